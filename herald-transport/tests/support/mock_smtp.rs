//! A minimal authenticated SMTP relay for exercising the SMTP transport.
//!
//! It speaks just enough of the protocol for a plaintext session: EHLO with
//! `AUTH PLAIN`, MAIL/RCPT/DATA, NOOP, RSET and QUIT. Every command line is
//! recorded so tests can assert on what the client sent.

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    Ehlo,
    Auth,
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    Noop,
    Rset,
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct RelayConfig {
    auth: Reply,
    rcpt_to: Reply,
    data_end: Reply,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            auth: Reply::new(235, "2.7.0 Authentication successful"),
            rcpt_to: Reply::new(250, "OK"),
            data_end: Reply::new(250, "OK: queued"),
        }
    }
}

pub struct MockRelay {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<RelayCommand>>>,
    shutdown: Arc<AtomicBool>,
}

impl MockRelay {
    pub fn builder() -> MockRelayBuilder {
        MockRelayBuilder {
            config: RelayConfig::default(),
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<RelayCommand> {
        self.commands.read().await.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    fn ehlo() -> Vec<u8> {
        let mut response = String::new();
        for (i, line) in ["mock.relay", "AUTH PLAIN", "SIZE 10000000"].iter().enumerate() {
            let sep = if i == 2 { ' ' } else { '-' };
            let _ = write!(&mut response, "250{sep}{line}\r\n");
        }
        response.into_bytes()
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<RelayConfig>,
        commands: Arc<RwLock<Vec<RelayCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(b"220 mock.relay ESMTP ready\r\n").await?;
        writer.flush().await?;

        loop {
            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let cmd_line = line.trim_end().to_string();
            let verb = cmd_line
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_uppercase();
            let argument = || cmd_line.splitn(2, ':').nth(1).unwrap_or_default().trim().to_string();

            let (command, response) = match verb.as_str() {
                "EHLO" => (RelayCommand::Ehlo, Self::ehlo()),
                "AUTH" => (RelayCommand::Auth, config.auth.to_bytes()),
                "MAIL" => (RelayCommand::MailFrom(argument()), Reply::new(250, "OK").to_bytes()),
                "RCPT" => (RelayCommand::RcptTo(argument()), config.rcpt_to.to_bytes()),
                "NOOP" => (RelayCommand::Noop, Reply::new(250, "OK").to_bytes()),
                "RSET" => (RelayCommand::Rset, Reply::new(250, "OK").to_bytes()),
                "QUIT" => {
                    commands.write().await.push(RelayCommand::Quit);
                    writer.write_all(&Reply::new(221, "Bye").to_bytes()).await?;
                    writer.flush().await?;
                    return Ok(());
                }
                "DATA" => {
                    commands.write().await.push(RelayCommand::Data);
                    writer
                        .write_all(&Reply::new(354, "End data with <CR><LF>.<CR><LF>").to_bytes())
                        .await?;
                    writer.flush().await?;

                    let mut content = String::new();
                    let mut data_line = String::new();
                    loop {
                        data_line.clear();
                        if reader.read_line(&mut data_line).await? == 0 {
                            return Ok(());
                        }
                        if data_line.trim_end() == "." {
                            break;
                        }
                        content.push_str(&data_line);
                    }

                    commands.write().await.push(RelayCommand::MessageContent(content));
                    writer.write_all(&config.data_end.to_bytes()).await?;
                    writer.flush().await?;
                    continue;
                }
                _ => (
                    RelayCommand::Other(cmd_line.clone()),
                    Reply::new(502, "Command not implemented").to_bytes(),
                ),
            };

            commands.write().await.push(command);
            writer.write_all(&response).await?;
            writer.flush().await?;
        }
    }
}

pub struct MockRelayBuilder {
    config: RelayConfig,
}

impl MockRelayBuilder {
    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    pub async fn build(self) -> std::io::Result<MockRelay> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_commands = Arc::clone(&commands);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while !accept_shutdown.load(Ordering::Relaxed) {
                if let Ok(Ok((stream, _))) =
                    timeout(Duration::from_millis(100), listener.accept()).await
                {
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&accept_commands);
                    tokio::spawn(async move {
                        let _ = MockRelay::handle_client(stream, config, commands).await;
                    });
                }
            }
        });

        Ok(MockRelay {
            addr,
            commands,
            shutdown,
        })
    }
}
