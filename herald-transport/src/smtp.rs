//! SMTP delivery through an authenticated relay.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_common::internal;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{
    EmailMessage, SendOutcome, Transport, TransportError,
    credentials::{CredentialSource, EMAIL_PASS, EMAIL_USER},
};

const PROVIDER: &str = "SMTP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// Plain connection upgraded with STARTTLS before authenticating
    #[default]
    Starttls,
    /// Implicit TLS from the first byte
    Tls,
    /// No encryption at all. Only useful against a local relay
    Plain,
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starttls => "STARTTLS",
            Self::Tls => "TLS",
            Self::Plain => "plain",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub security: Security,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_host() -> String {
    "smtp.gmail.com".to_string()
}

const fn default_port() -> u16 {
    587
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_from_name() -> String {
    "Herald".to_string()
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            security: Security::default(),
            timeout_secs: default_timeout_secs(),
            from_name: default_from_name(),
        }
    }
}

/// Port/security combinations tried, in order, by diagnostics
pub const ALTERNATE_PORTS: [(u16, Security); 4] = [
    (587, Security::Starttls),
    (465, Security::Tls),
    (25, Security::Starttls),
    (2525, Security::Starttls),
];

impl SmtpSettings {
    /// [`ALTERNATE_PORTS`] applied to the configured host
    pub fn alternates(&self) -> Vec<Self> {
        ALTERNATE_PORTS
            .into_iter()
            .map(|(port, security)| Self {
                port,
                security,
                ..self.clone()
            })
            .collect()
    }
}

impl fmt::Display for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.security)
    }
}

struct SmtpClient {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Address,
}

pub struct SmtpTransport {
    settings: SmtpSettings,
    credentials: Arc<dyn CredentialSource>,
    client: OnceCell<SmtpClient>,
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("settings", &self.settings)
            .field("connected", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl SmtpTransport {
    pub fn new(settings: SmtpSettings, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            settings,
            credentials,
            client: OnceCell::new(),
        }
    }

    pub const fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    fn connect(&self, settings: &SmtpSettings) -> Result<SmtpClient, TransportError> {
        let user = self.credentials.get(EMAIL_USER).ok_or_else(|| {
            TransportError::NotConfigured(PROVIDER, format!("{EMAIL_USER} is not set"))
        })?;
        let password = self.credentials.get(EMAIL_PASS).ok_or_else(|| {
            TransportError::NotConfigured(PROVIDER, format!("{EMAIL_PASS} is not set"))
        })?;
        let sender = user.parse::<Address>().map_err(|err| {
            TransportError::NotConfigured(PROVIDER, format!("{EMAIL_USER} is not an address: {err}"))
        })?;

        let builder = match settings.security {
            Security::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?,
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
            Security::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let mailer = builder
            .port(settings.port)
            .credentials(Credentials::new(user, password))
            .timeout(Some(Duration::from_secs(settings.timeout_secs)))
            .build();

        internal!(level = DEBUG, "Built SMTP client for {settings}");

        Ok(SmtpClient { mailer, sender })
    }

    /// The shared client, built on first use. A failed build is not cached.
    async fn client(&self) -> Result<&SmtpClient, TransportError> {
        self.client
            .get_or_try_init(|| async { self.connect(&self.settings) })
            .await
    }

    fn build_message(
        &self,
        sender: &Address,
        message: &EmailMessage,
        message_id: &str,
    ) -> Result<Message, String> {
        let name = message
            .from_name
            .clone()
            .unwrap_or_else(|| self.settings.from_name.clone());
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|err| format!("Invalid recipient {}: {err}", message.to))?;

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(name), sender.clone()))
            .to(to)
            .subject(message.subject.clone())
            .message_id(Some(message_id.to_string()));

        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse::<Mailbox>()
                    .map_err(|err| format!("Invalid reply-to {reply_to}: {err}"))?,
            );
        }

        let built = match &message.text {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                message.html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(message.html.clone()),
        };

        built.map_err(|err| format!("Unable to build message: {err}"))
    }

    /// Check that the relay accepts a connection with the current credentials.
    ///
    /// # Errors
    ///
    /// Fails when credentials are missing or the connection cannot be made.
    pub async fn verify(&self) -> Result<bool, TransportError> {
        let client = self.client().await?;
        Ok(client.mailer.test_connection().await?)
    }

    /// One-off connection check against `settings` without touching the
    /// shared client.
    ///
    /// # Errors
    ///
    /// Fails when credentials are missing or the connection cannot be made.
    pub async fn probe(&self, settings: &SmtpSettings) -> Result<bool, TransportError> {
        let client = self.connect(settings)?;
        Ok(client.mailer.test_connection().await?)
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, TransportError> {
        let client = match self.client().await {
            Ok(client) => client,
            Err(err @ TransportError::NotConfigured(..)) => {
                return Ok(SendOutcome::failure(err.to_string()));
            }
            Err(err) => return Err(err),
        };

        let message_id = format!("<{}@{}>", ulid::Ulid::new(), client.sender.domain());
        let email = match self.build_message(&client.sender, message, &message_id) {
            Ok(email) => email,
            Err(reason) => return Ok(SendOutcome::failure(reason)),
        };

        match client.mailer.send(email).await {
            Ok(response) => {
                tracing::debug!(
                    to = %message.to,
                    message_id = %message_id,
                    code = %response.code(),
                    "SMTP relay accepted message"
                );
                Ok(SendOutcome::delivered(Some(message_id)))
            }
            Err(err) if err.is_permanent() || err.is_transient() => {
                Ok(SendOutcome::failure(format!("SMTP relay rejected message: {err}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}
