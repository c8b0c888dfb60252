//! Command-line utility for operating a running herald
//!
//! Every command is sent over the control socket; nothing here touches a
//! provider directly.

use std::{fs, path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use herald_control::{
    Command, ControlClient, DEFAULT_CONTROL_SOCKET, MonitorAction, Provider, Request,
    ResponseData, ResponsePayload,
};
use herald_health::MonitorStatus;
use herald_queue::{EmailJob, JobId, Priority, QueueStatus, StatisticsSnapshot};
use herald_transport::EmailMessage;

/// Command-line utility for operating herald
#[derive(Parser, Debug)]
#[command(name = "heraldctl")]
#[command(about = "Operate a running herald email pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the control socket
    #[arg(short = 'c', long, default_value = DEFAULT_CONTROL_SOCKET)]
    control_socket: String,

    /// Give up after this many seconds instead of the command's own deadline
    #[arg(short = 't', long, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that herald is responding
    Ping,
    /// Queue an email for delivery
    Send {
        /// Recipient address
        to: String,
        subject: String,
        /// File holding the HTML body
        #[arg(long)]
        html: PathBuf,
        /// File holding a plain-text alternative
        #[arg(long)]
        text: Option<PathBuf>,
        #[arg(long)]
        reply_to: Option<String>,
        #[arg(long)]
        from_name: Option<String>,
        /// Jump ahead of normal-priority mail
        #[arg(long)]
        high: bool,
    },
    /// Statistics, queue state, monitor state and recommendations
    Health,
    /// Send and failure counters
    Stats,
    /// Queue management
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Start or stop the health monitor
    Monitor {
        #[arg(value_enum)]
        action: MonitorArg,
    },
    /// Check provider connectivity (Brevo sends a real test email)
    Test {
        #[arg(value_enum, default_value = "all")]
        provider: ProviderArg,
        /// Where to send the Brevo test email
        #[arg(long)]
        recipient: Option<String>,
    },
    /// Try each alternate SMTP port and security mode
    ProbeSmtp,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Job counts
    Status,
    /// List every job the queue holds
    List,
    /// Show one job
    View { id: JobId },
    /// Drop failed jobs
    ClearFailed,
    /// Stop sending after the current email
    Pause,
    Resume,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MonitorArg {
    Start,
    Stop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Smtp,
    Brevo,
    All,
}

impl From<MonitorArg> for MonitorAction {
    fn from(value: MonitorArg) -> Self {
        match value {
            MonitorArg::Start => Self::Start,
            MonitorArg::Stop => Self::Stop,
        }
    }
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Smtp => Self::Smtp,
            ProviderArg::Brevo => Self::Brevo,
            ProviderArg::All => Self::All,
        }
    }
}

impl Commands {
    fn into_command(self) -> anyhow::Result<Command> {
        Ok(match self {
            Self::Ping => Command::Ping,
            Self::Send {
                to,
                subject,
                html,
                text,
                reply_to,
                from_name,
                high,
            } => {
                let mut message = EmailMessage::new(to, subject, fs::read_to_string(&html)?);
                if let Some(text) = text {
                    message = message.with_text(fs::read_to_string(text)?);
                }
                if let Some(reply_to) = reply_to {
                    message = message.with_reply_to(reply_to);
                }
                if let Some(from_name) = from_name {
                    message = message.with_from_name(from_name);
                }
                Command::Enqueue {
                    message,
                    priority: if high { Priority::High } else { Priority::Normal },
                }
            }
            Self::Health => Command::Health,
            Self::Stats => Command::Statistics,
            Self::Queue { action } => match action {
                QueueAction::Status => Command::QueueStatus,
                QueueAction::List => Command::Jobs,
                QueueAction::View { id } => Command::Job(id),
                QueueAction::ClearFailed => Command::ClearFailed,
                QueueAction::Pause => Command::PauseQueue,
                QueueAction::Resume => Command::ResumeQueue,
            },
            Self::Monitor { action } => Command::Monitoring(action.into()),
            Self::Test {
                provider,
                recipient,
            } => Command::TestConnection {
                provider: provider.into(),
                test_recipient: recipient,
            },
            Self::ProbeSmtp => Command::TestAllConfigurations,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    herald_common::logging::init();

    let cli = Cli::parse();
    let mut client = ControlClient::new(&cli.control_socket);
    if let Some(secs) = cli.timeout {
        client = client.with_timeout(Duration::from_secs(secs));
    }
    client.check_socket_exists()?;

    let response = client
        .send_request(Request::new(cli.command.into_command()?))
        .await?;

    match response.payload {
        ResponsePayload::Ok => println!("OK"),
        ResponsePayload::Data(data) => print_data(*data),
        ResponsePayload::Error(err) => anyhow::bail!(err),
    }

    Ok(())
}

fn print_data(data: ResponseData) {
    match data {
        ResponseData::Enqueued(id) => println!("Queued {id}"),
        ResponseData::Health(report) => print!("{report}"),
        ResponseData::Statistics(stats) => print_statistics(&stats),
        ResponseData::QueueStatus(status) => print_queue_status(&status),
        ResponseData::Jobs(jobs) => {
            if jobs.is_empty() {
                println!("Queue is empty");
                return;
            }
            println!("{:<28} {:<8} {:<8} {:>8}  RECIPIENT", "ID", "STATUS", "PRIORITY", "ATTEMPTS");
            for job in jobs {
                let id = job.id.to_string();
                let status = job.status.to_string();
                let priority = format!("{:?}", job.priority);
                println!(
                    "{id:<28} {status:<8} {priority:<8} {:>8}  {}",
                    job.attempts, job.payload.to
                );
            }
        }
        ResponseData::Job(job) => print_job(&job),
        ResponseData::ClearFailed(report) => println!("{report}"),
        ResponseData::Monitor(status) => print_monitor(&status),
        ResponseData::ConnectionTest(report) => print!("{report}"),
        ResponseData::SmtpProbe(report) => print!("{report}"),
        ResponseData::Message(message) => println!("{message}"),
    }
}

fn print_statistics(stats: &StatisticsSnapshot) {
    println!("Sent:         {}", stats.sent);
    println!("Failed:       {}", stats.failed);
    println!("Retries:      {}", stats.retries);
    println!("Success rate: {:.1}%", stats.success_rate);
    match &stats.last_error {
        Some(last) => println!(
            "Last error:   {} at {}",
            last.message,
            last.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Last error:   none"),
    }
}

fn print_queue_status(status: &QueueStatus) {
    println!(
        "{} job(s): {} queued, {} sending, {} failed ({})",
        status.queue_length,
        status.queued,
        status.sending,
        status.failed,
        if status.processing { "processing" } else { "idle" }
    );
}

fn print_job(job: &EmailJob) {
    println!("ID:        {}", job.id);
    println!("To:        {}", job.payload.to);
    println!("Subject:   {}", job.payload.subject);
    println!("Status:    {}", job.status);
    println!("Priority:  {:?}", job.priority);
    println!("Attempts:  {}", job.attempts);
    println!("Created:   {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(sent_at) = job.sent_at {
        println!("Sent:      {}", sent_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(failed_at) = job.failed_at {
        println!("Failed:    {}", failed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(message_id) = &job.message_id {
        println!("Message:   {message_id}");
    }
    if let Some(error) = &job.last_error {
        println!("Error:     {error}");
    }
}

fn print_monitor(status: &MonitorStatus) {
    println!(
        "Monitoring: {} ({} check(s) run, up {}s)",
        if status.monitoring { "running" } else { "stopped" },
        status.checks_run,
        status.uptime_seconds
    );
    println!("Status:     {}", status.overall_status);
    for recommendation in &status.recommendations {
        println!("  - {recommendation}");
    }
}
