//! Control protocol types

use std::time::Duration;

use herald_health::MonitorStatus;
use herald_queue::{EmailJob, JobId, Priority, QueueStatus, StatisticsSnapshot};
use herald_transport::{ALTERNATE_PORTS, EmailMessage};
use serde::{Deserialize, Serialize};

use crate::{
    ClearFailedReport, ConnectionTestReport, HealthReport, MonitorAction, Provider,
    SmtpProbeReport,
};

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Longest any single diagnostic step may take: one SMTP handshake or one
/// Brevo request
pub const DIAGNOSTIC_STEP: Duration = Duration::from_secs(30);

/// Budget for commands that only read or flip in-memory state
const QUICK_COMMAND: Duration = Duration::from_secs(10);

/// Request sent to the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub version: u32,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Liveness check
    Ping,
    Enqueue {
        message: EmailMessage,
        priority: Priority,
    },
    Health,
    Statistics,
    QueueStatus,
    /// Every job still held by the queue
    Jobs,
    Job(JobId),
    ClearFailed,
    PauseQueue,
    ResumeQueue,
    Monitoring(MonitorAction),
    TestConnection {
        provider: Provider,
        test_recipient: Option<String>,
    },
    TestAllConfigurations,
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Enqueue { .. } => "enqueue",
            Self::Health => "health",
            Self::Statistics => "statistics",
            Self::QueueStatus => "queue-status",
            Self::Jobs => "jobs",
            Self::Job(_) => "job",
            Self::ClearFailed => "clear-failed",
            Self::PauseQueue => "pause-queue",
            Self::ResumeQueue => "resume-queue",
            Self::Monitoring(_) => "monitoring",
            Self::TestConnection { .. } => "test-connection",
            Self::TestAllConfigurations => "test-all-configurations",
        }
    }

    /// How long the server lets a handler work on this command before
    /// answering with an error instead.
    ///
    /// Diagnostics get one [`DIAGNOSTIC_STEP`] per network step they may take:
    /// an SMTP check plus a Brevo send, or one probe per alternate port.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        let steps = match self {
            Self::TestConnection { .. } => 2,
            Self::TestAllConfigurations => {
                u32::try_from(ALTERNATE_PORTS.len()).unwrap_or(u32::MAX)
            }
            _ => 0,
        };

        DIAGNOSTIC_STEP.saturating_mul(steps) + QUICK_COMMAND
    }
}

/// Response from the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub version: u32,
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Command succeeded
    Ok,
    /// Command succeeded with data
    Data(Box<ResponseData>),
    /// Command failed with error message
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    Enqueued(JobId),
    Health(HealthReport),
    Statistics(StatisticsSnapshot),
    QueueStatus(QueueStatus),
    Jobs(Vec<EmailJob>),
    Job(EmailJob),
    ClearFailed(ClearFailedReport),
    Monitor(MonitorStatus),
    ConnectionTest(ConnectionTestReport),
    SmtpProbe(SmtpProbeReport),
    Message(String),
}

impl Request {
    /// Create a new request with the current protocol version
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            command,
        }
    }

    /// Only an exact version match is accepted
    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

impl Response {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Error(message.into()),
        }
    }

    #[must_use]
    pub const fn ok() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Ok,
        }
    }

    #[must_use]
    pub fn data(data: ResponseData) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Data(Box::new(data)),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.payload, ResponsePayload::Error(_))
    }

    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

/// Encode a message the way it travels over the control socket
///
/// # Errors
///
/// Fails if the value cannot be serialised
pub fn encode<T: Serialize>(value: &T) -> crate::Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        value,
        bincode::config::legacy(),
    )?)
}

/// # Errors
///
/// Fails if `bytes` is not a valid encoding of `T`
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> crate::Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
    Ok(value)
}
