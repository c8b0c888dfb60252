//! Outbound transports for herald.
//!
//! Every provider implements [`Transport`]: send one message and report the
//! outcome. Ordinary provider failures (bad credentials, a rejected recipient,
//! a missing API key) come back as [`SendOutcome::failure`]; only exceptional
//! conditions such as a dropped connection surface as [`TransportError`].

pub mod brevo;
pub mod credentials;
pub mod error;
pub mod message;
pub mod smtp;

use async_trait::async_trait;

pub use brevo::{BrevoSettings, BrevoStatus, BrevoTransport, SenderIdentity};
pub use credentials::{CredentialSource, ProcessEnv, StaticCredentials};
pub use error::TransportError;
pub use message::{EmailMessage, SendOutcome};
pub use smtp::{ALTERNATE_PORTS, Security, SmtpSettings, SmtpTransport};

/// A provider capable of delivering a single email
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Attempt delivery of `message`.
    ///
    /// # Errors
    ///
    /// Returns an error only for exceptional conditions (network failures and
    /// the like). Provider rejections are reported through
    /// [`SendOutcome::failure`].
    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, TransportError>;
}
