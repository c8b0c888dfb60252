use thiserror::Error;

/// Exceptional transport conditions.
///
/// A provider refusing a message is not one of these; see
/// [`crate::SendOutcome::failure`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} not configured: {1}")]
    NotConfigured(&'static str, String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
