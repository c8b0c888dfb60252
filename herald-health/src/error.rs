//! Health monitor error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    /// The task running a single check panicked or was cancelled
    #[error("Health check did not complete: {0}")]
    CheckFailed(#[from] tokio::task::JoinError),
}
