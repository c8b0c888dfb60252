//! The in-memory send queue.
//!
//! [`EmailQueue`] accepts jobs, drains them one at a time through a
//! [`Transport`](herald_transport::Transport), retries failures with
//! exponential backoff and keeps terminally failed jobs around for inspection.
//! Every attempt is counted in the shared [`Statistics`].

pub mod config;
pub mod error;
pub mod job;
pub mod policy;
pub mod queue;
pub mod stats;

pub use config::QueueConfig;
pub use error::QueueError;
pub use job::{EmailJob, JobId, JobStatus, Priority};
pub use policy::RetryPolicy;
pub use queue::{Cleared, EmailQueue, QueueStatus};
pub use stats::{LastError, Statistics, StatisticsSnapshot};
