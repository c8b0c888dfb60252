//! Pieces shared by every herald crate: the shutdown signal and logging setup.

pub mod logging;

pub use tracing;

/// Broadcast to every long-running task when the process is asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
