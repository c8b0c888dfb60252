//! Advisory health monitoring for herald.
//!
//! The monitor only ever reads [`Statistics`](herald_queue::Statistics). It
//! never touches the queue or a transport, so nothing it does can hold up a
//! send.

pub mod config;
pub mod error;
pub mod monitor;
pub mod report;

pub use config::{AlertThresholds, MonitorConfig};
pub use error::HealthError;
pub use monitor::{HealthCheck, HealthMonitor};
pub use report::{HealthAlert, MonitorStatus, OverallStatus, Severity};
