//! Operating a running herald instance.
//!
//! [`ControlSurface`] is the set of inspection and command operations an
//! outer layer may call. The same operations are reachable from outside the
//! process through a Unix domain socket speaking a small length-prefixed
//! bincode protocol ([`ControlServer`] / [`ControlClient`]).

pub mod client;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod report;
pub mod server;
pub mod surface;

pub use client::ControlClient;
pub use error::{ControlError, Result};
pub use protocol::{
    Command, DIAGNOSTIC_STEP, PROTOCOL_VERSION, Request, Response, ResponseData, ResponsePayload,
};
pub use report::{
    ClearFailedReport, ConnectionTestReport, HealthReport, MonitorAction, ProbeResult, Provider,
    SmtpProbeReport, TestResult, TestStatus,
};
pub use server::{CommandHandler, ControlServer};
pub use surface::ControlSurface;

/// Default path for the control socket
pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/herald.sock";
