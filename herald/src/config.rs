//! The daemon's configuration file.
//!
//! Everything here is optional; a missing section takes its defaults.
//! Credentials never live in this file, they are read from the environment
//! when a transport first needs them.

use herald_control::DEFAULT_CONTROL_SOCKET;
use herald_health::MonitorConfig;
use herald_queue::QueueConfig;
use herald_transport::{BrevoSettings, SmtpSettings};
use serde::Deserialize;

/// Which provider the queue sends through. The other one remains available
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Primary {
    #[default]
    Smtp,
    Brevo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

fn default_socket_path() -> String {
    DEFAULT_CONTROL_SOCKET.to_string()
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Herald {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default)]
    pub brevo: BrevoSettings,
    #[serde(default)]
    pub primary: Primary,
    #[serde(default)]
    pub control: ControlConfig,
}
