//! Health monitor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits that turn statistics into alerts. Fixed once the monitor is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Alert when the success rate drops below `100 - failure_rate_pct`
    #[serde(default = "default_failure_rate_pct")]
    pub failure_rate_pct: f64,

    /// Reported with the thresholds; no check reads it
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,

    /// Provider's daily sending allowance
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u64,
}

const fn default_failure_rate_pct() -> f64 {
    10.0
}

const fn default_consecutive_failures() -> u32 {
    5
}

const fn default_daily_limit() -> u64 {
    300
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            failure_rate_pct: default_failure_rate_pct(),
            consecutive_failures: default_consecutive_failures(),
            daily_limit: default_daily_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Start monitoring as soon as the daemon is up
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub thresholds: AlertThresholds,
}

const fn default_enabled() -> bool {
    true
}

const fn default_interval_secs() -> u64 {
    300
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
