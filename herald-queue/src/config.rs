use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

/// Queue tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Reported in status output only. Jobs are always sent one at a time.
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Pause after each successful send, skipped when nothing is left to send
    #[serde(default = "defaults::inter_send_delay_ms")]
    pub inter_send_delay_ms: u64,

    /// Total attempts a job gets before it is marked failed
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each one after
    #[serde(default = "defaults::base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            inter_send_delay_ms: defaults::inter_send_delay_ms(),
            max_retries: defaults::max_retries(),
            base_retry_delay_ms: defaults::base_retry_delay_ms(),
        }
    }
}

impl QueueConfig {
    pub const fn inter_send_delay(&self) -> Duration {
        Duration::from_millis(self.inter_send_delay_ms)
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_retry_delay_ms)
    }
}

mod defaults {
    pub const fn max_concurrent() -> usize {
        1
    }

    pub const fn inter_send_delay_ms() -> u64 {
        1000
    }

    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn base_retry_delay_ms() -> u64 {
        5000
    }
}
