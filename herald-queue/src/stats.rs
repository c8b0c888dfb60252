//! Cumulative send counters shared between the queue and the health monitor.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub sent: u64,
    pub failed: u64,
    pub retries: u64,
    pub success_rate: f64,
    pub last_error: Option<LastError>,
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self {
            sent: 0,
            failed: 0,
            retries: 0,
            success_rate: success_rate(0, 0),
            last_error: None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: u64,
    failed: u64,
    retries: u64,
    last_error: Option<LastError>,
}

/// Counters for the lifetime of the process. They only ever go up.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

/// Percentage of finished jobs that were delivered.
///
/// With nothing finished yet there is nothing to fault, so this is 100.
#[allow(clippy::cast_precision_loss)]
pub fn success_rate(sent: u64, failed: u64) -> f64 {
    let total = sent + failed;
    if total == 0 {
        100.0
    } else {
        sent as f64 / total as f64 * 100.0
    }
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.counters.lock().sent += 1;
    }

    pub fn record_retry(&self) {
        self.counters.lock().retries += 1;
    }

    pub fn record_failed(&self) {
        self.counters.lock().failed += 1;
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.counters.lock().last_error = Some(LastError {
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let counters = self.counters.lock();

        StatisticsSnapshot {
            sent: counters.sent,
            failed: counters.failed,
            retries: counters.retries,
            success_rate: success_rate(counters.sent, counters.failed),
            last_error: counters.last_error.clone(),
        }
    }
}
