//! Results handed back by the control surface

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use herald_health::MonitorStatus;
use herald_queue::{QueueStatus, StatisticsSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorAction {
    Start,
    Stop,
}

/// Which provider a connection test targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    Smtp,
    Brevo,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Pass,
    Fail,
}

impl TestStatus {
    pub const fn from_bool(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail }
    }
}

impl Display for TestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub details: String,
}

impl TestResult {
    pub fn new(name: impl Into<String>, passed: bool, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::from_bool(passed),
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestReport {
    pub tests: Vec<TestResult>,
    pub overall_status: TestStatus,
}

impl ConnectionTestReport {
    /// Passes only when every individual test passed
    pub fn new(tests: Vec<TestResult>) -> Self {
        let overall_status = TestStatus::from_bool(
            !tests.is_empty() && tests.iter().all(|t| t.status == TestStatus::Pass),
        );
        Self {
            tests,
            overall_status,
        }
    }
}

impl Display for ConnectionTestReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for test in &self.tests {
            writeln!(f, "[{}] {}: {}", test.status, test.name, test.details)?;
        }
        write!(f, "Overall: {}", self.overall_status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub config: String,
    pub status: TestStatus,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpProbeReport {
    pub has_working_config: bool,
    pub working_config_index: Option<usize>,
    pub details: Vec<ProbeResult>,
}

impl Display for SmtpProbeReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, probe) in self.details.iter().enumerate() {
            writeln!(f, "{index}: [{}] {} {}", probe.status, probe.config, probe.details)?;
        }
        match self.working_config_index {
            Some(index) => write!(f, "Working configuration: {index}"),
            None => f.write_str("No working configuration found"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearFailedReport {
    pub before_count: usize,
    pub after_count: usize,
    pub cleared: usize,
}

impl Display for ClearFailedReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cleared {} failed email(s); queue length {} -> {}",
            self.cleared, self.before_count, self.after_count
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub statistics: StatisticsSnapshot,
    pub queue_status: QueueStatus,
    pub monitor_status: MonitorStatus,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Display for HealthReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stats = &self.statistics;
        let queue = &self.queue_status;
        let monitor = &self.monitor_status;

        writeln!(f, "Status:       {}", monitor.overall_status)?;
        writeln!(f, "Checked at:   {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Sent:         {} (failed {}, retries {}, success {:.1}%)",
            stats.sent, stats.failed, stats.retries, stats.success_rate
        )?;
        if let Some(last) = &stats.last_error {
            writeln!(
                f,
                "Last error:   {} at {}",
                last.message,
                last.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
        }
        writeln!(
            f,
            "Queue:        {} job(s), {} queued, {} sending, {} failed{}",
            queue.queue_length,
            queue.queued,
            queue.sending,
            queue.failed,
            if queue.processing { ", draining" } else { "" }
        )?;
        writeln!(
            f,
            "Monitoring:   {} ({} checks, up {}s)",
            if monitor.monitoring { "on" } else { "off" },
            monitor.checks_run,
            monitor.uptime_seconds
        )?;

        let advice: Vec<_> = self
            .recommendations
            .iter()
            .chain(&monitor.recommendations)
            .collect();
        if !advice.is_empty() {
            f.write_str("\n--- Recommendations ---\n")?;
            for line in advice {
                writeln!(f, "- {line}")?;
            }
        }

        Ok(())
    }
}
