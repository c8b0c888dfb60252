//! Turning a statistics snapshot into issues, alerts and advice.
//!
//! Everything here is a pure function of its inputs.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use herald_queue::StatisticsSnapshot;
use serde::{Deserialize, Serialize};

use crate::AlertThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Healthy,
    Warning,
    Critical,
}

impl OverallStatus {
    pub fn from_success_rate(success_rate: f64) -> Self {
        if success_rate >= 95.0 {
            Self::Healthy
        } else if success_rate >= 80.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "HEALTHY",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub timestamp: DateTime<Utc>,
    pub issues: Vec<String>,
    pub stats: StatisticsSnapshot,
    pub severity: Severity,
}

/// What the monitor reports when asked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub statistics: StatisticsSnapshot,
    pub overall_status: OverallStatus,
    pub uptime_seconds: u64,
    pub recommendations: Vec<String>,
    pub monitoring: bool,
    pub checks_run: u64,
    pub thresholds: AlertThresholds,
}

#[allow(clippy::cast_precision_loss)]
fn fraction_of(value: u64, fraction: f64) -> f64 {
    value as f64 * fraction
}

#[allow(clippy::cast_precision_loss)]
fn exceeds(count: u64, limit: f64) -> bool {
    count as f64 > limit
}

/// The problems visible in `stats` as of `now`
pub fn issues(
    stats: &StatisticsSnapshot,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut issues = Vec::new();

    if stats.success_rate < 100.0 - thresholds.failure_rate_pct {
        issues.push(format!(
            "High failure rate: {:.1}% of emails delivered",
            stats.success_rate
        ));
    }

    if stats.sent > thresholds.daily_limit {
        issues.push(format!(
            "Approaching daily limit: {} sent against a limit of {}",
            stats.sent, thresholds.daily_limit
        ));
    }

    if let Some(last) = &stats.last_error
        && now - last.timestamp < Duration::hours(1)
    {
        issues.push(format!("Recent error: {}", last.message));
    }

    issues
}

pub fn severity(stats: &StatisticsSnapshot, thresholds: &AlertThresholds) -> Severity {
    if stats.success_rate < 50.0 {
        Severity::Critical
    } else if stats.success_rate < 80.0 {
        Severity::High
    } else if exceeds(stats.sent, fraction_of(thresholds.daily_limit, 0.9)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Build an alert if anything in `stats` needs attention
pub fn evaluate(
    stats: StatisticsSnapshot,
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Option<HealthAlert> {
    let issues = issues(&stats, thresholds, now);
    if issues.is_empty() {
        return None;
    }

    Some(HealthAlert {
        timestamp: now,
        issues,
        severity: severity(&stats, thresholds),
        stats,
    })
}

pub fn recommendations(stats: &StatisticsSnapshot, thresholds: &AlertThresholds) -> Vec<String> {
    let mut advice = Vec::new();

    if stats.success_rate < 80.0 {
        advice.push("Check email provider credentials and configuration".to_string());
    }

    if exceeds(stats.sent, fraction_of(thresholds.daily_limit, 0.8)) {
        advice.push(
            "Sending is close to the daily limit: upgrade the provider tier or queue non-urgent email"
                .to_string(),
        );
    }

    if exceeds(stats.retries, fraction_of(stats.sent, 0.1)) {
        advice.push("Retry count is high: check connectivity to the email provider".to_string());
    }

    advice
}
