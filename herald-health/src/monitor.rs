//! The recurring health check.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use herald_common::internal;
use herald_queue::Statistics;
use parking_lot::Mutex;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    AlertThresholds, HealthError, MonitorStatus, OverallStatus, Severity,
    report::{self, HealthAlert},
};

/// What each tick runs against the live statistics
pub type HealthCheck =
    Arc<dyn Fn(&Statistics, &AlertThresholds) -> Option<HealthAlert> + Send + Sync>;

/// Periodically inspects send statistics and raises alerts.
///
/// At most one timer exists at a time: starting an already running monitor
/// replaces its timer rather than adding a second one. A check that panics
/// is logged and the timer keeps going.
pub struct HealthMonitor {
    statistics: Arc<Statistics>,
    thresholds: AlertThresholds,
    check: HealthCheck,
    started_at: Instant,
    task: Mutex<Option<JoinHandle<()>>>,
    alerts: broadcast::Sender<HealthAlert>,
    checks_run: Arc<AtomicU64>,
}

impl HealthMonitor {
    pub fn new(statistics: Arc<Statistics>, thresholds: AlertThresholds) -> Self {
        Self::with_check(statistics, thresholds, Arc::new(check))
    }

    /// A monitor whose ticks run `check` instead of the alert evaluation
    pub fn with_check(
        statistics: Arc<Statistics>,
        thresholds: AlertThresholds,
        check: HealthCheck,
    ) -> Self {
        let (alerts, _) = broadcast::channel(16);

        Self {
            statistics,
            thresholds,
            check,
            started_at: Instant::now(),
            task: Mutex::new(None),
            alerts,
            checks_run: Arc::new(AtomicU64::new(0)),
        }
    }

    pub const fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Begin checking every `interval`, replacing any timer already running.
    ///
    /// The first check happens one interval from now. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
            internal!(level = DEBUG, "Replacing running health monitor");
        }

        let statistics = Arc::clone(&self.statistics);
        let thresholds = self.thresholds;
        let check = Arc::clone(&self.check);
        let alerts = self.alerts.clone();
        let checks_run = Arc::clone(&self.checks_run);

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let statistics = Arc::clone(&statistics);
                let check = Arc::clone(&check);
                let result = tokio::spawn(async move { check(&statistics, &thresholds) })
                    .await
                    .map_err(HealthError::from);

                match result {
                    Ok(Some(alert)) => {
                        // Nobody listening is fine; the alert has been logged
                        let _ = alerts.send(alert);
                    }
                    Ok(None) => {}
                    Err(err) => tracing::error!(error = %err, "Health check failed"),
                }

                checks_run.fetch_add(1, Ordering::Relaxed);
            }
        }));

        tracing::info!(interval_secs = interval.as_secs(), "Health monitoring started");
    }

    /// Stop checking. Does nothing if already stopped.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::info!("Health monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Run a check immediately, outside the timer
    pub fn check_now(&self) -> Option<HealthAlert> {
        let alert = (self.check)(&self.statistics, &self.thresholds);
        if let Some(alert) = &alert {
            let _ = self.alerts.send(alert.clone());
        }
        alert
    }

    /// Receive every alert raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<HealthAlert> {
        self.alerts.subscribe()
    }

    /// Number of timer-driven checks completed since construction
    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> MonitorStatus {
        let statistics = self.statistics.snapshot();

        MonitorStatus {
            overall_status: OverallStatus::from_success_rate(statistics.success_rate),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            recommendations: report::recommendations(&statistics, &self.thresholds),
            monitoring: self.is_running(),
            checks_run: self.checks_run(),
            thresholds: self.thresholds,
            statistics,
        }
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("thresholds", &self.thresholds)
            .field("running", &self.is_running())
            .field("checks_run", &self.checks_run())
            .finish_non_exhaustive()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn check(statistics: &Statistics, thresholds: &AlertThresholds) -> Option<HealthAlert> {
    let Some(alert) = report::evaluate(statistics.snapshot(), thresholds, Utc::now()) else {
        tracing::debug!("Health check passed");
        return None;
    };

    let issues = alert.issues.join("; ");
    match alert.severity {
        Severity::Critical | Severity::High => tracing::error!(
            severity = %alert.severity,
            issues = %issues,
            sent = alert.stats.sent,
            failed = alert.stats.failed,
            retries = alert.stats.retries,
            success_rate = alert.stats.success_rate,
            "Email health alert"
        ),
        Severity::Medium | Severity::Low => tracing::warn!(
            severity = %alert.severity,
            issues = %issues,
            sent = alert.stats.sent,
            failed = alert.stats.failed,
            retries = alert.stats.retries,
            success_rate = alert.stats.success_rate,
            "Email health alert"
        ),
    }

    Some(alert)
}
