//! Inspection and command operations over a running pipeline.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use herald_health::{HealthMonitor, MonitorStatus};
use herald_queue::{
    EmailJob, EmailQueue, JobId, Priority, QueueError, QueueStatus, StatisticsSnapshot,
};
use herald_transport::{BrevoTransport, EmailMessage, SmtpTransport};

use crate::{
    ClearFailedReport, ConnectionTestReport, DIAGNOSTIC_STEP, HealthReport, MonitorAction,
    ProbeResult, Provider, SmtpProbeReport, TestResult, TestStatus,
};

/// Everything an operator (or an outer API layer) may do to a running
/// pipeline. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct ControlSurface {
    queue: EmailQueue,
    monitor: Arc<HealthMonitor>,
    smtp: Arc<SmtpTransport>,
    brevo: Arc<BrevoTransport>,
    monitor_interval: Duration,
}

/// Advice drawn from the control surface's own view of the numbers.
///
/// This is deliberately separate from the monitor's recommendations and uses
/// different limits.
#[allow(clippy::cast_precision_loss)]
pub fn recommendations(stats: &StatisticsSnapshot, queue: &QueueStatus) -> Vec<String> {
    let mut advice = Vec::new();

    if stats.success_rate < 80.0 {
        advice.push("Success rate is below 80%: verify provider credentials".to_string());
    }
    if stats.sent > 400 {
        advice.push("Sending volume is high: consider a higher provider tier".to_string());
    }
    if queue.failed > 10 {
        advice.push(format!(
            "{} failed emails are waiting in the queue: review and clear them",
            queue.failed
        ));
    }
    if stats.retries as f64 > stats.sent as f64 * 0.1 {
        advice.push("Retries are frequent: check network stability".to_string());
    }

    advice
}

impl ControlSurface {
    pub const fn new(
        queue: EmailQueue,
        monitor: Arc<HealthMonitor>,
        smtp: Arc<SmtpTransport>,
        brevo: Arc<BrevoTransport>,
        monitor_interval: Duration,
    ) -> Self {
        Self {
            queue,
            monitor,
            smtp,
            brevo,
            monitor_interval,
        }
    }

    pub fn enqueue(&self, payload: EmailMessage, priority: Priority) -> JobId {
        self.queue.enqueue(payload, priority)
    }

    pub fn health(&self) -> HealthReport {
        let statistics = self.statistics();
        let queue_status = self.queue_status();

        HealthReport {
            recommendations: recommendations(&statistics, &queue_status),
            monitor_status: self.monitor.status(),
            statistics,
            queue_status,
            timestamp: Utc::now(),
        }
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.queue.statistics().snapshot()
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    pub fn jobs(&self) -> Vec<EmailJob> {
        self.queue.jobs()
    }

    /// # Errors
    ///
    /// If the job is no longer held by the queue
    pub fn job(&self, id: JobId) -> Result<EmailJob, QueueError> {
        self.queue.job(id)
    }

    pub fn pause_queue(&self) {
        self.queue.pause();
    }

    pub fn resume_queue(&self) {
        self.queue.resume();
    }

    pub fn clear_failed_emails(&self) -> ClearFailedReport {
        let cleared = self.queue.clear_failed();

        ClearFailedReport {
            before_count: cleared.before,
            after_count: cleared.after,
            cleared: cleared.count(),
        }
    }

    pub fn toggle_monitoring(&self, action: MonitorAction) -> MonitorStatus {
        match action {
            MonitorAction::Start => self.monitor.start(self.monitor_interval),
            MonitorAction::Stop => self.monitor.stop(),
        }
        self.monitor.status()
    }

    /// Check the chosen provider(s), reporting each check as PASS or FAIL.
    ///
    /// For Brevo this sends one real email to `test_recipient` (or the
    /// configured diagnostic address).
    pub async fn test_connection(
        &self,
        provider: Provider,
        test_recipient: Option<&str>,
    ) -> ConnectionTestReport {
        let mut tests = Vec::new();

        if matches!(provider, Provider::Smtp | Provider::All) {
            tests.push(self.test_smtp().await);
        }

        if matches!(provider, Provider::Brevo | Provider::All) {
            tests.extend(self.test_brevo(test_recipient).await);
        }

        let report = ConnectionTestReport::new(tests);
        tracing::info!(?provider, overall = %report.overall_status, "Connection test finished");
        report
    }

    async fn test_smtp(&self) -> TestResult {
        let target = self.smtp.settings().to_string();

        match within_step(self.smtp.verify()).await {
            Ok(true) => TestResult::new("SMTP connection", true, format!("Connected to {target}")),
            Ok(false) => TestResult::new(
                "SMTP connection",
                false,
                format!("{target} did not respond to NOOP"),
            ),
            Err(detail) => TestResult::new("SMTP connection", false, detail),
        }
    }

    async fn test_brevo(&self, test_recipient: Option<&str>) -> Vec<TestResult> {
        let status = self.brevo.status();
        let configuration = TestResult::new(
            "Brevo configuration",
            status.has_api_key,
            if status.has_api_key {
                format!(
                    "API key present, sending as {} <{}>",
                    status.sender_identity.name,
                    status.sender_identity.email.as_deref().unwrap_or("unset")
                )
            } else {
                "BREVO_API_KEY is not set".to_string()
            },
        );

        let send = match within_step(self.brevo.test_connection(test_recipient)).await {
            Ok(outcome) if outcome.success => TestResult::new(
                "Brevo test email",
                true,
                format!(
                    "Accepted with message id {}",
                    outcome.message_id.as_deref().unwrap_or("unknown")
                ),
            ),
            Ok(outcome) => TestResult::new(
                "Brevo test email",
                false,
                outcome.error.unwrap_or_else(|| "Send failed".to_string()),
            ),
            Err(detail) => TestResult::new("Brevo test email", false, detail),
        };

        vec![configuration, send]
    }

    /// Try each alternate SMTP port/security combination in turn, stopping at
    /// the first that accepts a connection. Diagnostic only; the running
    /// transport is never switched.
    pub async fn test_all_smtp_configurations(&self) -> SmtpProbeReport {
        let mut details = Vec::new();
        let mut working_config_index = None;

        for (index, settings) in self.smtp.settings().alternates().iter().enumerate() {
            let (passed, detail) = match within_step(self.smtp.probe(settings)).await {
                Ok(true) => (true, "Connection verified".to_string()),
                Ok(false) => (false, "Server did not respond to NOOP".to_string()),
                Err(detail) => (false, detail),
            };

            tracing::debug!(config = %settings, passed, "Probed SMTP configuration");
            details.push(ProbeResult {
                config: settings.to_string(),
                status: TestStatus::from_bool(passed),
                details: detail,
            });

            if passed {
                working_config_index = Some(index);
                break;
            }
        }

        SmtpProbeReport {
            has_working_config: working_config_index.is_some(),
            working_config_index,
            details,
        }
    }
}

/// Bound one network step of a diagnostic so the whole command finishes
/// inside its deadline even when a server accepts and then stays silent.
async fn within_step<T, E: std::fmt::Display>(
    step: impl Future<Output = Result<T, E>>,
) -> Result<T, String> {
    match tokio::time::timeout(DIAGNOSTIC_STEP, step).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("No response within {}s", DIAGNOSTIC_STEP.as_secs())),
    }
}
