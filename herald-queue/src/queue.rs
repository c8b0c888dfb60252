use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use herald_common::internal;
use herald_transport::{EmailMessage, SendOutcome, Transport, TransportError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    EmailJob, JobId, JobStatus, Priority, QueueConfig, QueueError, RetryPolicy, Statistics,
};

/// Job counts at a single point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub processing: bool,
    pub queued: usize,
    pub sending: usize,
    pub failed: usize,
}

/// Queue length either side of [`EmailQueue::clear_failed`], read under the
/// same lock as the removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleared {
    pub before: usize,
    pub after: usize,
}

impl Cleared {
    #[must_use]
    pub const fn count(&self) -> usize {
        self.before - self.after
    }
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: VecDeque<EmailJob>,
    /// Set while a drain loop is scheduled to keep going
    processing: bool,
    /// Bumped by `pause` so a running loop notices it should stop
    generation: u64,
}

impl QueueState {
    fn position(&self, id: JobId) -> Result<usize, QueueError> {
        self.jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or(QueueError::JobNotFound(id))
    }

    fn has_queued(&self) -> bool {
        self.jobs.iter().any(|job| job.status == JobStatus::Queued)
    }
}

struct Inner {
    config: QueueConfig,
    policy: RetryPolicy,
    transport: Arc<dyn Transport>,
    statistics: Arc<Statistics>,
    state: Mutex<QueueState>,
    /// Held for the lifetime of a drain loop, so sends never overlap even when
    /// a pause and a restart race each other.
    drain_guard: tokio::sync::Mutex<()>,
}

/// Sequential, priority-aware send queue.
///
/// Cloning is cheap and every clone refers to the same queue.
#[derive(Clone)]
pub struct EmailQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EmailQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailQueue")
            .field("config", &self.inner.config)
            .field("transport", &self.inner.transport.name())
            .field("status", &self.status())
            .finish()
    }
}

impl EmailQueue {
    pub fn new(config: QueueConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy: config.retry_policy(),
                config,
                transport,
                statistics: Arc::new(Statistics::new()),
                state: Mutex::new(QueueState::default()),
                drain_guard: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Shared handle to the counters this queue updates
    pub fn statistics(&self) -> Arc<Statistics> {
        Arc::clone(&self.inner.statistics)
    }

    /// Add `payload` to the queue and make sure something is draining it.
    ///
    /// Returns as soon as the job is queued. The outcome of the send is only
    /// observable through [`Self::status`], [`Self::job`] and the statistics.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, payload: EmailMessage, priority: Priority) -> JobId {
        let job = EmailJob::new(payload, priority);
        let id = job.id;

        tracing::debug!(%id, ?priority, to = %job.payload.to, "Queued email");

        {
            let mut state = self.inner.state.lock();
            match priority {
                Priority::High => state.jobs.push_front(job),
                Priority::Normal => state.jobs.push_back(job),
            }
        }

        Inner::start_drain(&self.inner);
        id
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        let count = |status| state.jobs.iter().filter(|job| job.status == status).count();

        QueueStatus {
            queue_length: state.jobs.len(),
            processing: state.processing,
            queued: count(JobStatus::Queued),
            sending: count(JobStatus::Sending),
            failed: count(JobStatus::Failed),
        }
    }

    /// Remove every terminally failed job.
    pub fn clear_failed(&self) -> Cleared {
        let cleared = {
            let mut state = self.inner.state.lock();
            let before = state.jobs.len();
            state.jobs.retain(|job| job.status != JobStatus::Failed);
            Cleared {
                before,
                after: state.jobs.len(),
            }
        };

        tracing::info!(
            cleared = cleared.count(),
            remaining = cleared.after,
            "Cleared failed emails"
        );
        cleared
    }

    /// Stop scheduling further sends.
    ///
    /// A send already in flight finishes. Retry timers stay armed, and when
    /// one fires (or another job is enqueued) draining starts again.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        state.processing = false;
        state.generation = state.generation.wrapping_add(1);
        internal!(level = INFO, "Queue paused");
    }

    /// Restart draining if anything is waiting to be sent.
    pub fn resume(&self) {
        if self.inner.state.lock().has_queued() {
            internal!(level = INFO, "Queue resumed");
            Inner::start_drain(&self.inner);
        }
    }

    /// Snapshot of every job currently held, in queue order.
    ///
    /// Jobs waiting on a retry timer are not in the queue and so not listed.
    pub fn jobs(&self) -> Vec<EmailJob> {
        self.inner.state.lock().jobs.iter().cloned().collect()
    }

    /// # Errors
    ///
    /// [`QueueError::JobNotFound`] if the job has been sent, cleared, or is
    /// waiting to be retried.
    pub fn job(&self, id: JobId) -> Result<EmailJob, QueueError> {
        let state = self.inner.state.lock();
        let index = state.position(id)?;
        Ok(state.jobs[index].clone())
    }
}

enum Attempt {
    Delivered(Option<String>),
    Failed(String),
}

impl From<Result<SendOutcome, TransportError>> for Attempt {
    fn from(result: Result<SendOutcome, TransportError>) -> Self {
        match result {
            Ok(outcome) if outcome.success => Self::Delivered(outcome.message_id),
            Ok(outcome) => Self::Failed(
                outcome
                    .error
                    .unwrap_or_else(|| "Transport reported failure".to_string()),
            ),
            Err(err) => Self::Failed(err.to_string()),
        }
    }
}

impl Inner {
    fn start_drain(inner: &Arc<Self>) {
        let generation = {
            let mut state = inner.state.lock();
            if state.processing {
                return;
            }
            state.processing = true;
            state.generation
        };

        let inner = Arc::clone(inner);
        tokio::spawn(async move { inner.drain(generation).await });
    }

    /// Claim the first queued job, or end the loop if there is none.
    fn next_job(&self, generation: u64) -> Option<(JobId, EmailMessage)> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }

        if let Some(job) = state
            .jobs
            .iter_mut()
            .find(|job| job.status == JobStatus::Queued)
        {
            job.status = JobStatus::Sending;
            job.attempts += 1;
            return Some((job.id, job.payload.clone()));
        }

        state.processing = false;
        None
    }

    async fn drain(self: Arc<Self>, generation: u64) {
        let _guard = self.drain_guard.lock().await;
        internal!(level = DEBUG, "Drain loop started");

        while let Some((id, payload)) = self.next_job(generation) {
            let transport = Arc::clone(&self.transport);
            let attempt = match tokio::spawn(async move { transport.send(&payload).await }).await
            {
                Ok(result) => Attempt::from(result),
                Err(err) => Attempt::Failed(format!("Send task failed: {err}")),
            };

            let delivered = match attempt {
                Attempt::Delivered(message_id) => {
                    self.complete(id, message_id);
                    true
                }
                Attempt::Failed(error) => {
                    self.fail(id, error);
                    false
                }
            };

            let more = delivered && self.state.lock().has_queued();
            if more {
                tokio::time::sleep(self.config.inter_send_delay()).await;
            }
        }

        internal!(level = DEBUG, "Drain loop finished");
    }

    fn complete(&self, id: JobId, message_id: Option<String>) {
        let job = {
            let mut state = self.state.lock();
            match state.position(id) {
                Ok(index) => state.jobs.remove(index),
                Err(err) => {
                    tracing::warn!(error = %err, "Delivered job vanished from the queue");
                    None
                }
            }
        };

        self.statistics.record_sent();

        if let Some(mut job) = job {
            job.status = JobStatus::Sent;
            job.sent_at = Some(Utc::now());
            job.message_id = message_id;

            tracing::info!(
                id = %job.id,
                to = %job.payload.to,
                attempts = job.attempts,
                message_id = job.message_id.as_deref().unwrap_or_default(),
                "Email sent"
            );
        }
    }

    fn fail(self: &Arc<Self>, id: JobId, error: String) {
        self.statistics.record_error(error.clone());

        let mut state = self.state.lock();
        let index = match state.position(id) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(error = %err, "Failed job vanished from the queue");
                return;
            }
        };

        let job = &mut state.jobs[index];
        job.last_error = Some(error);

        if self.policy.should_retry(job.attempts) {
            let delay = self.policy.delay_for(job.attempts);
            tracing::warn!(
                id = %job.id,
                to = %job.payload.to,
                attempts = job.attempts,
                remaining = self.policy.remaining_attempts(job.attempts),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = job.last_error.as_deref().unwrap_or_default(),
                "Send failed, scheduling retry"
            );

            let job = state.jobs.remove(index);
            drop(state);
            if let Some(job) = job {
                self.statistics.record_retry();
                self.schedule_retry(job, delay);
            }
            return;
        }

        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.failed_at = Some(now);

        tracing::error!(
            id = %job.id,
            recipient = %job.payload.to,
            subject = %job.payload.subject,
            attempts = job.attempts,
            error = job.last_error.as_deref().unwrap_or_default(),
            failed_at = %now.to_rfc3339(),
            created_at = %job.created_at.to_rfc3339(),
            "Email permanently failed"
        );

        drop(state);
        self.statistics.record_failed();
    }

    fn schedule_retry(self: &Arc<Self>, mut job: EmailJob, delay: std::time::Duration) {
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            tracing::debug!(id = %job.id, attempts = job.attempts, "Retrying email");
            job.status = JobStatus::Queued;
            inner.state.lock().jobs.push_front(job);
            Self::start_drain(&inner);
        });
    }
}
