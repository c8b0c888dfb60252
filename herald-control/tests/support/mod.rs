#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_control::ControlSurface;
use herald_health::{AlertThresholds, HealthMonitor};
use herald_queue::{EmailQueue, QueueConfig};
use herald_transport::{
    BrevoSettings, BrevoTransport, CredentialSource, EmailMessage, SendOutcome, SmtpSettings,
    SmtpTransport, StaticCredentials, Transport, TransportError,
};

/// Delivers everything except mail addressed to a `fail@` mailbox, which is
/// refused, or a `hang@` mailbox, which never gets an answer
#[derive(Debug, Default)]
pub struct SelectiveTransport;

#[async_trait]
impl Transport for SelectiveTransport {
    fn name(&self) -> &'static str {
        "selective"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, TransportError> {
        if message.to.starts_with("hang@") {
            std::future::pending::<()>().await;
        }
        if message.to.starts_with("fail@") {
            Ok(SendOutcome::failure("550 mailbox unavailable"))
        } else {
            Ok(SendOutcome::delivered(None))
        }
    }
}

/// A surface over a queue with a single attempt per job and transports with
/// no credentials at all
pub fn surface() -> ControlSurface {
    surface_with_smtp(
        SmtpSettings {
            host: "smtp.invalid".to_string(),
            ..SmtpSettings::default()
        },
        StaticCredentials::default(),
    )
}

/// Like [`surface`] but with the given SMTP settings and credentials shared
/// by both providers
pub fn surface_with_smtp(settings: SmtpSettings, creds: StaticCredentials) -> ControlSurface {
    let transport: Arc<dyn Transport> = Arc::new(SelectiveTransport);
    let queue = EmailQueue::new(
        QueueConfig {
            max_retries: 1,
            ..QueueConfig::default()
        },
        transport,
    );
    let monitor = Arc::new(HealthMonitor::new(
        queue.statistics(),
        AlertThresholds::default(),
    ));

    let creds: Arc<dyn CredentialSource> = Arc::new(creds);
    let smtp = Arc::new(SmtpTransport::new(settings, Arc::clone(&creds)));
    let brevo = Arc::new(BrevoTransport::new(BrevoSettings::default(), creds));

    ControlSurface::new(queue, monitor, smtp, brevo, Duration::from_secs(60))
}
