use std::sync::{Arc, LazyLock};

use herald_common::{Signal, internal, logging};
use herald_control::{ControlServer, ControlSurface};
use herald_health::HealthMonitor;
use herald_queue::EmailQueue;
use herald_transport::{BrevoTransport, CredentialSource, ProcessEnv, SmtpTransport, Transport};
use tokio::sync::broadcast;

use crate::{Herald, Primary, control_handler::HeraldControlHandler};

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

/// Every long-lived component of a running herald, wired together
#[derive(Debug)]
pub struct Pipeline {
    pub queue: EmailQueue,
    pub monitor: Arc<HealthMonitor>,
    pub brevo: Arc<BrevoTransport>,
    pub surface: Arc<ControlSurface>,
}

impl Herald {
    /// Build the transports, queue, monitor and control surface.
    ///
    /// Nothing connects or reads credentials yet; that happens on first use.
    pub fn assemble(&self, credentials: Arc<dyn CredentialSource>) -> Pipeline {
        let smtp = Arc::new(SmtpTransport::new(
            self.smtp.clone(),
            Arc::clone(&credentials),
        ));
        let brevo = Arc::new(BrevoTransport::new(self.brevo.clone(), credentials));

        let primary: Arc<dyn Transport> = match self.primary {
            Primary::Smtp => smtp.clone(),
            Primary::Brevo => brevo.clone(),
        };
        tracing::info!(transport = primary.name(), "Primary transport selected");

        let queue = EmailQueue::new(self.queue.clone(), primary);
        let monitor = Arc::new(HealthMonitor::new(
            queue.statistics(),
            self.monitor.thresholds,
        ));

        let surface = Arc::new(ControlSurface::new(
            queue.clone(),
            Arc::clone(&monitor),
            smtp,
            Arc::clone(&brevo),
            self.monitor.interval(),
        ));

        Pipeline {
            queue,
            monitor,
            brevo,
            surface,
        }
    }

    /// Run the pipeline and its control socket until asked to stop
    ///
    /// # Errors
    ///
    /// This function will return an error if the control socket cannot be
    /// served or the process signal handlers cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let pipeline = self.assemble(Arc::new(ProcessEnv));

        match pipeline.brevo.initialize() {
            Ok(true) => internal!(level = INFO, "Brevo client ready"),
            Ok(false) => internal!(level = WARN, "BREVO_API_KEY is not set, Brevo sends will fail"),
            Err(e) => tracing::error!(error = %e, "Brevo client could not be built"),
        }

        if self.monitor.enabled {
            pipeline.monitor.start(self.monitor.interval());
        }

        tracing::info!(socket = %self.control.socket_path, "Controller running");

        let server = ControlServer::new(
            self.control.socket_path.clone(),
            Arc::new(HeraldControlHandler::new(Arc::clone(&pipeline.surface))),
        );
        let shutdown_rx = SHUTDOWN_BROADCAST.subscribe();
        let mut control = tokio::spawn(async move { server.serve(shutdown_rx).await });

        let ret = tokio::select! {
            served = &mut control => {
                match served {
                    Ok(result) => result.map_err(anyhow::Error::from),
                    Err(e) => Err(e.into()),
                }
            }
            signalled = shutdown() => {
                match signalled {
                    // Let the server remove its socket before leaving
                    Ok(()) => match control.await {
                        Ok(result) => result.map_err(anyhow::Error::from),
                        Err(e) => Err(e.into()),
                    },
                    Err(e) => Err(e),
                }
            }
        };

        internal!(level = INFO, "Shutting down...");
        pipeline.monitor.stop();
        pipeline.queue.pause();

        let status = pipeline.queue.status();
        if status.queued + status.sending > 0 {
            tracing::warn!(
                queued = status.queued,
                sending = status.sending,
                "Unsent emails are dropped on shutdown"
            );
        }

        ret
    }
}

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}
