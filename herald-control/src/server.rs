//! Serving the control protocol on a Unix domain socket.
//!
//! One request and one response per connection. Reading and writing are
//! bounded by [`IO_TIMEOUT`]; the work in between is bounded per command by
//! [`Command::deadline`](crate::Command::deadline), so a diagnostic that
//! walks every SMTP port is not cut short by the budget meant for a ping.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_common::Signal;
use tokio::{
    net::{UnixListener, UnixStream},
    sync::broadcast,
    time::Instant,
};
use tracing::{debug, error, info, trace, warn};

use crate::{ControlError, PROTOCOL_VERSION, Request, Response, Result, frame};

/// Bound on receiving a request or delivering its response
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests carry at most one email; anything bigger is refused unread
const MAX_REQUEST_BYTES: u32 = 1 << 20;

/// Processes decoded control requests
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a request and return a response
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be processed. The server turns
    /// it into an error response for the client.
    async fn handle_request(&self, request: Request) -> Result<Response>;
}

/// Serves control requests on a Unix domain socket
pub struct ControlServer {
    socket_path: String,
    handler: Arc<dyn CommandHandler>,
}

impl ControlServer {
    pub fn new(socket_path: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
        }
    }

    /// Accept connections until a shutdown signal arrives, then remove the
    /// socket file.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::SocketInUse`] if another herald answers on the
    /// socket, or an I/O error if it cannot be bound.
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> Result<()> {
        let listener = self.bind().await?;

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler.as_ref()).await {
                                warn!("Control connection failed: {e}");
                            }
                        });
                    }
                    Err(e) => error!("Could not accept control connection: {e}"),
                },
                signal = shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown) => info!("Control server shutting down"),
                        Err(e) => warn!("Control server lost its shutdown channel: {e}"),
                    }
                    break;
                }
            }
        }

        debug!("Removing control socket {}", self.socket_path);
        match tokio::fs::remove_file(&self.socket_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!("Could not remove control socket {}: {e}", self.socket_path);
            }
            _ => {}
        }

        Ok(())
    }

    /// Claim the socket path, replacing a file left by an instance that did
    /// not shut down cleanly. Only the owning user may connect.
    async fn bind(&self) -> Result<UnixListener> {
        let path = Path::new(&self.socket_path);
        if path.exists() {
            if UnixStream::connect(path).await.is_ok() {
                return Err(ControlError::SocketInUse(self.socket_path.clone()));
            }
            info!("Replacing stale control socket {}", self.socket_path);
            tokio::fs::remove_file(path).await?;
        }

        let listener = UnixListener::bind(path)?;

        #[cfg(unix)]
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;

        info!("Control socket listening on {} (mode 0600)", self.socket_path);
        Ok(listener)
    }
}

async fn serve_connection(mut stream: UnixStream, handler: &dyn CommandHandler) -> Result<()> {
    let request: Request = tokio::time::timeout(
        IO_TIMEOUT,
        frame::read(&mut stream, MAX_REQUEST_BYTES),
    )
    .await
    .map_err(|_| ControlError::Timeout(IO_TIMEOUT))??;

    trace!("Received request: {request:?}");
    let response = answer(request, handler).await;
    trace!("Sending response: {response:?}");

    tokio::time::timeout(IO_TIMEOUT, frame::write(&mut stream, &response))
        .await
        .map_err(|_| ControlError::Timeout(IO_TIMEOUT))?
}

/// Run one request through the handler under the command's deadline. Every
/// outcome, including a refusal or an overrun, becomes a response.
async fn answer(request: Request, handler: &dyn CommandHandler) -> Response {
    if !request.is_version_compatible() {
        return Response::error(
            ControlError::IncompatibleVersion {
                server: PROTOCOL_VERSION,
                client: request.version,
            }
            .to_string(),
        );
    }

    let command = request.command.name();
    let deadline = request.command.deadline();
    let started = Instant::now();

    let response = match tokio::time::timeout(deadline, handler.handle_request(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!(command, "Control command refused: {e}");
            Response::error(e.to_string())
        }
        Err(_) => {
            error!(command, deadline_secs = deadline.as_secs(), "Control command overran");
            Response::error(format!(
                "{command} did not finish within {}s",
                deadline.as_secs()
            ))
        }
    };

    debug!(
        command,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Control command answered"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, ResponsePayload};

    struct Stalled;

    #[async_trait]
    impl CommandHandler for Stalled {
        async fn handle_request(&self, request: Request) -> Result<Response> {
            if matches!(request.command, Command::Ping) {
                return Ok(Response::ok());
            }
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_command_becomes_an_error_response() {
        let started = Instant::now();
        let response = answer(Request::new(Command::TestAllConfigurations), &Stalled).await;

        let ResponsePayload::Error(message) = response.payload else {
            panic!("Expected an error response");
        };
        assert!(message.starts_with("test-all-configurations did not finish"));
        assert!(started.elapsed() >= Command::TestAllConfigurations.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn quick_commands_are_answered_directly() {
        let response = answer(Request::new(Command::Ping), &Stalled).await;
        assert!(matches!(response.payload, ResponsePayload::Ok));
    }

    #[tokio::test]
    async fn other_versions_never_reach_the_handler() {
        let request = Request {
            version: PROTOCOL_VERSION + 1,
            command: Command::Statistics,
        };
        let ResponsePayload::Error(message) = answer(request, &Stalled).await.payload else {
            panic!("Expected an error response");
        };
        assert!(message.contains("version"));
    }
}
