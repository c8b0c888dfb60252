//! Client for connecting to the control socket

use std::{path::Path, time::Duration};

use tokio::net::UnixStream;
use tracing::debug;

use crate::{ControlError, PROTOCOL_VERSION, Request, Response, ResponsePayload, Result, frame};

/// Responses may list every job in the queue
const MAX_RESPONSE_BYTES: u32 = 10 * 1024 * 1024;

/// Allowance on top of the server's own deadline for connecting and framing
const ROUND_TRIP_SLACK: Duration = Duration::from_secs(5);

pub struct ControlClient {
    socket_path: String,
    /// Fixed bound for every exchange; `None` waits as long as the server
    /// lets the command run
    timeout: Option<Duration>,
}

impl ControlClient {
    #[must_use]
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: None,
        }
    }

    /// Bound every exchange by `timeout` instead of the command's deadline
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How long to wait for the answer to `request`
    fn patience(&self, request: &Request) -> Duration {
        self.timeout
            .unwrap_or_else(|| request.command.deadline() + ROUND_TRIP_SLACK)
    }

    /// Send a request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, no answer arrives in time,
    /// the server speaks another protocol version, or herald rejects the
    /// command.
    pub async fn send_request(&self, request: Request) -> Result<Response> {
        let patience = self.patience(&request);
        tokio::time::timeout(patience, self.exchange(request))
            .await
            .map_err(|_| ControlError::Timeout(patience))?
    }

    async fn exchange(&self, request: Request) -> Result<Response> {
        debug!("Connecting to control socket: {}", self.socket_path);
        let mut stream = UnixStream::connect(&self.socket_path).await?;

        frame::write(&mut stream, &request).await?;
        let response: Response = frame::read(&mut stream, MAX_RESPONSE_BYTES).await?;

        if !response.is_version_compatible() {
            return Err(ControlError::IncompatibleVersion {
                server: response.version,
                client: PROTOCOL_VERSION,
            });
        }

        match response.payload {
            ResponsePayload::Error(message) => Err(ControlError::Rejected(message)),
            _ => Ok(response),
        }
    }

    /// # Errors
    ///
    /// Returns [`ControlError::SocketMissing`] if nothing exists at the socket
    /// path
    pub fn check_socket_exists(&self) -> Result<()> {
        if Path::new(&self.socket_path).exists() {
            Ok(())
        } else {
            Err(ControlError::SocketMissing(self.socket_path.clone()))
        }
    }
}
