//! Failures of the control socket and the commands sent over it

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Control socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode control frame: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Could not decode control frame: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The peer announced a frame longer than the reader accepts
    #[error("Control frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("Incompatible protocol version: server={server}, client={client}")]
    IncompatibleVersion { server: u32, client: u32 },

    /// herald refused or failed the command; the text is meant for the operator
    #[error("{0}")]
    Rejected(String),

    #[error("Control connection closed before a full frame arrived")]
    ConnectionClosed,

    #[error("No answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("No control socket at {0}: is herald running?")]
    SocketMissing(String),

    /// Another live herald instance answers on the socket
    #[error("Control socket {0} is owned by a running instance")]
    SocketInUse(String),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
