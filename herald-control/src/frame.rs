//! Length-prefixed framing shared by the control client and server.
//!
//! Every frame is a big-endian `u32` byte count followed by that many bytes of
//! bincode. Readers refuse a count above their own limit before allocating.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::{
    ControlError, Result,
    protocol::{decode, encode},
};

/// Encode `value` and write it as one frame.
///
/// # Errors
///
/// Returns an error if encoding fails, the body does not fit a `u32` length,
/// or the stream cannot be written.
pub async fn write<T, W>(stream: &mut W, value: &T) -> Result<()>
where
    T: Serialize + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let body = encode(value)?;
    let len = u32::try_from(body.len())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    trace!("Writing control frame: {len} bytes");
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame of at most `max` bytes and decode it.
///
/// # Errors
///
/// Returns [`ControlError::ConnectionClosed`] if the peer hangs up before the
/// length arrives, [`ControlError::FrameTooLarge`] if the length exceeds
/// `max`, or a decode or I/O error otherwise.
pub async fn read<T, R>(stream: &mut R, max: u32) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin + Send,
{
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ControlError::ConnectionClosed
        } else {
            ControlError::Io(e)
        }
    })?;

    let len = u32::from_be_bytes(len_buf);
    if len > max {
        return Err(ControlError::FrameTooLarge { len, max });
    }

    trace!("Reading control frame: {len} bytes");
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, Request};

    #[tokio::test]
    async fn frames_are_length_prefixed() {
        let (mut near, mut far) = tokio::io::duplex(1024);

        write(&mut near, &Request::new(Command::Ping)).await.unwrap();
        let request: Request = read(&mut far, 1024).await.unwrap();

        assert!(request.is_version_compatible());
        assert!(matches!(request.command, Command::Ping));
    }

    #[tokio::test]
    async fn oversize_length_is_refused_before_reading_the_body() {
        let (mut near, mut far) = tokio::io::duplex(64);
        near.write_all(&5000u32.to_be_bytes()).await.unwrap();

        let result: Result<Request> = read(&mut far, 1024).await;
        assert!(matches!(
            result,
            Err(ControlError::FrameTooLarge { len: 5000, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn hang_up_before_length_is_connection_closed() {
        let (near, mut far) = tokio::io::duplex(64);
        drop(near);

        let result: Result<Request> = read(&mut far, 1024).await;
        assert!(matches!(result, Err(ControlError::ConnectionClosed)));
    }
}
