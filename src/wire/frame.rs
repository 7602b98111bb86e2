//! Length-prefixed framing for handshake fields.
//!
//! Every frame is a 4-byte big-endian unsigned length followed by exactly
//! that many bytes. The length itself is not authenticated here; integrity
//! comes from the AEAD chunks and the key wrap that travel inside frames.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FerryError;

/// Maximum payload accepted for a single frame (16 MiB).
///
/// Handshake fields are all well below this; the ceiling exists so a hostile
/// peer cannot make us allocate an arbitrary buffer from a 4-byte prefix.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Write `payload` as a length-prefixed frame.
pub async fn write_frame<W>(sink: &mut W, payload: &[u8]) -> Result<(), FerryError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(FerryError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    sink.write_u32(payload.len() as u32).await?;
    sink.write_all(payload).await?;
    sink.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame and return its payload.
///
/// A connection that closes mid-length or mid-payload yields
/// [`FerryError::StreamTruncated`]; a declared length above
/// [`MAX_FRAME_LEN`] yields [`FerryError::FrameTooLarge`].
pub async fn read_frame<R>(source: &mut R) -> Result<Vec<u8>, FerryError>
where
    R: AsyncRead + Unpin,
{
    let len = source.read_u32().await.map_err(eof_as_truncation)? as usize;
    if len > MAX_FRAME_LEN {
        return Err(FerryError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len];
    source
        .read_exact(&mut payload)
        .await
        .map_err(eof_as_truncation)?;
    Ok(payload)
}

/// Map an early EOF onto the protocol-level truncation error; other I/O
/// failures pass through unchanged.
pub(crate) fn eof_as_truncation(err: std::io::Error) -> FerryError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        FerryError::StreamTruncated
    } else {
        err.into()
    }
}
