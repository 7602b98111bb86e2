//! Challenge/response authentication for TCP transfers.
//!
//! The listening side binds each connection to a fresh random nonce; the
//! dialing side proves knowledge of the shared passcode by returning a
//! bcrypt tag over `passcode + nonce_hex`. The nonce makes every challenge
//! single-use, and bcrypt keeps the passcode itself off the wire.
//!
//! Line protocol, newline-terminated ASCII:
//! server → client: 30 hex chars of nonce
//! client → server: bcrypt tag
//! server → client: `SUCCESS` or `FAIL`

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::FerryError;

/// Status line sent after a verified challenge.
pub const STATUS_SUCCESS: &str = "SUCCESS";
/// Status line sent after a failed challenge.
pub const STATUS_FAIL: &str = "FAIL";
/// Random bytes in a challenge nonce (30 hex chars on the wire).
pub const NONCE_BYTES: usize = 15;

/// Longest line we will read: a bcrypt tag is 60 chars, so anything past
/// this is a misbehaving peer.
const MAX_LINE_LEN: usize = 256;

/// Server side: issue a challenge on `stream` and verify the response.
///
/// Emits `SUCCESS` and returns `Ok` when the peer proves knowledge of
/// `passcode`; emits `FAIL`, returns [`FerryError::AuthRejected`], and leaves
/// the stream to be closed otherwise.
pub async fn verify_client<S>(stream: &mut S, passcode: &str) -> Result<(), FerryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut nonce_bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce_hex = hex::encode(nonce_bytes);

    stream.write_all(nonce_hex.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let tag = read_line(stream).await?;
    let expected = format!("{passcode}{nonce_hex}");
    let verified = bcrypt::verify(&expected, &tag).unwrap_or(false);

    if !verified {
        tracing::warn!("challenge verification failed");
        stream.write_all(STATUS_FAIL.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        return Err(FerryError::AuthRejected {
            status: STATUS_FAIL.into(),
        });
    }

    stream.write_all(STATUS_SUCCESS.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;
    tracing::debug!("challenge verified");
    Ok(())
}

/// Client side: answer the server's challenge with `passcode`.
pub async fn authenticate<S>(stream: &mut S, passcode: &str) -> Result<(), FerryError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let nonce_hex = read_line(stream).await?;
    if nonce_hex.len() != NONCE_BYTES * 2 || !nonce_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FerryError::AuthRejected {
            status: "invalid challenge nonce".into(),
        });
    }

    let tag = bcrypt::hash(format!("{passcode}{nonce_hex}"), bcrypt::DEFAULT_COST)
        .map_err(|e| FerryError::Auth(format!("failed to hash passcode: {e}")))?;
    stream.write_all(tag.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;

    let status = read_line(stream).await?;
    if status != STATUS_SUCCESS {
        return Err(FerryError::AuthRejected { status });
    }
    tracing::debug!("authenticated");
    Ok(())
}

/// Prompt the operator for a passcode on stdin.
pub async fn prompt_passcode() -> Result<String, FerryError> {
    use std::io::Write as _;
    eprint!("Enter passcode: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let passcode = line.trim().to_string();
    if passcode.is_empty() {
        return Err(FerryError::Config("passcode must not be empty".into()));
    }
    Ok(passcode)
}

/// Read one newline-terminated line, byte by byte so nothing past the
/// newline is consumed from the stream.
async fn read_line<R>(source: &mut R) -> Result<String, FerryError>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::with_capacity(64);
    let mut byte = [0u8; 1];
    loop {
        source
            .read_exact(&mut byte)
            .await
            .map_err(crate::wire::frame::eof_as_truncation)?;
        if byte[0] == b'\n' {
            break;
        }
        if line.len() >= MAX_LINE_LEN {
            return Err(FerryError::Protocol("control line too long".into()));
        }
        line.push(byte[0]);
    }
    let text = String::from_utf8(line)
        .map_err(|_| FerryError::Protocol("control line is not valid UTF-8".into()))?;
    Ok(text.trim().to_string())
}
