//! Sender side of the secure transfer pipeline.
//!
//! Operates on an already established and authenticated byte stream. The
//! handshake frames go out in a fixed order: manifest, sender identity
//! public key, session key wrapped to the receiver, then the base nonce and
//! the encrypted chunk stream.

use std::path::Path;

use rsa::RsaPublicKey;
use tokio::io::{AsyncReadExt, AsyncWrite};

use crate::error::FerryError;
use crate::security::identity;
use crate::transfer::codec::{self, ChunkWriter, MAX_PLAINTEXT_LEN};
use crate::transfer::progress::TransferProgress;
use crate::wire::frame::write_frame;
use crate::wire::manifest::Manifest;

/// Send the file at `path` over `stream`, encrypting to `receiver_key`.
///
/// `identity_dir` is where this node's keypair lives (generated on first
/// use). Returns the number of payload bytes sent.
pub async fn send_file<S>(
    stream: &mut S,
    path: &Path,
    receiver_key: &RsaPublicKey,
    identity_dir: &Path,
    quiet: bool,
) -> Result<u64, FerryError>
where
    S: AsyncWrite + Unpin,
{
    let manifest = Manifest::from_path(path)?;
    codec::check_counter_capacity(manifest.file_size)?;

    tracing::debug!(
        file = %manifest.file_name,
        size = manifest.file_size,
        "starting send handshake"
    );

    write_frame(stream, &manifest.to_bytes()?).await?;

    let sender_public = identity::load_public(identity_dir)?;
    write_frame(stream, &identity::public_key_to_der(&sender_public)?).await?;

    let session_key = identity::generate_session_key();
    let wrapped = identity::wrap_session_key(receiver_key, &session_key)?;
    write_frame(stream, &wrapped).await?;

    let mut writer = codec::open_send(&mut *stream, &session_key).await?;
    let mut progress = TransferProgress::new(&manifest.file_name, manifest.file_size, quiet);

    match pump_file(path, &mut writer, &mut progress).await {
        Ok(bytes_sent) => {
            writer.finish().await?;
            tracing::debug!(bytes = bytes_sent, "send complete");
            progress.finish("Sent", quiet);
            Ok(bytes_sent)
        }
        Err(e) => {
            progress.abandon();
            Err(e)
        }
    }
}

/// Stream the file body through the chunk writer.
async fn pump_file<W>(
    path: &Path,
    writer: &mut ChunkWriter<W>,
    progress: &mut TransferProgress,
) -> Result<u64, FerryError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; MAX_PLAINTEXT_LEN];
    let mut bytes_sent: u64 = 0;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_chunk(&buf[..n]).await?;
        bytes_sent += n as u64;
        progress.update(n as u64);
    }

    Ok(bytes_sent)
}
