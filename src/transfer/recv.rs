//! Receiver side of the secure transfer pipeline.
//!
//! Mirrors the sender's frame order, verifies every chunk before it touches
//! disk, and unlinks the partial output file on every failure path. The
//! cleanup guard runs on drop, so cancellation is covered as well.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::FerryError;
use crate::security::identity;
use crate::transfer::codec::{self, ChunkReader};
use crate::transfer::progress::TransferProgress;
use crate::wire::frame::read_frame;
use crate::wire::manifest::Manifest;

/// Receive one file from `stream` into `output_dir`.
///
/// The output directory is created if absent. Returns the path of the
/// written file.
pub async fn receive_file<S>(
    stream: &mut S,
    output_dir: &Path,
    identity_dir: &Path,
    quiet: bool,
) -> Result<PathBuf, FerryError>
where
    S: AsyncRead + Unpin,
{
    ensure_output_dir(output_dir)?;

    let manifest = Manifest::from_bytes(&read_frame(stream).await?)?;
    codec::check_counter_capacity(manifest.file_size)?;

    // Parsed for structural validity only; the sender's identity is
    // advisory, not authenticated.
    let sender_key = identity::public_key_from_der(&read_frame(stream).await?)?;
    tracing::debug!(
        file = %manifest.file_name,
        size = manifest.file_size,
        sender = %identity::fingerprint(&sender_key),
        "incoming transfer"
    );

    let wrapped = read_frame(stream).await?;
    let private = identity::load_private(identity_dir)?;
    let session_key = identity::unwrap_session_key(&private, &wrapped)?;

    let mut reader = codec::open_recv(&mut *stream, &session_key).await?;

    let output_path = output_dir.join(&manifest.file_name);
    let file = tokio::fs::File::create(&output_path).await?;
    let mut partial = PartialFile::new(output_path.clone());
    let mut progress = TransferProgress::new(&manifest.file_name, manifest.file_size, quiet);

    match pump_chunks(&mut reader, file, &mut progress).await {
        Ok(bytes_received) => {
            apply_file_mode(&output_path, manifest.file_mode);
            partial.disarm();
            tracing::debug!(bytes = bytes_received, path = %output_path.display(), "receive complete");
            progress.finish("Received", quiet);
            Ok(output_path)
        }
        Err(e) => {
            progress.abandon();
            Err(e)
        }
    }
}

/// Drain the chunk stream into the output file, verifying as we go.
async fn pump_chunks<R>(
    reader: &mut ChunkReader<R>,
    mut file: tokio::fs::File,
    progress: &mut TransferProgress,
) -> Result<u64, FerryError>
where
    R: AsyncRead + Unpin,
{
    let mut bytes_received: u64 = 0;

    while let Some(plaintext) = reader.read_chunk().await? {
        file.write_all(&plaintext).await?;
        bytes_received += plaintext.len() as u64;
        progress.update(plaintext.len() as u64);
    }
    file.flush().await?;

    Ok(bytes_received)
}

fn ensure_output_dir(dir: &Path) -> Result<(), FerryError> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(unix)]
fn apply_file_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777));
}

#[cfg(not(unix))]
fn apply_file_mode(_path: &Path, _mode: u32) {}

/// Unlinks the output file on drop unless the transfer completed.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn disarm(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove partial file");
            } else {
                tracing::debug!(path = %self.path.display(), "removed partial file");
            }
        }
    }
}
