//! TCP transport: dialing sender and listening receiver.
//!
//! No TLS. Confidentiality and integrity come from the AEAD chunk stream;
//! peer authentication comes from the passcode challenge. After a verified
//! challenge the listener sends its identity public key as a frame so the
//! dialer can wrap the session key to it, then the regular handshake runs.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::error::FerryError;
use crate::net::auth;
use crate::net::gate::TransferGate;
use crate::security::identity;
use crate::transfer::{recv, send};
use crate::wire::frame::{read_frame, write_frame};

/// Deadline for establishing the TCP connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on one inbound transfer, challenge included.
pub const TRANSFER_CEILING: Duration = Duration::from_secs(30 * 60);

/// Everything a TCP role needs, shared across connection tasks.
#[derive(Debug)]
pub struct TcpNode {
    pub passcode: String,
    pub output_dir: PathBuf,
    pub identity_dir: PathBuf,
    pub gate: Arc<TransferGate>,
    pub quiet: bool,
}

/// Dial `host:port`, pass the challenge, and send `file`.
pub async fn send_to(
    host: &str,
    port: u16,
    file: &Path,
    node: &TcpNode,
) -> Result<(), FerryError> {
    let _permit = node.gate.try_admit()?;

    tracing::info!(%host, port, "connecting to peer");
    let mut stream = tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| FerryError::Transport(format!("dial to {host}:{port} timed out")))?
        .map_err(|e| FerryError::Transport(format!("connection to {host}:{port} failed: {e}")))?;

    auth::authenticate(&mut stream, &node.passcode).await?;
    tracing::info!("authentication successful");

    let receiver_key = identity::public_key_from_der(&read_frame(&mut stream).await?)?;
    tracing::debug!(receiver = %identity::fingerprint(&receiver_key), "received peer identity");

    send::send_file(
        &mut stream,
        file,
        &receiver_key,
        &node.identity_dir,
        node.quiet,
    )
    .await?;
    Ok(())
}

/// Run the TCP listener until `cancel` fires.
///
/// Each inbound connection is handled on its own task. The listener keeps
/// accepting while a transfer runs; the gate refuses the extra connections.
pub async fn serve(
    port: u16,
    node: Arc<TcpNode>,
    cancel: CancellationToken,
) -> Result<(), FerryError> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| FerryError::Transport(format!("failed to bind port {port}: {e}")))?;
    tracing::info!(port, "TCP listener started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("TCP listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let node = Arc::clone(&node);
                        let cancel = cancel.clone();
                        tokio::spawn(handle_inbound(stream, peer, node, cancel));
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
                }
            }
        }
    }
}

async fn handle_inbound(
    mut stream: TcpStream,
    peer: SocketAddr,
    node: Arc<TcpNode>,
    cancel: CancellationToken,
) {
    tracing::info!(%peer, "connection accepted");

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(FerryError::Transport("cancelled".into())),
        outcome = tokio::time::timeout(TRANSFER_CEILING, receive_from(&mut stream, &node)) => {
            match outcome {
                Ok(inner) => inner,
                Err(_) => Err(FerryError::Transport("transfer deadline exceeded".into())),
            }
        }
    };

    match result {
        Ok(path) => tracing::info!(%peer, path = %path.display(), "file received"),
        Err(e) => tracing::warn!(%peer, error = %e, "transfer failed"),
    }
}

/// Handle one inbound connection: challenge, gate admission, identity
/// preamble, then the receive pipeline. Admission happens before any
/// handshake byte is read, so a locked node never consumes a stream it
/// cannot serve.
async fn receive_from(stream: &mut TcpStream, node: &TcpNode) -> Result<PathBuf, FerryError> {
    auth::verify_client(stream, &node.passcode).await?;

    let _permit = node.gate.try_admit()?;

    let public = identity::load_public(&node.identity_dir)?;
    write_frame(stream, &identity::public_key_to_der(&public)?).await?;

    recv::receive_file(stream, &node.output_dir, &node.identity_dir, node.quiet).await
}
