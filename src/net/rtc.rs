//! WebRTC transport: NAT-traversing transfers over a reliable, ordered
//! data channel.
//!
//! Signaling is manual copy/paste: each side prints a base64-encoded JSON
//! session description and pastes the peer's. Once the channel named
//! `"file"` opens it is detached into a plain byte stream and the regular
//! transfer pipeline takes over, with the receiver sending its identity
//! public key first so the sender can wrap the session key.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::data::data_channel::{DataChannel, PollDataChannel};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::FerryError;
use crate::net::gate::TransferGate;
use crate::security::identity;
use crate::transfer::{recv, send};
use crate::wire::frame::{read_frame, write_frame};

/// Label of the single data channel carrying the transfer.
pub const DATA_CHANNEL_LABEL: &str = "file";
/// Upper bound on a WebRTC session, signaling included.
pub const SESSION_DEADLINE: Duration = Duration::from_secs(30 * 60);

const SENDER_ICE_URLS: &[&str] = &["stun:stun.l.google.com:19302"];
const RECEIVER_ICE_URLS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun.stunprotocol.org:3478",
    "stun:stun.cloudflare.com:3478",
];

/// Send `file` to a receiver reachable only through NAT traversal.
///
/// Prints an OFFER, expects the receiver's ANSWER pasted back.
pub async fn send_over_channel(
    file: &Path,
    identity_dir: &Path,
    gate: &Arc<TransferGate>,
    quiet: bool,
) -> Result<(), FerryError> {
    let _permit = gate.try_admit()?;

    let pc = build_peer_connection(SENDER_ICE_URLS).await?;
    let dc = pc
        .create_data_channel(DATA_CHANNEL_LABEL, None)
        .await
        .map_err(rtc_err)?;

    let (open_tx, mut open_rx) = mpsc::channel::<Arc<DataChannel>>(1);
    let dc_handle = Arc::clone(&dc);
    dc.on_open(Box::new(move || {
        let dc = Arc::clone(&dc_handle);
        let open_tx = open_tx.clone();
        Box::pin(async move {
            match dc.detach().await {
                Ok(raw) => {
                    let _ = open_tx.send(raw).await;
                }
                Err(e) => tracing::error!(error = %e, "failed to detach data channel"),
            }
        })
    }));

    let offer = pc.create_offer(None).await.map_err(rtc_err)?;
    let mut gather_done = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await.map_err(rtc_err)?;
    let _ = gather_done.recv().await;

    let local = pc
        .local_description()
        .await
        .ok_or_else(|| FerryError::Transport("no local description after gathering".into()))?;
    println!("--- BEGIN WEBRTC OFFER ---");
    println!("{}", encode_sdp(&local)?);
    println!("--- END WEBRTC OFFER ---");

    let answer = prompt_line("Paste remote ANSWER and press Enter: ").await?;
    pc.set_remote_description(decode_sdp(&answer)?)
        .await
        .map_err(rtc_err)?;

    let outcome = tokio::time::timeout(SESSION_DEADLINE, async {
        let raw = open_rx
            .recv()
            .await
            .ok_or_else(|| FerryError::Transport("data channel never opened".into()))?;
        tracing::info!("data channel open; waiting for receiver public key");
        let mut channel = PollDataChannel::new(raw);

        let receiver_key = identity::public_key_from_der(&read_frame(&mut channel).await?)?;
        send::send_file(&mut channel, file, &receiver_key, identity_dir, quiet).await?;
        tracing::info!("WebRTC transfer finished");
        Ok(())
    })
    .await
    .map_err(|_| FerryError::Transport("WebRTC session deadline exceeded".into()))?;

    pc.close().await.ok();
    outcome
}

/// Receive one file from a WebRTC sender.
///
/// Expects the sender's OFFER pasted in, prints the ANSWER to paste back.
pub async fn receive_over_channel(
    output_dir: &Path,
    identity_dir: &Path,
    gate: &Arc<TransferGate>,
    quiet: bool,
) -> Result<PathBuf, FerryError> {
    let _permit = gate.try_admit()?;

    let pc = build_peer_connection(RECEIVER_ICE_URLS).await?;

    let (open_tx, mut open_rx) = mpsc::channel::<Arc<DataChannel>>(1);
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let open_tx = open_tx.clone();
        Box::pin(async move {
            if dc.label() != DATA_CHANNEL_LABEL {
                tracing::warn!(label = dc.label(), "ignoring unexpected data channel");
                return;
            }
            let dc_handle = Arc::clone(&dc);
            dc.on_open(Box::new(move || {
                let dc = Arc::clone(&dc_handle);
                let open_tx = open_tx.clone();
                Box::pin(async move {
                    match dc.detach().await {
                        Ok(raw) => {
                            let _ = open_tx.send(raw).await;
                        }
                        Err(e) => tracing::error!(error = %e, "failed to detach data channel"),
                    }
                })
            }));
        })
    }));

    let offer = prompt_line("Paste remote OFFER and press Enter: ").await?;
    pc.set_remote_description(decode_sdp(&offer)?)
        .await
        .map_err(rtc_err)?;

    let answer = pc.create_answer(None).await.map_err(rtc_err)?;
    let mut gather_done = pc.gathering_complete_promise().await;
    pc.set_local_description(answer).await.map_err(rtc_err)?;
    let _ = gather_done.recv().await;

    let local = pc
        .local_description()
        .await
        .ok_or_else(|| FerryError::Transport("no local description after gathering".into()))?;
    println!("--- BEGIN WEBRTC ANSWER ---");
    println!("{}", encode_sdp(&local)?);
    println!("--- END WEBRTC ANSWER ---");

    let outcome = tokio::time::timeout(SESSION_DEADLINE, async {
        let raw = open_rx
            .recv()
            .await
            .ok_or_else(|| FerryError::Transport("data channel never opened".into()))?;
        tracing::info!("data channel open; sending public key and awaiting file");
        let mut channel = PollDataChannel::new(raw);

        let public = identity::load_public(identity_dir)?;
        write_frame(&mut channel, &identity::public_key_to_der(&public)?).await?;
        let path = recv::receive_file(&mut channel, output_dir, identity_dir, quiet).await?;
        tracing::info!(path = %path.display(), "WebRTC file received");
        Ok(path)
    })
    .await
    .map_err(|_| FerryError::Transport("WebRTC session deadline exceeded".into()))?;

    pc.close().await.ok();
    outcome
}

async fn build_peer_connection(ice_urls: &[&str]) -> Result<Arc<RTCPeerConnection>, FerryError> {
    // Detached data channels expose the raw reliable stream instead of the
    // message callbacks, which is what the transfer pipeline expects.
    let mut setting_engine = SettingEngine::default();
    setting_engine.detach_data_channels();
    let api = APIBuilder::new().with_setting_engine(setting_engine).build();

    let config = RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: ice_urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }],
        ..Default::default()
    };

    api.new_peer_connection(config)
        .await
        .map(Arc::new)
        .map_err(rtc_err)
}

fn rtc_err(e: webrtc::Error) -> FerryError {
    FerryError::Transport(format!("webrtc: {e}"))
}

fn encode_sdp(desc: &RTCSessionDescription) -> Result<String, FerryError> {
    let json = serde_json::to_vec(desc)
        .map_err(|e| FerryError::Transport(format!("failed to encode SDP: {e}")))?;
    Ok(BASE64.encode(json))
}

fn decode_sdp(blob: &str) -> Result<RTCSessionDescription, FerryError> {
    let json = BASE64
        .decode(blob.trim())
        .map_err(|e| FerryError::Transport(format!("invalid SDP blob: {e}")))?;
    serde_json::from_slice(&json)
        .map_err(|e| FerryError::Transport(format!("failed to decode SDP: {e}")))
}

async fn prompt_line(prompt: &str) -> Result<String, FerryError> {
    use std::io::Write as _;
    eprint!("{prompt}");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}
