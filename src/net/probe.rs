//! Address probing: which addresses can a peer reach us on?
//!
//! Advisory only. The local address helps an operator hand a LAN peer
//! something to `--connect` to; the STUN binding request reports the
//! reflexive address as seen from the internet. Neither participates in a
//! transfer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use stun::agent::TransactionId;
use stun::client::ClientBuilder;
use stun::message::{Getter, Message, BINDING_REQUEST};
use stun::xoraddr::XorMappedAddress;
use tokio::net::UdpSocket;

use crate::error::FerryError;

/// Default STUN server for the public-address probe.
pub const DEFAULT_STUN_SERVER: &str = "stun.l.google.com:19302";

/// Primary non-loopback local IPv4 address.
///
/// Connecting a UDP socket sends no packets; it only asks the OS which
/// interface would route to the internet.
pub fn primary_local_ip() -> Result<IpAddr, FerryError> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

/// Discover this node's public address with a single STUN binding request.
///
/// Returns the reflexive `ip:port` the STUN server observed, or a
/// [`FerryError::Transport`] when `timeout` elapses first.
pub async fn public_address(server: &str, timeout: Duration) -> Result<SocketAddr, FerryError> {
    tokio::time::timeout(timeout, binding_request(server))
        .await
        .map_err(|_| FerryError::Transport(format!("STUN probe to {server} timed out")))?
}

async fn binding_request(server: &str) -> Result<SocketAddr, FerryError> {
    let conn = UdpSocket::bind("0.0.0.0:0").await?;
    conn.connect(server)
        .await
        .map_err(|e| FerryError::Transport(format!("STUN dial failed: {e}")))?;

    let mut client = ClientBuilder::new()
        .with_conn(Arc::new(conn))
        .build()
        .map_err(|e| FerryError::Transport(format!("STUN client: {e}")))?;

    let mut request = Message::new();
    request
        .build(&[Box::new(TransactionId::new()), Box::new(BINDING_REQUEST)])
        .map_err(|e| FerryError::Transport(format!("STUN request: {e}")))?;

    let (handler_tx, mut handler_rx) = tokio::sync::mpsc::unbounded_channel();
    client
        .send(&request, Some(Arc::new(handler_tx)))
        .await
        .map_err(|e| FerryError::Transport(format!("STUN send: {e}")))?;

    let event = handler_rx
        .recv()
        .await
        .ok_or_else(|| FerryError::Transport("STUN transaction yielded no response".into()))?;
    let response = event
        .event_body
        .map_err(|e| FerryError::Transport(format!("STUN transaction: {e}")))?;

    let mut reflexive = XorMappedAddress::default();
    reflexive
        .get_from(&response)
        .map_err(|e| FerryError::Transport(format!("STUN response missing address: {e}")))?;

    client.close().await.ok();
    Ok(SocketAddr::new(reflexive.ip, reflexive.port))
}
