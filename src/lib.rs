//! Ferry moves a single file from one node to another over an authenticated,
//! end-to-end encrypted byte stream.
//!
//! Three transport paths feed the same secure transfer pipeline: a LAN TCP
//! session discovered via mDNS, a direct TCP session to a supplied address,
//! and a WebRTC data channel for NAT-traversing transfers. The pipeline
//! itself is transport-agnostic: a framed handshake (manifest, sender
//! identity, wrapped session key, base nonce) followed by a sequence of
//! AES-256-GCM chunks and a zero-length terminator.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod net;
pub mod security;
pub mod transfer;
pub mod wire;
