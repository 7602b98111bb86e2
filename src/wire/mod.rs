//! Byte-level wire format shared by every transport.
//!
//! Handshake fields travel as length-prefixed frames (`frame`); the first
//! frame of every transfer carries the serialized file manifest (`manifest`).

pub mod frame;
pub mod manifest;
