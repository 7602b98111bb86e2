//! LAN peer discovery over multicast DNS.
//!
//! Nodes sharing a service id announce under the same hashed service type
//! and find each other without exchanging addresses out of band. Discovery
//! is an external collaborator of the transfer core: it only produces
//! `host:port` pairs to dial.

pub mod mdns;
pub mod service;
