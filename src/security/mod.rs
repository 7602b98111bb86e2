//! Long-term node identity and session-key wrapping.

pub mod identity;
