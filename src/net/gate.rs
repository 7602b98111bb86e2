//! Process-wide transfer exclusivity.
//!
//! Each node runs at most one transfer at a time: the gate protects the
//! output path and the single-transfer assumption baked into every other
//! component. Admission hands out a scoped permit whose drop releases the
//! gate on every exit path, success, error, or cancellation alike.

use std::sync::{Arc, Mutex};

use crate::error::FerryError;

/// The `{free, busy}` flag behind a mutex.
#[derive(Debug)]
pub struct TransferGate {
    busy: Mutex<bool>,
}

impl TransferGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            busy: Mutex::new(false),
        })
    }

    /// Admit a transfer if the gate is free.
    ///
    /// Returns [`FerryError::ConnectionLocked`] without touching the stream
    /// when a transfer is already running.
    pub fn try_admit(self: &Arc<Self>) -> Result<TransferPermit, FerryError> {
        let mut busy = self.busy.lock().expect("gate mutex poisoned");
        if *busy {
            return Err(FerryError::ConnectionLocked);
        }
        *busy = true;
        Ok(TransferPermit {
            gate: Arc::clone(self),
        })
    }

    /// Whether a transfer currently holds the gate.
    pub fn is_busy(&self) -> bool {
        *self.busy.lock().expect("gate mutex poisoned")
    }
}

/// Scoped admission token; releasing it frees the gate.
#[derive(Debug)]
pub struct TransferPermit {
    gate: Arc<TransferGate>,
}

impl Drop for TransferPermit {
    fn drop(&mut self) {
        let mut busy = self.gate.busy.lock().expect("gate mutex poisoned");
        *busy = false;
    }
}
