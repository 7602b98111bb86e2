//! Transports and the machinery that gates them: TCP and WebRTC adapters,
//! the challenge/response handshake, the process-wide transfer gate, and
//! address probing.

pub mod auth;
pub mod gate;
pub mod probe;
pub mod rtc;
pub mod tcp;

use std::future::Future;
use std::time::Duration;

use crate::error::FerryError;

/// Run `op` up to `attempts` times, doubling the delay after each retryable
/// failure. Non-retryable errors propagate immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, FerryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FerryError>>,
{
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
