//! Transfer progress reporting.
//!
//! A read-only observer over the byte counter: it never touches the stream,
//! never reorders work, and never turns into an error. Redraws are capped at
//! 10 Hz so the reporter samples at most once every 100 ms regardless of
//! chunk rate.

use std::time::Instant;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress state for one transfer, drawn to stderr.
pub struct TransferProgress {
    bar: ProgressBar,
    name: String,
    total: u64,
    transferred: u64,
    started: Instant,
}

impl TransferProgress {
    /// Create a reporter for `total` bytes. A hidden bar is returned in
    /// quiet mode so call sites never branch.
    pub fn new(name: &str, total: u64, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
                )
                .expect("static progress template is valid")
                .progress_chars("=>-"),
            );
            bar.set_message(name.to_string());
            bar
        };

        Self {
            bar,
            name: name.to_string(),
            total,
            transferred: 0,
            started: Instant::now(),
        }
    }

    /// Record `bytes` more transferred.
    pub fn update(&mut self, bytes: u64) {
        self.transferred += bytes;
        self.bar.set_position(self.transferred);
    }

    /// Completion percentage (0-100).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.transferred as f64 / self.total as f64 * 100.0
    }

    /// Bytes recorded so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Average throughput in bytes per second.
    pub fn throughput_bps(&self) -> u64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            (self.transferred as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Clear the bar and print a one-line completion summary.
    ///
    /// `verb` is "Sent" or "Received" depending on the role.
    pub fn finish(self, verb: &str, quiet: bool) {
        let hidden = self.bar.is_hidden();
        self.bar.finish_and_clear();
        if quiet || hidden {
            return;
        }
        eprintln!(
            "{}: {} ({}) in {:.1}s @ {}/s",
            verb,
            self.name,
            ByteSize(self.transferred),
            self.started.elapsed().as_secs_f64(),
            ByteSize(self.throughput_bps()),
        );
    }

    /// Clear the bar without a summary, for error paths.
    pub fn abandon(self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_accumulates() {
        let mut p = TransferProgress::new("file.bin", 1000, true);
        p.update(300);
        p.update(200);
        assert_eq!(p.transferred(), 500);
        assert!((p.percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_size_transfer_reports_zero_percent() {
        let p = TransferProgress::new("empty", 0, true);
        assert_eq!(p.percent(), 0.0);
    }

    #[test]
    fn quiet_mode_uses_hidden_bar() {
        let p = TransferProgress::new("file.bin", 10, true);
        assert!(p.bar.is_hidden());
        p.finish("Sent", true);
    }
}
