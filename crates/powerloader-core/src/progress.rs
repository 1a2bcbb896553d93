//! Progress reporting for downloads (bytes done, ETA, rate).
//!
//! Snapshots are pushed to the caller over a bounded channel with `try_send`;
//! a slow consumer drops snapshots rather than stalling the transfer.

use std::time::Instant;

/// Channel end the transfer pushes snapshots into.
pub type ProgressSender = tokio::sync::mpsc::Sender<ProgressStats>;

/// Snapshot of download progress for one destination (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Bytes present in the partial file, including those from earlier runs.
    pub bytes_done: u64,
    /// Total size in bytes, when the server declared it.
    pub total_bytes: Option<u64>,
    /// Bytes that were already on disk when this run started.
    pub resumed_from: u64,
    /// Elapsed time since this run started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Bytes received during this run.
    pub fn bytes_this_run(&self) -> u64 {
        self.bytes_done.saturating_sub(self.resumed_from)
    }

    /// Download rate for this run in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_this_run() as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if total is unknown or rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}

/// Pushes snapshots for one run; tracks its own start time.
pub struct ProgressReporter<'a> {
    tx: Option<&'a ProgressSender>,
    started: Instant,
    resumed_from: u64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(tx: Option<&'a ProgressSender>, resumed_from: u64) -> Self {
        Self {
            tx,
            started: Instant::now(),
            resumed_from,
        }
    }

    pub fn report(&self, bytes_done: u64, total_bytes: Option<u64>) {
        if let Some(tx) = self.tx {
            let _ = tx.try_send(ProgressStats {
                bytes_done,
                total_bytes,
                resumed_from: self.resumed_from,
                elapsed_secs: self.started.elapsed().as_secs_f64(),
            });
        }
    }
}
