//! Atomics-based progress aggregation for a batch of uploads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Monotonic acknowledged-bytes counter over the whole batch.
///
/// Upload tasks bump it from any thread; the reporter samples it on a
/// fixed tick so observers are never flooded with per-chunk updates.
pub struct SendProgress {
    total_bytes: AtomicU64,
    acked_bytes: AtomicU64,
}

impl SendProgress {
    /// `total_bytes` is the declared size across all files in the batch.
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes: AtomicU64::new(total_bytes),
            acked_bytes: AtomicU64::new(0),
        }
    }

    /// Record `bytes` acknowledged by the receiver.
    pub fn add_acked(&self, bytes: u64) {
        self.acked_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// `(acknowledged, total)` bytes.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.acked_bytes.load(Ordering::Relaxed),
            self.total_bytes.load(Ordering::Relaxed),
        )
    }

    pub fn fraction(&self) -> f64 {
        let (acked, total) = self.snapshot();
        if total == 0 {
            1.0
        } else {
            acked as f64 / total as f64
        }
    }
}

/// Spawn a task that logs progress at most once per `interval` until
/// `done` is cancelled, then emits a final report.
pub fn spawn_reporter(
    progress: Arc<SendProgress>,
    interval: Duration,
    done: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_reported = u64::MAX;

        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = ticker.tick() => {
                    let (acked, total) = progress.snapshot();
                    if acked != last_reported {
                        last_reported = acked;
                        tracing::info!(
                            acked_bytes = acked,
                            total_bytes = total,
                            percent = format!("{:.1}", progress.fraction() * 100.0),
                            "upload progress"
                        );
                    }
                }
            }
        }

        let (acked, total) = progress.snapshot();
        tracing::info!(acked_bytes = acked, total_bytes = total, "upload progress final");
    })
}
