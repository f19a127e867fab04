//! Background eviction of abandoned upload sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::ReaperSettings;
use crate::receive::registry::SessionRegistry;

/// One sweep: evict every session idle longer than `ttl`.
///
/// The registry is consulted only to identify and remove expired entries;
/// scratch-area deletion happens afterwards under each session's own lock,
/// so an in-flight chunk write either completes first or finds the session
/// gone on its next resolve. Returns the number of evicted sessions.
pub async fn sweep(registry: &SessionRegistry, ttl: Duration) -> usize {
    let expired = registry.idle_keys(ttl);
    let mut evicted = 0;

    for key in expired {
        let Some(handle) = registry.remove(&key) else {
            continue;
        };

        let mut session = handle.lock().await;
        let received = session.received_bytes();
        session.discard_scratch();
        evicted += 1;

        tracing::info!(
            file = %key.file_name,
            total_size = key.total_size,
            received_bytes = received,
            "evicted abandoned upload session"
        );
    }

    evicted
}

/// Spawn the periodic sweep task. Cancelling `shutdown` stops it.
pub fn spawn(
    registry: Arc<SessionRegistry>,
    settings: ReaperSettings,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = settings.sweep_period();
    let ttl = settings.inactivity_timeout();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately; skip the startup tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = sweep(&registry, ttl).await;
                    if evicted > 0 {
                        tracing::debug!(evicted, live = registry.len(), "reaper sweep");
                    }
                }
            }
        }
    })
}
