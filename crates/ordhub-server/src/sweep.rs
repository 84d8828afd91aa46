//! Periodic removal of expired locks.
//!
//! Expiry is already enforced lazily on every registry read, so the
//! sweeper is housekeeping: it stops the table and the `locks_active`
//! gauge from drifting when nobody touches a dead entry.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use ordhub_locks::registry::LockRegistry;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::{LOCKS_EXPIRED_TOTAL, set_locks_active};

/// Run the sweep loop until cancelled.
///
/// A sweep interval of zero never reaches this function; the server skips
/// spawning the sweeper entirely when it is disabled.
pub async fn run_lock_sweeper(
    registry: Arc<LockRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    // The registry is empty at startup; skip the immediate first tick.
    let _ = ticker.tick().await;

    info!(interval_secs = interval.as_secs(), "lock sweeper running");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = registry.purge_expired();
                if removed > 0 {
                    counter!(LOCKS_EXPIRED_TOTAL).increment(removed as u64);
                }
                set_locks_active(registry.active_count());
                debug!(removed, tracked = registry.tracked_len(), "sweep pass complete");
            }
            () = cancel.cancelled() => {
                info!("lock sweeper stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordhub_core::ids::{OwnerId, ResourceId};

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_locks() {
        let registry = Arc::new(LockRegistry::new(Duration::from_secs(5)));
        let _ = registry.try_acquire(&ResourceId::from("1"), &OwnerId::from("a"), None);
        let _ = registry.try_acquire(&ResourceId::from("2"), &OwnerId::from("b"), None);
        assert_eq!(registry.tracked_len(), 2);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_lock_sweeper(
            registry.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        // Let the leases lapse and one sweep pass run.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.tracked_len(), 0);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_leaves_live_locks_alone() {
        let registry = Arc::new(LockRegistry::new(Duration::from_secs(3600)));
        let _ = registry.try_acquire(&ResourceId::from("1"), &OwnerId::from("a"), None);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_lock_sweeper(
            registry.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.tracked_len(), 1);
        assert!(registry.is_locked(&ResourceId::from("1")));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancel() {
        let registry = Arc::new(LockRegistry::new(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_lock_sweeper(
            registry,
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        cancel.cancel();
        task.await.unwrap();
    }
}
