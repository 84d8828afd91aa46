//! Coordination between the lock registry and the broadcast hub.
//!
//! Every mutation of a shared order follows the same flow: try to acquire
//! the advisory lock, mutate only on success, then publish the change. The
//! [`Coordinator`] owns the glue: lock transitions become `order_locked` /
//! `order_unlocked` frames on the orders topic, and completed mutations
//! become `order_update` frames (or `status_update` when a single workflow
//! flag flips). A failed mutation never releases the lock on the caller's
//! behalf; the owner releases explicitly or the lease expires.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use ordhub_core::errors::CoordError;
use ordhub_core::events::EventFrame;
use ordhub_core::ids::{OwnerId, ResourceId};
use ordhub_core::lock::LockInfo;
use ordhub_core::topic::Topic;
use ordhub_locks::registry::{AcquireOutcome, LockRegistry};

use crate::metrics::{
    LOCKS_ACQUIRED_TOTAL, LOCKS_CONFLICTS_TOTAL, LOCKS_FORCE_RELEASED_TOTAL,
    LOCKS_RELEASED_TOTAL, set_locks_active,
};
use crate::websocket::hub::BroadcastHub;

/// Glue between advisory locks and realtime notifications.
pub struct Coordinator {
    registry: Arc<LockRegistry>,
    hub: Arc<BroadcastHub>,
}

impl Coordinator {
    /// Create a coordinator over the given registry and hub.
    #[must_use]
    pub fn new(registry: Arc<LockRegistry>, hub: Arc<BroadcastHub>) -> Self {
        Self { registry, hub }
    }

    /// The lock registry this coordinator drives.
    #[must_use]
    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    /// The broadcast hub this coordinator publishes to.
    #[must_use]
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Try to take (or renew) the advisory lock on a resource.
    ///
    /// On success every orders subscriber learns about the new holder via
    /// an `order_locked` frame. On conflict the error carries the holder
    /// and the seconds left on its lease, so callers can render
    /// "locked by X for Ys".
    pub async fn try_acquire(
        &self,
        resource_id: &ResourceId,
        owner_id: &OwnerId,
        ttl: Option<Duration>,
    ) -> Result<LockInfo, CoordError> {
        match self.registry.try_acquire(resource_id, owner_id, ttl) {
            AcquireOutcome::Acquired(info) => {
                counter!(LOCKS_ACQUIRED_TOTAL).increment(1);
                set_locks_active(self.registry.active_count());
                let _ = self
                    .hub
                    .broadcast(Topic::Orders, &EventFrame::order_locked(&info))
                    .await;
                Ok(info)
            }
            AcquireOutcome::Rejected(holder) => {
                counter!(LOCKS_CONFLICTS_TOTAL).increment(1);
                Err(holder.conflict_error())
            }
        }
    }

    /// Release a lock held by `owner_id`.
    ///
    /// Succeeding releases are broadcast as `order_unlocked`. Releasing a
    /// lock the caller does not hold fails with [`CoordError::LockNotHeld`]
    /// and leaves the registry untouched.
    pub async fn release(
        &self,
        resource_id: &ResourceId,
        owner_id: &OwnerId,
    ) -> Result<(), CoordError> {
        if self.registry.release(resource_id, owner_id) {
            counter!(LOCKS_RELEASED_TOTAL).increment(1);
            set_locks_active(self.registry.active_count());
            let _ = self
                .hub
                .broadcast(Topic::Orders, &EventFrame::order_unlocked(resource_id.clone()))
                .await;
            Ok(())
        } else {
            Err(CoordError::LockNotHeld { resource_id: resource_id.clone() })
        }
    }

    /// Remove a lock regardless of owner. Returns whether one was removed.
    ///
    /// Only an actual removal is broadcast; forcing an unheld resource is
    /// a silent no-op.
    pub async fn force_release(&self, resource_id: &ResourceId) -> bool {
        let removed = self.registry.force_release(resource_id);
        if removed {
            counter!(LOCKS_FORCE_RELEASED_TOTAL).increment(1);
            set_locks_active(self.registry.active_count());
            let _ = self
                .hub
                .broadcast(Topic::Orders, &EventFrame::order_unlocked(resource_id.clone()))
                .await;
        }
        removed
    }

    /// Publish a completed mutation to every orders subscriber.
    ///
    /// Returns the number of connections the frame was queued for.
    pub async fn publish_order_update(
        &self,
        action: &str,
        resource_id: &ResourceId,
        payload: serde_json::Value,
    ) -> usize {
        self.hub
            .broadcast(
                Topic::Orders,
                &EventFrame::order_update(action, resource_id.clone(), payload),
            )
            .await
    }

    /// Publish a single-field status change to every orders subscriber.
    ///
    /// Workflow flags (invoiced, reviewed, ...) flip far more often than
    /// whole orders change; a `status_update` patch lets clients update the
    /// one field in place instead of refetching the order. Same best-effort
    /// delivery as [`publish_order_update`](Self::publish_order_update).
    /// Returns the number of connections the frame was queued for.
    pub async fn publish_status_update(
        &self,
        resource_id: &ResourceId,
        field: &str,
        value: serde_json::Value,
    ) -> usize {
        self.hub
            .broadcast(
                Topic::Orders,
                &EventFrame::status_update(resource_id.clone(), field, value),
            )
            .await
    }

    /// Current lock snapshot for one resource, purging it if expired.
    #[must_use]
    pub fn lock_status(&self, resource_id: &ResourceId) -> Option<LockInfo> {
        self.registry.info(resource_id)
    }

    /// Snapshot of all live locks.
    #[must_use]
    pub fn list_locks(&self) -> Vec<LockInfo> {
        self.registry.list_all()
    }
}

// ────────────────────────────── Tests ──────────────────────────────
