//! Lock holder information as it crosses the wire.

use crate::errors::CoordError;
use crate::ids::{OwnerId, ResourceId};
use serde::{Deserialize, Serialize};

/// Snapshot of one advisory lock.
///
/// `locked_at` and `expires_at` are RFC 3339 UTC timestamps; `time_left_seconds`
/// is whole seconds remaining at the moment the snapshot was taken (truncated,
/// floored at zero). Snapshots are informational only: the registry decides
/// expiry from its own monotonic clock, never from these strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// The locked resource.
    pub resource_id: ResourceId,
    /// The owner holding the lock.
    pub locked_by: OwnerId,
    /// When the current lease began. A renewal starts a fresh lease, so this
    /// moves forward together with `expires_at`.
    pub locked_at: String,
    /// When the current lease expires.
    pub expires_at: String,
    /// Whole seconds until expiry, at snapshot time.
    pub time_left_seconds: u64,
}

impl LockInfo {
    /// The rejection a competing caller receives while this lock is held.
    #[must_use]
    pub fn conflict_error(&self) -> CoordError {
        CoordError::ResourceLocked {
            resource_id: self.resource_id.clone(),
            locked_by: self.locked_by.clone(),
            time_left: self.time_left_seconds,
        }
    }
}
