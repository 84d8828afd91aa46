//! The advisory lock registry.
//!
//! One mutex-guarded table mapping resource ids to lease entries. All
//! decisions happen under the mutex, so per-resource lock operations are
//! linearizable. Nothing blocks and nothing queues: a caller that loses the
//! race gets the current holder's info back and retries on its own schedule.
//!
//! Expiry is lazy. Every read path treats an expired entry as absent and
//! physically drops it in passing; a periodic sweep is optional and purely
//! cosmetic. The expiry authority is a monotonic [`tokio::time::Instant`]
//! deadline (which paused-clock tests can drive); the wall-clock timestamps
//! in [`LockInfo`] are for display only.

use chrono::{DateTime, Utc};
use ordhub_core::ids::{OwnerId, ResourceId};
use ordhub_core::lock::LockInfo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lease duration granted when the caller does not ask for one.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Shortest lease the registry will grant.
const MIN_TTL: Duration = Duration::from_secs(1);

/// Longest lease the registry will grant.
const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One granted lease.
#[derive(Clone, Debug)]
struct LockEntry {
    locked_by: OwnerId,
    locked_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    deadline: Instant,
}

impl LockEntry {
    fn new(owner_id: OwnerId, ttl: Duration, now: Instant) -> Self {
        let locked_at = Utc::now();
        Self {
            locked_by: owner_id,
            locked_at,
            expires_at: wall_expiry(locked_at, ttl),
            deadline: now + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn time_left(&self, now: Instant) -> u64 {
        self.deadline.saturating_duration_since(now).as_secs()
    }

    fn info(&self, resource_id: &ResourceId, now: Instant) -> LockInfo {
        LockInfo {
            resource_id: resource_id.clone(),
            locked_by: self.locked_by.clone(),
            locked_at: self.locked_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            expires_at: self.expires_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            time_left_seconds: self.time_left(now),
        }
    }
}

/// Display-side expiry timestamp. The monotonic deadline is the authority.
fn wall_expiry(locked_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|lease| locked_at.checked_add_signed(lease))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Result of a [`LockRegistry::try_acquire`] call.
#[derive(Clone, Debug)]
pub enum AcquireOutcome {
    /// The caller now holds the lease described by the info.
    Acquired(LockInfo),
    /// Another owner holds the resource; the info describes the holder.
    Rejected(LockInfo),
}

impl AcquireOutcome {
    /// Whether the caller got the lock.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    /// The lock snapshot, whichever way the call went.
    #[must_use]
    pub fn info(&self) -> &LockInfo {
        match self {
            Self::Acquired(info) | Self::Rejected(info) => info,
        }
    }
}

/// In-process advisory locks over order resources.
///
/// Locks are cooperative: they gate nothing by themselves, they only answer
/// "may I edit this?" consistently. Owner ids are opaque claimed strings and
/// never verified.
pub struct LockRegistry {
    locks: Mutex<HashMap<ResourceId, LockEntry>>,
    default_ttl: Duration,
}

impl LockRegistry {
    /// Create a registry granting `default_ttl` leases when callers do not
    /// specify one. Leases are clamped to `[1 s, 24 h]`.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            default_ttl: default_ttl.clamp(MIN_TTL, MAX_TTL),
        }
    }

    /// The lease duration used when `try_acquire` is called without a TTL.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Try to take (or renew) the lock on `resource_id` for `owner_id`.
    ///
    /// Non-blocking. A lock already held by the same owner is renewed with a
    /// fresh lease; a lock held by a different, still-valid owner rejects the
    /// call and reports that holder.
    pub fn try_acquire(
        &self,
        resource_id: &ResourceId,
        owner_id: &OwnerId,
        ttl: Option<Duration>,
    ) -> AcquireOutcome {
        let ttl = ttl.unwrap_or(self.default_ttl).clamp(MIN_TTL, MAX_TTL);
        let now = Instant::now();
        let mut locks = self.locks.lock();

        // An expired entry is logically absent; drop it before deciding.
        if locks.get(resource_id).is_some_and(|entry| entry.is_expired(now)) {
            let _ = locks.remove(resource_id);
            debug!(resource = %resource_id, "expired lock purged on acquire");
        }

        let holder = match locks.get(resource_id) {
            Some(entry) if entry.locked_by != *owner_id => Some(entry.info(resource_id, now)),
            _ => None,
        };
        if let Some(holder) = holder {
            warn!(
                resource = %resource_id,
                owner = %owner_id,
                locked_by = %holder.locked_by,
                time_left = holder.time_left_seconds,
                "acquire rejected, resource already locked"
            );
            return AcquireOutcome::Rejected(holder);
        }

        let renewal = locks.contains_key(resource_id);
        let entry = LockEntry::new(owner_id.clone(), ttl, now);
        let granted = entry.info(resource_id, now);
        let _ = locks.insert(resource_id.clone(), entry);
        if renewal {
            debug!(resource = %resource_id, owner = %owner_id, "lock renewed");
        } else {
            info!(resource = %resource_id, owner = %owner_id, ttl_secs = ttl.as_secs(), "lock acquired");
        }
        AcquireOutcome::Acquired(granted)
    }

    /// Release the lock on `resource_id` if `owner_id` holds it.
    ///
    /// Returns `false` when there is no entry or the entry belongs to someone
    /// else, never an error. Deliberately skips the expiry check: releasing
    /// your own already-expired entry still counts as a release.
    pub fn release(&self, resource_id: &ResourceId, owner_id: &OwnerId) -> bool {
        let mut locks = self.locks.lock();
        let Some(holder) = locks.get(resource_id).map(|entry| entry.locked_by.clone()) else {
            return false;
        };
        if holder != *owner_id {
            warn!(
                resource = %resource_id,
                owner = %owner_id,
                locked_by = %holder,
                "release refused, caller does not hold the lock"
            );
            return false;
        }
        let _ = locks.remove(resource_id);
        info!(resource = %resource_id, owner = %owner_id, "lock released");
        true
    }

    /// Remove the lock on `resource_id` regardless of owner (admin override).
    ///
    /// Returns whether an entry was actually removed. Idempotent.
    pub fn force_release(&self, resource_id: &ResourceId) -> bool {
        let mut locks = self.locks.lock();
        match locks.remove(resource_id) {
            Some(entry) => {
                info!(resource = %resource_id, evicted_owner = %entry.locked_by, "lock force released");
                true
            }
            None => false,
        }
    }

    /// Whether `resource_id` currently has a valid lock.
    pub fn is_locked(&self, resource_id: &ResourceId) -> bool {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        if locks.get(resource_id).is_some_and(|entry| entry.is_expired(now)) {
            let _ = locks.remove(resource_id);
            return false;
        }
        locks.contains_key(resource_id)
    }

    /// Snapshot of the valid lock on `resource_id`, if any.
    pub fn info(&self, resource_id: &ResourceId) -> Option<LockInfo> {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        if locks.get(resource_id).is_some_and(|entry| entry.is_expired(now)) {
            let _ = locks.remove(resource_id);
            return None;
        }
        locks.get(resource_id).map(|entry| entry.info(resource_id, now))
    }

    /// Snapshots of every valid lock, sorted by resource id.
    pub fn list_all(&self) -> Vec<LockInfo> {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        let _ = Self::drop_expired(&mut locks, now);
        let mut all: Vec<LockInfo> =
            locks.iter().map(|(resource_id, entry)| entry.info(resource_id, now)).collect();
        all.sort_by(|a, b| a.resource_id.as_str().cmp(b.resource_id.as_str()));
        all
    }

    /// Physically remove every expired entry. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        let removed = Self::drop_expired(&mut locks, now);
        if removed > 0 {
            info!(removed, "purged expired locks");
        }
        removed
    }

    /// Number of currently valid locks.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        let mut locks = self.locks.lock();
        let _ = Self::drop_expired(&mut locks, now);
        locks.len()
    }

    /// Number of entries physically in the table, expired ones included.
    /// Observability aid; prefer [`active_count`](Self::active_count).
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.locks.lock().len()
    }

    fn drop_expired(locks: &mut HashMap<ResourceId, LockEntry>, now: Instant) -> usize {
        let before = locks.len();
        locks.retain(|_, entry| !entry.is_expired(now));
        before - locks.len()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TTL)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
