//! Lock endpoints: request/response bodies and axum handlers.
//!
//! The HTTP surface maps 1:1 onto the registry operations: status, acquire,
//! release, force-release, and the admin list. Conflicts come back as
//! `423 Locked` with the holder in the error details. Once shutdown begins
//! every route answers `503 NOT_AVAILABLE`; callers fall back to working
//! without the advisory lock.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use ordhub_core::errors::CoordError;
use ordhub_core::ids::{OwnerId, ResourceId};
use ordhub_core::lock::LockInfo;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::server::AppState;

/// Longest lease a client may request, in seconds.
const MAX_TTL_SECONDS: u64 = 3600;

/// Body of `POST /orders/{id}/lock`.
#[derive(Debug, Clone, Deserialize)]
pub struct AcquireLockRequest {
    /// Who is asking. Opaque, claimed, never verified.
    pub owner_id: OwnerId,
    /// Lease length in seconds. Server default when omitted.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// Query of `DELETE /orders/{id}/lock`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseLockQuery {
    /// Who is releasing. Required; optional here only to produce a
    /// structured error instead of the extractor's plain-text one.
    #[serde(default)]
    pub owner_id: Option<OwnerId>,
}

/// Body of a successful `POST /orders/{id}/lock`.
#[derive(Debug, Clone, Serialize)]
pub struct AcquireLockResponse {
    /// Always `true` on the success path.
    pub acquired: bool,
    /// The granted lease.
    #[serde(flatten)]
    pub lock: LockInfo,
}

/// Body of `GET /orders/{id}/lock`.
#[derive(Debug, Clone, Serialize)]
pub struct LockStatusResponse {
    /// Whether the resource is currently locked.
    pub locked: bool,
    /// Holder details, present only when locked.
    #[serde(flatten)]
    pub lock: Option<LockInfo>,
}

/// Body of the release and force-release responses.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasedResponse {
    /// Whether a lock was actually removed.
    pub released: bool,
}

/// Body of `GET /locks`.
#[derive(Debug, Clone, Serialize)]
pub struct LockListResponse {
    /// All live locks, sorted by resource id.
    pub locks: Vec<LockInfo>,
    /// Convenience count of `locks`.
    pub count: usize,
}

/// Reject with `503 NOT_AVAILABLE` once shutdown has begun.
fn ensure_available(state: &AppState) -> Result<(), ApiError> {
    if state.shutdown.is_shutting_down() {
        return Err(ApiError(CoordError::NotAvailable {
            message: "server is shutting down".into(),
        }));
    }
    Ok(())
}

/// `GET /orders/{id}/lock`: current lock status for one resource.
pub async fn lock_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LockStatusResponse>, ApiError> {
    ensure_available(&state)?;
    let lock = state.coordinator.lock_status(&ResourceId::from(id));
    Ok(Json(LockStatusResponse { locked: lock.is_some(), lock }))
}

/// `POST /orders/{id}/lock`: try to acquire or renew the lock.
pub async fn acquire_lock_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcquireLockRequest>,
) -> Result<Json<AcquireLockResponse>, ApiError> {
    ensure_available(&state)?;
    let ttl = match req.ttl_seconds {
        None => None,
        Some(secs) if (1..=MAX_TTL_SECONDS).contains(&secs) => Some(Duration::from_secs(secs)),
        Some(secs) => {
            return Err(ApiError(CoordError::InvalidParams {
                message: format!("ttl_seconds must be between 1 and {MAX_TTL_SECONDS}, got {secs}"),
            }));
        }
    };

    let lock = state
        .coordinator
        .try_acquire(&ResourceId::from(id), &req.owner_id, ttl)
        .await?;
    Ok(Json(AcquireLockResponse { acquired: true, lock }))
}

/// `DELETE /orders/{id}/lock?owner_id=...`: release an owned lock.
pub async fn release_lock_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReleaseLockQuery>,
) -> Result<Json<ReleasedResponse>, ApiError> {
    ensure_available(&state)?;
    let Some(owner_id) = query.owner_id else {
        return Err(ApiError(CoordError::InvalidParams {
            message: "owner_id query parameter is required".into(),
        }));
    };

    state
        .coordinator
        .release(&ResourceId::from(id), &owner_id)
        .await?;
    Ok(Json(ReleasedResponse { released: true }))
}

/// `POST /orders/{id}/lock/force`: remove a lock regardless of owner.
pub async fn force_release_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReleasedResponse>, ApiError> {
    ensure_available(&state)?;
    let released = state.coordinator.force_release(&ResourceId::from(id)).await;
    Ok(Json(ReleasedResponse { released }))
}

/// `GET /locks`: snapshot of every live lock.
pub async fn list_locks_handler(
    State(state): State<AppState>,
) -> Result<Json<LockListResponse>, ApiError> {
    ensure_available(&state)?;
    let locks = state.coordinator.list_locks();
    let count = locks.len();
    Ok(Json(LockListResponse { locks, count }))
}

// ────────────────────────────── Tests ──────────────────────────────
