//! Coordination error codes and error type.
//!
//! Every error that can cross the wire carries a stable machine-readable code
//! from the constants below; [`CoordError::to_error_body`] produces the JSON
//! body clients switch on. `RESOURCE_LOCKED` is the only code with structured
//! details (`locked_by`, `time_left`); callers use them to tell the user who
//! is editing and for how long.

use crate::ids::{OwnerId, ResourceId};
use serde::{Deserialize, Serialize};

// ── Error code constants ────────────────────────────────────────────

/// Resource is held by another owner; the mutation must not proceed.
pub const RESOURCE_LOCKED: &str = "RESOURCE_LOCKED";
/// Release attempted by a caller who does not hold the lock.
pub const LOCK_NOT_HELD: &str = "LOCK_NOT_HELD";
/// Topic name outside the closed topic set.
pub const UNKNOWN_TOPIC: &str = "UNKNOWN_TOPIC";
/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Subsystem cannot serve right now (shutting down or at capacity).
pub const NOT_AVAILABLE: &str = "NOT_AVAILABLE";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Errors surfaced by the coordination service.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    /// Another owner holds the lock; carries enough for a useful rejection.
    #[error("resource {resource_id} is locked by {locked_by}")]
    ResourceLocked {
        /// The contested resource.
        resource_id: ResourceId,
        /// Current holder.
        locked_by: OwnerId,
        /// Whole seconds until the holder's lease expires.
        time_left: u64,
    },

    /// The caller asked to release a lock it does not hold.
    #[error("no lock on {resource_id} held by this owner")]
    LockNotHeld {
        /// The resource the caller tried to release.
        resource_id: ResourceId,
    },

    /// Subscription to a topic outside the closed set.
    #[error("unknown topic: {topic}")]
    UnknownTopic {
        /// The name that failed to parse.
        topic: String,
    },

    /// Required parameter missing or out of range.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Feature or subsystem not available.
    #[error("{message}")]
    NotAvailable {
        /// Description.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl CoordError {
    /// Machine-readable error code for this variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ResourceLocked { .. } => RESOURCE_LOCKED,
            Self::LockNotHeld { .. } => LOCK_NOT_HELD,
            Self::UnknownTopic { .. } => UNKNOWN_TOPIC,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotAvailable { .. } => NOT_AVAILABLE,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    #[must_use]
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details: match self {
                Self::ResourceLocked { locked_by, time_left, .. } => Some(serde_json::json!({
                    "locked_by": locked_by,
                    "time_left": time_left,
                })),
                _ => None,
            },
        }
    }
}

/// Structured error body inside an error response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `RESOURCE_LOCKED`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Top-level JSON error envelope: `{"error": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error body.
    pub error: ErrorBody,
}

impl From<&CoordError> for ErrorResponse {
    fn from(err: &CoordError) -> Self {
        Self { error: err.to_error_body() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_locked_code_and_details() {
        let err = CoordError::ResourceLocked {
            resource_id: ResourceId::from("order-42"),
            locked_by: OwnerId::from("terminal-3"),
            time_left: 27,
        };
        assert_eq!(err.code(), RESOURCE_LOCKED);
        assert_eq!(err.to_string(), "resource order-42 is locked by terminal-3");

        let body = err.to_error_body();
        assert_eq!(body.code, RESOURCE_LOCKED);
        assert_eq!(
            body.details,
            Some(json!({"locked_by": "terminal-3", "time_left": 27}))
        );
    }

    #[test]
    fn lock_not_held_code() {
        let err = CoordError::LockNotHeld { resource_id: ResourceId::from("order-9") };
        assert_eq!(err.code(), LOCK_NOT_HELD);
        assert!(err.to_error_body().details.is_none());
    }

    #[test]
    fn unknown_topic_code() {
        let err = CoordError::UnknownTopic { topic: "chat".into() };
        assert_eq!(err.code(), UNKNOWN_TOPIC);
        assert_eq!(err.to_string(), "unknown topic: chat");
    }

    #[test]
    fn invalid_params_code() {
        let err = CoordError::InvalidParams { message: "ttl_seconds out of range".into() };
        assert_eq!(err.code(), INVALID_PARAMS);
        assert_eq!(err.to_string(), "ttl_seconds out of range");
    }

    #[test]
    fn not_available_code() {
        let err = CoordError::NotAvailable { message: "shutting down".into() };
        assert_eq!(err.code(), NOT_AVAILABLE);
    }

    #[test]
    fn internal_code() {
        let err = CoordError::Internal { message: "boom".into() };
        assert_eq!(err.code(), INTERNAL_ERROR);
    }

    #[test]
    fn error_response_wire_shape() {
        let err = CoordError::ResourceLocked {
            resource_id: ResourceId::from("order-42"),
            locked_by: OwnerId::from("a"),
            time_left: 30,
        };
        let value = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(
            value,
            json!({
                "error": {
                    "code": "RESOURCE_LOCKED",
                    "message": "resource order-42 is locked by a",
                    "details": {"locked_by": "a", "time_left": 30},
                }
            })
        );
    }

    #[test]
    fn details_omitted_when_absent() {
        let err = CoordError::Internal { message: "boom".into() };
        let value = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(
            value,
            json!({"error": {"code": "INTERNAL_ERROR", "message": "boom"}})
        );
    }
}
