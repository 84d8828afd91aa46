//! Wire frames exchanged over WebSocket connections.
//!
//! [`EventFrame`] covers everything the server pushes; [`ClientMessage`] is
//! the tiny vocabulary clients may send back. Both are `type`-tagged JSON,
//! snake_case, so a terminal can switch on `msg.type` directly.

use crate::ids::{ConnectionId, OwnerId, ResourceId};
use crate::lock::LockInfo;
use crate::topic::Topic;
use serde::{Deserialize, Serialize};

/// RFC 3339 UTC with millisecond precision, the timestamp format of every frame.
fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// A server-pushed frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventFrame {
    /// First frame on every new connection, confirming registration.
    ConnectionAck {
        /// Server-assigned id for this connection.
        connection_id: ConnectionId,
        /// The topic this connection is subscribed to.
        topic: Topic,
        /// When the frame was built.
        timestamp: String,
    },

    /// An order changed; sent after the host has persisted the mutation.
    OrderUpdate {
        /// What happened: `created`, `updated`, `deleted`, ...
        action: String,
        /// The order that changed.
        resource_id: ResourceId,
        /// Host-supplied body, passed through opaquely.
        payload: serde_json::Value,
        /// When the frame was built.
        timestamp: String,
    },

    /// One workflow flag of an order changed. A single-field patch that
    /// clients apply in place instead of refetching the whole order.
    StatusUpdate {
        /// The order whose flag changed.
        resource_id: ResourceId,
        /// Which field changed, e.g. `invoiced` or `reviewed`.
        field: String,
        /// The field's new value.
        value: serde_json::Value,
        /// When the frame was built.
        timestamp: String,
    },

    /// An order was locked for editing.
    OrderLocked {
        /// The locked order.
        resource_id: ResourceId,
        /// Who holds the lock.
        locked_by: OwnerId,
        /// When the lease expires.
        expires_at: String,
        /// When the frame was built.
        timestamp: String,
    },

    /// An order's lock was released (explicitly or by force).
    OrderUnlocked {
        /// The unlocked order.
        resource_id: ResourceId,
        /// When the frame was built.
        timestamp: String,
    },

    /// Reply to a client-level `ping`.
    Pong {
        /// When the frame was built.
        timestamp: String,
    },
}

impl EventFrame {
    /// Build a `connection_ack` frame stamped now.
    #[must_use]
    pub fn connection_ack(connection_id: ConnectionId, topic: Topic) -> Self {
        Self::ConnectionAck { connection_id, topic, timestamp: timestamp_now() }
    }

    /// Build an `order_update` frame stamped now.
    #[must_use]
    pub fn order_update(
        action: impl Into<String>,
        resource_id: ResourceId,
        payload: serde_json::Value,
    ) -> Self {
        Self::OrderUpdate { action: action.into(), resource_id, payload, timestamp: timestamp_now() }
    }

    /// Build a `status_update` frame stamped now.
    #[must_use]
    pub fn status_update(
        resource_id: ResourceId,
        field: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self::StatusUpdate { resource_id, field: field.into(), value, timestamp: timestamp_now() }
    }

    /// Build an `order_locked` frame from a fresh lock snapshot.
    #[must_use]
    pub fn order_locked(info: &LockInfo) -> Self {
        Self::OrderLocked {
            resource_id: info.resource_id.clone(),
            locked_by: info.locked_by.clone(),
            expires_at: info.expires_at.clone(),
            timestamp: timestamp_now(),
        }
    }

    /// Build an `order_unlocked` frame stamped now.
    #[must_use]
    pub fn order_unlocked(resource_id: ResourceId) -> Self {
        Self::OrderUnlocked { resource_id, timestamp: timestamp_now() }
    }

    /// Build a `pong` frame stamped now.
    #[must_use]
    pub fn pong() -> Self {
        Self::Pong { timestamp: timestamp_now() }
    }

    /// The wire value of this frame's `type` tag.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ConnectionAck { .. } => "connection_ack",
            Self::OrderUpdate { .. } => "order_update",
            Self::StatusUpdate { .. } => "status_update",
            Self::OrderLocked { .. } => "order_locked",
            Self::OrderUnlocked { .. } => "order_unlocked",
            Self::Pong { .. } => "pong",
        }
    }
}

/// Messages clients send over an established connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application-level liveness probe, answered with a [`EventFrame::Pong`].
    Ping,
    /// Anything unrecognized. Ignored, so old clients stay compatible.
    #[serde(other)]
    Unknown,
}
