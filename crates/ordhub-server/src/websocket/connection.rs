//! Per-client connection state shared between the session task and the
//! broadcast hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ordhub_core::events::EventFrame;
use ordhub_core::ids::ConnectionId;
use ordhub_core::topic::Topic;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Result of enqueuing a frame onto a connection's send channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame was queued for delivery.
    Sent,
    /// The frame was discarded (channel full or unserializable) but the
    /// connection itself is still usable.
    Dropped,
    /// The receiving side is gone; the connection is dead.
    Closed,
}

impl SendOutcome {
    /// `true` only for [`SendOutcome::Sent`].
    #[must_use]
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// A connected realtime client.
///
/// Frames are serialized once and pushed through a bounded channel so that
/// one slow consumer cannot stall the hub. Liveness is tracked with an
/// alive flag (reset on every ping cycle) plus the wall time of the most
/// recent pong.
pub struct ClientConnection {
    id: ConnectionId,
    topic: Topic,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_frames: AtomicU64,
}

impl ClientConnection {
    /// Create a connection bound to `topic` with the given send channel.
    #[must_use]
    pub fn new(id: ConnectionId, topic: Topic, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            topic,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(Instant::now()),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Identifier assigned at registration time.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The single topic this connection subscribed to.
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Enqueue an already-serialized frame without blocking.
    ///
    /// A full channel counts against this connection's drop budget; a
    /// closed channel means the session task has exited.
    pub fn send(&self, frame: Arc<String>) -> SendOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    connection_id = %self.id,
                    dropped,
                    "send channel full, dropping frame"
                );
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Serialize `frame` and enqueue it.
    pub fn send_frame(&self, frame: &EventFrame) -> SendOutcome {
        match serde_json::to_string(frame) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                error!(connection_id = %self.id, error = %e, "failed to serialize frame");
                SendOutcome::Dropped
            }
        }
    }

    /// Record that the client responded (pong or any inbound traffic).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Consume the alive flag: returns whether the client responded since
    /// the previous call, and resets the flag for the next ping cycle.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong (or since connect, before the first pong).
    #[must_use]
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// How long this connection has been open.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Total frames discarded because the send channel was full.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("dropped_frames", &self.drop_count())
            .finish_non_exhaustive()
    }
}

// ────────────────────────────── Tests ──────────────────────────────
