//! Topic-scoped broadcast hub.
//!
//! Keeps the set of live connections, fans serialized frames out to every
//! subscriber of a topic, and evicts clients that are closed or persistently
//! slow. Delivery is best-effort: a failed send never blocks the caller and
//! never affects the other recipients.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use ordhub_core::events::EventFrame;
use ordhub_core::ids::ConnectionId;
use ordhub_core::topic::Topic;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::connection::{ClientConnection, SendOutcome};
use crate::metrics::{
    WS_BROADCAST_DROPS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT_TOTAL,
};

/// Cumulative dropped-frame budget per connection. A client that has
/// dropped this many frames over its lifetime is disconnected so it cannot
/// keep soaking up broadcast work.
const MAX_TOTAL_DROPS: u64 = 100;

/// Occupancy snapshot returned by [`BroadcastHub::stats`].
///
/// Every known topic appears in `connections_by_topic`, including topics
/// with zero subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubStats {
    /// Number of registered connections across all topics.
    pub total_connections: usize,
    /// Connection count per topic, keyed by the topic's wire name.
    pub connections_by_topic: BTreeMap<String, usize>,
}

/// Registry of live realtime connections with topic-filtered fan-out.
pub struct BroadcastHub {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Kept in lockstep with the map so occupancy checks (admission
    /// fast path, health reporting) never need the read lock.
    active_count: AtomicUsize,
    /// Registration refuses beyond this many live connections.
    max_connections: usize,
}

impl BroadcastHub {
    /// Create a hub without a connection limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Create a hub that refuses registrations beyond `max_connections`.
    #[must_use]
    pub fn with_limit(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            max_connections,
        }
    }

    /// Register a connection and enqueue its `connection_ack` frame.
    ///
    /// Returns `None` when the hub is full. The check runs under the
    /// write lock, so concurrent registrations cannot exceed the cap even
    /// when they all passed the HTTP pre-upgrade check.
    ///
    /// The ack rides the same channel as every other frame, so a client
    /// whose session died before registration completes is detected and
    /// removed right away.
    pub async fn register(&self, connection: Arc<ClientConnection>) -> Option<ConnectionId> {
        let id = connection.id().clone();
        let topic = connection.topic();
        {
            let mut conns = self.connections.write().await;
            if conns.len() >= self.max_connections {
                warn!(
                    connection_id = %id,
                    limit = self.max_connections,
                    "hub full, refusing registration"
                );
                return None;
            }
            if conns.insert(id.clone(), connection).is_none() {
                let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
                counter!(WS_CONNECTIONS_TOTAL).increment(1);
                gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
            }
        }
        info!(connection_id = %id, %topic, "connection registered");
        let _ = self
            .send_to(&id, &EventFrame::connection_ack(id.clone(), topic))
            .await;
        Some(id)
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(id).is_some();
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
            debug!(connection_id = %id, "connection unregistered");
        }
        removed
    }

    /// Send a frame to one connection.
    ///
    /// Returns `true` only when the frame was queued. A closed connection
    /// is unregistered as a side effect.
    pub async fn send_to(&self, id: &ConnectionId, frame: &EventFrame) -> bool {
        let Some(conn) = self.connections.read().await.get(id).cloned() else {
            return false;
        };
        match conn.send_frame(frame) {
            SendOutcome::Sent => {
                counter!(WS_MESSAGES_SENT_TOTAL).increment(1);
                true
            }
            SendOutcome::Dropped => false,
            SendOutcome::Closed => {
                let _ = self.unregister(id).await;
                false
            }
        }
    }

    /// Fan a frame out to every subscriber of `topic`.
    ///
    /// The frame is serialized once and shared across recipients. Returns
    /// the number of connections the frame was queued for. Closed
    /// connections and clients past their drop budget are removed after
    /// the send pass, without affecting the other recipients.
    pub async fn broadcast(&self, topic: Topic, frame: &EventFrame) -> usize {
        let json = match serde_json::to_string(frame) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                error!(error = %e, event = frame.type_name(), "failed to serialize broadcast frame");
                return 0;
            }
        };

        let mut delivered = 0usize;
        let mut to_remove: Vec<ConnectionId> = Vec::new();
        {
            let conns = self.connections.read().await;
            for (id, conn) in conns.iter().filter(|(_, c)| c.topic() == topic) {
                match conn.send(Arc::clone(&json)) {
                    SendOutcome::Sent => {
                        delivered += 1;
                        counter!(WS_MESSAGES_SENT_TOTAL).increment(1);
                    }
                    SendOutcome::Dropped => {
                        counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                        if conn.drop_count() >= MAX_TOTAL_DROPS {
                            warn!(
                                connection_id = %id,
                                drops = conn.drop_count(),
                                "drop budget exhausted, disconnecting slow client"
                            );
                            to_remove.push(id.clone());
                        }
                    }
                    SendOutcome::Closed => to_remove.push(id.clone()),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut conns = self.connections.write().await;
            for id in to_remove {
                if conns.remove(&id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
                    info!(connection_id = %id, "removed dead connection");
                }
            }
        }

        debug!(%topic, event = frame.type_name(), delivered, "broadcast complete");
        delivered
    }

    /// Current connection count, without taking the read lock.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Occupancy snapshot for the stats endpoint and health reporting.
    pub async fn stats(&self) -> HubStats {
        let conns = self.connections.read().await;
        let mut by_topic: BTreeMap<String, usize> = Topic::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        for conn in conns.values() {
            *by_topic.entry(conn.topic().as_str().to_string()).or_insert(0) += 1;
        }
        HubStats {
            total_connections: conns.len(),
            connections_by_topic: by_topic,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────── Tests ──────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ordhub_core::ids::ResourceId;
    use tokio::sync::mpsc;

    fn make_conn(
        topic: Topic,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = Arc::new(ClientConnection::new(ConnectionId::new(), topic, tx));
        (conn, rx)
    }

    async fn recv_json(rx: &mut mpsc::Receiver<Arc<String>>) -> serde_json::Value {
        let frame = rx.recv().await.expect("expected a frame");
        serde_json::from_str(&frame).expect("frame should be valid JSON")
    }

    #[tokio::test]
    async fn register_delivers_ack_frame() {
        let hub = BroadcastHub::new();
        let (conn, mut rx) = make_conn(Topic::Orders, 8);
        let id = hub.register(conn).await.unwrap();

        let ack = recv_json(&mut rx).await;
        assert_eq!(ack["type"], "connection_ack");
        assert_eq!(ack["connection_id"], id.as_str());
        assert_eq!(ack["topic"], "orders");
        assert!(ack["timestamp"].is_string());
    }

    #[tokio::test]
    async fn register_counts_connection() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.connection_count(), 0);
        let (conn, _rx) = make_conn(Topic::Global, 8);
        let _ = hub.register(conn).await;
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn register_refuses_when_full() {
        let hub = BroadcastHub::with_limit(1);
        let (first, mut rx_first) = make_conn(Topic::Orders, 8);
        let (second, _rx_second) = make_conn(Topic::Orders, 8);

        let id = hub.register(first).await.unwrap();
        let _ = recv_json(&mut rx_first).await; // ack

        assert!(hub.register(second).await.is_none());
        assert_eq!(hub.connection_count(), 1);

        // A freed slot admits the next client.
        assert!(hub.unregister(&id).await);
        let (third, _rx_third) = make_conn(Topic::Orders, 8);
        assert!(hub.register(third).await.is_some());
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn register_dead_connection_is_removed_immediately() {
        let hub = BroadcastHub::new();
        let (conn, rx) = make_conn(Topic::Orders, 8);
        drop(rx);
        // The ack send fails with a closed channel, which unregisters.
        let _ = hub.register(conn).await;
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn unregister_removes_and_reports() {
        let hub = BroadcastHub::new();
        let (conn, _rx) = make_conn(Topic::Orders, 8);
        let id = hub.register(conn).await.unwrap();

        assert!(hub.unregister(&id).await);
        assert_eq!(hub.connection_count(), 0);
        // Second removal is a no-op.
        assert!(!hub.unregister(&id).await);
    }

    #[tokio::test]
    async fn unregister_unknown_returns_false() {
        let hub = BroadcastHub::new();
        assert!(!hub.unregister(&ConnectionId::from("ghost")).await);
    }

    #[tokio::test]
    async fn send_to_delivers_frame() {
        let hub = BroadcastHub::new();
        let (conn, mut rx) = make_conn(Topic::Orders, 8);
        let id = hub.register(conn).await.unwrap();
        let _ = recv_json(&mut rx).await; // ack

        assert!(hub.send_to(&id, &EventFrame::pong()).await);
        let frame = recv_json(&mut rx).await;
        assert_eq!(frame["type"], "pong");
    }

    #[tokio::test]
    async fn send_to_unknown_returns_false() {
        let hub = BroadcastHub::new();
        assert!(!hub.send_to(&ConnectionId::from("ghost"), &EventFrame::pong()).await);
    }

    #[tokio::test]
    async fn send_to_closed_connection_auto_unregisters() {
        let hub = BroadcastHub::new();
        let (conn, rx) = make_conn(Topic::Orders, 8);
        let id = conn.id().clone();
        // Insert directly so the closed channel survives registration.
        {
            let mut conns = hub.connections.write().await;
            let _ = conns.insert(id.clone(), conn);
            let _ = hub.active_count.fetch_add(1, Ordering::Relaxed);
        }
        drop(rx);

        assert!(!hub.send_to(&id, &EventFrame::pong()).await);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_matching_topic() {
        let hub = BroadcastHub::new();
        let (orders_a, mut rx_a) = make_conn(Topic::Orders, 8);
        let (orders_b, mut rx_b) = make_conn(Topic::Orders, 8);
        let (global, mut rx_global) = make_conn(Topic::Global, 8);
        let _ = hub.register(orders_a).await;
        let _ = hub.register(orders_b).await;
        let _ = hub.register(global).await;
        let _ = recv_json(&mut rx_a).await;
        let _ = recv_json(&mut rx_b).await;
        let _ = recv_json(&mut rx_global).await;

        let frame = EventFrame::order_unlocked(ResourceId::from("42"));
        let delivered = hub.broadcast(Topic::Orders, &frame).await;
        assert_eq!(delivered, 2);

        assert_eq!(recv_json(&mut rx_a).await["type"], "order_unlocked");
        assert_eq!(recv_json(&mut rx_b).await["type"], "order_unlocked");
        assert!(rx_global.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_topic_delivers_zero() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.broadcast(Topic::Global, &EventFrame::pong()).await, 0);
    }

    #[tokio::test]
    async fn broadcast_serializes_once_and_shares_the_payload() {
        let hub = BroadcastHub::new();
        let (c1, mut rx1) = make_conn(Topic::Orders, 8);
        let (c2, mut rx2) = make_conn(Topic::Orders, 8);
        let _ = hub.register(c1).await;
        let _ = hub.register(c2).await;
        let _ = rx1.recv().await.unwrap(); // acks are per-connection
        let _ = rx2.recv().await.unwrap();

        let delivered = hub.broadcast(Topic::Orders, &EventFrame::pong()).await;
        assert_eq!(delivered, 2);

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn broadcast_removes_closed_connection_without_affecting_others() {
        let hub = BroadcastHub::new();
        let (healthy, mut rx_healthy) = make_conn(Topic::Orders, 8);
        let (doomed, rx_doomed) = make_conn(Topic::Orders, 8);
        let _ = hub.register(healthy).await;
        let _ = hub.register(doomed).await;
        let _ = recv_json(&mut rx_healthy).await;
        drop(rx_doomed); // loses its ack and closes the channel

        let delivered = hub.broadcast(Topic::Orders, &EventFrame::pong()).await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(recv_json(&mut rx_healthy).await["type"], "pong");
    }

    #[tokio::test]
    async fn slow_client_is_evicted_after_drop_budget() {
        let hub = BroadcastHub::new();
        let (healthy, _rx_healthy) = make_conn(Topic::Orders, 1024);
        // Capacity 1: the ack fills the only slot and is never drained,
        // so every broadcast afterwards drops.
        let (slow, _rx_slow) = make_conn(Topic::Orders, 1);
        let _ = hub.register(healthy).await;
        let _ = hub.register(slow).await;
        assert_eq!(hub.connection_count(), 2);

        for _ in 0..MAX_TOTAL_DROPS {
            let _ = hub.broadcast(Topic::Orders, &EventFrame::pong()).await;
        }

        assert_eq!(hub.connection_count(), 1);
        let stats = hub.stats().await;
        assert_eq!(stats.total_connections, 1);
    }

    #[tokio::test]
    async fn stats_counts_by_topic_with_zero_entries() {
        let hub = BroadcastHub::new();
        let empty = hub.stats().await;
        assert_eq!(empty.total_connections, 0);
        assert_eq!(empty.connections_by_topic["orders"], 0);
        assert_eq!(empty.connections_by_topic["global"], 0);

        let (a, _rx_a) = make_conn(Topic::Orders, 8);
        let (b, _rx_b) = make_conn(Topic::Orders, 8);
        let (c, _rx_c) = make_conn(Topic::Global, 8);
        let _ = hub.register(a).await;
        let _ = hub.register(b).await;
        let _ = hub.register(c).await;

        let stats = hub.stats().await;
        assert_eq!(stats.total_connections, 3);
        assert_eq!(stats.connections_by_topic["orders"], 2);
        assert_eq!(stats.connections_by_topic["global"], 1);
    }

    #[tokio::test]
    async fn count_stays_consistent_across_register_and_unregister() {
        let hub = BroadcastHub::new();
        let mut ids = Vec::new();
        let mut rxs = Vec::new();
        for _ in 0..5 {
            let (conn, rx) = make_conn(Topic::Global, 8);
            ids.push(hub.register(conn).await.unwrap());
            rxs.push(rx);
        }
        assert_eq!(hub.connection_count(), 5);

        for id in &ids {
            assert!(hub.unregister(id).await);
        }
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.stats().await.total_connections, 0);
    }
}
