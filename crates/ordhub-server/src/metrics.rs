//! Prometheus recorder install and the metric names ordhub emits.

use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

// Metric names live here so call sites and tests agree on spelling.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Frames queued for delivery total (counter).
pub const WS_MESSAGES_SENT_TOTAL: &str = "ws_messages_sent_total";
/// Broadcast frames dropped on full channels total (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Locks acquired total, renewals included (counter).
pub const LOCKS_ACQUIRED_TOTAL: &str = "locks_acquired_total";
/// Acquisition attempts rejected because another owner holds the lock (counter).
pub const LOCKS_CONFLICTS_TOTAL: &str = "locks_conflicts_total";
/// Locks released by their owner total (counter).
pub const LOCKS_RELEASED_TOTAL: &str = "locks_released_total";
/// Locks removed administratively total (counter).
pub const LOCKS_FORCE_RELEASED_TOTAL: &str = "locks_force_released_total";
/// Expired locks removed by the sweeper total (counter).
pub const LOCKS_EXPIRED_TOTAL: &str = "locks_expired_total";
/// Currently held locks (gauge).
pub const LOCKS_ACTIVE: &str = "locks_active";

/// Install the process-global Prometheus recorder.
///
/// Call once at startup, before anything records a metric. The returned
/// handle is what `/metrics` renders from.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("metrics recorder installed");
    handle
}

/// Render the exposition text for `/metrics`.
#[must_use]
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Record the current number of held locks.
pub fn set_locks_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!(LOCKS_ACTIVE).set(count as f64);
}
