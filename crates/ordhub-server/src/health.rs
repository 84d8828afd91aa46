//! `/health` endpoint.

use ordhub_core::constants::{NAME, VERSION};
use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service name (`"ordhub"`).
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Always `"ok"`; a server that cannot answer does not answer.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Currently held locks.
    pub active_locks: usize,
}

impl HealthResponse {
    /// Snapshot the live counters into a response body.
    #[must_use]
    pub fn collect(started: Instant, connections: usize, active_locks: usize) -> Self {
        Self {
            service: NAME,
            version: VERSION,
            status: "ok",
            uptime_secs: started.elapsed().as_secs(),
            connections,
            active_locks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn collect_reports_identity() {
        let resp = HealthResponse::collect(Instant::now(), 0, 0);
        assert_eq!(resp.status, "ok");
        assert_eq!(resp.service, "ordhub");
        assert_eq!(resp.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn uptime_counts_from_start() {
        let started = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        let resp = HealthResponse::collect(started, 0, 0);
        assert!(resp.uptime_secs >= 59);

        let fresh = HealthResponse::collect(Instant::now(), 0, 0);
        assert!(fresh.uptime_secs < 2);
    }

    #[test]
    fn live_counters_pass_through() {
        let resp = HealthResponse::collect(Instant::now(), 5, 3);
        assert_eq!(resp.connections, 5);
        assert_eq!(resp.active_locks, 3);
    }

    #[test]
    fn wire_shape() {
        let parsed = serde_json::to_value(HealthResponse::collect(Instant::now(), 2, 1)).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["service"], "ordhub");
        assert_eq!(parsed["connections"], 2);
        assert_eq!(parsed["active_locks"], 1);
        assert!(parsed["uptime_secs"].is_number());
        assert!(parsed["version"].is_string());
    }
}
