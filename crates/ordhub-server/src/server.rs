//! `CoordServer`, the Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use ordhub_core::constants::{NAME, VERSION};
use ordhub_core::errors::CoordError;
use ordhub_core::ids::ConnectionId;
use ordhub_core::topic::Topic;
use ordhub_locks::registry::LockRegistry;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::coordination::Coordinator;
use crate::errors::ApiError;
use crate::health::HealthResponse;
use crate::locks;
use crate::shutdown::ShutdownCoordinator;
use crate::sweep::run_lock_sweeper;
use crate::websocket::hub::{BroadcastHub, HubStats};
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lock/broadcast coordinator.
    pub coordinator: Arc<Coordinator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Handle for rendering the `/metrics` endpoint.
    pub metrics_handle: PrometheusHandle,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

/// The coordination server: advisory locks plus realtime broadcast.
pub struct CoordServer {
    config: Arc<ServerConfig>,
    coordinator: Arc<Coordinator>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics_handle: PrometheusHandle,
    start_time: Instant,
}

impl CoordServer {
    /// Create a new server. The metrics recorder is installed by the
    /// caller so tests can use per-test recorders.
    #[must_use]
    pub fn new(config: ServerConfig, metrics_handle: PrometheusHandle) -> Self {
        let registry = Arc::new(LockRegistry::new(config.default_lock_ttl()));
        let hub = Arc::new(BroadcastHub::with_limit(config.max_connections));
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(Coordinator::new(registry, hub)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics_handle,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            coordinator: self.coordinator.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
            config: self.config.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/stats", get(ws_stats_handler))
            .route("/ws/{topic}", get(ws_handler))
            .route(
                "/orders/{id}/lock",
                get(locks::lock_status_handler)
                    .post(locks::acquire_lock_handler)
                    .delete(locks::release_lock_handler),
            )
            .route("/orders/{id}/lock/force", post(locks::force_release_handler))
            .route("/locks", get(locks::list_locks_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// The serve task is registered with the shutdown coordinator; it ends
    /// when the shutdown token fires. Returns the bound address (useful
    /// with port 0).
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(service = NAME, version = VERSION, %addr, "listening");
        self.shutdown.register(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        }));
        Ok(addr)
    }

    /// Start the periodic lock sweeper, unless it is disabled.
    pub fn spawn_sweeper(&self) {
        let Some(interval) = self.config.lock_sweep_interval() else {
            info!("lock sweeper disabled");
            return;
        };
        let registry = self.coordinator.registry().clone();
        let token = self.shutdown.token();
        self.shutdown
            .register(tokio::spawn(run_lock_sweeper(registry, interval, token)));
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.coordinator.hub().connection_count();
    let active_locks = state.coordinator.registry().active_count();
    Json(HealthResponse::collect(state.start_time, connections, active_locks))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics_handle)
}

/// GET /ws/stats
async fn ws_stats_handler(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.coordinator.hub().stats().await)
}

/// GET /ws/{topic}: WebSocket upgrade.
///
/// Unknown topics fail the handshake with 404; a server at its connection
/// limit or already shutting down fails it with 503.
async fn ws_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let topic = match topic.parse::<Topic>() {
        Ok(topic) => topic,
        Err(e) => return ApiError(e).into_response(),
    };

    if state.shutdown.is_shutting_down() {
        return ApiError(CoordError::NotAvailable {
            message: "server is shutting down".into(),
        })
        .into_response();
    }
    // Pre-upgrade check only: a full server answers 503 here rather than
    // upgrading and closing. The hub re-checks under its write lock at
    // registration, so racing handshakes cannot exceed the cap.
    if state.coordinator.hub().connection_count() >= state.config.max_connections {
        return ApiError(CoordError::NotAvailable {
            message: format!("connection limit of {} reached", state.config.max_connections),
        })
        .into_response();
    }

    let connection_id = ConnectionId::new();
    let hub = state.coordinator.hub().clone();
    let ping_interval = state.config.ping_interval();
    let pong_timeout = state.config.pong_timeout();
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                connection_id,
                topic,
                hub,
                ping_interval,
                pong_timeout,
                shutdown,
            )
        })
}

// ────────────────────────────── Tests ──────────────────────────────
