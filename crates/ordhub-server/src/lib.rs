//! # ordhub-server
//!
//! HTTP + WebSocket server for the ordhub coordination service.
//!
//! - **Locks over HTTP**: acquire, release, force-release, status, and the
//!   admin list, mapped 1:1 onto the registry with `423 Locked` conflicts
//! - **Realtime**: `/ws/{topic}` sessions fed by the topic broadcast hub
//! - **Coordination**: lock transitions and order mutations published as
//!   JSON event frames to every subscriber
//! - **Operations**: JSON config with env overrides, `/health`, Prometheus
//!   `/metrics`, graceful shutdown, periodic lock sweeping

#![deny(unsafe_code)]

pub mod config;
pub mod coordination;
pub mod errors;
pub mod health;
pub mod locks;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod sweep;
pub mod websocket;
