//! Realtime connection management: per-client state, topic broadcast, and
//! session lifecycle.

pub mod connection;
pub mod hub;
pub mod session;
