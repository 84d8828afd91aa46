//! # ordhub-core
//!
//! Shared vocabulary for the ordhub coordination service.
//!
//! This crate provides the types every other ordhub crate speaks:
//!
//! - **Branded IDs**: `ResourceId`, `OwnerId`, `ConnectionId` as newtypes for type safety
//! - **Topics**: the closed `Topic` set (`orders`, `global`) connections subscribe to
//! - **Lock info**: `LockInfo` snapshots of who holds what, for how long
//! - **Event frames**: `EventFrame` server-push JSON and the `ClientMessage` inbound vocabulary
//! - **Errors**: `CoordError` via `thiserror`, stable wire codes, `{"error": {...}}` envelopes

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod events;
pub mod ids;
pub mod lock;
pub mod topic;
