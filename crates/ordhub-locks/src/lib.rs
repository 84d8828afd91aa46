//! # ordhub-locks
//!
//! In-process advisory lock registry for order editing.
//!
//! - One lock per resource, 30 s default TTL, same-owner renewal
//! - Non-blocking `try_acquire` that reports the current holder on rejection
//! - Owner-checked release, admin force-release
//! - Lazy expiry on every read, with an optional sweep via `purge_expired`
//!
//! Cooperative only: the registry coordinates editors, it does not guard the
//! data itself, and it keeps no state across process restarts.

#![deny(unsafe_code)]

pub mod registry;
