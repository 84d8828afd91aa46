//! Service identity.

/// Service name, reported by `/health` and the startup log line.
pub const NAME: &str = "ordhub";

/// Service version, taken from the crate manifest at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
