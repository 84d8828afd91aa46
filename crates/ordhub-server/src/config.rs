//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If the config file exists, deep-merge its values over the defaults
//! 3. Apply `ORDHUB_*` environment variable overrides (highest priority)
//!
//! A sparse config file only needs the fields it wants to change; nulls and
//! missing keys leave the defaults alone. Invalid environment values never
//! abort startup; they log a warning and the previous value stands.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Errors from config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON (or not a valid config shape).
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for the ordhub server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Protocol ping interval in seconds.
    pub ping_interval_secs: u64,
    /// Close a connection that has not ponged within this many seconds.
    pub pong_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Lock lease granted when an acquire does not specify a TTL, in seconds.
    pub default_lock_ttl_secs: u64,
    /// Period of the expired-lock sweeper in seconds; `0` disables it.
    pub lock_sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 50,
            ping_interval_secs: 30,
            pong_timeout_secs: 90,
            max_message_size: 1024 * 1024, // 1 MiB; order payloads are small JSON
            default_lock_ttl_secs: 30,
            lock_sweep_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Protocol ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong timeout as a [`Duration`].
    #[must_use]
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Default lock TTL as a [`Duration`].
    #[must_use]
    pub fn default_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.default_lock_ttl_secs)
    }

    /// Sweeper period, or `None` when the sweeper is disabled.
    #[must_use]
    pub fn lock_sweep_interval(&self) -> Option<Duration> {
        (self.lock_sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.lock_sweep_interval_secs))
    }
}

/// Resolve the path to the config file (`~/.ordhub/config.json`).
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".ordhub").join("config.json")
}

/// Load config from the default path with env var overrides.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_from_path(&config_path())
}

/// Load config from a specific path with env var overrides.
///
/// A missing file yields the defaults; a file that exists but does not parse
/// is an error.
pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    let mut merged = serde_json::to_value(ServerConfig::default())?;

    if path.exists() {
        debug!(?path, "merging config file over defaults");
        let file: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        deep_merge(&mut merged, file);
    } else {
        debug!(?path, "no config file, using defaults");
    }

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Merge `overlay` into `base`, in place.
///
/// Object keys merge recursively; arrays and scalars in the overlay replace
/// whatever `base` held. Nulls inside an overlay object are skipped so a
/// sparse config file cannot blank out defaults.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    if let Value::Object(overlay_map) = overlay {
        if let Value::Object(base_map) = base {
            for (key, val) in overlay_map {
                if val.is_null() {
                    continue;
                }
                if let Some(slot) = base_map.get_mut(&key) {
                    deep_merge(slot, val);
                } else {
                    let _ = base_map.insert(key, val);
                }
            }
        } else {
            *base = Value::Object(overlay_map);
        }
    } else {
        *base = overlay;
    }
}

/// Apply `ORDHUB_*` environment variable overrides to a loaded config.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    if let Some(v) = read_env_string("ORDHUB_HOST") {
        config.host = v;
    }
    if let Some(v) = read_env_int("ORDHUB_PORT", 1u16, 65535) {
        config.port = v;
    }
    if let Some(v) = read_env_int("ORDHUB_MAX_CONNECTIONS", 1usize, 10_000) {
        config.max_connections = v;
    }
    if let Some(v) = read_env_int("ORDHUB_PING_INTERVAL_SECS", 1u64, 600) {
        config.ping_interval_secs = v;
    }
    if let Some(v) = read_env_int("ORDHUB_PONG_TIMEOUT_SECS", 1u64, 3600) {
        config.pong_timeout_secs = v;
    }
    if let Some(v) = read_env_int("ORDHUB_MAX_MESSAGE_SIZE", 1024usize, 16 * 1024 * 1024) {
        config.max_message_size = v;
    }
    if let Some(v) = read_env_int("ORDHUB_DEFAULT_LOCK_TTL_SECS", 1u64, 3600) {
        config.default_lock_ttl_secs = v;
    }
    // 0 is meaningful here: it disables the sweeper
    if let Some(v) = read_env_int("ORDHUB_LOCK_SWEEP_INTERVAL_SECS", 0u64, 3600) {
        config.lock_sweep_interval_secs = v;
    }
}

/// Parse a string as an integer within an inclusive range.
///
/// Pure so it can be tested without touching the process environment.
pub fn parse_int_range<T: FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    let n: T = val.parse().ok()?;
    (min <= n && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_int<T: FromStr + PartialOrd>(name: &str, min: T, max: T) -> Option<T> {
    let val = std::env::var(name).ok()?;
    let parsed = parse_int_range(&val, min, max);
    if parsed.is_none() {
        warn!(key = name, value = %val, "ignoring invalid env override");
    }
    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
