//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which durable store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map, lost on restart
    Memory,
    /// One file per key under `store_dir`
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Durable store implementation
    pub store_backend: StoreBackend,
    /// Directory used by the file backend
    pub store_dir: PathBuf,
    /// Maximum number of keys the memory backend holds
    pub max_entries: usize,
    /// Default TTL in milliseconds for writes without explicit TTL
    pub default_ttl_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
    /// Collapse concurrent misses on the same key
    pub single_flight: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_BACKEND` - `memory` or `file` (default: memory)
    /// - `STORE_DIR` - File backend directory (default: ./cache-data)
    /// - `MAX_ENTRIES` - Memory backend key limit (default: 1000)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds, 0 = off (default: 60)
    /// - `SINGLE_FLIGHT` - `true`/`false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            store_backend: parse_var("STORE_BACKEND").unwrap_or(defaults.store_backend),
            store_dir: env::var("STORE_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl_ms: parse_var("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            single_flight: parse_var("SINGLE_FLIGHT").unwrap_or(defaults.single_flight),
        }
    }
}

/// Reads and parses an environment variable, `None` if unset or unparsable.
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            store_dir: PathBuf::from("./cache-data"),
            max_entries: 1000,
            default_ttl_ms: 300_000,
            server_port: 3000,
            sweep_interval: 60,
            single_flight: true,
        }
    }
}
