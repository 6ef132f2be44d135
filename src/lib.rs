//! Expiring Cache - A TTL-bounded key-value cache over a durable store
//!
//! Adds expiry and a compute-on-miss path to any byte-oriented key-value
//! store, with in-memory and file-backed stores and an HTTP façade.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEntry, CacheStats, Clock, ExpiringCache, ManualClock, SystemClock};
pub use config::{Config, StoreBackend};
pub use error::{CacheError, GetOrComputeError, StoreError};
pub use store::{DurableStore, FileStore, MemoryStore};
pub use tasks::spawn_sweep_task;
