//! Cache Entry Module
//!
//! Defines the persisted record for a single cached value with its expiry.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

// == Cache Entry ==
/// A cached value together with its absolute expiry.
///
/// Stored as `{"value": <T>, "expiresAt": <epoch ms>}`. The expiry travels
/// with the value so any process can judge liveness without sharing a clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: i64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after `now_ms`.
    ///
    /// Sub-millisecond TTLs round up to one millisecond, so only a zero TTL
    /// is expired on write. Saturates instead of overflowing for absurdly
    /// large TTLs.
    pub fn new(value: T, now_ms: i64, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(i64::MAX);
        Self {
            value,
            expires_at: now_ms.saturating_add(ttl_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// Boundary condition: an entry is expired once `now_ms >= expires_at`,
    /// so a zero TTL is expired from the moment it is written.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Returns the remaining lifetime at `now_ms`, zero once expired.
    pub fn ttl_remaining(&self, now_ms: i64) -> Duration {
        let remaining = self.expires_at.saturating_sub(now_ms).max(0);
        Duration::from_millis(remaining as u64)
    }
}

impl<T: Serialize> CacheEntry<T> {
    /// Encodes the entry into the persisted byte layout.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Decodes an entry from its persisted byte layout.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
