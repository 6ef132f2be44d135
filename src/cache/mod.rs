//! Cache Module
//!
//! Provides a TTL-bounded cache over a durable store, with lazy expiry and an
//! optional single-flight compute path.

mod clock;
mod entry;
mod expiring;
mod single_flight;
mod stats;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use expiring::ExpiringCache;
pub use single_flight::{FlightGuard, SingleFlight};
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
