//! Single-Flight Module
//!
//! Per-key guard that collapses concurrent misses on the same key into one
//! computation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One key's lock plus how many callers hold or wait on it.
#[derive(Debug, Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

// == Single Flight ==
/// Registry of in-flight keys.
///
/// A key has a slot only while some caller holds or waits on it. Holders of
/// different keys never block each other.
#[derive(Debug, Default)]
pub struct SingleFlight {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire ==
    /// Waits until no other caller holds `key`, then holds it until the
    /// returned guard is dropped.
    ///
    /// Dropping the future while it waits gives up the caller's place and
    /// frees the slot if nobody else is using it.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(key.to_string()).or_default();
            slot.users += 1;
            slot.lock.clone()
        };
        let registration = Registration {
            registry: self,
            key: key.to_string(),
        };

        let held = lock.lock_owned().await;

        FlightGuard {
            _held: held,
            _registration: registration,
        }
    }

    // == In Flight ==
    /// Number of keys currently held or waited on.
    pub fn in_flight(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, key: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(key);
            }
        }
    }
}

/// Counts one caller against a key's slot until dropped.
#[derive(Debug)]
struct Registration<'a> {
    registry: &'a SingleFlight,
    key: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

// == Flight Guard ==
/// Exclusive hold on one key; releases it on drop.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    // Field order matters: unlock before deregistering.
    _held: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}
