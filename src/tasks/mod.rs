//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry Sweep: Removes expired entries from the durable store at
//!   configured intervals, on top of the lazy removal done by reads

mod sweep;

pub use sweep::spawn_sweep_task;
