//! Undo of the most recent delete.
//!
//! # Invariants
//! - One slot, overwritten by every capture.
//! - The slot is cleared only after a confirmed replay.

pub mod snapshot_store;
