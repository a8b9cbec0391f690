//! Domain model for attendance and apology records.
//!
//! # Responsibility
//! - Define the canonical entry shapes staged, validated and submitted by
//!   the engine.
//! - Define the fixed congregation/position catalogs.
//!
//! # Invariants
//! - Entry kind is an explicit tag, never inferred from field presence.
//! - Position validity depends on `EntryType` (`local` vs `district`).

pub mod catalog;
pub mod entry;
pub mod meeting;
