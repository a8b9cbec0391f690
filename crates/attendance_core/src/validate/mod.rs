//! Local rule validation for candidate entries.
//!
//! # Responsibility
//! - Check field formats before anything is staged.
//! - Check cross-record invariants against the in-memory working set.
//!
//! # Invariants
//! - Validation performs no I/O.
//! - Checks are advisory; the record store holds the authoritative copy.

pub mod rules;
