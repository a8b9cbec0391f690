//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for durable client state.
//! - Isolate SQLite query details from the engine.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`EmptyKey`, `InvalidData`) in
//!   addition to DB transport errors.

pub mod local_state_repo;
