//! Authorized mutation execution.

pub mod mutation_executor;
