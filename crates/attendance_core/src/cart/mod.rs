//! Client-side staging of entries awaiting one authorized bulk submission.
//!
//! # Invariants
//! - A cart holds entries of a single kind.
//! - Staged entries are stamped with the wall-clock time of `append`.
//! - A failed submission never changes the cart.

pub mod batch_cart;
