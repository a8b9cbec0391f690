//! Secondary-credential authorization for sensitive mutations.
//!
//! # Responsibility
//! - Bind a pending mutation to a challenge at the moment it opens.
//! - Verify short PINs against the record store and admin credentials
//!   locally, producing a single-use verified challenge.
//!
//! # Invariants
//! - At most one challenge is outstanding at a time.
//! - Cancel, rejection and expiry discard the bound mutation with no side
//!   effect.
//! - Credentials live only inside a verified challenge and are never cached.

pub mod challenge;
pub mod gate;
