//! Invalidation signals for views that mirror record store data.

pub mod synchronizer;
