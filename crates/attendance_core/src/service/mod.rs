//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, authorization and execution into the flows
//!   callers drive.
//! - Keep UI layers decoupled from store and storage details.

pub mod record_service;
