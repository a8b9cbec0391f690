//! Record store contracts and implementations.
//!
//! # Responsibility
//! - Define the REST surface the engine consumes (`RecordStore`).
//! - Classify transport and HTTP outcomes into `StoreError`.
//!
//! # Invariants
//! - Authoritative rejections keep the store's message verbatim.
//! - HTTP 429 is reported as `RateLimited`, never as a credential failure.

use crate::auth::challenge::{AdminCredential, Pin};
use crate::model::entry::{ApologyEntry, AttendanceEntry, EntryKind, EntryPatch, RecordId, StoredRecord};
use crate::model::meeting::Meeting;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod http;
pub mod memory;
pub mod wire;

pub use http::HttpRecordStore;
pub use memory::{InMemoryRecordStore, StoreCallCounts};

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure; nothing reached the store or no answer came back.
    Network(String),
    /// Authoritative rejection, message passed through verbatim.
    Rejected { status: u16, message: String },
    /// Credential or session refused at call time (401/403).
    Unauthorized { status: u16, message: String },
    /// HTTP 429.
    RateLimited,
    /// Response body did not match the expected shape.
    InvalidResponse(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Rejected { message, .. } => write!(f, "{message}"),
            Self::Unauthorized { message, .. } => write!(f, "{message}"),
            Self::RateLimited => write!(f, "too many attempts, please wait before retrying"),
            Self::InvalidResponse(message) => write!(f, "invalid store response: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Per-call request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext<'a> {
    /// Session bearer token; `None` means unauthenticated.
    pub bearer_token: Option<&'a str>,
}

/// PIN verification endpoint.
pub trait PinVerifier {
    /// Returns whether the PIN is valid.
    fn verify_pin(&self, pin: &Pin) -> StoreResult<bool>;
}

/// Remote record store.
pub trait RecordStore: PinVerifier {
    fn submit_attendance(
        &self,
        ctx: &CallContext<'_>,
        entries: &[AttendanceEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()>;

    fn submit_apologies(
        &self,
        ctx: &CallContext<'_>,
        entries: &[ApologyEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()>;

    fn edit_record(
        &self,
        ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        patch: &EntryPatch,
    ) -> StoreResult<()>;

    fn delete_record(
        &self,
        ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        pin: &Pin,
    ) -> StoreResult<()>;

    fn clear_all_data(&self, ctx: &CallContext<'_>, pin: &Pin) -> StoreResult<()>;

    /// Lists records of one kind visible to the session.
    fn fetch_records(&self, ctx: &CallContext<'_>, kind: EntryKind) -> StoreResult<Vec<StoredRecord>>;

    /// Returns the active meeting, or `None` when none is set.
    fn current_meeting(&self, ctx: &CallContext<'_>) -> StoreResult<Option<Meeting>>;
}
