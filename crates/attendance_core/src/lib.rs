//! Record mutation and authorization engine for congregational attendance
//! and apology records.
//!
//! Local rule checks, batch staging, secondary-credential authorization,
//! authorized execution against the record store, single-slot undo and
//! change signals live here. UI layers call [`RecordService`].

pub mod auth;
pub mod cart;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod model;
pub mod repo;
pub mod retry;
pub mod service;
pub mod session;
pub mod store;
pub mod undo;
pub mod validate;

pub use auth::challenge::{
    AdminCredential, AuthChallenge, ChallengeKind, ChallengeResponse, ChallengeState,
    MutationAction, PendingMutation, Pin,
};
pub use auth::gate::{AuthorizationGate, GateError};
pub use cart::batch_cart::{BatchCart, CartError, StagedId};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory};
pub use error::{EngineError, EngineResult};
pub use events::synchronizer::{Channel, EventSynchronizer, SubscriptionId};
pub use executor::mutation_executor::{ExecutorError, MutationExecutor, MutationOutcome, UndoEffect};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{Congregation, EntryType, Position};
pub use model::entry::{ApologyEntry, AttendanceEntry, Entry, EntryKind, EntryPatch, RecordId, StoredRecord};
pub use model::meeting::Meeting;
pub use repo::local_state_repo::{LocalStateRepository, SqliteLocalStateRepository};
pub use retry::RetryPolicy;
pub use service::record_service::RecordService;
pub use session::SessionContext;
pub use store::{CallContext, HttpRecordStore, InMemoryRecordStore, RecordStore, StoreError};
pub use undo::snapshot_store::{ComponentId, UndoSnapshot, UndoSnapshotStore};
pub use validate::rules::{ConflictError, ValidationError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
