//! Executes authorized mutations against the record store.
//!
//! # Responsibility
//! - Refuse any call not backed by a matching, unconsumed verified
//!   challenge.
//! - Run the single store call for the bound action and classify its result.
//! - After success, publish invalidation signals and maintain the undo slot.
//!
//! # Invariants
//! - A refused invocation never reaches the store and is logged at `error`.
//! - A challenge authorizes at most one call, successful or not.
//! - Store failures leave the undo slot and event counters untouched.
//! - A successful clear-all empties the undo slot.

use crate::auth::challenge::{
    AdminCredential, AuthChallenge, ChallengeCredential, ChallengeId, CreateSource,
    MutationAction, Pin,
};
use crate::cart::batch_cart::StagedId;
use crate::events::synchronizer::{Channel, EventSynchronizer};
use crate::model::entry::{Entry, EntryKind, EntryPatch, RecordId};
use crate::repo::local_state_repo::LocalStateRepository;
use crate::store::{CallContext, RecordStore, StoreError};
use crate::undo::snapshot_store::{ComponentId, UndoSnapshot, UndoSnapshotStore};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ExecResult<T> = Result<T, ExecutorError>;

/// Executor failure.
#[derive(Debug)]
pub enum ExecutorError {
    /// Called without a matching verified challenge. A caller defect.
    UnauthorizedInvocation {
        challenge_id: ChallengeId,
        requested: &'static str,
    },
    Network(String),
    /// Authoritative rejection; `message` is the store's text verbatim.
    ServerRejected { status: u16, message: String },
    /// Credential refused by the store at call time.
    AuthRejected { status: u16, message: String },
    RateLimited,
    InvalidResponse(String),
}

impl Display for ExecutorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnauthorizedInvocation {
                challenge_id,
                requested,
            } => write!(
                f,
                "refusing `{requested}`: challenge {challenge_id} does not authorize it"
            ),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::ServerRejected { message, .. } => write!(f, "{message}"),
            Self::AuthRejected { message, .. } => write!(f, "{message}"),
            Self::RateLimited => write!(f, "too many attempts, please wait before retrying"),
            Self::InvalidResponse(message) => write!(f, "invalid store response: {message}"),
        }
    }
}

impl Error for ExecutorError {}

impl From<StoreError> for ExecutorError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Network(message) => Self::Network(message),
            StoreError::Rejected { status, message } => Self::ServerRejected { status, message },
            StoreError::Unauthorized { status, message } => Self::AuthRejected { status, message },
            StoreError::RateLimited => Self::RateLimited,
            StoreError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

/// What happened to the undo slot after a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEffect {
    Untouched,
    Captured(UndoSnapshot),
    Cleared,
    /// The store call succeeded but the slot could not be updated.
    Failed(String),
}

/// Result of one successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub action: &'static str,
    pub challenge_id: ChallengeId,
    /// Cart entries covered by a create, empty otherwise.
    pub staged_ids: Vec<StagedId>,
    pub published: Vec<Channel>,
    pub undo: UndoEffect,
}

/// Action an explicit executor call asks to perform.
enum Requested<'a> {
    Create { kind: EntryKind, entries: &'a [Entry] },
    Edit { id: RecordId, patch: &'a EntryPatch },
    Delete { id: RecordId },
    ClearAll,
}

impl Requested<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Edit { .. } => "edit",
            Self::Delete { .. } => "delete",
            Self::ClearAll => "clear_all",
        }
    }

    fn is_bound_by(&self, action: &MutationAction) -> bool {
        match (self, action) {
            (
                Self::Create { kind, entries },
                MutationAction::Create {
                    kind: bound_kind,
                    entries: bound_entries,
                    ..
                },
            ) => kind == bound_kind && *entries == bound_entries.as_slice(),
            (
                Self::Edit { id, patch },
                MutationAction::Edit {
                    record,
                    patch: bound_patch,
                },
            ) => *id == record.id && *patch == bound_patch,
            (Self::Delete { id }, MutationAction::Delete { record, .. }) => *id == record.id,
            (Self::ClearAll, MutationAction::ClearAll) => true,
            _ => false,
        }
    }
}

/// Runs authorized mutations and their follow-up effects.
pub struct MutationExecutor<S: RecordStore, L: LocalStateRepository> {
    store: S,
    events: EventSynchronizer,
    undo: UndoSnapshotStore<L>,
    consumed: HashSet<ChallengeId>,
}

impl<S: RecordStore, L: LocalStateRepository> MutationExecutor<S, L> {
    pub fn new(store: S, events: EventSynchronizer, undo: UndoSnapshotStore<L>) -> Self {
        Self {
            store,
            events,
            undo,
            consumed: HashSet::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventSynchronizer {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventSynchronizer {
        &mut self.events
    }

    pub fn undo(&self) -> &UndoSnapshotStore<L> {
        &self.undo
    }

    /// Runs whatever action `challenge` is bound to.
    pub fn execute(&mut self, challenge: AuthChallenge, ctx: &CallContext<'_>) -> ExecResult<MutationOutcome> {
        match challenge.mutation().action().clone() {
            MutationAction::Create { kind, entries, .. } => self.create(challenge, ctx, kind, &entries),
            MutationAction::Edit { record, patch } => self.edit(challenge, ctx, record.id, &patch),
            MutationAction::Delete { record, .. } => self.delete(challenge, ctx, record.id),
            MutationAction::ClearAll => self.clear_all(challenge, ctx),
        }
    }

    /// Bulk create of `entries`, or the replay of an undo snapshot.
    pub fn create(
        &mut self,
        challenge: AuthChallenge,
        ctx: &CallContext<'_>,
        kind: EntryKind,
        entries: &[Entry],
    ) -> ExecResult<MutationOutcome> {
        let credential = self.authorize(&challenge, &Requested::Create { kind, entries })?;
        let admin = admin_credential(&challenge, credential)?;
        let started_at = Instant::now();

        let result = match kind {
            EntryKind::Attendance => {
                let batch: Vec<_> = entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Entry::Attendance(attendance) => Some(attendance.clone()),
                        Entry::Apology(_) => None,
                    })
                    .collect();
                self.store.submit_attendance(ctx, &batch, &admin)
            }
            EntryKind::Apology => {
                let batch: Vec<_> = entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Entry::Apology(apology) => Some(apology.clone()),
                        Entry::Attendance(_) => None,
                    })
                    .collect();
                self.store.submit_apologies(ctx, &batch, &admin)
            }
        };
        drop(admin);
        self.finish_call(&challenge, "create", started_at, result)?;

        let (staged_ids, undo) = match challenge.mutation().action() {
            MutationAction::Create {
                source: CreateSource::Cart { staged_ids },
                ..
            } => (staged_ids.clone(), UndoEffect::Untouched),
            MutationAction::Create {
                source: CreateSource::Restore { origin },
                ..
            } => (Vec::new(), self.clear_restored(origin, entries)),
            _ => (Vec::new(), UndoEffect::Untouched),
        };
        let published = self.publish_for(&[kind]);

        Ok(MutationOutcome {
            action: challenge.mutation().action().name(),
            challenge_id: challenge.id(),
            staged_ids,
            published,
            undo,
        })
    }

    pub fn edit(
        &mut self,
        challenge: AuthChallenge,
        ctx: &CallContext<'_>,
        id: RecordId,
        patch: &EntryPatch,
    ) -> ExecResult<MutationOutcome> {
        let credential = self.authorize(&challenge, &Requested::Edit { id, patch })?;
        pin_credential(&challenge, "edit", credential)?;
        let kind = match challenge.mutation().action() {
            MutationAction::Edit { record, .. } => record.kind(),
            _ => return Err(unauthorized(&challenge, "edit")),
        };
        let started_at = Instant::now();

        let result = self.store.edit_record(ctx, kind, id, patch);
        self.finish_call(&challenge, "edit", started_at, result)?;

        Ok(MutationOutcome {
            action: "edit",
            challenge_id: challenge.id(),
            staged_ids: Vec::new(),
            published: self.publish_for(&[kind]),
            undo: UndoEffect::Untouched,
        })
    }

    /// Deletes one record and captures it in the undo slot.
    pub fn delete(
        &mut self,
        challenge: AuthChallenge,
        ctx: &CallContext<'_>,
        id: RecordId,
    ) -> ExecResult<MutationOutcome> {
        let credential = self.authorize(&challenge, &Requested::Delete { id })?;
        let pin = pin_credential(&challenge, "delete", credential)?;
        let (record, origin) = match challenge.mutation().action() {
            MutationAction::Delete { record, origin } => (record.clone(), origin.clone()),
            _ => return Err(unauthorized(&challenge, "delete")),
        };
        let kind = record.kind();
        let started_at = Instant::now();

        let result = self.store.delete_record(ctx, kind, id, &pin);
        self.finish_call(&challenge, "delete", started_at, result)?;

        let undo = match self.undo.capture(record, origin) {
            Ok(snapshot) => UndoEffect::Captured(snapshot),
            Err(err) => {
                error!(
                    "event=undo_capture module=executor status=error record_id={} error={}",
                    id, err
                );
                UndoEffect::Failed(err.to_string())
            }
        };

        Ok(MutationOutcome {
            action: "delete",
            challenge_id: challenge.id(),
            staged_ids: Vec::new(),
            published: self.publish_for(&[kind]),
            undo,
        })
    }

    /// Wipes every record; publishes both channels.
    pub fn clear_all(&mut self, challenge: AuthChallenge, ctx: &CallContext<'_>) -> ExecResult<MutationOutcome> {
        let credential = self.authorize(&challenge, &Requested::ClearAll)?;
        let pin = pin_credential(&challenge, "clear_all", credential)?;
        let started_at = Instant::now();

        let result = self.store.clear_all_data(ctx, &pin);
        self.finish_call(&challenge, "clear_all", started_at, result)?;

        // Nothing deleted before the wipe may be replayed into the emptied store.
        let undo = match self.undo.clear() {
            Ok(true) => UndoEffect::Cleared,
            Ok(false) => UndoEffect::Untouched,
            Err(err) => {
                error!(
                    "event=undo_clear module=executor status=error action=clear_all error={}",
                    err
                );
                UndoEffect::Failed(err.to_string())
            }
        };

        Ok(MutationOutcome {
            action: "clear_all",
            challenge_id: challenge.id(),
            staged_ids: Vec::new(),
            published: self.publish_for(&[EntryKind::Attendance, EntryKind::Apology]),
            undo,
        })
    }

    /// Checks and consumes `challenge` for `requested`.
    fn authorize(
        &mut self,
        challenge: &AuthChallenge,
        requested: &Requested<'_>,
    ) -> ExecResult<ChallengeCredential> {
        let bound = requested.is_bound_by(challenge.mutation().action());
        let credential = challenge.credential().cloned();
        match credential {
            Some(credential)
                if challenge.is_verified() && bound && !self.consumed.contains(&challenge.id()) =>
            {
                self.consumed.insert(challenge.id());
                Ok(credential)
            }
            _ => Err(unauthorized(challenge, requested.name())),
        }
    }

    fn finish_call(
        &self,
        challenge: &AuthChallenge,
        op: &'static str,
        started_at: Instant,
        result: Result<(), StoreError>,
    ) -> ExecResult<()> {
        match result {
            Ok(()) => {
                info!(
                    "event=mutation_execute module=executor status=ok action={} challenge_id={} duration_ms={}",
                    op,
                    challenge.id(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let err = ExecutorError::from(err);
                warn!(
                    "event=mutation_execute module=executor status=error action={} challenge_id={} duration_ms={} error_code={}",
                    op,
                    challenge.id(),
                    started_at.elapsed().as_millis(),
                    error_code(&err)
                );
                Err(err)
            }
        }
    }

    fn clear_restored(&self, origin: &ComponentId, entries: &[Entry]) -> UndoEffect {
        let cleared = self.undo.peek(origin).and_then(|snapshot| match snapshot {
            Some(snapshot)
                if entries
                    .first()
                    .is_some_and(|entry| entry.same_user_fields(&snapshot.record.entry)) =>
            {
                self.undo.clear_matching(&snapshot)
            }
            _ => Ok(false),
        });
        match cleared {
            Ok(true) => UndoEffect::Cleared,
            Ok(false) => UndoEffect::Untouched,
            Err(err) => {
                error!(
                    "event=undo_clear module=executor status=error origin={} error={}",
                    origin, err
                );
                UndoEffect::Failed(err.to_string())
            }
        }
    }

    fn publish_for(&mut self, kinds: &[EntryKind]) -> Vec<Channel> {
        kinds
            .iter()
            .map(|kind| {
                let channel = channel_for(*kind);
                self.events.publish(channel);
                channel
            })
            .collect()
    }
}

pub fn channel_for(kind: EntryKind) -> Channel {
    match kind {
        EntryKind::Attendance => Channel::AttendanceChanged,
        EntryKind::Apology => Channel::ApologyChanged,
    }
}

fn unauthorized(challenge: &AuthChallenge, requested: &'static str) -> ExecutorError {
    error!(
        "event=mutation_execute module=executor status=error error_code=unauthorized_invocation requested={} bound={} challenge_id={} state={:?}",
        requested,
        challenge.mutation().action().name(),
        challenge.id(),
        challenge.state()
    );
    ExecutorError::UnauthorizedInvocation {
        challenge_id: challenge.id(),
        requested,
    }
}

fn admin_credential(challenge: &AuthChallenge, credential: ChallengeCredential) -> ExecResult<AdminCredential> {
    match credential {
        ChallengeCredential::Admin(admin) => Ok(admin),
        ChallengeCredential::Pin(_) => Err(unauthorized(challenge, "create")),
    }
}

fn pin_credential(
    challenge: &AuthChallenge,
    requested: &'static str,
    credential: ChallengeCredential,
) -> ExecResult<Pin> {
    match credential {
        ChallengeCredential::Pin(pin) => Ok(pin),
        ChallengeCredential::Admin(_) => Err(unauthorized(challenge, requested)),
    }
}

fn error_code(err: &ExecutorError) -> &'static str {
    match err {
        ExecutorError::UnauthorizedInvocation { .. } => "unauthorized_invocation",
        ExecutorError::Network(_) => "network",
        ExecutorError::ServerRejected { .. } => "server_rejected",
        ExecutorError::AuthRejected { .. } => "auth_rejected",
        ExecutorError::RateLimited => "rate_limited",
        ExecutorError::InvalidResponse(_) => "invalid_response",
    }
}
