//! Record use-case service.
//!
//! # Responsibility
//! - Wire validator, carts, gate, executor, undo slot and events into the
//!   flows a form or records view drives.
//! - Keep the working set (last-fetched server records) that local checks
//!   run against.
//!
//! # Invariants
//! - Validation and conflict failures happen before any challenge opens.
//! - A cart changes only through staging calls or a confirmed create.
//! - Kinds touched by a successful mutation are refetched before the next
//!   local check or record lookup that depends on them.

use crate::auth::challenge::{AuthChallenge, ChallengeResponse, ChallengeState, PendingMutation};
use crate::auth::gate::AuthorizationGate;
use crate::cart::batch_cart::{BatchCart, StagedEntry, StagedId};
use crate::clock::SharedClock;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::synchronizer::{Channel, EventSynchronizer};
use crate::executor::mutation_executor::{MutationExecutor, MutationOutcome};
use crate::model::entry::{Entry, EntryKind, EntryPatch, RecordId, StoredRecord};
use crate::model::meeting::Meeting;
use crate::repo::local_state_repo::LocalStateRepository;
use crate::retry::RetryPolicy;
use crate::session::SessionContext;
use crate::store::RecordStore;
use crate::undo::snapshot_store::{ComponentId, UndoSnapshot, UndoSnapshotStore};
use crate::validate::rules::{normalize_name, validate_candidate, ValidationError};
use log::{info, warn};
use std::collections::BTreeSet;

/// Use-case facade over the mutation and authorization engine.
pub struct RecordService<S: RecordStore, L: LocalStateRepository> {
    session: SessionContext,
    attendance_cart: BatchCart,
    apology_cart: BatchCart,
    gate: AuthorizationGate,
    executor: MutationExecutor<S, L>,
    working_set: Vec<StoredRecord>,
    stale: BTreeSet<EntryKind>,
    retry: RetryPolicy,
    submitting: bool,
}

impl<S: RecordStore, L: LocalStateRepository> RecordService<S, L> {
    pub fn new(config: &EngineConfig, store: S, local_state: L, clock: SharedClock) -> Self {
        let undo = UndoSnapshotStore::new(local_state, clock.clone());
        Self {
            session: SessionContext::new(),
            attendance_cart: BatchCart::new(EntryKind::Attendance, clock.clone()),
            apology_cart: BatchCart::new(EntryKind::Apology, clock.clone()),
            gate: AuthorizationGate::new(config.challenge_ttl, clock),
            executor: MutationExecutor::new(store, EventSynchronizer::new(), undo),
            working_set: Vec::new(),
            stale: BTreeSet::new(),
            retry: config.refetch_retry.clone(),
            submitting: false,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn store(&self) -> &S {
        self.executor.store()
    }

    pub fn events(&self) -> &EventSynchronizer {
        self.executor.events()
    }

    /// Registers a view that refetches when `channel` fires.
    pub fn subscribe(
        &mut self,
        channel: Channel,
        callback: impl FnMut() + 'static,
    ) -> crate::events::synchronizer::SubscriptionId {
        self.executor.events_mut().subscribe(channel, callback)
    }

    pub fn cart(&self, kind: EntryKind) -> &BatchCart {
        match kind {
            EntryKind::Attendance => &self.attendance_cart,
            EntryKind::Apology => &self.apology_cart,
        }
    }

    fn cart_mut(&mut self, kind: EntryKind) -> &mut BatchCart {
        match kind {
            EntryKind::Attendance => &mut self.attendance_cart,
            EntryKind::Apology => &mut self.apology_cart,
        }
    }

    /// Active records of `kind` from the last fetch.
    pub fn working_set(&self, kind: EntryKind) -> Vec<&StoredRecord> {
        self.working_set
            .iter()
            .filter(|record| record.kind() == kind && record.is_active())
            .collect()
    }

    /// Advisory flag set while an executor call is in flight.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn pending_challenge(&mut self) -> Option<&AuthChallenge> {
        self.gate.current()
    }

    pub fn challenge_state(&mut self) -> ChallengeState {
        self.gate.state()
    }

    /// Replaces the working set of `kind` with the store's current records.
    ///
    /// Transport failures are retried per the configured policy.
    pub fn refresh_working_set(&mut self, kind: EntryKind) -> EngineResult<usize> {
        let store = self.executor.store();
        let ctx = self.session.call_context();
        let records = self
            .retry
            .run("fetch_records", || store.fetch_records(&ctx, kind))?;
        let fetched = records.len();
        self.working_set.retain(|record| record.kind() != kind);
        self.working_set.extend(records);
        self.stale.remove(&kind);
        info!(
            "event=working_set_refresh module=service status=ok kind={} count={}",
            kind, fetched
        );
        Ok(fetched)
    }

    /// Looks up the active meeting; failures degrade to `None`.
    pub fn load_current_meeting(&mut self) -> Option<Meeting> {
        let result = self
            .executor
            .store()
            .current_meeting(&self.session.call_context());
        match result {
            Ok(meeting) => {
                self.session.set_current_meeting(meeting.clone());
                meeting
            }
            Err(err) => {
                warn!(
                    "event=current_meeting module=service status=degraded error={}",
                    err
                );
                None
            }
        }
    }

    /// Normalizes, validates and stages one entry.
    pub fn stage(&mut self, mut entry: Entry) -> EngineResult<StagedId> {
        let kind = entry.kind();
        self.ensure_fresh(kind)?;
        entry.set_name(normalize_name(entry.name()));

        let (existing, _) = self.existing_entries(kind, None);
        validate_candidate(&entry, &existing, None)?;
        let id = self.cart_mut(kind).append(entry)?;
        info!(
            "event=cart_stage module=service status=ok kind={} cart_len={}",
            kind,
            self.cart(kind).len()
        );
        Ok(id)
    }

    pub fn remove_staged(&mut self, kind: EntryKind, index: usize) -> EngineResult<StagedEntry> {
        Ok(self.cart_mut(kind).remove_at(index)?)
    }

    pub fn clear_cart(&mut self, kind: EntryKind) {
        self.cart_mut(kind).clear();
    }

    /// Opens an admin challenge for a bulk create of the whole cart.
    pub fn request_submit(&mut self, kind: EntryKind) -> EngineResult<AuthChallenge> {
        let snapshot = self.cart(kind).submit_all()?;
        Ok(self.gate.open(PendingMutation::create_from_cart(snapshot))?)
    }

    /// Validates `patch` against the working set and opens a PIN challenge.
    pub fn request_edit(&mut self, id: RecordId, patch: EntryPatch) -> EngineResult<AuthChallenge> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        self.ensure_all_fresh()?;
        let record = self.find_record(id)?;
        if record.kind() == EntryKind::Apology && patch.phone.is_some() {
            return Err(ValidationError::PhoneNotApplicable.into());
        }

        let patch = EntryPatch {
            name: patch.name.as_deref().map(normalize_name),
            ..patch
        };
        let patched = patch.apply(&record.entry);
        let (existing, exclude_index) = self.existing_entries(record.kind(), Some(id));
        validate_candidate(&patched, &existing, exclude_index)?;

        Ok(self.gate.open(PendingMutation::edit(record, patch))?)
    }

    /// Opens a PIN challenge to delete one record on behalf of `origin`.
    pub fn request_delete(&mut self, id: RecordId, origin: ComponentId) -> EngineResult<AuthChallenge> {
        self.ensure_all_fresh()?;
        let record = self.find_record(id)?;
        Ok(self.gate.open(PendingMutation::delete(record, origin))?)
    }

    pub fn request_clear_all(&mut self) -> EngineResult<AuthChallenge> {
        Ok(self.gate.open(PendingMutation::clear_all())?)
    }

    /// Undo snapshot captured by `origin`, if any.
    pub fn undo_snapshot(&self, origin: &ComponentId) -> EngineResult<Option<UndoSnapshot>> {
        Ok(self.executor.undo().peek(origin)?)
    }

    /// Opens a fresh admin challenge to replay `origin`'s last delete.
    ///
    /// Returns `None` when there is nothing to restore for `origin`.
    pub fn request_restore(&mut self, origin: &ComponentId) -> EngineResult<Option<AuthChallenge>> {
        let Some(snapshot) = self.executor.undo().peek(origin)? else {
            info!(
                "event=undo_restore module=service status=noop origin={}",
                origin
            );
            return Ok(None);
        };
        Ok(Some(self.gate.open(PendingMutation::restore(&snapshot))?))
    }

    /// Discards the pending challenge and its bound action.
    pub fn cancel_challenge(&mut self) -> Option<PendingMutation> {
        self.gate.cancel()
    }

    /// Answers the pending challenge and, once verified, runs its action.
    ///
    /// A failure at any point leaves carts and the undo slot unchanged.
    pub fn authorize(&mut self, response: ChallengeResponse) -> EngineResult<MutationOutcome> {
        let verified = self.gate.verify(response, self.executor.store())?;

        self.submitting = true;
        let result = self
            .executor
            .execute(verified, &self.session.call_context());
        self.submitting = false;
        let outcome = result?;

        if !outcome.staged_ids.is_empty() {
            let committed = self.attendance_cart.commit(&outcome.staged_ids)
                + self.apology_cart.commit(&outcome.staged_ids);
            info!(
                "event=cart_commit module=service status=ok committed={}",
                committed
            );
        }
        for channel in &outcome.published {
            self.stale.insert(match channel {
                Channel::AttendanceChanged => EntryKind::Attendance,
                Channel::ApologyChanged => EntryKind::Apology,
            });
        }
        Ok(outcome)
    }

    fn ensure_fresh(&mut self, kind: EntryKind) -> EngineResult<()> {
        if self.stale.contains(&kind) {
            self.refresh_working_set(kind)?;
        }
        Ok(())
    }

    /// Refetches every stale kind; used where the record's kind is not known
    /// until it is looked up.
    fn ensure_all_fresh(&mut self) -> EngineResult<()> {
        let stale: Vec<EntryKind> = self.stale.iter().copied().collect();
        for kind in stale {
            self.refresh_working_set(kind)?;
        }
        Ok(())
    }

    fn find_record(&self, id: RecordId) -> EngineResult<StoredRecord> {
        self.working_set
            .iter()
            .find(|record| record.id == id && record.is_active())
            .cloned()
            .ok_or(EngineError::RecordNotFound(id))
    }

    /// Working set plus cart for `kind`, and the index of `editing` in it.
    fn existing_entries(&self, kind: EntryKind, editing: Option<RecordId>) -> (Vec<Entry>, Option<usize>) {
        let mut exclude_index = None;
        let mut existing = Vec::new();
        for record in self.working_set(kind) {
            if Some(record.id) == editing {
                exclude_index = Some(existing.len());
            }
            existing.push(record.entry.clone());
        }
        existing.extend(self.cart(kind).entries().cloned());
        (existing, exclude_index)
    }
}
