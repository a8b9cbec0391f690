//! In-process record store.
//!
//! Mirrors the remote store's authoritative checks (admin credential, PIN,
//! per-meeting uniqueness) and counts every call. Tests use it as the
//! call-count spy and to queue store failures.

use super::{CallContext, PinVerifier, RecordStore, StoreError, StoreResult};
use crate::auth::challenge::{AdminCredential, Pin};
use crate::model::entry::{
    ApologyEntry, AttendanceEntry, Entry, EntryKind, EntryPatch, RecordId, StoredRecord,
};
use crate::model::meeting::Meeting;
use std::cell::RefCell;
use std::collections::HashSet;

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub verify_pin: usize,
    pub submit_attendance: usize,
    pub submit_apologies: usize,
    pub edit: usize,
    pub delete: usize,
    pub clear_all: usize,
    pub fetch: usize,
    pub current_meeting: usize,
}

impl StoreCallCounts {
    /// Calls that could have changed stored data.
    pub fn mutations(&self) -> usize {
        self.submit_attendance + self.submit_apologies + self.edit + self.delete + self.clear_all
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<StoredRecord>,
    next_id: i64,
    counts: StoreCallCounts,
    meeting: Option<Meeting>,
    queued_failures: Vec<StoreError>,
    pin_rate_limited: bool,
}

impl MemoryState {
    fn take_failure(&mut self) -> StoreResult<()> {
        if self.queued_failures.is_empty() {
            return Ok(());
        }
        Err(self.queued_failures.remove(0))
    }

    fn insert(&mut self, entry: Entry, submitted_by: Option<String>) -> RecordId {
        self.next_id += 1;
        let id = RecordId(self.next_id);
        self.records.push(StoredRecord {
            id,
            entry,
            submitted_by,
            is_deleted: false,
        });
        id
    }
}

/// Record store kept in memory.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    pin: String,
    admin_username: String,
    admin_password: String,
    state: RefCell<MemoryState>,
}

impl InMemoryRecordStore {
    pub fn new(
        pin: impl Into<String>,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            pin: pin.into(),
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            state: RefCell::new(MemoryState::default()),
        }
    }

    pub fn with_meeting(self, meeting: Meeting) -> Self {
        self.state.borrow_mut().meeting = Some(meeting);
        self
    }

    /// Inserts a record directly, bypassing checks and counters.
    pub fn seed(&self, entry: Entry) -> RecordId {
        self.state.borrow_mut().insert(entry, None)
    }

    /// Fails the next call (of any operation) with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.state.borrow_mut().queued_failures.push(error);
    }

    /// Makes `verify_pin` answer HTTP 429 until turned off.
    pub fn set_pin_rate_limited(&self, limited: bool) {
        self.state.borrow_mut().pin_rate_limited = limited;
    }

    pub fn counts(&self) -> StoreCallCounts {
        self.state.borrow().counts
    }

    /// Active records of every kind, in insertion order.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .filter(|record| record.is_active())
            .cloned()
            .collect()
    }

    pub fn record(&self, id: RecordId) -> Option<StoredRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|record| record.id == id && record.is_active())
            .cloned()
    }

    fn check_admin(&self, admin: &AdminCredential) -> StoreResult<()> {
        if admin.username() == self.admin_username && admin.expose_password() == self.admin_password
        {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                status: 401,
                message: "Invalid admin credentials.".to_string(),
            })
        }
    }

    fn check_pin(&self, pin: &Pin) -> StoreResult<()> {
        if pin.expose() == self.pin {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                status: 403,
                message: "Invalid PIN".to_string(),
            })
        }
    }

    fn submit(&self, entries: Vec<Entry>, admin: &AdminCredential) -> StoreResult<()> {
        self.check_admin(admin)?;
        let mut state = self.state.borrow_mut();
        let mut names_seen = HashSet::new();
        for entry in &entries {
            if !names_seen.insert(entry.name().trim().to_lowercase()) {
                return Err(rejected(format!(
                    "Duplicate name in submission: {}",
                    entry.name()
                )));
            }
            let taken = state.records.iter().filter(|record| record.is_active()).any(|record| {
                let stored = &record.entry;
                stored.kind() == entry.kind()
                    && stored.meeting_date() == entry.meeting_date()
                    && stored.entry_type() == entry.entry_type()
                    && (stored.name() == entry.name()
                        || (stored.phone().is_some() && stored.phone() == entry.phone()))
            });
            if taken {
                return Err(rejected(match entry.kind() {
                    EntryKind::Attendance => {
                        format!("{} already submitted for this meeting.", entry.name())
                    }
                    EntryKind::Apology => format!(
                        "{} has already submitted an apology for this meeting.",
                        entry.name()
                    ),
                }));
            }
        }
        for entry in entries {
            state.insert(entry, Some(admin.username().to_string()));
        }
        Ok(())
    }

    fn find_active_mut<'a>(
        state: &'a mut MemoryState,
        kind: EntryKind,
        id: RecordId,
    ) -> StoreResult<&'a mut StoredRecord> {
        state
            .records
            .iter_mut()
            .find(|record| record.id == id && record.kind() == kind && record.is_active())
            .ok_or_else(|| StoreError::Rejected {
                status: 404,
                message: "Record not found or not authorized".to_string(),
            })
    }
}

fn rejected(message: String) -> StoreError {
    StoreError::Rejected {
        status: 400,
        message,
    }
}

impl PinVerifier for InMemoryRecordStore {
    fn verify_pin(&self, pin: &Pin) -> StoreResult<bool> {
        let mut state = self.state.borrow_mut();
        state.counts.verify_pin += 1;
        state.take_failure()?;
        if state.pin_rate_limited {
            return Err(StoreError::RateLimited);
        }
        Ok(pin.expose() == self.pin)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn submit_attendance(
        &self,
        _ctx: &CallContext<'_>,
        entries: &[AttendanceEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()> {
        {
            let mut state = self.state.borrow_mut();
            state.counts.submit_attendance += 1;
            state.take_failure()?;
        }
        self.submit(entries.iter().cloned().map(Entry::Attendance).collect(), admin)
    }

    fn submit_apologies(
        &self,
        _ctx: &CallContext<'_>,
        entries: &[ApologyEntry],
        admin: &AdminCredential,
    ) -> StoreResult<()> {
        {
            let mut state = self.state.borrow_mut();
            state.counts.submit_apologies += 1;
            state.take_failure()?;
        }
        self.submit(entries.iter().cloned().map(Entry::Apology).collect(), admin)
    }

    fn edit_record(
        &self,
        _ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        patch: &EntryPatch,
    ) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        state.counts.edit += 1;
        state.take_failure()?;
        let record = Self::find_active_mut(&mut state, kind, id)?;
        record.entry = patch.apply(&record.entry);
        Ok(())
    }

    fn delete_record(
        &self,
        _ctx: &CallContext<'_>,
        kind: EntryKind,
        id: RecordId,
        pin: &Pin,
    ) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        state.counts.delete += 1;
        state.take_failure()?;
        self.check_pin(pin)?;
        Self::find_active_mut(&mut state, kind, id)?;
        state.records.retain(|record| record.id != id);
        Ok(())
    }

    fn clear_all_data(&self, _ctx: &CallContext<'_>, pin: &Pin) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        state.counts.clear_all += 1;
        state.take_failure()?;
        self.check_pin(pin)?;
        state.records.clear();
        Ok(())
    }

    fn fetch_records(&self, _ctx: &CallContext<'_>, kind: EntryKind) -> StoreResult<Vec<StoredRecord>> {
        let mut state = self.state.borrow_mut();
        state.counts.fetch += 1;
        state.take_failure()?;
        Ok(state
            .records
            .iter()
            .filter(|record| record.kind() == kind && record.is_active())
            .cloned()
            .collect())
    }

    fn current_meeting(&self, _ctx: &CallContext<'_>) -> StoreResult<Option<Meeting>> {
        let mut state = self.state.borrow_mut();
        state.counts.current_meeting += 1;
        state.take_failure()?;
        Ok(state.meeting.clone())
    }
}
