//! Single-slot durable undo snapshot.

use crate::clock::SharedClock;
use crate::model::entry::StoredRecord;
use crate::repo::local_state_repo::{LocalStateRepository, RepoError, RepoResult};
use chrono::{DateTime, Local, TimeZone};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Local state key holding the snapshot.
pub const UNDO_STATE_KEY: &str = "pendingUndo";

/// Identity of the view that deleted a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last deleted record and who deleted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoSnapshot {
    pub record: StoredRecord,
    pub origin: ComponentId,
    pub captured_at: DateTime<Local>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    component: ComponentId,
    record: StoredRecord,
    /// Unix epoch milliseconds.
    timestamp: i64,
}

/// Undo slot persisted through a [`LocalStateRepository`].
pub struct UndoSnapshotStore<L: LocalStateRepository> {
    repo: L,
    clock: SharedClock,
}

impl<L: LocalStateRepository> UndoSnapshotStore<L> {
    pub fn new(repo: L, clock: SharedClock) -> Self {
        Self { repo, clock }
    }

    /// Overwrites the slot with `record`.
    pub fn capture(&self, record: StoredRecord, origin: ComponentId) -> RepoResult<UndoSnapshot> {
        let captured_at = self.clock.now();
        let persisted = PersistedSnapshot {
            component: origin,
            record,
            timestamp: captured_at.timestamp_millis(),
        };
        let json = serde_json::to_string(&persisted)
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        self.repo.put(UNDO_STATE_KEY, &json, persisted.timestamp)?;
        info!(
            "event=undo_capture module=undo status=ok record_id={} kind={} origin={}",
            persisted.record.id,
            persisted.record.kind(),
            persisted.component
        );
        Ok(UndoSnapshot {
            record: persisted.record,
            origin: persisted.component,
            captured_at,
        })
    }

    /// Snapshot in the slot, whoever captured it.
    pub fn current(&self) -> RepoResult<Option<UndoSnapshot>> {
        let Some(stored) = self.repo.get(UNDO_STATE_KEY)? else {
            return Ok(None);
        };
        let persisted: PersistedSnapshot = serde_json::from_str(&stored.value).map_err(|err| {
            warn!("event=undo_load module=undo status=error error_code=invalid_snapshot");
            RepoError::InvalidData(err.to_string())
        })?;
        let captured_at = Local
            .timestamp_millis_opt(persisted.timestamp)
            .single()
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "snapshot timestamp out of range: {}",
                    persisted.timestamp
                ))
            })?;
        Ok(Some(UndoSnapshot {
            record: persisted.record,
            origin: persisted.component,
            captured_at,
        }))
    }

    /// Snapshot captured by `origin`; `None` for an empty or foreign slot.
    pub fn peek(&self, origin: &ComponentId) -> RepoResult<Option<UndoSnapshot>> {
        Ok(self
            .current()?
            .filter(|snapshot| &snapshot.origin == origin))
    }

    /// Empties the slot if it still holds `snapshot`.
    ///
    /// A slot overwritten by a later capture is left alone.
    pub fn clear_matching(&self, snapshot: &UndoSnapshot) -> RepoResult<bool> {
        match self.current()? {
            Some(current)
                if current.record.id == snapshot.record.id && current.origin == snapshot.origin =>
            {
                self.clear()
            }
            _ => Ok(false),
        }
    }

    pub fn clear(&self) -> RepoResult<bool> {
        let removed = self.repo.remove(UNDO_STATE_KEY)?;
        if removed {
            info!("event=undo_clear module=undo status=ok");
        }
        Ok(removed)
    }
}
