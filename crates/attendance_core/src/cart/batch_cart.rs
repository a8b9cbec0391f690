//! Batch cart for one entry kind.

use crate::clock::SharedClock;
use crate::model::entry::{Entry, EntryKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one staged entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagedId(pub Uuid);

impl Display for StagedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry waiting in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub id: StagedId,
    pub entry: Entry,
}

/// Ordered snapshot taken by [`BatchCart::submit_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub kind: EntryKind,
    pub staged_ids: Vec<StagedId>,
    pub entries: Vec<Entry>,
}

/// Cart operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    KindMismatch {
        expected: EntryKind,
        actual: EntryKind,
    },
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    Empty,
}

impl Display for CartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KindMismatch { expected, actual } => {
                write!(f, "cart holds {expected} entries, cannot stage {actual}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "cart index {index} out of range for {len} entries")
            }
            Self::Empty => write!(f, "no entries to submit"),
        }
    }
}

impl Error for CartError {}

/// Ephemeral staging list of unsubmitted entries of one kind.
pub struct BatchCart {
    kind: EntryKind,
    items: Vec<StagedEntry>,
    clock: SharedClock,
}

impl BatchCart {
    pub fn new(kind: EntryKind, clock: SharedClock) -> Self {
        Self {
            kind,
            items: Vec::new(),
            clock,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[StagedEntry] {
        &self.items
    }

    /// Staged entries in cart order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter().map(|item| &item.entry)
    }

    /// Stages one entry and stamps its logged time.
    ///
    /// Any `local_time_logged` already present on `entry` is overwritten.
    pub fn append(&mut self, mut entry: Entry) -> Result<StagedId, CartError> {
        if entry.kind() != self.kind {
            return Err(CartError::KindMismatch {
                expected: self.kind,
                actual: entry.kind(),
            });
        }
        entry.set_local_time_logged(self.clock.time_of_day());
        let id = StagedId(Uuid::new_v4());
        self.items.push(StagedEntry { id, entry });
        Ok(id)
    }

    /// Removes and returns the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<StagedEntry, CartError> {
        if index >= self.items.len() {
            return Err(CartError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Snapshots the full ordered list for one bulk create.
    ///
    /// The cart itself is not modified; see [`BatchCart::commit`].
    pub fn submit_all(&self) -> Result<CartSnapshot, CartError> {
        if self.items.is_empty() {
            return Err(CartError::Empty);
        }
        Ok(CartSnapshot {
            kind: self.kind,
            staged_ids: self.items.iter().map(|item| item.id).collect(),
            entries: self.items.iter().map(|item| item.entry.clone()).collect(),
        })
    }

    /// Drops the submitted entries after a confirmed create.
    ///
    /// Returns how many entries were removed. Entries staged after the
    /// snapshot was taken stay in the cart.
    pub fn commit(&mut self, staged_ids: &[StagedId]) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !staged_ids.contains(&item.id));
        before - self.items.len()
    }
}
