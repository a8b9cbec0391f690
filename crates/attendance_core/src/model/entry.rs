//! Attendance/apology entry model.
//!
//! # Responsibility
//! - Define the tagged `Entry` variant shared by cart, validator, executor
//!   and undo snapshot.
//! - Define `StoredRecord`, an entry as persisted by the record store.
//!
//! # Invariants
//! - `local_time_logged` is stamped once when the entry is staged and is
//!   never recomputed at submission time.
//! - Only attendance entries carry a phone number.

use crate::model::catalog::{Congregation, EntryType, Position};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Server-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminant of [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Attendance,
    Apology,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Apology => "apology",
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance entry for one meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub name: String,
    /// Ten ASCII digits.
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub congregation: Congregation,
    pub position: Position,
    /// Serialized as `type` to match the record store schema.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub meeting_date: NaiveDate,
    #[serde(default)]
    pub meeting_title: String,
    /// Wall-clock time the user logged the entry. `None` until staged.
    #[serde(default)]
    pub local_time_logged: Option<NaiveTime>,
}

/// Apology entry for one meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApologyEntry {
    pub name: String,
    pub congregation: Congregation,
    pub position: Position,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub meeting_date: NaiveDate,
    #[serde(default)]
    pub meeting_title: String,
    pub reason: String,
    #[serde(default)]
    pub local_time_logged: Option<NaiveTime>,
}

/// Candidate or persisted entry, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_kind", rename_all = "snake_case")]
pub enum Entry {
    Attendance(AttendanceEntry),
    Apology(ApologyEntry),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Attendance(_) => EntryKind::Attendance,
            Self::Apology(_) => EntryKind::Apology,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Attendance(entry) => &entry.name,
            Self::Apology(entry) => &entry.name,
        }
    }

    /// Phone number; apologies have none.
    pub fn phone(&self) -> Option<&str> {
        match self {
            Self::Attendance(entry) => Some(&entry.phone),
            Self::Apology(_) => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Attendance(entry) => entry.email.as_deref(),
            Self::Apology(_) => None,
        }
    }

    pub fn congregation(&self) -> Congregation {
        match self {
            Self::Attendance(entry) => entry.congregation,
            Self::Apology(entry) => entry.congregation,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::Attendance(entry) => entry.position,
            Self::Apology(entry) => entry.position,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Attendance(entry) => entry.entry_type,
            Self::Apology(entry) => entry.entry_type,
        }
    }

    pub fn meeting_date(&self) -> NaiveDate {
        match self {
            Self::Attendance(entry) => entry.meeting_date,
            Self::Apology(entry) => entry.meeting_date,
        }
    }

    pub fn meeting_title(&self) -> &str {
        match self {
            Self::Attendance(entry) => &entry.meeting_title,
            Self::Apology(entry) => &entry.meeting_title,
        }
    }

    pub fn local_time_logged(&self) -> Option<NaiveTime> {
        match self {
            Self::Attendance(entry) => entry.local_time_logged,
            Self::Apology(entry) => entry.local_time_logged,
        }
    }

    pub(crate) fn set_local_time_logged(&mut self, logged_at: NaiveTime) {
        match self {
            Self::Attendance(entry) => entry.local_time_logged = Some(logged_at),
            Self::Apology(entry) => entry.local_time_logged = Some(logged_at),
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            Self::Attendance(entry) => entry.name = name,
            Self::Apology(entry) => entry.name = name,
        }
    }

    /// Compares the fields a user types in, ignoring server/clock metadata.
    pub fn same_user_fields(&self, other: &Entry) -> bool {
        self.kind() == other.kind()
            && self.name() == other.name()
            && self.phone() == other.phone()
            && self.congregation() == other.congregation()
            && self.position() == other.position()
            && self.entry_type() == other.entry_type()
            && self.meeting_date() == other.meeting_date()
    }
}

/// Entry as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub entry: Entry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl StoredRecord {
    pub fn kind(&self) -> EntryKind {
        self.entry.kind()
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Partial update for a persisted record.
///
/// Only `name`, `phone`, `congregation` and `position` are editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congregation: Option<Congregation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.congregation.is_none()
            && self.position.is_none()
    }

    /// Returns `entry` with this patch applied.
    ///
    /// `phone` is ignored for apologies; callers reject that combination
    /// before applying.
    pub fn apply(&self, entry: &Entry) -> Entry {
        let mut patched = entry.clone();
        match &mut patched {
            Entry::Attendance(attendance) => {
                if let Some(name) = &self.name {
                    attendance.name = name.clone();
                }
                if let Some(phone) = &self.phone {
                    attendance.phone = phone.clone();
                }
                if let Some(congregation) = self.congregation {
                    attendance.congregation = congregation;
                }
                if let Some(position) = self.position {
                    attendance.position = position;
                }
            }
            Entry::Apology(apology) => {
                if let Some(name) = &self.name {
                    apology.name = name.clone();
                }
                if let Some(congregation) = self.congregation {
                    apology.congregation = congregation;
                }
                if let Some(position) = self.position {
                    apology.position = position;
                }
            }
        }
        patched
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceEntry, Entry, EntryKind, EntryPatch};
    use crate::model::catalog::{Congregation, EntryType, Position};
    use chrono::{NaiveDate, NaiveTime};

    fn attendance() -> Entry {
        Entry::Attendance(AttendanceEntry {
            name: "Jane Doe".to_string(),
            phone: "0551234567".to_string(),
            email: None,
            congregation: Congregation::Nom,
            position: Position::Organizer,
            entry_type: EntryType::Local,
            meeting_date: NaiveDate::from_ymd_opt(2025, 3, 2).expect("valid date"),
            meeting_title: "Quarterly Meeting".to_string(),
            local_time_logged: None,
        })
    }

    #[test]
    fn serializes_with_explicit_kind_tag() {
        let json = serde_json::to_value(attendance()).expect("serialize entry");
        assert_eq!(json["record_kind"], "attendance");
        assert_eq!(json["type"], "local");
        assert_eq!(json["meeting_date"], "2025-03-02");

        let decoded: Entry = serde_json::from_value(json).expect("deserialize entry");
        assert_eq!(decoded.kind(), EntryKind::Attendance);
        assert_eq!(decoded, attendance());
    }

    #[test]
    fn patch_replaces_only_provided_fields() {
        let patch = EntryPatch {
            congregation: Some(Congregation::Odagya2),
            ..EntryPatch::default()
        };
        let patched = patch.apply(&attendance());
        assert_eq!(patched.congregation(), Congregation::Odagya2);
        assert_eq!(patched.name(), "Jane Doe");
        assert_eq!(patched.phone(), Some("0551234567"));
    }

    #[test]
    fn user_field_comparison_ignores_logged_time() {
        let mut stamped = attendance();
        stamped.set_local_time_logged(NaiveTime::from_hms_opt(9, 15, 0).expect("valid time"));
        assert!(stamped.same_user_fields(&attendance()));
        assert_ne!(stamped, attendance());
    }
}
