//! JSON request and response shapes of the record store.
//!
//! # Invariants
//! - `timestamp` is taken from the staged `local_time_logged`; it is never
//!   recomputed at send time.
//! - Record rows with unknown catalog values are reported, not dropped.

use crate::model::catalog::{Congregation, EntryType, Position};
use crate::model::entry::{
    ApologyEntry, AttendanceEntry, Entry, EntryKind, EntryPatch, RecordId, StoredRecord,
};
use crate::model::meeting::Meeting;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

const WIRE_TIME_FORMAT: &str = "%H:%M:%S";

fn wire_time(value: Option<NaiveTime>) -> Option<String> {
    value.map(|time| time.format(WIRE_TIME_FORMAT).to_string())
}

/// Parses `HH:MM:SS` with an optional fractional part.
pub fn parse_wire_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M:%S%.f").ok()
}

#[derive(Debug, Serialize)]
pub struct AttendancePayload<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub congregation: Congregation,
    pub position: Position,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub meeting_date: NaiveDate,
    pub meeting_title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'a> From<&'a AttendanceEntry> for AttendancePayload<'a> {
    fn from(entry: &'a AttendanceEntry) -> Self {
        Self {
            name: &entry.name,
            phone: &entry.phone,
            email: entry.email.as_deref().unwrap_or(""),
            congregation: entry.congregation,
            position: entry.position,
            entry_type: entry.entry_type,
            meeting_date: entry.meeting_date,
            meeting_title: &entry.meeting_title,
            timestamp: wire_time(entry.local_time_logged),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApologyPayload<'a> {
    pub name: &'a str,
    pub congregation: Congregation,
    pub position: Position,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub meeting_date: NaiveDate,
    pub meeting_title: &'a str,
    pub reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'a> From<&'a ApologyEntry> for ApologyPayload<'a> {
    fn from(entry: &'a ApologyEntry) -> Self {
        Self {
            name: &entry.name,
            congregation: entry.congregation,
            position: entry.position,
            entry_type: entry.entry_type,
            meeting_date: entry.meeting_date,
            meeting_title: &entry.meeting_title,
            reason: &entry.reason,
            timestamp: wire_time(entry.local_time_logged),
        }
    }
}

/// Body of `POST submit-apologies`.
#[derive(Debug, Serialize)]
pub struct ApologySubmission<'a> {
    pub apologies: Vec<ApologyPayload<'a>>,
    pub admin_username: &'a str,
    pub admin_password: &'a str,
}

/// Body of `PUT edit-*`.
#[derive(Debug, Serialize)]
pub struct PatchPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub congregation: Option<Congregation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl<'a> PatchPayload<'a> {
    /// Drops `phone` for apology records, which have no phone column.
    pub fn for_kind(kind: EntryKind, patch: &'a EntryPatch) -> Self {
        Self {
            name: patch.name.as_deref(),
            phone: match kind {
                EntryKind::Attendance => patch.phone.as_deref(),
                EntryKind::Apology => None,
            },
            congregation: patch.congregation,
            position: patch.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PinBody<'a> {
    pub pin: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PinVerifyResponse {
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// One row of `attendance-summary` / `apology-summary`.
#[derive(Debug, Deserialize)]
pub struct RecordRow {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub congregation: String,
    pub position: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub meeting_date: NaiveDate,
    #[serde(default)]
    pub meeting_title: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl RecordRow {
    pub fn into_stored(self, kind: EntryKind) -> Result<StoredRecord, String> {
        let congregation = Congregation::parse(&self.congregation).map_err(|err| err.to_string())?;
        let position = Position::parse(&self.position).map_err(|err| err.to_string())?;
        let local_time_logged = self.timestamp.as_deref().and_then(parse_wire_time);
        let meeting_title = self.meeting_title.unwrap_or_default();

        let entry = match kind {
            EntryKind::Attendance => Entry::Attendance(AttendanceEntry {
                name: self.name,
                phone: self.phone.unwrap_or_default(),
                email: self.email.filter(|email| !email.trim().is_empty()),
                congregation,
                position,
                entry_type: self.entry_type,
                meeting_date: self.meeting_date,
                meeting_title,
                local_time_logged,
            }),
            EntryKind::Apology => Entry::Apology(ApologyEntry {
                name: self.name,
                congregation,
                position,
                entry_type: self.entry_type,
                meeting_date: self.meeting_date,
                meeting_title,
                reason: self.reason.unwrap_or_default(),
                local_time_logged,
            }),
        };

        Ok(StoredRecord {
            id: RecordId(self.id),
            entry,
            submitted_by: self.submitted_by,
            is_deleted: self.is_deleted,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MeetingRow {
    pub title: String,
    pub date: NaiveDate,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Self {
            title: row.title,
            date: row.date,
        }
    }
}
