//! Field and cross-record rules.
//!
//! # Responsibility
//! - Field format checks (`name`, `phone`, `email`).
//! - Duplicate phone/name, duplicate position and congregation capacity.
//!
//! # Invariants
//! - `(phone, meeting_date, type)` is unique among active attendance
//!   entries, excluding the entry being edited.
//! - Local `(position, congregation, meeting_date)` and district
//!   `(position, meeting_date)` are unique per entry kind.
//! - At most [`LOCAL_CAPACITY_PER_CONGREGATION`] local entries per
//!   `(congregation, meeting_date)` per entry kind.

use crate::model::catalog::{Congregation, EntryType, Position};
use crate::model::entry::Entry;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum local entries per congregation and meeting date.
pub const LOCAL_CAPACITY_PER_CONGREGATION: usize = 2;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z\s-]+$").expect("valid name regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").expect("valid phone regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Form field checked by [`validate_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Name,
    Phone,
    Email,
    Reason,
}

impl FieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Reason => "reason",
        }
    }
}

/// Format failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FieldName,
    pub message: &'static str,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

impl Error for FieldError {}

/// Local, pre-network validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingField(FieldName),
    InvalidField(FieldError),
    PositionNotAllowed {
        position: Position,
        entry_type: EntryType,
    },
    /// Apologies carry no phone number.
    PhoneNotApplicable,
    EmptyPatch,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "{} is required", field.as_str()),
            Self::InvalidField(err) => write!(f, "{err}"),
            Self::PositionNotAllowed {
                position,
                entry_type,
            } => write!(f, "position `{position}` is not available for {entry_type} entries"),
            Self::PhoneNotApplicable => write!(f, "apology records have no phone number"),
            Self::EmptyPatch => write!(f, "edit contains no changes"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidField(err) => Some(err),
            _ => None,
        }
    }
}

/// Optimistic duplicate/capacity conflict against the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    DuplicatePhone {
        meeting_date: NaiveDate,
        entry_type: EntryType,
    },
    DuplicateName {
        meeting_date: NaiveDate,
        entry_type: EntryType,
    },
    DuplicatePosition {
        position: Position,
        congregation: Option<Congregation>,
        meeting_date: NaiveDate,
    },
    CapacityExceeded {
        congregation: Congregation,
        meeting_date: NaiveDate,
        limit: usize,
    },
}

impl Display for ConflictError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePhone {
                meeting_date,
                entry_type,
            } => write!(
                f,
                "this phone number is already registered as {entry_type} for {meeting_date}"
            ),
            Self::DuplicateName {
                meeting_date,
                entry_type,
            } => write!(
                f,
                "this person has already been added as {entry_type} for {meeting_date}"
            ),
            Self::DuplicatePosition {
                position,
                congregation: Some(congregation),
                meeting_date,
            } => write!(
                f,
                "position `{position}` is already taken for {congregation} on {meeting_date}"
            ),
            Self::DuplicatePosition {
                position,
                congregation: None,
                meeting_date,
            } => write!(
                f,
                "district position `{position}` is already taken on {meeting_date}"
            ),
            Self::CapacityExceeded {
                congregation,
                meeting_date,
                limit,
            } => write!(
                f,
                "you have exceeded the {limit}-attendee limit for {congregation} on {meeting_date}"
            ),
        }
    }
}

impl Error for ConflictError {}

/// Outcome of [`validate_candidate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    Validation(ValidationError),
    Conflict(ConflictError),
}

impl Display for CandidateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CandidateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
        }
    }
}

impl From<ValidationError> for CandidateError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConflictError> for CandidateError {
    fn from(value: ConflictError) -> Self {
        Self::Conflict(value)
    }
}

/// Checks one field value. Returns `None` when the value is acceptable.
///
/// An empty email is acceptable; email is optional.
pub fn validate_field(field: FieldName, value: &str) -> Option<FieldError> {
    let message = match field {
        FieldName::Name if !NAME_RE.is_match(value) => {
            "only letters, spaces, and hyphens allowed"
        }
        FieldName::Phone if !PHONE_RE.is_match(value) => "phone number must be exactly 10 digits",
        FieldName::Email if !value.is_empty() && !EMAIL_RE.is_match(value) => {
            "invalid email format"
        }
        FieldName::Reason if value.trim().is_empty() => "reason must not be blank",
        _ => return None,
    };
    Some(FieldError { field, message })
}

/// Normalizes a person name to single-spaced title case.
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns whether another attendance entry already uses the candidate's
/// `(phone, meeting_date, type)`.
pub fn has_duplicate_phone(
    candidate: &Entry,
    existing: &[Entry],
    exclude_index: Option<usize>,
) -> bool {
    let Some(phone) = candidate.phone() else {
        return false;
    };
    others(existing, exclude_index).any(|entry| {
        entry.phone() == Some(phone)
            && entry.meeting_date() == candidate.meeting_date()
            && entry.entry_type() == candidate.entry_type()
    })
}

/// Returns whether another apology already uses the candidate's
/// case-insensitive `(name, meeting_date, type)`.
pub fn has_duplicate_apology_name(
    candidate: &Entry,
    existing: &[Entry],
    exclude_index: Option<usize>,
) -> bool {
    let Entry::Apology(apology) = candidate else {
        return false;
    };
    let name_key = apology.name.trim().to_lowercase();
    others(existing, exclude_index).any(|entry| {
        matches!(entry, Entry::Apology(_))
            && entry.name().trim().to_lowercase() == name_key
            && entry.meeting_date() == candidate.meeting_date()
            && entry.entry_type() == candidate.entry_type()
    })
}

/// Returns whether the candidate's position is already taken.
///
/// Local entries compare `(position, congregation, meeting_date)`; district
/// entries compare `(position, meeting_date)` across all congregations.
pub fn has_duplicate_position(
    candidate: &Entry,
    existing: &[Entry],
    exclude_index: Option<usize>,
) -> bool {
    others(existing, exclude_index).any(|entry| {
        entry.kind() == candidate.kind()
            && entry.entry_type() == candidate.entry_type()
            && entry.position() == candidate.position()
            && entry.meeting_date() == candidate.meeting_date()
            && match candidate.entry_type() {
                EntryType::Local => entry.congregation() == candidate.congregation(),
                EntryType::District => true,
            }
    })
}

/// Returns whether adding a local candidate would exceed the per-congregation
/// capacity. District candidates never exceed it.
pub fn exceeds_congregation_capacity(candidate: &Entry, existing: &[Entry]) -> bool {
    if candidate.entry_type() != EntryType::Local {
        return false;
    }
    let count = existing
        .iter()
        .filter(|entry| {
            entry.kind() == candidate.kind()
                && entry.entry_type() == EntryType::Local
                && entry.congregation() == candidate.congregation()
                && entry.meeting_date() == candidate.meeting_date()
        })
        .count();
    count >= LOCAL_CAPACITY_PER_CONGREGATION
}

/// Runs every rule against `candidate` and returns the first failure.
///
/// Order: required fields, field formats, position-for-type, duplicate
/// phone/name, duplicate position, capacity. `exclude_index` marks the
/// entry being edited inside `existing`; it is also left out of the
/// capacity count.
pub fn validate_candidate(
    candidate: &Entry,
    existing: &[Entry],
    exclude_index: Option<usize>,
) -> Result<(), CandidateError> {
    check_fields(candidate)?;

    if !candidate.position().allowed_for(candidate.entry_type()) {
        return Err(ValidationError::PositionNotAllowed {
            position: candidate.position(),
            entry_type: candidate.entry_type(),
        }
        .into());
    }

    if has_duplicate_phone(candidate, existing, exclude_index) {
        return Err(ConflictError::DuplicatePhone {
            meeting_date: candidate.meeting_date(),
            entry_type: candidate.entry_type(),
        }
        .into());
    }
    if has_duplicate_apology_name(candidate, existing, exclude_index) {
        return Err(ConflictError::DuplicateName {
            meeting_date: candidate.meeting_date(),
            entry_type: candidate.entry_type(),
        }
        .into());
    }
    if has_duplicate_position(candidate, existing, exclude_index) {
        return Err(ConflictError::DuplicatePosition {
            position: candidate.position(),
            congregation: match candidate.entry_type() {
                EntryType::Local => Some(candidate.congregation()),
                EntryType::District => None,
            },
            meeting_date: candidate.meeting_date(),
        }
        .into());
    }

    let exceeds = match exclude_index {
        Some(index) => {
            let remaining: Vec<Entry> = others(existing, Some(index)).cloned().collect();
            exceeds_congregation_capacity(candidate, &remaining)
        }
        None => exceeds_congregation_capacity(candidate, existing),
    };
    if exceeds {
        return Err(ConflictError::CapacityExceeded {
            congregation: candidate.congregation(),
            meeting_date: candidate.meeting_date(),
            limit: LOCAL_CAPACITY_PER_CONGREGATION,
        }
        .into());
    }

    Ok(())
}

fn check_fields(candidate: &Entry) -> Result<(), ValidationError> {
    if candidate.name().trim().is_empty() {
        return Err(ValidationError::MissingField(FieldName::Name));
    }
    if let Some(err) = validate_field(FieldName::Name, candidate.name()) {
        return Err(ValidationError::InvalidField(err));
    }

    match candidate {
        Entry::Attendance(attendance) => {
            if attendance.phone.trim().is_empty() {
                return Err(ValidationError::MissingField(FieldName::Phone));
            }
            if let Some(err) = validate_field(FieldName::Phone, &attendance.phone) {
                return Err(ValidationError::InvalidField(err));
            }
            if let Some(email) = attendance.email.as_deref() {
                if let Some(err) = validate_field(FieldName::Email, email) {
                    return Err(ValidationError::InvalidField(err));
                }
            }
        }
        Entry::Apology(apology) => {
            if apology.reason.trim().is_empty() {
                return Err(ValidationError::MissingField(FieldName::Reason));
            }
        }
    }
    Ok(())
}

fn others(existing: &[Entry], exclude_index: Option<usize>) -> impl Iterator<Item = &Entry> {
    existing
        .iter()
        .enumerate()
        .filter(move |(index, _)| Some(*index) != exclude_index)
        .map(|(_, entry)| entry)
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, validate_field, FieldName};

    #[test]
    fn name_accepts_letters_spaces_and_hyphens() {
        assert!(validate_field(FieldName::Name, "Mary-Ann Boateng").is_none());
        assert!(validate_field(FieldName::Name, "J0hn").is_some());
        assert!(validate_field(FieldName::Name, "O'Neil").is_some());
    }

    #[test]
    fn phone_requires_exactly_ten_digits() {
        assert!(validate_field(FieldName::Phone, "0551234567").is_none());
        assert!(validate_field(FieldName::Phone, "055123456").is_some());
        assert!(validate_field(FieldName::Phone, "05512345678").is_some());
        assert!(validate_field(FieldName::Phone, "055-123456").is_some());
    }

    #[test]
    fn email_is_optional_but_checked_when_present() {
        assert!(validate_field(FieldName::Email, "").is_none());
        assert!(validate_field(FieldName::Email, "jane@ypg.org").is_none());
        let err = validate_field(FieldName::Email, "jane@ypg").expect("missing tld must fail");
        assert_eq!(err.field, FieldName::Email);
    }

    #[test]
    fn normalizes_names_to_title_case() {
        assert_eq!(normalize_name("  jane   DOE "), "Jane Doe");
        assert_eq!(normalize_name("kwame"), "Kwame");
        assert_eq!(normalize_name(""), "");
    }
}
