use attendance_core::validate::rules::{
    exceeds_congregation_capacity, has_duplicate_position, validate_candidate, CandidateError,
};
use attendance_core::{
    ApologyEntry, AttendanceEntry, Congregation, ConflictError, Entry, EntryType, Position,
    ValidationError,
};
use chrono::NaiveDate;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
}

fn attendance(
    phone: &str,
    congregation: Congregation,
    position: Position,
    entry_type: EntryType,
) -> Entry {
    Entry::Attendance(AttendanceEntry {
        name: "Jane Doe".to_string(),
        phone: phone.to_string(),
        email: None,
        congregation,
        position,
        entry_type,
        meeting_date: date(),
        meeting_title: String::new(),
        local_time_logged: None,
    })
}

fn apology(name: &str, position: Position) -> Entry {
    Entry::Apology(ApologyEntry {
        name: name.to_string(),
        congregation: Congregation::Nom,
        position,
        entry_type: EntryType::Local,
        meeting_date: date(),
        meeting_title: String::new(),
        reason: "Sick".to_string(),
        local_time_logged: None,
    })
}

#[test]
fn same_phone_on_another_date_or_type_is_allowed() {
    let existing = vec![attendance(
        "0551234567",
        Congregation::Nom,
        Position::Organizer,
        EntryType::Local,
    )];

    let district = attendance(
        "0551234567",
        Congregation::Nom,
        Position::Organizer,
        EntryType::District,
    );
    assert_eq!(validate_candidate(&district, &existing, None), Ok(()));

    let mut next_week = attendance(
        "0551234567",
        Congregation::Nom,
        Position::Organizer,
        EntryType::Local,
    );
    if let Entry::Attendance(entry) = &mut next_week {
        entry.meeting_date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    }
    assert_eq!(validate_candidate(&next_week, &existing, None), Ok(()));
}

#[test]
fn local_position_is_unique_per_congregation_only() {
    let existing = vec![attendance(
        "0551111111",
        Congregation::Nom,
        Position::Secretary,
        EntryType::Local,
    )];

    let other_congregation = attendance(
        "0552222222",
        Congregation::Odagya2,
        Position::Secretary,
        EntryType::Local,
    );
    assert!(!has_duplicate_position(&other_congregation, &existing, None));

    let same_congregation = attendance(
        "0552222222",
        Congregation::Nom,
        Position::Secretary,
        EntryType::Local,
    );
    assert!(matches!(
        validate_candidate(&same_congregation, &existing, None),
        Err(CandidateError::Conflict(ConflictError::DuplicatePosition {
            congregation: Some(Congregation::Nom),
            ..
        }))
    ));
}

#[test]
fn district_position_is_unique_across_congregations() {
    let existing = vec![attendance(
        "0551111111",
        Congregation::Nom,
        Position::PresidentsRep,
        EntryType::District,
    )];
    let candidate = attendance(
        "0552222222",
        Congregation::LibertyHighTension,
        Position::PresidentsRep,
        EntryType::District,
    );

    assert!(matches!(
        validate_candidate(&candidate, &existing, None),
        Err(CandidateError::Conflict(ConflictError::DuplicatePosition {
            congregation: None,
            ..
        }))
    ));
}

#[test]
fn position_must_belong_to_entry_type() {
    let vice_for_district = attendance(
        "0551111111",
        Congregation::Nom,
        Position::VicePresident,
        EntryType::District,
    );
    assert!(matches!(
        validate_candidate(&vice_for_district, &[], None),
        Err(CandidateError::Validation(ValidationError::PositionNotAllowed { .. }))
    ));
}

#[test]
fn capacity_ignores_district_entries_and_the_edited_entry() {
    let existing = vec![
        attendance("0551111111", Congregation::Nom, Position::President, EntryType::Local),
        attendance("0552222222", Congregation::Nom, Position::Secretary, EntryType::Local),
        attendance("0553333333", Congregation::Nom, Position::Treasurer, EntryType::District),
    ];

    let district = attendance(
        "0554444444",
        Congregation::Nom,
        Position::Organizer,
        EntryType::District,
    );
    assert!(!exceeds_congregation_capacity(&district, &existing));

    let local = attendance("0554444444", Congregation::Nom, Position::Organizer, EntryType::Local);
    assert!(exceeds_congregation_capacity(&local, &existing));

    let edited = attendance("0551111111", Congregation::Nom, Position::Organizer, EntryType::Local);
    assert_eq!(validate_candidate(&edited, &existing, Some(0)), Ok(()));
}

#[test]
fn apology_name_is_unique_ignoring_case() {
    let existing = vec![apology("Ama Owusu", Position::Treasurer)];
    let candidate = apology("ama owusu", Position::Organizer);

    assert!(matches!(
        validate_candidate(&candidate, &existing, None),
        Err(CandidateError::Conflict(ConflictError::DuplicateName { .. }))
    ));
}

#[test]
fn apology_requires_a_reason() {
    let mut candidate = apology("Ama Owusu", Position::Treasurer);
    if let Entry::Apology(entry) = &mut candidate {
        entry.reason = "   ".to_string();
    }
    assert!(matches!(
        validate_candidate(&candidate, &[], None),
        Err(CandidateError::Validation(ValidationError::MissingField(_)))
    ));
}
