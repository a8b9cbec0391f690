use attendance_core::db::open_db_in_memory;
use attendance_core::store::StoreCallCounts;
use attendance_core::{
    AttendanceEntry, Channel, ChallengeKind, ChallengeResponse, ChallengeState, ComponentId,
    Congregation, ConflictError, EngineConfig, EngineError, Entry, EntryKind, EntryPatch,
    EntryType, InMemoryRecordStore, ManualClock, Position, RecordService,
    SqliteLocalStateRepository, StoreError, UndoEffect,
};
use chrono::{Local, NaiveDate, TimeZone};
use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

const PIN: &str = "4821";
const ADMIN_USER: &str = "ypg-admin";
const ADMIN_PASS: &str = "s3cret";

type Service<'conn> = RecordService<InMemoryRecordStore, SqliteLocalStateRepository<'conn>>;

fn meeting_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
}

fn attendance(name: &str, phone: &str, position: Position) -> Entry {
    attendance_in(Congregation::Nom, name, phone, position)
}

fn attendance_in(congregation: Congregation, name: &str, phone: &str, position: Position) -> Entry {
    Entry::Attendance(AttendanceEntry {
        name: name.to_string(),
        phone: phone.to_string(),
        email: None,
        congregation,
        position,
        entry_type: EntryType::Local,
        meeting_date: meeting_date(),
        meeting_title: "Quarterly Meeting".to_string(),
        local_time_logged: None,
    })
}

fn service(conn: &Connection) -> Service<'_> {
    let clock = Arc::new(ManualClock::new(
        Local.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).single().unwrap(),
    ));
    RecordService::new(
        &EngineConfig::default(),
        InMemoryRecordStore::new(PIN, ADMIN_USER, ADMIN_PASS),
        SqliteLocalStateRepository::new(conn),
        clock,
    )
}

fn submit_cart(service: &mut Service<'_>, kind: EntryKind) {
    let challenge = service.request_submit(kind).unwrap();
    assert_eq!(challenge.kind(), ChallengeKind::AdminCredential);
    service
        .authorize(ChallengeResponse::admin(ADMIN_USER, ADMIN_PASS))
        .unwrap();
}

#[test]
fn same_phone_submitted_twice_conflicts_on_second_attempt() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);

    service
        .stage(attendance("Jane Doe", "0551234567", Position::Organizer))
        .unwrap();
    submit_cart(&mut service, EntryKind::Attendance);
    assert!(service.cart(EntryKind::Attendance).is_empty());
    assert_eq!(service.store().records().len(), 1);

    let err = service
        .stage(attendance("Jane Doe", "0551234567", Position::Organizer))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Conflict(ConflictError::DuplicatePhone { .. })
    ));
    assert_eq!(service.store().counts().submit_attendance, 1);
    assert!(service.cart(EntryKind::Attendance).is_empty());
}

#[test]
fn third_local_entry_for_congregation_is_refused_without_store_calls() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);

    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();
    service
        .stage(attendance("Kofi Mensah", "0552222222", Position::Secretary))
        .unwrap();
    let err = service
        .stage(attendance("Yaw Boateng", "0553333333", Position::Treasurer))
        .unwrap_err();

    match err {
        EngineError::Conflict(ConflictError::CapacityExceeded {
            congregation,
            limit,
            ..
        }) => {
            assert_eq!(congregation, Congregation::Nom);
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.cart(EntryKind::Attendance).len(), 2);
    assert_eq!(service.store().counts(), StoreCallCounts::default());
}

#[test]
fn wrong_pin_leaves_staged_cart_untouched() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();
    service
        .stage(attendance("Kofi Mensah", "0552222222", Position::Secretary))
        .unwrap();

    service.request_clear_all().unwrap();
    let err = service.authorize(ChallengeResponse::pin("0000")).unwrap_err();

    assert!(matches!(err, EngineError::Auth(ref message) if message == "Invalid PIN"));
    assert_eq!(service.cart(EntryKind::Attendance).len(), 2);
    assert_eq!(service.store().counts().verify_pin, 1);
    assert_eq!(service.store().counts().mutations(), 0);
    assert!(service.pending_challenge().is_none());
}

#[test]
fn wrong_admin_credential_keeps_cart_for_retry() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();
    service
        .stage(attendance("Kofi Mensah", "0552222222", Position::Secretary))
        .unwrap();

    service.request_submit(EntryKind::Attendance).unwrap();
    let err = service
        .authorize(ChallengeResponse::admin(ADMIN_USER, "wrong"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Auth(_)));
    assert_eq!(service.cart(EntryKind::Attendance).len(), 2);
    assert!(service.store().records().is_empty());

    submit_cart(&mut service, EntryKind::Attendance);
    assert!(service.cart(EntryKind::Attendance).is_empty());
    assert_eq!(service.store().records().len(), 2);
}

#[test]
fn server_rejection_is_surfaced_verbatim_and_cart_kept() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();
    service.store().fail_next(StoreError::Rejected {
        status: 400,
        message: "Ama Owusu already submitted for this meeting.".to_string(),
    });

    service.request_submit(EntryKind::Attendance).unwrap();
    let err = service
        .authorize(ChallengeResponse::admin(ADMIN_USER, ADMIN_PASS))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Ama Owusu already submitted for this meeting."
    );
    assert_eq!(service.cart(EntryKind::Attendance).len(), 1);
    assert!(!service.is_submitting());
}

#[test]
fn clear_all_publishes_each_channel_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));

    let attendance_hits = Rc::new(Cell::new(0));
    let apology_hits = Rc::new(Cell::new(0));
    let hits = attendance_hits.clone();
    service.subscribe(Channel::AttendanceChanged, move || hits.set(hits.get() + 1));
    let hits = apology_hits.clone();
    service.subscribe(Channel::ApologyChanged, move || hits.set(hits.get() + 1));

    service.request_clear_all().unwrap();
    let outcome = service.authorize(ChallengeResponse::pin(PIN)).unwrap();

    assert_eq!(
        outcome.published,
        vec![Channel::AttendanceChanged, Channel::ApologyChanged]
    );
    assert_eq!(attendance_hits.get(), 1);
    assert_eq!(apology_hits.get(), 1);
    assert_eq!(service.events().published_count(Channel::AttendanceChanged), 1);
    assert_eq!(service.events().published_count(Channel::ApologyChanged), 1);
    assert!(service.store().records().is_empty());
}

#[test]
fn rejected_challenge_never_reaches_the_store() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service.refresh_working_set(EntryKind::Attendance).unwrap();

    service
        .request_delete(id, ComponentId::new("records-library"))
        .unwrap();
    assert!(service.authorize(ChallengeResponse::pin("9999")).is_err());

    assert_eq!(service.store().counts().delete, 0);
    assert!(service.store().record(id).is_some());
    assert_eq!(service.events().published_count(Channel::AttendanceChanged), 0);
}

#[test]
fn malformed_pin_keeps_challenge_open_for_another_attempt() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service.request_clear_all().unwrap();

    let err = service.authorize(ChallengeResponse::pin("12")).unwrap_err();
    assert!(matches!(err, EngineError::Gate(_)));
    assert_eq!(service.store().counts().verify_pin, 0);
    assert!(service.pending_challenge().is_some());

    service.authorize(ChallengeResponse::pin(PIN)).unwrap();
    assert_eq!(service.store().counts().clear_all, 1);
}

#[test]
fn edit_is_validated_without_conflicting_with_itself() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service
        .store()
        .seed(attendance("Kofi Mensah", "0552222222", Position::Secretary));
    service.refresh_working_set(EntryKind::Attendance).unwrap();

    let taken_phone = EntryPatch {
        phone: Some("0552222222".to_string()),
        ..EntryPatch::default()
    };
    let err = service.request_edit(id, taken_phone).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Conflict(ConflictError::DuplicatePhone { .. })
    ));

    let rename = EntryPatch {
        name: Some("ama   OWUSU-badu".to_string()),
        position: Some(Position::Organizer),
        ..EntryPatch::default()
    };
    let challenge = service.request_edit(id, rename).unwrap();
    assert_eq!(challenge.kind(), ChallengeKind::ShortPin);
    let outcome = service.authorize(ChallengeResponse::pin(PIN)).unwrap();
    assert_eq!(outcome.published, vec![Channel::AttendanceChanged]);

    let edited = service.store().record(id).unwrap();
    assert_eq!(edited.entry.name(), "Ama Owusu-badu");
    assert_eq!(edited.entry.position(), Position::Organizer);
    assert_eq!(edited.entry.phone(), Some("0551111111"));
}

#[test]
fn empty_edit_is_refused_before_any_challenge() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service.refresh_working_set(EntryKind::Attendance).unwrap();

    assert!(matches!(
        service.request_edit(id, EntryPatch::default()),
        Err(EngineError::Validation(_))
    ));
    assert!(service.pending_challenge().is_none());
}

#[test]
fn second_request_while_challenge_pending_is_refused() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();

    service.request_submit(EntryKind::Attendance).unwrap();
    assert!(matches!(
        service.request_clear_all(),
        Err(EngineError::Gate(_))
    ));

    let cancelled = service.cancel_challenge().unwrap();
    assert_eq!(cancelled.action().name(), "create");
    assert_eq!(service.cart(EntryKind::Attendance).len(), 1);
    service.request_clear_all().unwrap();
}

#[test]
fn second_edit_is_checked_against_the_first_edit_result() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service.store().seed(attendance_in(
        Congregation::Odagya2,
        "Esi Appiah",
        "0555555555",
        Position::Treasurer,
    ));
    service.refresh_working_set(EntryKind::Attendance).unwrap();

    let move_congregation = EntryPatch {
        congregation: Some(Congregation::Odagya2),
        ..EntryPatch::default()
    };
    service.request_edit(id, move_congregation).unwrap();
    service.authorize(ChallengeResponse::pin(PIN)).unwrap();

    let take_treasurer = EntryPatch {
        position: Some(Position::Treasurer),
        ..EntryPatch::default()
    };
    let err = service.request_edit(id, take_treasurer).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Conflict(ConflictError::DuplicatePosition {
            congregation: Some(Congregation::Odagya2),
            ..
        })
    ));
    assert!(service.pending_challenge().is_none());
    assert_eq!(service.store().counts().edit, 1);
    assert_eq!(service.store().counts().fetch, 2);
}

#[test]
fn deleting_an_already_deleted_record_opens_no_challenge() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let origin = ComponentId::new("records-library");
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service.refresh_working_set(EntryKind::Attendance).unwrap();

    service.request_delete(id, origin.clone()).unwrap();
    service.authorize(ChallengeResponse::pin(PIN)).unwrap();

    let err = service.request_delete(id, origin).unwrap_err();
    assert!(matches!(err, EngineError::RecordNotFound(missing) if missing == id));
    assert!(service.pending_challenge().is_none());
    assert_eq!(service.store().counts().delete, 1);
    assert_eq!(service.store().counts().verify_pin, 1);
}

#[test]
fn rate_limited_submit_keeps_cart_and_returns_gate_to_idle() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();

    service.request_submit(EntryKind::Attendance).unwrap();
    service.store().fail_next(StoreError::RateLimited);
    let err = service
        .authorize(ChallengeResponse::admin(ADMIN_USER, ADMIN_PASS))
        .unwrap_err();

    assert!(matches!(err, EngineError::RateLimited));
    assert_eq!(service.cart(EntryKind::Attendance).len(), 1);
    assert_eq!(service.challenge_state(), ChallengeState::Idle);
    assert!(service.store().records().is_empty());
    assert!(!service.is_submitting());
}

#[test]
fn rate_limited_pin_check_keeps_cart_and_returns_gate_to_idle() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    service
        .stage(attendance("Ama Owusu", "0551111111", Position::President))
        .unwrap();
    service.store().set_pin_rate_limited(true);

    service.request_clear_all().unwrap();
    let err = service.authorize(ChallengeResponse::pin(PIN)).unwrap_err();

    assert!(matches!(err, EngineError::RateLimited));
    assert_eq!(service.cart(EntryKind::Attendance).len(), 1);
    assert_eq!(service.challenge_state(), ChallengeState::Idle);
    assert_eq!(service.store().counts().clear_all, 0);
}

#[test]
fn clear_all_discards_pending_undo() {
    let conn = open_db_in_memory().unwrap();
    let mut service = service(&conn);
    let origin = ComponentId::new("records-library");
    let id = service
        .store()
        .seed(attendance("Ama Owusu", "0551111111", Position::President));
    service
        .store()
        .seed(attendance("Kofi Mensah", "0552222222", Position::Secretary));
    service.refresh_working_set(EntryKind::Attendance).unwrap();
    service.request_delete(id, origin.clone()).unwrap();
    service.authorize(ChallengeResponse::pin(PIN)).unwrap();
    assert!(service.undo_snapshot(&origin).unwrap().is_some());

    service.request_clear_all().unwrap();
    let outcome = service.authorize(ChallengeResponse::pin(PIN)).unwrap();

    assert_eq!(outcome.undo, UndoEffect::Cleared);
    assert!(service.undo_snapshot(&origin).unwrap().is_none());
    assert!(service.request_restore(&origin).unwrap().is_none());
    assert!(service.store().records().is_empty());
}
