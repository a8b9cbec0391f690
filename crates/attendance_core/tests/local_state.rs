use attendance_core::db::open_db_in_memory;
use attendance_core::repo::local_state_repo::{LocalStateValue, RepoError};
use attendance_core::{LocalStateRepository, SqliteLocalStateRepository};

#[test]
fn put_then_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLocalStateRepository::new(&conn);

    repo.put("pendingUndo", r#"{"component":"records-library"}"#, 1_700_000_000_000)
        .unwrap();

    assert_eq!(
        repo.get("pendingUndo").unwrap(),
        Some(LocalStateValue {
            value: r#"{"component":"records-library"}"#.to_string(),
            updated_at: 1_700_000_000_000,
        })
    );
}

#[test]
fn put_overwrites_previous_value() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLocalStateRepository::new(&conn);

    repo.put("pendingUndo", "first", 1).unwrap();
    repo.put("pendingUndo", "second", 2).unwrap();

    let stored = repo.get("pendingUndo").unwrap().unwrap();
    assert_eq!(stored.value, "second");
    assert_eq!(stored.updated_at, 2);
}

#[test]
fn remove_reports_whether_a_value_existed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLocalStateRepository::new(&conn);

    assert!(!repo.remove("pendingUndo").unwrap());
    repo.put("pendingUndo", "value", 1).unwrap();
    assert!(repo.remove("pendingUndo").unwrap());
    assert_eq!(repo.get("pendingUndo").unwrap(), None);
}

#[test]
fn blank_keys_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLocalStateRepository::new(&conn);

    assert!(matches!(repo.put("  ", "value", 1), Err(RepoError::EmptyKey)));
    assert!(matches!(repo.get(""), Err(RepoError::EmptyKey)));
}
