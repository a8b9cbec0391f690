//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `attendance_core` linkage and print its version.
//! - Start file logging from the configured level and directory.
//! - Probe the configured record store for the current meeting and report
//!   any pending undo snapshot in local state.

use attendance_core::{
    init_logging, open_db, open_db_in_memory, CallContext, EngineConfig, HttpRecordStore, RecordStore,
    SqliteLocalStateRepository, SystemClock, UndoSnapshotStore,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("attendance_core version={}", attendance_core::core_version());

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("store base_url={}", config.base_url);

    match init_logging(&config.log_level, &config.log_dir.to_string_lossy()) {
        Ok(()) => println!(
            "logging level={} dir={}",
            config.log_level,
            config.log_dir.display()
        ),
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    let store = match HttpRecordStore::new(config.base_url.clone(), config.request_timeout) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("store error: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Best effort; an unreachable store is reported, not fatal.
    match store.current_meeting(&CallContext::default()) {
        Ok(Some(meeting)) => println!(
            "current_meeting title={} date={}",
            meeting.title, meeting.date
        ),
        Ok(None) => println!("current_meeting none"),
        Err(err) => println!("current_meeting unavailable: {err}"),
    }

    let conn = match &config.state_db_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };
    let conn = match conn {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("local state error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let undo = UndoSnapshotStore::new(SqliteLocalStateRepository::new(&conn), Arc::new(SystemClock));
    match undo.current() {
        Ok(Some(snapshot)) => println!(
            "pending_undo record_id={} kind={} origin={}",
            snapshot.record.id,
            snapshot.record.kind(),
            snapshot.origin
        ),
        Ok(None) => println!("pending_undo none"),
        Err(err) => println!("pending_undo unreadable: {err}"),
    }
    ExitCode::SUCCESS
}
