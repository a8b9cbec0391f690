//! Key/value repository over the `local_state` table.
//!
//! # Responsibility
//! - Persist small JSON documents that must survive a restart.
//!
//! # Invariants
//! - Keys are non-empty.
//! - `put` replaces any previous value for the key in one statement.

use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Local state persistence error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    EmptyKey,
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EmptyKey => write!(f, "local state key cannot be empty"),
            Self::InvalidData(message) => write!(f, "invalid persisted local state: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::EmptyKey | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Stored value with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStateValue {
    pub value: String,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Durable key/value store for client state.
pub trait LocalStateRepository {
    fn get(&self, key: &str) -> RepoResult<Option<LocalStateValue>>;
    fn put(&self, key: &str, value: &str, updated_at: i64) -> RepoResult<()>;
    /// Returns whether a value was removed.
    fn remove(&self, key: &str) -> RepoResult<bool>;
}

/// SQLite-backed local state repository.
pub struct SqliteLocalStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocalStateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

fn ensure_key(key: &str) -> RepoResult<()> {
    if key.trim().is_empty() {
        return Err(RepoError::EmptyKey);
    }
    Ok(())
}

impl LocalStateRepository for SqliteLocalStateRepository<'_> {
    fn get(&self, key: &str) -> RepoResult<Option<LocalStateValue>> {
        ensure_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value, updated_at FROM local_state WHERE key = ?1;",
                params![key],
                |row| {
                    Ok(LocalStateValue {
                        value: row.get(0)?,
                        updated_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str, updated_at: i64) -> RepoResult<()> {
        ensure_key(key)?;
        self.conn.execute(
            "INSERT INTO local_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> RepoResult<bool> {
        ensure_key(key)?;
        let changed = self
            .conn
            .execute("DELETE FROM local_state WHERE key = ?1;", params![key])?;
        Ok(changed > 0)
    }
}
