//! SQLite-backed persistence.
//!
//! One [`Store`] owns the connection (WAL mode, foreign keys on) and exposes
//! the credential operations (`users.rs`) and the owner-scoped note
//! operations (`notes.rs`). Every note method takes the owner id as its first
//! argument and bakes it into the SQL predicate — there is no way to reach a
//! note row without saying whose it must be.

pub mod notes;
pub mod users;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::path::Path;

pub use notes::Note;
pub use users::{LoginKey, NewUser, Profile};

/// Store-level failures, mapped to the API taxonomy at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub struct Store {
    pub(crate) conn: Mutex<rusqlite::Connection>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notes_owner ON notes(user_id);
            CREATE INDEX IF NOT EXISTS idx_notes_owner_created
                ON notes(user_id, created_at DESC);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// UTC timestamp in RFC 3339 with millisecond precision. Stored as TEXT;
/// lexicographic order equals chronological order at fixed precision.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
