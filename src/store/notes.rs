//! Owner-scoped note operations.
//!
//! Every method takes the owner id and every statement carries
//! `user_id = ?owner` — a note lookup without the owner predicate does not
//! exist in this API. Update and delete match `(id, owner)` jointly, so a
//! note id belonging to someone else behaves exactly like a missing id.

use serde::Serialize;

use super::{now_rfc3339, Store, StoreError};

/// Maximum items accepted by one import batch.
pub const IMPORT_BATCH_CAP: usize = 1000;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Escape LIKE wildcards so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Store {
    /// Create a note owned by `owner`. Content is expected pre-sanitized.
    pub fn create_note(&self, owner: &str, title: &str, content: &str) -> Result<Note, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();
        self.conn.lock().execute(
            "INSERT INTO notes (id, user_id, title, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![id, owner, title, content, now],
        )?;
        Ok(Note {
            id,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// List the owner's notes, newest first. With a search term, returns the
    /// notes whose title OR content contains it, case-insensitively.
    pub fn list_notes(&self, owner: &str, query: Option<&str>) -> Result<Vec<Note>, StoreError> {
        let conn = self.conn.lock();
        let notes = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(term));
                let mut stmt = conn.prepare(
                    "SELECT id, title, content, created_at, updated_at FROM notes
                     WHERE user_id = ?1
                       AND (title LIKE ?2 ESCAPE '\\' OR content LIKE ?2 ESCAPE '\\')
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner, pattern], note_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, title, content, created_at, updated_at FROM notes
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner], note_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(notes)
    }

    /// Update a note matched by `(id, owner)`. A note owned by someone else
    /// is indistinguishable from a missing one.
    pub fn update_note(
        &self,
        owner: &str,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<Note, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            rusqlite::params![title, content, now_rfc3339(), id, owner],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("Note not found"));
        }
        conn.query_row(
            "SELECT id, title, content, created_at, updated_at FROM notes
             WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, owner],
            note_from_row,
        )
        .map_err(Into::into)
    }

    /// Delete a note matched by `(id, owner)`.
    pub fn delete_note(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, owner],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound("Note not found"));
        }
        Ok(())
    }

    /// Insert a batch of notes for `owner` in one transaction. Batch bounds
    /// ([`IMPORT_BATCH_CAP`], non-empty) are enforced at the gateway.
    pub fn import_notes(&self, owner: &str, items: &[(String, String)]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notes (id, user_id, title, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )?;
            for (title, content) in items {
                let id = uuid::Uuid::new_v4().to_string();
                stmt.execute(rusqlite::params![id, owner, title, content, now_rfc3339()])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }
}
