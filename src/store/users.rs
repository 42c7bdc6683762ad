//! Credential store operations.
//!
//! Usernames and emails are globally unique — checked as **case-sensitive
//! exact matches**, sequentially (username first) so conflict messages are
//! deterministic — and the password hash is excluded from profile reads by
//! column projection, never by post-hoc redaction.

use serde::Serialize;

use super::{now_rfc3339, Store, StoreError};

/// Input for registration. The password arrives pre-hashed; plaintext never
/// reaches the store.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Client-safe projection of a user row. No hash column selected.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip_serializing)]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

/// Full row needed by login: identity fields plus the stored hash.
#[derive(Debug)]
pub struct Credentials {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Which identifier a login request supplied.
#[derive(Debug, Clone, Copy)]
pub enum LoginKey<'a> {
    Username(&'a str),
    Email(&'a str),
}

impl Store {
    /// Create a user. Returns the new user id, or a conflict if the username
    /// or email is already taken (username checked first).
    pub fn create_user(&self, new: &NewUser) -> Result<String, StoreError> {
        let conn = self.conn.lock();

        let username_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            rusqlite::params![new.username],
            |row| row.get(0),
        )?;
        if username_taken {
            return Err(StoreError::Conflict("Username already exists"));
        }

        let email_taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            rusqlite::params![new.email],
            |row| row.get(0),
        )?;
        if email_taken {
            return Err(StoreError::Conflict("Email already registered"));
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let inserted = conn.execute(
            "INSERT INTO users (id, first_name, last_name, username, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            rusqlite::params![
                user_id,
                new.first_name,
                new.last_name,
                new.username,
                new.email,
                new.password_hash,
                now,
            ],
        );

        match inserted {
            Ok(_) => Ok(user_id),
            // Lost a race between check and insert: report it as the same
            // conflict the check would have produced.
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict("Username already exists"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up login credentials by username or email.
    pub fn find_credentials(&self, key: LoginKey) -> Result<Option<Credentials>, StoreError> {
        let (sql, value) = match key {
            LoginKey::Username(v) => (
                "SELECT id, first_name, last_name, username, email, password_hash
                 FROM users WHERE username = ?1",
                v,
            ),
            LoginKey::Email(v) => (
                "SELECT id, first_name, last_name, username, email, password_hash
                 FROM users WHERE email = ?1",
                v,
            ),
        };

        let row = self.conn.lock().query_row(sql, rusqlite::params![value], |row| {
            Ok(Credentials {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                username: row.get(3)?,
                email: row.get(4)?,
                password_hash: row.get(5)?,
            })
        });

        match row {
            Ok(credentials) => Ok(Some(credentials)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a user's profile — hash excluded by projection.
    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let row = self.conn.lock().query_row(
            "SELECT id, first_name, last_name, username, email FROM users WHERE id = ?1",
            rusqlite::params![user_id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    username: row.get(3)?,
                    email: row.get(4)?,
                })
            },
        );

        match row {
            Ok(profile) => Ok(Some(profile)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update first/last name and optionally the username. A username already
    /// held by a *different* user is a conflict; the caller's own row is
    /// excluded from the check.
    pub fn update_profile(
        &self,
        user_id: &str,
        first_name: &str,
        last_name: &str,
        username: Option<&str>,
    ) -> Result<Profile, StoreError> {
        {
            let conn = self.conn.lock();

            if let Some(name) = username {
                let taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id <> ?2)",
                    rusqlite::params![name, user_id],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(StoreError::Conflict("Username already exists"));
                }
            }

            let now = now_rfc3339();
            let changed = match username {
                Some(name) => conn.execute(
                    "UPDATE users SET first_name = ?1, last_name = ?2, username = ?3, updated_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![first_name, last_name, name, now, user_id],
                )?,
                None => conn.execute(
                    "UPDATE users SET first_name = ?1, last_name = ?2, updated_at = ?3
                     WHERE id = ?4",
                    rusqlite::params![first_name, last_name, now, user_id],
                )?,
            };
            if changed == 0 {
                return Err(StoreError::NotFound("User not found"));
            }
        }

        self.get_profile(user_id)?
            .ok_or(StoreError::NotFound("User not found"))
    }

    /// Stored password hash for a user, if the user exists.
    pub fn password_hash(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let row = self.conn.lock().query_row(
            "SELECT password_hash FROM users WHERE id = ?1",
            rusqlite::params![user_id],
            |row| row.get(0),
        );

        match row {
            Ok(hash) => Ok(Some(hash)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a user's password hash.
    pub fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<(), StoreError> {
        let changed = self.conn.lock().execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![hash, now_rfc3339(), user_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("User not found"));
        }
        Ok(())
    }
}
