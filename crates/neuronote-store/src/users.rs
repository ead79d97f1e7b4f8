//! Identity: registration, sessions, username/password changes, reset tokens.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cascade;
use crate::credentials::{
    check_password_strength, generate_token, hash_password, hash_token, verify_password,
    DUMMY_PASSWORD_HASH,
};
use crate::sqlite::{db_err, now_millis};
use crate::types::*;
use crate::SqliteStore;
use neuronote_core::{Error, Result};

pub const USERNAME_COOLDOWN_DAYS: i64 = 7;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const MAX_USERNAME_LEN: usize = 150;

/// Days left before another username change is allowed, or `None` when free.
pub fn cooldown_remaining_days(last_change_at: Option<i64>, now: i64) -> Option<i64> {
    let last = last_change_at?;
    let days_since = (now - last).div_euclid(DAY_MS).max(0);
    if days_since < USERNAME_COOLDOWN_DAYS {
        Some(USERNAME_COOLDOWN_DAYS - days_since)
    } else {
        None
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingField(field.to_string())),
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(Error::Validation(
            "Username may not contain whitespace or '/'".into(),
        ));
    }
    Ok(())
}

fn username_taken(conn: &Connection, username: &str, except_id: Option<i64>) -> Result<bool> {
    conn.prepare_cached("SELECT 1 FROM users WHERE username = ?1 AND id != ?2")
        .map_err(db_err)?
        .exists(params![username, except_id.unwrap_or(-1)])
        .map_err(db_err)
}

fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    conn.prepare_cached("SELECT 1 FROM users WHERE email = ?1")
        .map_err(db_err)?
        .exists(params![email])
        .map_err(db_err)
}

pub(crate) fn find_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.prepare_cached("SELECT * FROM users WHERE id = ?1")
        .map_err(db_err)?
        .query_row(params![user_id], SqliteStore::row_to_user)
        .optional()
        .map_err(db_err)
}

fn find_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.prepare_cached("SELECT * FROM users WHERE username = ?1")
        .map_err(db_err)?
        .query_row(params![username], SqliteStore::row_to_user)
        .optional()
        .map_err(db_err)
}

fn check_identity_free(conn: &Connection, username: &str, email: &str) -> Result<()> {
    if username_taken(conn, username, None)? {
        return Err(Error::DuplicateUsername);
    }
    if email_taken(conn, email)? {
        return Err(Error::DuplicateEmail);
    }
    Ok(())
}

/// The user id a live reset token belongs to.
fn reset_token_owner(conn: &Connection, token_hash: &str, now: i64) -> Result<i64> {
    conn.prepare_cached(
        "SELECT user_id FROM password_reset_tokens WHERE token_hash = ?1 AND expires_at > ?2",
    )
    .map_err(db_err)?
    .query_row(params![token_hash, now], |row| row.get(0))
    .optional()
    .map_err(db_err)?
    .ok_or_else(|| Error::NotFound("Reset token is invalid or expired".into()))
}

fn require_user(conn: &Connection, user_id: i64) -> Result<User> {
    find_user(conn, user_id)?.ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
}

impl SqliteStore {
    /// Create an account. Checks run in a fixed order so the first problem
    /// reported is stable: missing fields, email shape, duplicate username,
    /// duplicate email, password strength.
    ///
    /// Hashing runs outside the connection lock; uniqueness is checked again
    /// in the insert transaction.
    pub fn register(&self, new_user: NewUser) -> Result<User> {
        let username = required(new_user.username, "username")?;
        let email = required(new_user.email, "email")?;
        let password = new_user
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::MissingField("password".into()))?;
        let first_name = new_user.first_name.unwrap_or_default().trim().to_string();
        let last_name = new_user.last_name.unwrap_or_default().trim().to_string();

        if !email.contains('@') {
            return Err(Error::Validation("Enter a valid email address".into()));
        }
        validate_username(&username)?;

        self.with_conn(|conn| check_identity_free(conn, &username, &email))?;
        check_password_strength(&password)?;
        let password_hash = hash_password(&password)?;

        let user = self.write_tx(|tx| {
            check_identity_free(tx, &username, &email)?;
            let now = now_millis();
            let id = tx
                .prepare_cached(
                    "INSERT INTO users (username, email, password_hash, first_name, last_name, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(db_err)?
                .insert(params![username, email, password_hash, first_name, last_name, now])
                .map_err(db_err)?;
            require_user(tx, id)
        })?;

        info!("Registered user {} (id={})", user.username, user.id);
        Ok(user)
    }

    pub fn get_user(&self, user_id: i64) -> Result<User> {
        self.with_conn(|conn| require_user(conn, user_id))
    }

    /// Log in. Unknown user and wrong password give the same error, and both
    /// pay for one password verification.
    pub fn authenticate(&self, username: &str, password: &str, ttl_ms: i64) -> Result<Session> {
        if username.trim().is_empty() {
            return Err(Error::MissingField("username".into()));
        }
        if password.is_empty() {
            return Err(Error::MissingField("password".into()));
        }

        let user = self.with_conn(|conn| find_user_by_username(conn, username.trim()))?;
        let stored_hash = user
            .as_ref()
            .map_or(DUMMY_PASSWORD_HASH.as_str(), |u| u.password_hash.as_str());
        let verified = verify_password(password, stored_hash);
        let user = match user {
            Some(user) if verified => user,
            _ => return Err(Error::InvalidCredentials),
        };

        let session = self.write_tx(move |tx| {
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user.id])
                .map_err(db_err)?;

            let token = generate_token();
            let now = now_millis();
            let expires_at = now + ttl_ms;
            tx.execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![hash_token(&token), user.id, now, expires_at],
            )
            .map_err(db_err)?;
            Ok(Session {
                token,
                user,
                expires_at,
            })
        })?;

        info!("User {} logged in", session.user.username);
        Ok(session)
    }

    /// Resolve a bearer token to its user. Expired sessions are removed.
    pub fn resolve_session(&self, token: &str) -> Result<User> {
        let token_hash = hash_token(token);
        let now = now_millis();
        self.with_conn(|conn| {
            let row: Option<(i64, i64)> = conn
                .prepare_cached("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1")
                .map_err(db_err)?
                .query_row(params![token_hash], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()
                .map_err(db_err)?;

            let (user_id, expires_at) =
                row.ok_or_else(|| Error::Unauthorized("Invalid token".into()))?;
            if expires_at <= now {
                conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
                    .map_err(db_err)?;
                debug!("Dropped expired session for user {}", user_id);
                return Err(Error::Unauthorized("Token expired".into()));
            }
            find_user(conn, user_id)?.ok_or_else(|| Error::Unauthorized("Invalid token".into()))
        })
    }

    /// Returns whether a session was removed.
    pub fn logout(&self, token: &str) -> Result<bool> {
        let token_hash = hash_token(token);
        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
                .map_err(db_err)
        })?;
        Ok(removed > 0)
    }

    pub fn change_username(&self, user_id: i64, new_username: &str) -> Result<User> {
        self.change_username_at(user_id, new_username, now_millis())
    }

    /// [`Self::change_username`] with an explicit clock, in epoch millis.
    pub fn change_username_at(&self, user_id: i64, new_username: &str, now: i64) -> Result<User> {
        let new_username = new_username.trim();
        if new_username.is_empty() {
            return Err(Error::MissingField("username".into()));
        }
        validate_username(new_username)?;

        let user = self.write_tx(|tx| {
            let user = require_user(tx, user_id)?;
            if user.username == new_username {
                return Err(Error::Validation(
                    "New username is the same as the current one".into(),
                ));
            }
            if username_taken(tx, new_username, Some(user_id))? {
                return Err(Error::DuplicateUsername);
            }
            if let Some(remaining_days) = cooldown_remaining_days(user.last_username_change_at, now)
            {
                return Err(Error::CooldownActive { remaining_days });
            }

            tx.execute(
                "UPDATE users SET username = ?1, last_username_change_at = ?2 WHERE id = ?3",
                params![new_username, now, user_id],
            )
            .map_err(db_err)?;
            require_user(tx, user_id)
        })?;

        info!("User {} changed username to {}", user.id, user.username);
        Ok(user)
    }

    pub fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get_user(user_id)?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }
        check_password_strength(new_password)?;
        let password_hash = hash_password(new_password)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, user_id],
            )
            .map_err(db_err)
        })?;
        info!("User {} changed password", user_id);
        Ok(())
    }

    /// Issue a reset token for the account with `email`, if one exists.
    /// Older unused tokens of that user are replaced.
    pub fn create_password_reset(&self, email: &str, ttl_ms: i64) -> Result<Option<(User, String)>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::MissingField("email".into()));
        }
        self.write_tx(|tx| {
            let user = tx
                .prepare_cached("SELECT * FROM users WHERE email = ?1")
                .map_err(db_err)?
                .query_row(params![email], Self::row_to_user)
                .optional()
                .map_err(db_err)?;
            let Some(user) = user else {
                debug!("Password reset requested for unknown email");
                return Ok(None);
            };

            tx.execute(
                "DELETE FROM password_reset_tokens WHERE user_id = ?1",
                params![user.id],
            )
            .map_err(db_err)?;
            let token = generate_token();
            let now = now_millis();
            tx.execute(
                "INSERT INTO password_reset_tokens (token_hash, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![hash_token(&token), user.id, now, now + ttl_ms],
            )
            .map_err(db_err)?;
            Ok(Some((user, token)))
        })
    }

    /// Consume a reset token and set a new password. Drops every session of the user.
    pub fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<()> {
        let token_hash = hash_token(token);
        let now = now_millis();
        self.with_conn(|conn| reset_token_owner(conn, &token_hash, now))?;
        check_password_strength(new_password)?;
        let password_hash = hash_password(new_password)?;

        let user_id = self.write_tx(|tx| {
            // The token may have been used while the new hash was computed.
            let user_id = reset_token_owner(tx, &token_hash, now)?;
            tx.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, user_id],
            )
            .map_err(db_err)?;
            tx.execute(
                "DELETE FROM password_reset_tokens WHERE user_id = ?1",
                params![user_id],
            )
            .map_err(db_err)?;
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
                .map_err(db_err)?;
            Ok(user_id)
        })?;
        info!("Password reset completed for user {}", user_id);
        Ok(())
    }

    /// Delete the account and everything it owns. The password must match.
    pub fn delete_user(&self, user_id: i64, password: &str) -> Result<CascadeReport> {
        let user = self.get_user(user_id)?;
        if !verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }
        let report = self.write_tx(|tx| cascade::delete_user(tx, user_id))?;
        info!(
            "Deleted user {}: {} notes, {} documents, {} pages",
            user.username,
            report.notes,
            report.documents.len(),
            report.pages
        );
        Ok(report)
    }
}
