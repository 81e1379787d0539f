use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use crate::Database;
use crate::models::{FriendRequestRow, NewUser, UserRow};

/// Result of [`Database::register_user`].
#[derive(Debug)]
pub enum RegisterOutcome {
    Created(UserRow),
    Conflict {
        username_taken: bool,
        email_taken: bool,
    },
}

impl Database {
    // -- Users --

    /// Insert a user and its token in one transaction, after checking that
    /// neither the username nor the email is already registered.
    pub fn register_user(&self, new_user: &NewUser) -> Result<RegisterOutcome> {
        self.with_tx(|tx| -> Result<RegisterOutcome> {
            let username_taken = username_exists(tx, &new_user.username)?;
            let email_taken = email_exists(tx, &new_user.email)?;
            if username_taken || email_taken {
                return Ok(RegisterOutcome::Conflict {
                    username_taken,
                    email_taken,
                });
            }

            let created_at = now_timestamp();
            tx.execute(
                "INSERT INTO users (id, username, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    &new_user.id,
                    &new_user.username,
                    &new_user.email,
                    &new_user.password_hash,
                    &created_at,
                ),
            )?;
            insert_token(tx, &new_user.token, &new_user.id)?;

            debug!("Inserted user {} with token", new_user.username);
            Ok(RegisterOutcome::Created(UserRow {
                id: new_user.id.clone(),
                username: new_user.username.clone(),
                email: new_user.email.clone(),
                password: new_user.password_hash.clone(),
                created_at,
            }))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_token(&self, key: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.username, u.email, u.password, u.created_at
                     FROM tokens t
                     JOIN users u ON u.id = t.user_id
                     WHERE t.key = ?1",
                    [key],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every username except `user_id`'s own, in registration order.
    pub fn list_usernames_except(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT username FROM users WHERE id <> ?1 ORDER BY rowid")?;
            let names = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    // -- Tokens --

    pub fn get_token_for_user(&self, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_token_for_user(conn, user_id))
    }

    /// Return the user's token, inserting `candidate` only when none exists.
    /// An existing token is never replaced.
    pub fn ensure_token(&self, user_id: &str, candidate: &str) -> Result<String> {
        self.with_tx(|tx| -> Result<String> {
            if let Some(existing) = query_token_for_user(tx, user_id)? {
                return Ok(existing);
            }
            insert_token(tx, candidate, user_id)?;
            Ok(candidate.to_string())
        })
    }

    // -- Profile aggregates --

    pub fn friend_usernames(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.username
                 FROM friend_lists l
                 JOIN friend_list_members m ON m.list_id = l.id
                 JOIN users u ON u.id = m.user_id
                 WHERE l.owner_id = ?1
                 ORDER BY u.username",
            )?;
            let names = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    pub fn sent_requests(&self, user_id: &str) -> Result<Vec<FriendRequestRow>> {
        self.with_conn(|conn| query_requests(conn, "r.from_user = ?1", user_id))
    }

    pub fn received_requests(&self, user_id: &str) -> Result<Vec<FriendRequestRow>> {
        self.with_conn(|conn| query_requests(conn, "r.to_user = ?1", user_id))
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
            [username],
            user_from_row,
        )
        .optional()?;

    Ok(row)
}

fn username_exists(conn: &Connection, username: &str) -> Result<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(found)
}

fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let found = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?;
    Ok(found)
}

fn insert_token(conn: &Connection, key: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)",
        (key, user_id, now_timestamp()),
    )?;
    Ok(())
}

fn query_token_for_user(conn: &Connection, user_id: &str) -> Result<Option<String>> {
    let key = conn
        .query_row("SELECT key FROM tokens WHERE user_id = ?1", [user_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(key)
}

fn query_requests(conn: &Connection, filter: &str, user_id: &str) -> Result<Vec<FriendRequestRow>> {
    // JOIN users twice to resolve both ends in a single query
    let sql = format!(
        "SELECT r.id, f.username, t.username, r.created_at
         FROM friend_requests r
         JOIN users f ON f.id = r.from_user
         JOIN users t ON t.id = r.to_user
         WHERE {}
         ORDER BY r.created_at, r.rowid",
        filter
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FriendRequestRow {
                id: row.get(0)?,
                from_username: row.get(1)?,
                to_username: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
