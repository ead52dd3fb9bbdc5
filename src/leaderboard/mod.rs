//! Leaderboard storage
//!
//! SQLite-backed point balances keyed by normalized username. The award loop
//! only sees this through the [`PointStore`] trait; the HTTP API uses the
//! full [`Leaderboard`] for registration and admin edits.

use crate::db::Database;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::sync::Arc;

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub username: String,
    pub points: i64,
    pub exercises_completed: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Storage capabilities the passive award loop depends on
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Whether a user with this (normalized) username exists
    async fn user_exists(&self, username: &str) -> Result<bool>;

    /// Add `delta` to the user's balance and return the updated row.
    /// Additive, never an overwrite.
    async fn add_points(&self, username: &str, delta: i64) -> Result<LeaderboardEntry>;
}

/// Trim and lowercase a username. Returns `None` if nothing is left.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn require_username(raw: &str) -> Result<String> {
    normalize_username(raw)
        .ok_or_else(|| CoreError::Validation("username must not be empty".to_string()))
}

const SELECT_COLUMNS: &str =
    "SELECT id, username, points, exercises_completed, created_at, updated_at FROM users";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        id: row.get(0)?,
        username: row.get(1)?,
        points: row.get(2)?,
        exercises_completed: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<LeaderboardEntry>> {
    conn.query_row(
        &format!("{} WHERE username = ?", SELECT_COLUMNS),
        [username],
        entry_from_row,
    )
    .optional()
}

fn fetch_updated(conn: &Connection, username: &str) -> Result<LeaderboardEntry> {
    find_by_username(conn, username)?
        .ok_or_else(|| CoreError::NotFound("User", username.to_string()))
}

/// Add `delta` to a balance in one statement. The WHERE clause refuses any
/// update that would push the balance past `i64::MAX`, so nothing is written
/// when the addition is rejected.
fn increment_points(
    conn: &Connection,
    username: &str,
    delta: i64,
    count_exercise: bool,
    now: &str,
) -> Result<LeaderboardEntry> {
    if delta < 0 {
        return Err(CoreError::Validation(format!(
            "points to add must not be negative, got {}",
            delta
        )));
    }

    let changed = conn.execute(
        "UPDATE users
         SET points = points + ?1,
             exercises_completed = exercises_completed + ?2,
             updated_at = ?3
         WHERE username = ?4 AND points <= ?5",
        params![delta, count_exercise as i64, now, username, i64::MAX - delta],
    )?;

    if changed == 0 {
        return match find_by_username(conn, username)? {
            Some(entry) => Err(CoreError::Validation(format!(
                "adding {} points to {} would overflow the balance of {}",
                delta, username, entry.points
            ))),
            None => Err(CoreError::NotFound("User", username.to_string())),
        };
    }
    fetch_updated(conn, username)
}

/// SQLite leaderboard store
#[derive(Clone)]
pub struct Leaderboard {
    db: Arc<Database>,
}

impl Leaderboard {
    pub fn new(db: Arc<Database>) -> Self {
        Leaderboard { db }
    }

    /// Create the user if missing and return their row
    pub async fn register(&self, username: &str) -> Result<LeaderboardEntry> {
        let username = require_username(username)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .with_conn(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO users (id, username, points, exercises_completed, created_at, updated_at)
                     VALUES (?, ?, 0, 0, ?, ?)",
                    params![id, username, now, now],
                )?;
                if inserted > 0 {
                    tracing::info!("Registered new user {}", username);
                }
                fetch_updated(conn, &username)
            })
            .await
    }

    pub async fn get(&self, username: &str) -> Result<Option<LeaderboardEntry>> {
        let username = require_username(username)?;
        self.db
            .with_conn(move |conn| find_by_username(conn, &username))
            .await
    }

    /// All entries, highest score first (ties by username)
    pub async fn list(&self) -> Result<Vec<LeaderboardEntry>> {
        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} ORDER BY points DESC, username ASC",
                    SELECT_COLUMNS
                ))?;
                let entries = stmt
                    .query_map([], entry_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok::<_, rusqlite::Error>(entries)
            })
            .await
    }

    /// Overwrite a user's balance (admin only)
    pub async fn set_points(&self, username: &str, points: i64) -> Result<LeaderboardEntry> {
        if points < 0 {
            return Err(CoreError::Validation(format!(
                "points must not be negative, got {}",
                points
            )));
        }
        let username = require_username(username)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .with_conn(move |conn| {
                let changed = conn.execute(
                    "UPDATE users SET points = ?, updated_at = ? WHERE username = ?",
                    params![points, now, username],
                )?;
                if changed == 0 {
                    return Err(CoreError::NotFound("User", username));
                }
                fetch_updated(conn, &username)
            })
            .await
    }

    /// Add points for one completed exercise and bump the exercise counter
    pub async fn record_exercise(&self, username: &str, points: i64) -> Result<LeaderboardEntry> {
        if points <= 0 {
            return Err(CoreError::Validation(format!(
                "points must be positive, got {}",
                points
            )));
        }
        let username = require_username(username)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .with_conn(move |conn| increment_points(conn, &username, points, true, &now))
            .await
    }

    pub async fn delete(&self, username: &str) -> Result<()> {
        let username = require_username(username)?;
        self.db
            .with_conn(move |conn| {
                let deleted = conn.execute("DELETE FROM users WHERE username = ?", [&username])?;
                if deleted == 0 {
                    return Err(CoreError::NotFound("User", username));
                }
                Ok(())
            })
            .await
    }

    /// Delete by row id, for entries whose username no longer resolves cleanly
    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.db
            .with_conn(move |conn| {
                let deleted = conn.execute("DELETE FROM users WHERE id = ?", [&id])?;
                if deleted == 0 {
                    return Err(CoreError::NotFound("Leaderboard entry", id));
                }
                Ok(())
            })
            .await
    }

    /// Zero every balance. Returns the number of rows touched.
    pub async fn reset(&self) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .with_conn(move |conn| {
                conn.execute("UPDATE users SET points = 0, updated_at = ?", [&now])
            })
            .await
    }
}

#[async_trait]
impl PointStore for Leaderboard {
    async fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.get(username).await?.is_some())
    }

    async fn add_points(&self, username: &str, delta: i64) -> Result<LeaderboardEntry> {
        let username = require_username(username)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .with_conn(move |conn| increment_points(conn, &username, delta, false, &now))
            .await
    }
}
