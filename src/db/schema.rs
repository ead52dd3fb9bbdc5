//! SQLite schema for Brain Gym
//!
//! A single `users` table holds each player's point balance.

use rusqlite::{Connection, Result};

/// Initialize the database with required tables
pub fn init_db(conn: &Connection) -> Result<()> {
    // Usernames are stored normalized, COLLATE NOCASE guards rows written by older clients
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            points INTEGER NOT NULL DEFAULT 0,
            exercises_completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_points ON users(points DESC)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(init_db(&conn).is_ok());

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 1);
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        assert!(init_db(&conn).is_ok());
    }

    #[test]
    fn test_username_unique_case_insensitive() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (id, username, created_at, updated_at) VALUES ('1', 'alice', 'now', 'now')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO users (id, username, created_at, updated_at) VALUES ('2', 'ALICE', 'now', 'now')",
            [],
        );
        assert!(dup.is_err());
    }
}
