// src/database.rs

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Result};

pub const SCHEMA_VERSION: i64 = 1;

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("[DB] init_db: Checking database schema...");

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS schema_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS challenges (
            id TEXT PRIMARY KEY,
            content_hash TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            author TEXT,
            source TEXT,
            pattern TEXT,
            file_path TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            superseded_by TEXT,
            extra TEXT,
            content TEXT NOT NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS challenge_tags (
            challenge_id TEXT NOT NULL REFERENCES challenges(id),
            tag TEXT NOT NULL,
            PRIMARY KEY (challenge_id, tag)
        );
        CREATE TABLE IF NOT EXISTS challenge_paths (
            path TEXT PRIMARY KEY,
            challenge_id TEXT NOT NULL REFERENCES challenges(id),
            version INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS progress (
            challenge_id TEXT NOT NULL REFERENCES challenges(id),
            user_id TEXT NOT NULL,
            stability REAL NOT NULL,
            difficulty REAL NOT NULL,
            ease_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL,
            repetitions INTEGER NOT NULL,
            due_ts INTEGER NOT NULL,
            review_count INTEGER NOT NULL,
            correct_streak INTEGER NOT NULL,
            total_attempts INTEGER NOT NULL,
            average_rating REAL,
            last_reviewed_ts INTEGER,
            created_ts INTEGER NOT NULL,
            updated_ts INTEGER NOT NULL,
            version INTEGER NOT NULL,
            PRIMARY KEY (challenge_id, user_id)
        );
        CREATE TABLE IF NOT EXISTS reviews (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id TEXT UNIQUE,
            challenge_id TEXT NOT NULL REFERENCES challenges(id),
            user_id TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 4),
            response_time_ms INTEGER,
            review_ts INTEGER NOT NULL,
            previous_interval INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_progress_due ON progress(user_id, due_ts);
        CREATE INDEX IF NOT EXISTS idx_reviews_pair ON reviews(challenge_id, user_id, seq);
        CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id, review_ts);
        CREATE INDEX IF NOT EXISTS idx_challenge_tags_tag ON challenge_tags(tag);
        ",
    )?;

    let version: Option<i64> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if version.is_none() {
        info!("[DB] init_db: Fresh database, stamping schema v{}", SCHEMA_VERSION);
        conn.execute(
            "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?)",
            params![SCHEMA_VERSION],
        )?;
    }

    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('challenges', 'challenge_tags', 'challenge_paths', 'progress', 'reviews')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn test_rating_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO challenges (id, content_hash, title, file_path, content, created_ts, modified_ts)
             VALUES ('c1', 'sha256:x', 'T', 'a.md', 'body', 0, 0)",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO reviews (challenge_id, user_id, rating, review_ts, previous_interval)
             VALUES ('c1', 'u1', 9, 0, 0)",
            [],
        );
        assert!(bad.is_err());
    }
}
