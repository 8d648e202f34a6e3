// src/repository.rs
//! SQLite persistence for challenges, path pointers, progress and reviews.
//! Every function takes a plain `&Connection` so callers decide the
//! transaction boundary (a `Transaction` derefs to one).

use crate::error::{Result, TrainerError};
use crate::models::{
    Challenge, ChallengeFilter, DueCursor, DueQuery, PathPointer, Progress, Rating, ReviewRecord,
};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::collections::{BTreeMap, BTreeSet};

const CHALLENGE_COLUMNS: &str = "c.id, c.content_hash, c.title, c.author, c.source, c.pattern, \
     c.file_path, c.version, c.superseded_by, c.extra, c.content, c.created_ts, c.modified_ts";

const PROGRESS_COLUMNS: &str = "challenge_id, user_id, stability, difficulty, ease_factor, \
     interval_days, repetitions, due_ts, review_count, correct_streak, total_attempts, \
     average_rating, last_reviewed_ts, created_ts, updated_ts, version";

const REVIEW_COLUMNS: &str = "review_id, challenge_id, user_id, rating, response_time_ms, \
     review_ts, previous_interval";

// --- Timestamp Encoding ---

pub fn to_ts(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| TrainerError::Encoding(format!("timestamp {} out of range", ts)))
}

// --- Raw Rows ---

struct ChallengeRow {
    id: String,
    content_hash: String,
    title: String,
    author: Option<String>,
    source: Option<String>,
    pattern: Option<String>,
    file_path: String,
    version: i64,
    superseded_by: Option<String>,
    extra: Option<String>,
    content: String,
    created_ts: i64,
    modified_ts: i64,
}

fn read_challenge_row(row: &Row) -> rusqlite::Result<ChallengeRow> {
    Ok(ChallengeRow {
        id: row.get(0)?,
        content_hash: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        source: row.get(4)?,
        pattern: row.get(5)?,
        file_path: row.get(6)?,
        version: row.get(7)?,
        superseded_by: row.get(8)?,
        extra: row.get(9)?,
        content: row.get(10)?,
        created_ts: row.get(11)?,
        modified_ts: row.get(12)?,
    })
}

fn hydrate_challenge(conn: &Connection, raw: ChallengeRow) -> Result<Challenge> {
    let extra = match raw.extra.as_deref() {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml::from_str::<BTreeMap<String, serde_yaml::Value>>(yaml).map_err(|e| {
                TrainerError::Encoding(format!("front matter extras of {}: {}", raw.id, e))
            })?
        }
        _ => BTreeMap::new(),
    };
    let tags = load_tags(conn, &raw.id)?;

    Ok(Challenge {
        tags,
        extra,
        created_at: from_ts(raw.created_ts)?,
        last_modified: from_ts(raw.modified_ts)?,
        id: raw.id,
        content_hash: raw.content_hash,
        title: raw.title,
        author: raw.author,
        source: raw.source,
        pattern: raw.pattern,
        file_path: raw.file_path,
        version: raw.version,
        superseded_by: raw.superseded_by,
        content: raw.content,
    })
}

fn query_challenges<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Challenge>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_challenge_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|raw| hydrate_challenge(conn, raw))
        .collect()
}

struct ProgressRow {
    challenge_id: String,
    user_id: String,
    stability: f64,
    difficulty: f64,
    ease_factor: f64,
    interval_days: i64,
    repetitions: i64,
    due_ts: i64,
    review_count: i64,
    correct_streak: i64,
    total_attempts: i64,
    average_rating: Option<f64>,
    last_reviewed_ts: Option<i64>,
    created_ts: i64,
    updated_ts: i64,
    version: i64,
}

fn read_progress_row(row: &Row) -> rusqlite::Result<ProgressRow> {
    Ok(ProgressRow {
        challenge_id: row.get(0)?,
        user_id: row.get(1)?,
        stability: row.get(2)?,
        difficulty: row.get(3)?,
        ease_factor: row.get(4)?,
        interval_days: row.get(5)?,
        repetitions: row.get(6)?,
        due_ts: row.get(7)?,
        review_count: row.get(8)?,
        correct_streak: row.get(9)?,
        total_attempts: row.get(10)?,
        average_rating: row.get(11)?,
        last_reviewed_ts: row.get(12)?,
        created_ts: row.get(13)?,
        updated_ts: row.get(14)?,
        version: row.get(15)?,
    })
}

impl ProgressRow {
    fn into_progress(self) -> Result<Progress> {
        Ok(Progress {
            due_date: from_ts(self.due_ts)?,
            last_reviewed: self.last_reviewed_ts.map(from_ts).transpose()?,
            created_at: from_ts(self.created_ts)?,
            updated_at: from_ts(self.updated_ts)?,
            challenge_id: self.challenge_id,
            user_id: self.user_id,
            stability: self.stability,
            difficulty: self.difficulty,
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            repetitions: self.repetitions,
            review_count: self.review_count,
            correct_streak: self.correct_streak,
            total_attempts: self.total_attempts,
            average_rating: self.average_rating,
            version: self.version,
        })
    }
}

struct ReviewRow {
    review_id: Option<String>,
    challenge_id: String,
    user_id: String,
    rating: i64,
    response_time_ms: Option<i64>,
    review_ts: i64,
    previous_interval: i64,
}

fn read_review_row(row: &Row) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        review_id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        rating: row.get(3)?,
        response_time_ms: row.get(4)?,
        review_ts: row.get(5)?,
        previous_interval: row.get(6)?,
    })
}

impl ReviewRow {
    fn into_record(self) -> Result<ReviewRecord> {
        let rating = Rating::try_from(self.rating)
            .map_err(|_| TrainerError::Encoding(format!("stored rating {}", self.rating)))?;
        Ok(ReviewRecord {
            rating,
            review_date: from_ts(self.review_ts)?,
            review_id: self.review_id,
            challenge_id: self.challenge_id,
            user_id: self.user_id,
            response_time_ms: self.response_time_ms,
            previous_interval: self.previous_interval,
        })
    }
}

fn query_progress<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Progress>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_progress_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(ProgressRow::into_progress).collect()
}

fn query_reviews<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<ReviewRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_review_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(ReviewRow::into_record).collect()
}

// --- Challenges ---

pub fn load_tags(conn: &Connection, challenge_id: &str) -> Result<BTreeSet<String>> {
    let mut stmt =
        conn.prepare("SELECT tag FROM challenge_tags WHERE challenge_id = ? ORDER BY tag")?;
    let tags = stmt
        .query_map([challenge_id], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(tags)
}

pub fn load_challenge(conn: &Connection, id: &str) -> Result<Option<Challenge>> {
    let sql = format!("SELECT {} FROM challenges c WHERE c.id = ?", CHALLENGE_COLUMNS);
    Ok(query_challenges(conn, &sql, [id])?.into_iter().next())
}

pub fn load_challenge_by_hash(conn: &Connection, content_hash: &str) -> Result<Option<Challenge>> {
    let sql = format!(
        "SELECT {} FROM challenges c WHERE c.content_hash = ?",
        CHALLENGE_COLUMNS
    );
    Ok(query_challenges(conn, &sql, [content_hash])?.into_iter().next())
}

/// Resolves a path through its pointer to the revision currently living there.
pub fn load_challenge_by_path(conn: &Connection, path: &str) -> Result<Option<Challenge>> {
    let sql = format!(
        "SELECT {} FROM challenge_paths cp JOIN challenges c ON c.id = cp.challenge_id
         WHERE cp.path = ?",
        CHALLENGE_COLUMNS
    );
    Ok(query_challenges(conn, &sql, [path])?.into_iter().next())
}

pub fn load_path_pointer(conn: &Connection, path: &str) -> Result<Option<PathPointer>> {
    let pointer = conn
        .query_row(
            "SELECT path, challenge_id, version FROM challenge_paths WHERE path = ?",
            [path],
            |row| {
                Ok(PathPointer {
                    path: row.get(0)?,
                    challenge_id: row.get(1)?,
                    version: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(pointer)
}

/// Inserts a challenge and its tags. Returns `false` without writing anything
/// when a row with the same id or content hash already exists.
pub fn save_challenge(conn: &Connection, challenge: &Challenge) -> Result<bool> {
    let extra = if challenge.extra.is_empty() {
        None
    } else {
        Some(
            serde_yaml::to_string(&challenge.extra)
                .map_err(|e| TrainerError::Encoding(e.to_string()))?,
        )
    };

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO challenges
            (id, content_hash, title, author, source, pattern, file_path, version,
             superseded_by, extra, content, created_ts, modified_ts)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            challenge.id,
            challenge.content_hash,
            challenge.title,
            challenge.author,
            challenge.source,
            challenge.pattern,
            challenge.file_path,
            challenge.version,
            challenge.superseded_by,
            extra,
            challenge.content,
            to_ts(challenge.created_at),
            to_ts(challenge.last_modified),
        ],
    )?;
    if inserted == 0 {
        debug!("[DB] Challenge {} already stored", challenge.content_hash);
        return Ok(false);
    }

    let mut stmt = conn.prepare("INSERT INTO challenge_tags (challenge_id, tag) VALUES (?, ?)")?;
    for tag in &challenge.tags {
        stmt.execute(params![challenge.id, tag])?;
    }
    Ok(true)
}

pub fn mark_superseded(
    conn: &Connection,
    old_id: &str,
    new_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET superseded_by = ?, modified_ts = ? WHERE id = ?",
        params![new_id, to_ts(at), old_id],
    )?;
    Ok(())
}

pub fn save_path_pointer(conn: &Connection, pointer: &PathPointer) -> Result<()> {
    conn.execute(
        "INSERT INTO challenge_paths (path, challenge_id, version) VALUES (?1, ?2, ?3)
         ON CONFLICT(path) DO UPDATE SET challenge_id = excluded.challenge_id,
                                         version = excluded.version",
        params![pointer.path, pointer.challenge_id, pointer.version],
    )?;
    Ok(())
}

/// Current (non-superseded) challenges, alphabetically.
pub fn list_challenges(conn: &Connection, filter: &ChallengeFilter) -> Result<Vec<Challenge>> {
    let sql = format!(
        "SELECT {} FROM challenges c
         WHERE c.superseded_by IS NULL
         AND (?1 IS NULL OR EXISTS (
                SELECT 1 FROM challenge_tags t WHERE t.challenge_id = c.id AND t.tag = ?1))
         AND (?2 IS NULL OR c.pattern = ?2 COLLATE NOCASE)
         ORDER BY c.title COLLATE NOCASE ASC, c.id ASC",
        CHALLENGE_COLUMNS
    );
    query_challenges(conn, &sql, params![filter.tag, filter.pattern])
}

pub fn count_current_challenges(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT count(*) FROM challenges WHERE superseded_by IS NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(count)
}

// --- Progress ---

pub fn load_progress(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> Result<Option<Progress>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM progress WHERE challenge_id = ? AND user_id = ?",
                PROGRESS_COLUMNS
            ),
            [challenge_id, user_id],
            read_progress_row,
        )
        .optional()?;
    row.map(ProgressRow::into_progress).transpose()
}

/// Writes progress guarded by its version. `None` means the caller believes no
/// row exists yet. Returns the row as stored, with its new version.
pub fn save_progress(
    conn: &Connection,
    progress: &Progress,
    expected_version: Option<i64>,
) -> Result<Progress> {
    let mut saved = progress.clone();
    saved.version = expected_version.map_or(1, |v| v + 1);

    match expected_version {
        None => {
            let res = conn.execute(
                &format!(
                    "INSERT INTO progress ({}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    PROGRESS_COLUMNS
                ),
                params![
                    saved.challenge_id,
                    saved.user_id,
                    saved.stability,
                    saved.difficulty,
                    saved.ease_factor,
                    saved.interval_days,
                    saved.repetitions,
                    to_ts(saved.due_date),
                    saved.review_count,
                    saved.correct_streak,
                    saved.total_attempts,
                    saved.average_rating,
                    saved.last_reviewed.map(to_ts),
                    to_ts(saved.created_at),
                    to_ts(saved.updated_at),
                    saved.version,
                ],
            );
            match res {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    return Err(TrainerError::Conflict(format!(
                        "progress for ({}, {}) was created concurrently",
                        saved.challenge_id, saved.user_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Some(expected) => {
            let updated = conn.execute(
                "UPDATE progress SET
                    stability = ?1, difficulty = ?2, ease_factor = ?3, interval_days = ?4,
                    repetitions = ?5, due_ts = ?6, review_count = ?7, correct_streak = ?8,
                    total_attempts = ?9, average_rating = ?10, last_reviewed_ts = ?11,
                    updated_ts = ?12, version = ?13
                 WHERE challenge_id = ?14 AND user_id = ?15 AND version = ?16",
                params![
                    saved.stability,
                    saved.difficulty,
                    saved.ease_factor,
                    saved.interval_days,
                    saved.repetitions,
                    to_ts(saved.due_date),
                    saved.review_count,
                    saved.correct_streak,
                    saved.total_attempts,
                    saved.average_rating,
                    saved.last_reviewed.map(to_ts),
                    to_ts(saved.updated_at),
                    saved.version,
                    saved.challenge_id,
                    saved.user_id,
                    expected,
                ],
            )?;
            if updated == 0 {
                return Err(TrainerError::Conflict(format!(
                    "progress for ({}, {}) is no longer at version {}",
                    saved.challenge_id, saved.user_id, expected
                )));
            }
        }
    }

    debug!(
        "[DB] Saved progress ({}, {}) v{}",
        saved.challenge_id, saved.user_id, saved.version
    );
    Ok(saved)
}

/// Progress rows of a user whose challenge is still current at its path.
pub fn load_user_progress(conn: &Connection, user_id: &str) -> Result<Vec<Progress>> {
    let sql = format!(
        "SELECT {} FROM progress
         WHERE user_id = ?
         AND challenge_id IN (SELECT id FROM challenges WHERE superseded_by IS NULL)
         ORDER BY due_ts ASC",
        PROGRESS_COLUMNS
    );
    query_progress(conn, &sql, [user_id])
}

pub fn load_all_progress(conn: &Connection) -> Result<Vec<Progress>> {
    let sql = format!(
        "SELECT {} FROM progress ORDER BY challenge_id, user_id",
        PROGRESS_COLUMNS
    );
    query_progress(conn, &sql, [])
}

/// Due challenges for a user, ascending by due date, resuming after `query.after`.
/// Returns each challenge alongside its due instant.
pub fn query_due(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    query: &DueQuery,
    limit: Option<usize>,
) -> Result<Vec<(Challenge, DateTime<Utc>)>> {
    let sql = format!(
        "SELECT {}, p.due_ts
         FROM progress p
         JOIN challenges c ON c.id = p.challenge_id
         WHERE p.user_id = ?1
         AND p.due_ts <= ?2
         AND c.superseded_by IS NULL
         AND (?3 IS NULL OR EXISTS (
                SELECT 1 FROM challenge_tags t WHERE t.challenge_id = c.id AND t.tag = ?3))
         AND (?4 IS NULL OR c.pattern = ?4 COLLATE NOCASE)
         AND (?5 IS NULL OR p.due_ts > ?5 OR (p.due_ts = ?5 AND c.id > ?6))
         ORDER BY p.due_ts ASC, c.id ASC
         LIMIT ?7",
        CHALLENGE_COLUMNS
    );

    let (after_ts, after_id) = match &query.after {
        Some(DueCursor {
            due_date,
            challenge_id,
        }) => (Some(to_ts(*due_date)), Some(challenge_id.as_str())),
        None => (None, None),
    };
    // SQLite treats a negative LIMIT as unbounded
    let sql_limit = limit.map_or(-1, |l| l as i64);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                user_id,
                to_ts(now),
                query.tag,
                query.pattern,
                after_ts,
                after_id,
                sql_limit
            ],
            |row| Ok((read_challenge_row(row)?, row.get::<_, i64>(13)?)),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut due = Vec::with_capacity(rows.len());
    for (raw, due_ts) in rows {
        due.push((hydrate_challenge(conn, raw)?, from_ts(due_ts)?));
    }
    debug!("[DB] Found {} due challenges for {}", due.len(), user_id);
    Ok(due)
}

// --- Reviews ---

/// Appends a review. With a client review id that was already recorded this
/// is a no-op and returns `false`.
pub fn append_review(conn: &Connection, record: &ReviewRecord) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO reviews
            (review_id, challenge_id, user_id, rating, response_time_ms, review_ts, previous_interval)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(review_id) DO NOTHING",
        params![
            record.review_id,
            record.challenge_id,
            record.user_id,
            record.rating.value(),
            record.response_time_ms,
            to_ts(record.review_date),
            record.previous_interval,
        ],
    )?;
    Ok(inserted == 1)
}

/// The (challenge, user) pair a client review id was recorded for, if any.
pub fn load_review_pair(conn: &Connection, review_id: &str) -> Result<Option<(String, String)>> {
    let pair = conn
        .query_row(
            "SELECT challenge_id, user_id FROM reviews WHERE review_id = ?",
            [review_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(pair)
}

/// Reviews of one (challenge, user) pair in the order they were written.
pub fn load_reviews(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> Result<Vec<ReviewRecord>> {
    let sql = format!(
        "SELECT {} FROM reviews WHERE challenge_id = ? AND user_id = ? ORDER BY seq ASC",
        REVIEW_COLUMNS
    );
    query_reviews(conn, &sql, [challenge_id, user_id])
}

pub fn load_user_reviews(conn: &Connection, user_id: &str) -> Result<Vec<ReviewRecord>> {
    let sql = format!(
        "SELECT {} FROM reviews WHERE user_id = ? ORDER BY seq ASC",
        REVIEW_COLUMNS
    );
    query_reviews(conn, &sql, [user_id])
}

// --- Snapshot ---

pub fn load_all_challenges(conn: &Connection) -> Result<Vec<Challenge>> {
    let sql = format!(
        "SELECT {} FROM challenges c ORDER BY c.created_ts ASC, c.id ASC",
        CHALLENGE_COLUMNS
    );
    query_challenges(conn, &sql, [])
}

pub fn load_all_paths(conn: &Connection) -> Result<Vec<PathPointer>> {
    let mut stmt =
        conn.prepare("SELECT path, challenge_id, version FROM challenge_paths ORDER BY path")?;
    let paths = stmt
        .query_map([], |row| {
            Ok(PathPointer {
                path: row.get(0)?,
                challenge_id: row.get(1)?,
                version: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(paths)
}

pub fn load_all_reviews(conn: &Connection) -> Result<Vec<ReviewRecord>> {
    let sql = format!("SELECT {} FROM reviews ORDER BY seq ASC", REVIEW_COLUMNS);
    query_reviews(conn, &sql, [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn challenge(id: &str, hash: &str, path: &str, tags: &[&str]) -> Challenge {
        Challenge {
            id: id.to_string(),
            content_hash: hash.to_string(),
            title: format!("Title {}", id),
            author: None,
            source: Some("leetcode".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pattern: Some("sliding-window".to_string()),
            file_path: path.to_string(),
            version: 1,
            superseded_by: None,
            created_at: t0(),
            last_modified: t0(),
            content: "body".to_string(),
            extra: BTreeMap::new(),
        }
    }

    fn progress(challenge_id: &str, due: DateTime<Utc>) -> Progress {
        Progress {
            challenge_id: challenge_id.to_string(),
            user_id: "u1".to_string(),
            stability: 6.0,
            difficulty: 5.0,
            ease_factor: 2.5,
            interval_days: 6,
            repetitions: 1,
            due_date: due,
            review_count: 1,
            correct_streak: 1,
            total_attempts: 1,
            average_rating: Some(3.0),
            last_reviewed: Some(t0()),
            created_at: t0(),
            updated_at: t0(),
            version: 0,
        }
    }

    #[test]
    fn test_challenge_round_trip_with_tags_and_extras() {
        let conn = setup();
        let mut c = challenge("c1", "sha256:1", "a.md", &["arrays", "hashing"]);
        c.extra
            .insert("leetcode_id".to_string(), serde_yaml::Value::from("1"));
        assert!(save_challenge(&conn, &c).unwrap());

        let loaded = load_challenge(&conn, "c1").unwrap().unwrap();
        assert_eq!(loaded, c);
        assert_eq!(
            load_challenge_by_hash(&conn, "sha256:1").unwrap().unwrap().id,
            "c1"
        );
        assert!(load_challenge(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_hash_is_ignored() {
        let conn = setup();
        assert!(save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &[])).unwrap());
        assert!(!save_challenge(&conn, &challenge("c2", "sha256:1", "b.md", &[])).unwrap());
        assert!(load_challenge(&conn, "c2").unwrap().is_none());
    }

    #[test]
    fn test_path_pointer_resolves_current_revision() {
        let conn = setup();
        save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &[])).unwrap();
        save_challenge(&conn, &challenge("c2", "sha256:2", "a.md", &[])).unwrap();
        save_path_pointer(
            &conn,
            &PathPointer {
                path: "a.md".into(),
                challenge_id: "c1".into(),
                version: 1,
            },
        )
        .unwrap();
        save_path_pointer(
            &conn,
            &PathPointer {
                path: "a.md".into(),
                challenge_id: "c2".into(),
                version: 2,
            },
        )
        .unwrap();

        assert_eq!(load_challenge_by_path(&conn, "a.md").unwrap().unwrap().id, "c2");
        assert_eq!(load_path_pointer(&conn, "a.md").unwrap().unwrap().version, 2);
        assert!(load_challenge_by_path(&conn, "b.md").unwrap().is_none());
    }

    #[test]
    fn test_save_progress_checks_version() {
        let conn = setup();
        save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &[])).unwrap();

        let first = save_progress(&conn, &progress("c1", t0()), None).unwrap();
        assert_eq!(first.version, 1);

        // second insert for the same pair loses
        let dup = save_progress(&conn, &progress("c1", t0()), None);
        assert!(matches!(dup, Err(TrainerError::Conflict(_))));

        let second = save_progress(&conn, &first, Some(1)).unwrap();
        assert_eq!(second.version, 2);

        let stale = save_progress(&conn, &first, Some(1));
        assert!(matches!(stale, Err(TrainerError::Conflict(_))));

        let loaded = load_progress(&conn, "c1", "u1").unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_query_due_orders_filters_and_pages() {
        let conn = setup();
        save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &["graphs"])).unwrap();
        save_challenge(&conn, &challenge("c2", "sha256:2", "b.md", &["trees"])).unwrap();
        save_challenge(&conn, &challenge("c3", "sha256:3", "c.md", &["graphs"])).unwrap();
        save_progress(&conn, &progress("c1", t0() + Duration::days(2)), None).unwrap();
        save_progress(&conn, &progress("c2", t0() + Duration::days(1)), None).unwrap();
        save_progress(&conn, &progress("c3", t0() + Duration::days(30)), None).unwrap();

        let now = t0() + Duration::days(3);
        let all = query_due(&conn, "u1", now, &DueQuery::default(), None).unwrap();
        let ids: Vec<_> = all.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);

        let tagged = DueQuery {
            tag: Some("graphs".into()),
            ..DueQuery::default()
        };
        let graphs = query_due(&conn, "u1", now, &tagged, None).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].0.id, "c1");

        let page = query_due(&conn, "u1", now, &DueQuery::default(), Some(1)).unwrap();
        assert_eq!(page[0].0.id, "c2");
        let resume = DueQuery {
            after: Some(DueCursor {
                due_date: page[0].1,
                challenge_id: page[0].0.id.clone(),
            }),
            ..DueQuery::default()
        };
        let rest = query_due(&conn, "u1", now, &resume, None).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0.id, "c1");

        assert!(query_due(&conn, "someone-else", now, &DueQuery::default(), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_superseded_challenges_are_not_due() {
        let conn = setup();
        save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &[])).unwrap();
        save_challenge(&conn, &challenge("c2", "sha256:2", "a.md", &[])).unwrap();
        save_progress(&conn, &progress("c1", t0()), None).unwrap();
        mark_superseded(&conn, "c1", "c2", t0()).unwrap();

        let due = query_due(&conn, "u1", t0(), &DueQuery::default(), None).unwrap();
        assert!(due.is_empty());
        // the history of the old revision is kept
        assert!(load_progress(&conn, "c1", "u1").unwrap().is_some());
        assert_eq!(count_current_challenges(&conn).unwrap(), 1);
    }

    #[test]
    fn test_append_review_is_idempotent_by_review_id() {
        let conn = setup();
        save_challenge(&conn, &challenge("c1", "sha256:1", "a.md", &[])).unwrap();
        let record = ReviewRecord {
            review_id: Some("r-1".into()),
            challenge_id: "c1".into(),
            user_id: "u1".into(),
            rating: Rating::Good,
            response_time_ms: Some(1200),
            review_date: t0(),
            previous_interval: 0,
        };
        assert!(append_review(&conn, &record).unwrap());
        assert!(!append_review(&conn, &record).unwrap());
        assert_eq!(
            load_review_pair(&conn, "r-1").unwrap(),
            Some(("c1".to_string(), "u1".to_string()))
        );
        assert!(load_review_pair(&conn, "r-2").unwrap().is_none());

        // without an id every submission is a distinct review
        let anonymous = ReviewRecord {
            review_id: None,
            ..record.clone()
        };
        assert!(append_review(&conn, &anonymous).unwrap());
        assert!(append_review(&conn, &anonymous).unwrap());

        let history = load_reviews(&conn, "c1", "u1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], record);
    }
}
