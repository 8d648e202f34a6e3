// src/history.rs
//! Append-only review log. Progress is a fold over a pair's records; the
//! folded value is persisted for cheap due queries, and `replay` recomputes it.

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::models::{Progress, Rating, ReviewRecord};
use crate::repository;
use crate::scheduler;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::Connection;

/// Builds the log entry for a review applied on top of `previous`.
pub fn new_record(
    challenge_id: &str,
    user_id: &str,
    rating: Rating,
    response_time_ms: Option<i64>,
    review_id: Option<&str>,
    previous: Option<&Progress>,
    now: DateTime<Utc>,
) -> ReviewRecord {
    ReviewRecord {
        review_id: review_id.map(str::to_string),
        challenge_id: challenge_id.to_string(),
        user_id: user_id.to_string(),
        rating,
        response_time_ms,
        review_date: now,
        previous_interval: previous.map_or(0, |p| p.interval_days),
    }
}

/// Returns `false` when the record's review id was already logged.
pub fn append(conn: &Connection, record: &ReviewRecord) -> Result<bool> {
    let written = repository::append_review(conn, record)?;
    if written {
        debug!(
            "[History] {} rated {} by {} (previous interval {}d)",
            record.challenge_id, record.rating, record.user_id, record.previous_interval
        );
    } else {
        warn!(
            "[History] Review {:?} already recorded, skipping",
            record.review_id
        );
    }
    Ok(written)
}

pub fn for_pair(conn: &Connection, challenge_id: &str, user_id: &str) -> Result<Vec<ReviewRecord>> {
    repository::load_reviews(conn, challenge_id, user_id)
}

/// Folds ordered records through the scheduler. `None` for an empty log.
pub fn replay(records: &[ReviewRecord], config: &SchedulerConfig) -> Result<Option<Progress>> {
    let mut iter = records.iter();
    let first = match iter.next() {
        Some(first) => first,
        None => return Ok(None),
    };

    let mut progress = scheduler::initialize(
        &first.challenge_id,
        &first.user_id,
        first.rating,
        first.review_date,
        config,
    )?;
    for record in iter {
        progress = scheduler::schedule(&progress, record.rating, record.review_date, config)?;
    }
    Ok(Some(progress))
}
