// src/stats.rs

use crate::config::StatsConfig;
use crate::error::Result;
use crate::models::{MemoryState, Progress, ReviewRecord, Statistics};
use crate::repository;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Reads everything `compute` needs for one user. Run it inside a read
/// transaction for a consistent view.
pub fn collect(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    config: &StatsConfig,
) -> Result<Statistics> {
    let progress = repository::load_user_progress(conn, user_id)?;
    let reviews = repository::load_user_reviews(conn, user_id)?;
    let total_challenges = repository::count_current_challenges(conn)?;
    Ok(compute(&progress, &reviews, total_challenges, now, config))
}

pub fn compute(
    progress: &[Progress],
    reviews: &[ReviewRecord],
    total_challenges: i64,
    now: DateTime<Utc>,
    config: &StatsConfig,
) -> Statistics {
    let offset = local_offset(config);
    let end_of_today = end_of_local_day(now, &offset);

    let due_today = progress.iter().filter(|p| p.due_date < end_of_today).count() as i64;
    let learning_count = progress
        .iter()
        .filter(|p| p.memory_state() == MemoryState::Learning)
        .count() as i64;
    let review_count = progress.len() as i64 - learning_count;

    let days: BTreeSet<NaiveDate> = reviews
        .iter()
        .map(|r| r.review_date.with_timezone(&offset).date_naive())
        .collect();
    let today = now.with_timezone(&offset).date_naive();

    Statistics {
        total_challenges,
        due_today,
        average_rating: average_rating(reviews, config.recent_reviews),
        current_streak: current_streak(&days, today),
        longest_streak: longest_streak(&days),
        total_reviews: reviews.len() as i64,
        learning_count,
        review_count,
    }
}

fn local_offset(config: &StatsConfig) -> FixedOffset {
    FixedOffset::east_opt(config.utc_offset_minutes * 60)
        .unwrap_or_else(|| Utc.fix())
}

fn end_of_local_day(now: DateTime<Utc>, offset: &FixedOffset) -> DateTime<Utc> {
    now.with_timezone(offset)
        .date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Mean over all reviews, or only the newest `recent` of them.
fn average_rating(reviews: &[ReviewRecord], recent: Option<usize>) -> f64 {
    let window = match recent {
        Some(n) if n < reviews.len() => &reviews[reviews.len() - n..],
        _ => reviews,
    };
    if window.is_empty() {
        return 0.0;
    }
    let total: i64 = window.iter().map(|r| r.rating.value()).sum();
    total as f64 / window.len() as f64
}

/// Consecutive review days ending today, or yesterday when today has no review yet.
fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> i64 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor = match cursor.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }
    streak
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> i64 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(expected) if expected == *day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}
