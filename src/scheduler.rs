// src/scheduler.rs
//! Memory-model scheduling. Each (challenge, user) pair carries a stability
//! (days until recall probability decays to the reference threshold) and a
//! difficulty on a 1-10 scale. Retrievability decays as `2^(-t/S)`.
//!
//! Every function here is pure: the caller passes `now` and persists the result.

use crate::config::SchedulerConfig;
use crate::constants::*;
use crate::error::{Result, TrainerError};
use crate::models::{MemoryState, Progress, Rating};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

// --- Public Interface ---

/// Progress for the first ever review of a pair.
pub fn initialize(
    challenge_id: &str,
    user_id: &str,
    rating: Rating,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<Progress> {
    let stability = bound_stability(
        config.initial_stability[rating.index()],
        config.max_stability_days,
    );
    let difficulty = clamp_difficulty(
        config.baseline_difficulty + INITIAL_DIFFICULTY_OFFSET[rating.index()],
    );
    let interval_days = interval_for(stability);
    let due_date = due_after(now, interval_days)?;
    let succeeded = i64::from(!rating.is_lapse());

    info!(
        "[Scheduler] Initialized {} for {}: {} -> S {:.2}d, D {:.2}, due in {}d",
        challenge_id, user_id, rating, stability, difficulty, interval_days
    );

    Ok(Progress {
        challenge_id: challenge_id.to_string(),
        user_id: user_id.to_string(),
        stability,
        difficulty,
        ease_factor: config.initial_ease_factor,
        interval_days,
        repetitions: succeeded,
        due_date,
        review_count: 1,
        correct_streak: succeeded,
        total_attempts: 1,
        average_rating: Some(rating.value() as f64),
        last_reviewed: Some(now),
        created_at: now,
        updated_at: now,
        version: 0,
    })
}

/// Applies one more review to existing progress.
pub fn schedule(
    progress: &Progress,
    rating: Rating,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<Progress> {
    if let Some(last_reviewed) = progress.last_reviewed {
        if now < last_reviewed {
            return Err(TrainerError::ClockSkew { now, last_reviewed });
        }
    }

    let anchor = progress.last_reviewed.unwrap_or(progress.created_at);
    let elapsed = elapsed_days(anchor, now);
    let retrievability = retrievability_after(elapsed, progress.stability);

    debug!(
        "[Scheduler Input] {}: rating {}, elapsed {:.2}d, R {:.3}, S {:.2}d, D {:.2}",
        progress.challenge_id,
        rating,
        elapsed,
        retrievability,
        progress.stability,
        progress.difficulty
    );

    let mut next = progress.clone();
    next.difficulty = next_difficulty(
        progress.difficulty,
        rating,
        retrievability,
        config.baseline_difficulty,
    );

    if rating.is_lapse() {
        next.stability = (progress.stability * STABILITY_LAPSE_MULTIPLIER).max(STABILITY_MIN);
        next.repetitions = 0;
        next.correct_streak = 0;
    } else {
        let growth = growth_factor(rating, next.difficulty, retrievability);
        // a lowered cap never shrinks stability on success
        let cap = config.max_stability_days.max(progress.stability);
        next.stability = bound_stability(progress.stability * growth, cap);
        next.repetitions = progress.repetitions + 1;
        next.correct_streak = progress.correct_streak + 1;
    }

    next.ease_factor = next_ease_factor(progress.ease_factor, rating);
    next.interval_days = interval_for(next.stability);
    next.due_date = due_after(now, next.interval_days)?;
    next.average_rating = Some(running_mean(
        progress.average_rating,
        progress.review_count,
        rating,
    ));
    next.review_count = progress.review_count + 1;
    next.total_attempts = progress.total_attempts + 1;
    next.last_reviewed = Some(now);
    next.updated_at = now;

    info!(
        "[Scheduler Result] {}: S {:.2}d -> {:.2}d, D {:.2} -> {:.2}, Interval {}d -> {}d, Ease {:.2} -> {:.2}",
        progress.challenge_id,
        progress.stability,
        next.stability,
        progress.difficulty,
        next.difficulty,
        progress.interval_days,
        next.interval_days,
        progress.ease_factor,
        next.ease_factor
    );

    Ok(next)
}

/// State of a pair, `New` when it has never been reviewed.
pub fn memory_state(progress: Option<&Progress>) -> MemoryState {
    progress.map_or(MemoryState::New, Progress::memory_state)
}

/// Estimated probability of recall at `now`.
pub fn retrievability(progress: &Progress, now: DateTime<Utc>) -> f64 {
    let anchor = progress.last_reviewed.unwrap_or(progress.created_at);
    retrievability_after(elapsed_days(anchor, now), progress.stability)
}

pub fn retrievability_after(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    2f64.powf(-elapsed_days.max(0.0) / stability)
}

/// Multiplier applied to stability on a review. Larger for easier ratings,
/// smaller for difficult items, with a bonus for recalls made after more decay.
/// Never below 1.0 for Good/Easy; Hard dips below 1.0 only for difficult items.
pub fn growth_factor(rating: Rating, difficulty: f64, retrievability: f64) -> f64 {
    let ease = (DIFFICULTY_MAX + 1.0 - clamp_difficulty(difficulty)) / DIFFICULTY_MAX;
    let recall_bonus = 1.0 + RETRIEVABILITY_BONUS * (1.0 - retrievability.clamp(0.0, 1.0));
    match rating {
        Rating::Again => STABILITY_LAPSE_MULTIPLIER,
        Rating::Hard => GROWTH_BASE_HARD + GROWTH_GAIN_HARD * ease * recall_bonus,
        Rating::Good => 1.0 + GROWTH_GAIN_GOOD * ease * recall_bonus,
        Rating::Easy => 1.0 + GROWTH_GAIN_EASY * ease * recall_bonus,
    }
}

pub fn next_difficulty(difficulty: f64, rating: Rating, retrievability: f64, baseline: f64) -> f64 {
    let r = retrievability.clamp(0.0, 1.0);
    let updated = match rating {
        // forgetting something that should still be fresh says more about the item
        Rating::Again => difficulty + DIFFICULTY_DELTA_AGAIN * (0.5 + 0.5 * r),
        Rating::Hard => difficulty + DIFFICULTY_DELTA_HARD * (0.5 + 0.5 * r),
        Rating::Good => difficulty + DIFFICULTY_MEAN_REVERSION_GOOD * (baseline - difficulty),
        Rating::Easy => difficulty + DIFFICULTY_DELTA_EASY * (1.5 - 0.5 * r),
    };
    clamp_difficulty(updated)
}

/// Legacy SM-2 ease update on the 4-point scale.
pub fn next_ease_factor(ease_factor: f64, rating: Rating) -> f64 {
    let q = (4 - rating.value()) as f64;
    (ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(EASE_FACTOR_MIN)
}

// --- Internal Helpers ---

fn clamp_difficulty(difficulty: f64) -> f64 {
    difficulty.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)
}

fn bound_stability(stability: f64, cap: f64) -> f64 {
    stability.max(STABILITY_MIN).min(cap.max(STABILITY_MIN))
}

fn due_after(now: DateTime<Utc>, interval_days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(interval_days)
        .and_then(|interval| now.checked_add_signed(interval))
        .ok_or(TrainerError::IntervalOverflow(interval_days))
}

fn interval_for(stability: f64) -> i64 {
    stability.round() as i64
}

fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / DAY_MILLIS).max(0.0)
}

fn running_mean(previous: Option<f64>, count: i64, rating: Rating) -> f64 {
    let value = rating.value() as f64;
    match previous {
        Some(mean) if count > 0 => (mean * count as f64 + value) / (count + 1) as f64,
        _ => value,
    }
}
