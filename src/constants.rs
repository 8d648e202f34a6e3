// src/constants.rs

// --- Time Constants ---
pub const DAY_SECONDS: i64 = 86400;
pub const DAY_MILLIS: f64 = (DAY_SECONDS * 1000) as f64;

// --- Memory Model Seeds ---
// Indexed by rating - 1 (Again, Hard, Good, Easy). Days.
pub const INITIAL_STABILITY: [f64; 4] = [1.0, 3.0, 6.0, 10.0];
pub const STABILITY_MIN: f64 = 1.0; // Days
pub const STABILITY_MAX: f64 = 36500.0; // Days
pub const STABILITY_LAPSE_MULTIPLIER: f64 = 0.5;

// --- Difficulty (1-10 scale) ---
pub const DIFFICULTY_MIN: f64 = 1.0;
pub const DIFFICULTY_MAX: f64 = 10.0;
pub const DIFFICULTY_BASELINE: f64 = 5.0;

// Seed offsets from the baseline, indexed by rating - 1.
pub const INITIAL_DIFFICULTY_OFFSET: [f64; 4] = [2.0, 1.0, 0.0, -2.0];

// Per-review adjustments
pub const DIFFICULTY_DELTA_AGAIN: f64 = 1.0;
pub const DIFFICULTY_DELTA_HARD: f64 = 0.5;
pub const DIFFICULTY_DELTA_EASY: f64 = -0.8;
pub const DIFFICULTY_MEAN_REVERSION_GOOD: f64 = 0.05;

// --- Stability Growth ---
pub const GROWTH_GAIN_HARD: f64 = 0.6;
pub const GROWTH_BASE_HARD: f64 = 0.8;
pub const GROWTH_GAIN_GOOD: f64 = 1.5;
pub const GROWTH_GAIN_EASY: f64 = 2.5;
// Extra growth for items recalled after retrievability had decayed.
pub const RETRIEVABILITY_BONUS: f64 = 0.5;

// --- Legacy SM-2 Ease ---
pub const EASE_FACTOR_MIN: f64 = 1.3;
pub const EASE_FACTOR_DEFAULT: f64 = 2.5;

// --- Learning States ---
pub const REVIEW_STATE_REPETITIONS: i64 = 2;

// --- Concurrency ---
pub const CONFLICT_RETRY_ATTEMPTS: u32 = 3;

// --- Content Validation ---
pub const TAG_MAX_LEN: usize = 50;
