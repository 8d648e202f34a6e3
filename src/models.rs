// src/models.rs

use crate::constants::REVIEW_STATE_REPETITIONS;
use crate::error::TrainerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// --- Ratings & States ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }

    pub fn value(self) -> i64 {
        self as i64
    }

    /// Position in rating-indexed tables.
    pub fn index(self) -> usize {
        (self as usize) - 1
    }

    pub fn is_lapse(self) -> bool {
        self == Rating::Again
    }
}

impl TryFrom<i64> for Rating {
    type Error = TrainerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(TrainerError::InvalidRating(other)),
        }
    }
}

impl FromStr for Rating {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" => Ok(Rating::Again),
            "hard" => Ok(Rating::Hard),
            "good" => Ok(Rating::Good),
            "easy" => Ok(Rating::Easy),
            other => {
                let value = other.parse::<i64>().map_err(|_| TrainerError::InvalidRating(0))?;
                Rating::try_from(value)
            }
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where a (challenge, user) pair sits in the review cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryState {
    /// No Progress row yet.
    New,
    Learning,
    Review,
}

// --- Challenge Documents ---

/// A raw document as handed over by the presentation layer.
#[derive(Debug, Clone)]
pub struct ChallengeDocument {
    pub path: String,
    pub raw: String,
}

impl ChallengeDocument {
    pub fn new(path: impl Into<String>, raw: impl Into<String>) -> Self {
        ChallengeDocument {
            path: path.into(),
            raw: raw.into(),
        }
    }
}

/// Front matter + body after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedChallenge {
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub tags: BTreeSet<String>,
    pub pattern: Option<String>,
    pub body: String,
    /// Front-matter keys nothing in the trainer interprets.
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub content_hash: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub file_path: String,
    pub version: i64,
    /// Set once a newer revision took over this challenge's path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Path-level pointer to the current revision living at that path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPointer {
    pub path: String,
    pub challenge_id: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum IngestResult {
    Created {
        id: String,
        version: i64,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        id: String,
        previous_id: String,
        version: i64,
    },
    Duplicate {
        id: String,
    },
}

impl IngestResult {
    pub fn id(&self) -> &str {
        match self {
            IngestResult::Created { id, .. }
            | IngestResult::Updated { id, .. }
            | IngestResult::Duplicate { id } => id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestResult::Created { .. } => "created",
            IngestResult::Updated { .. } => "updated",
            IngestResult::Duplicate { .. } => "duplicate",
        }
    }
}

// --- Queries ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChallengeFilter {
    pub tag: Option<String>,
    pub pattern: Option<String>,
}

/// Keyset position for resuming a due scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DueCursor {
    pub due_date: DateTime<Utc>,
    pub challenge_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DueQuery {
    pub tag: Option<String>,
    pub pattern: Option<String>,
    pub limit: Option<usize>,
    pub after: Option<DueCursor>,
}

impl DueQuery {
    pub fn with_limit(limit: usize) -> Self {
        DueQuery {
            limit: Some(limit),
            ..DueQuery::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuePage {
    pub challenges: Vec<Challenge>,
    /// Present when the page was cut short by the limit.
    pub next_cursor: Option<DueCursor>,
}

// --- Scheduling State ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub challenge_id: String,
    pub user_id: String,
    pub stability: f64,
    pub difficulty: f64,
    pub ease_factor: f64,
    pub interval_days: i64,
    pub repetitions: i64,
    pub due_date: DateTime<Utc>,
    pub review_count: i64,
    pub correct_streak: i64,
    pub total_attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every committed write.
    pub version: i64,
}

impl Progress {
    pub fn memory_state(&self) -> MemoryState {
        if self.repetitions < REVIEW_STATE_REPETITIONS {
            MemoryState::Learning
        } else {
            MemoryState::Review
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    pub challenge_id: String,
    pub user_id: String,
    pub rating: Rating,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    pub review_date: DateTime<Utc>,
    pub previous_interval: i64,
}

/// A review as submitted by the presentation layer; the rating is still unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewSubmission {
    pub challenge_id: String,
    pub user_id: String,
    pub rating: i64,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
    /// Client-supplied idempotency key.
    #[serde(default)]
    pub review_id: Option<String>,
}

impl ReviewSubmission {
    pub fn new(challenge_id: impl Into<String>, user_id: impl Into<String>, rating: i64) -> Self {
        ReviewSubmission {
            challenge_id: challenge_id.into(),
            user_id: user_id.into(),
            rating,
            response_time_ms: None,
            review_id: None,
        }
    }

    pub fn with_response_time(mut self, millis: i64) -> Self {
        self.response_time_ms = Some(millis);
        self
    }

    pub fn with_review_id(mut self, review_id: impl Into<String>) -> Self {
        self.review_id = Some(review_id.into());
        self
    }
}

// --- Reporting ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_challenges: i64,
    pub due_today: i64,
    pub average_rating: f64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub total_reviews: i64,
    pub learning_count: i64,
    pub review_count: i64,
}

/// Everything a sync layer needs to merge two stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub challenges: Vec<Challenge>,
    pub paths: Vec<PathPointer>,
    pub progress: Vec<Progress>,
    pub reviews: Vec<ReviewRecord>,
}
