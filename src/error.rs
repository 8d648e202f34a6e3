// src/error.rs

use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a challenge document was rejected at the parser boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("challenge is missing a title")]
    MissingTitle,

    #[error("invalid tag {0:?}: tags are 1-50 characters of letters, digits, '-' or '_'")]
    InvalidTag(String),

    #[error("malformed front matter: {0}")]
    MalformedFrontMatter(String),
}

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid rating {0}: expected 1 (Again) to 4 (Easy)")]
    InvalidRating(i64),

    #[error("clock skew: review at {now} precedes last review at {last_reviewed}")]
    ClockSkew {
        now: DateTime<Utc>,
        last_reviewed: DateTime<Utc>,
    },

    #[error("review id {review_id} was already recorded for ({challenge_id}, {user_id})")]
    ReviewIdReused {
        review_id: String,
        challenge_id: String,
        user_id: String,
    },

    #[error("interval of {0} days runs past the supported calendar")]
    IntervalOverflow(i64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage error: corrupt payload: {0}")]
    Encoding(String),

    #[error("storage error: connection lock poisoned")]
    Poisoned,
}

impl TrainerError {
    /// Only optimistic-version conflicts are worth re-reading and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrainerError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, TrainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(TrainerError::Conflict("progress".into()).is_retryable());
        assert!(!TrainerError::NotFound("x".into()).is_retryable());
        assert!(!TrainerError::InvalidRating(7).is_retryable());
        assert!(!TrainerError::Validation(ValidationError::MissingTitle).is_retryable());
        assert!(!TrainerError::IntervalOverflow(i64::MAX).is_retryable());
        let reused = TrainerError::ReviewIdReused {
            review_id: "r1".into(),
            challenge_id: "c1".into(),
            user_id: "u1".into(),
        };
        assert!(!reused.is_retryable());
    }

    #[test]
    fn validation_converts_into_trainer_error() {
        let err: TrainerError = ValidationError::MissingTitle.into();
        assert!(matches!(
            err,
            TrainerError::Validation(ValidationError::MissingTitle)
        ));
        assert_eq!(
            err.to_string(),
            "validation error: challenge is missing a title"
        );
    }
}
