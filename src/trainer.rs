// src/trainer.rs
//! Entry point for presentation and sync layers. Owns the persistence handle;
//! every call takes the connection lock for the shortest span it needs and
//! releases it on all exit paths.

use crate::config::TrainerConfig;
use crate::database::init_db;
use crate::error::{Result, TrainerError};
use crate::history;
use crate::models::{
    Challenge, ChallengeDocument, ChallengeFilter, DuePage, DueQuery, IngestResult, Progress,
    Rating, ReviewRecord, ReviewSubmission, Snapshot, Statistics,
};
use crate::repository;
use crate::scheduler;
use crate::stats;
use crate::store;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum ReviewRead {
    /// The submission's review id is already logged; this is the pair's progress.
    Recorded(Progress),
    Current(Option<Progress>),
}

pub struct Trainer {
    db: Mutex<Connection>,
    config: TrainerConfig,
}

impl Trainer {
    pub fn open(path: &Path, config: TrainerConfig) -> Result<Self> {
        info!("[DB] Opening {:?}", path);
        Self::from_connection(Connection::open(path)?, config)
    }

    pub fn open_in_memory(config: TrainerConfig) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    pub fn from_connection(conn: Connection, config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        init_db(&conn)?;
        Ok(Trainer {
            db: Mutex::new(conn),
            config,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.db.lock().map_err(|_| TrainerError::Poisoned)?;
        f(&mut conn)
    }

    // --- Challenges ---

    pub fn ingest(&self, doc: &ChallengeDocument, now: DateTime<Utc>) -> Result<IngestResult> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = store::ingest(&tx, doc, now)?;
            tx.commit()?;
            Ok(result)
        })
    }

    /// Runs ingestion and rolls it back, reporting what would have happened.
    pub fn verify(&self, doc: &ChallengeDocument, now: DateTime<Utc>) -> Result<IngestResult> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = store::ingest(&tx, doc, now)?;
            tx.rollback()?;
            debug!("[Store] Verified {} without writing", doc.path);
            Ok(result)
        })
    }

    pub fn get(&self, id: &str) -> Result<Challenge> {
        self.with_conn(|conn| store::get(conn, id))
    }

    pub fn get_by_path(&self, path: &str) -> Result<Challenge> {
        self.with_conn(|conn| store::get_by_path(conn, path))
    }

    pub fn list(&self, filter: &ChallengeFilter) -> Result<Vec<Challenge>> {
        self.with_conn(|conn| store::list(conn, filter))
    }

    /// Every challenge due for `user_id` at `now`, soonest first.
    pub fn list_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        filter: &ChallengeFilter,
    ) -> Result<Vec<Challenge>> {
        let query = DueQuery {
            tag: filter.tag.clone(),
            pattern: filter.pattern.clone(),
            ..DueQuery::default()
        };
        Ok(self.list_due_page(user_id, now, &query)?.challenges)
    }

    pub fn list_due_page(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        query: &DueQuery,
    ) -> Result<DuePage> {
        self.with_conn(|conn| store::list_due(conn, user_id, now, query))
    }

    // --- Reviews ---

    /// Records a review and returns the pair's updated progress. The first
    /// review of a pair initializes it. Lost version races are retried from a
    /// fresh read up to the configured number of attempts.
    pub fn review(&self, submission: &ReviewSubmission, now: DateTime<Utc>) -> Result<Progress> {
        let rating = Rating::try_from(submission.rating)?;
        retry_on_conflict(
            self.config.scheduler.conflict_retries,
            &submission.challenge_id,
            || self.try_review(submission, rating, now),
        )
    }

    fn try_review(
        &self,
        submission: &ReviewSubmission,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<Progress> {
        let ReviewSubmission {
            challenge_id,
            user_id,
            response_time_ms,
            review_id,
            ..
        } = submission;

        // read
        let current = match self.with_conn(|conn| {
            if let Some(existing) = self.already_recorded(conn, submission)? {
                return Ok(ReviewRead::Recorded(existing));
            }
            store::get(conn, challenge_id)?;
            Ok(ReviewRead::Current(repository::load_progress(
                conn,
                challenge_id,
                user_id,
            )?))
        })? {
            ReviewRead::Current(current) => current,
            ReviewRead::Recorded(existing) => return Ok(existing),
        };

        // compute
        let cfg = &self.config.scheduler;
        let next = match &current {
            Some(progress) => scheduler::schedule(progress, rating, now, cfg)?,
            None => scheduler::initialize(challenge_id, user_id, rating, now, cfg)?,
        };
        let record = history::new_record(
            challenge_id,
            user_id,
            rating,
            *response_time_ms,
            review_id.as_deref(),
            current.as_ref(),
            now,
        );

        // write, guarded by the version we read
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(existing) = self.already_recorded(&tx, submission)? {
                return Ok(existing);
            }
            let expected = current.as_ref().map(|p| p.version);
            let saved = repository::save_progress(&tx, &next, expected)?;
            Self::append_or_conflict(&tx, &record)?;
            tx.commit()?;
            Ok(saved)
        })
    }

    /// Current progress when the submission's review id is already logged.
    fn already_recorded(
        &self,
        conn: &Connection,
        submission: &ReviewSubmission,
    ) -> Result<Option<Progress>> {
        let review_id = match &submission.review_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let (challenge_id, user_id) = match repository::load_review_pair(conn, review_id)? {
            Some(pair) => pair,
            None => return Ok(None),
        };
        if challenge_id != submission.challenge_id || user_id != submission.user_id {
            return Err(TrainerError::ReviewIdReused {
                review_id: review_id.clone(),
                challenge_id,
                user_id,
            });
        }
        info!("[History] Review {} already applied, returning current progress", review_id);
        repository::load_progress(conn, &challenge_id, &user_id)?
            .map(Some)
            .ok_or_else(|| {
                TrainerError::NotFound(format!("progress for ({}, {})", challenge_id, user_id))
            })
    }

    fn append_or_conflict(conn: &Connection, record: &ReviewRecord) -> Result<()> {
        if history::append(conn, record)? {
            Ok(())
        } else {
            Err(TrainerError::Conflict(format!(
                "review {:?} was recorded concurrently",
                record.review_id
            )))
        }
    }

    /// Applies a review on top of the caller's copy of `progress`. Fails with
    /// `Conflict` when the stored row has moved past that copy's version; the
    /// caller re-reads and retries.
    pub fn schedule(
        &self,
        progress: &Progress,
        rating: i64,
        response_time_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Progress> {
        let rating = Rating::try_from(rating)?;
        let next = scheduler::schedule(progress, rating, now, &self.config.scheduler)?;
        let record = history::new_record(
            &progress.challenge_id,
            &progress.user_id,
            rating,
            response_time_ms,
            None,
            Some(progress),
            now,
        );

        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if repository::load_progress(&tx, &progress.challenge_id, &progress.user_id)?.is_none() {
                return Err(TrainerError::NotFound(format!(
                    "progress for ({}, {})",
                    progress.challenge_id, progress.user_id
                )));
            }
            let saved = repository::save_progress(&tx, &next, Some(progress.version))?;
            Self::append_or_conflict(&tx, &record)?;
            tx.commit()?;
            Ok(saved)
        })
    }

    pub fn progress(&self, challenge_id: &str, user_id: &str) -> Result<Progress> {
        self.with_conn(|conn| {
            repository::load_progress(conn, challenge_id, user_id)?.ok_or_else(|| {
                TrainerError::NotFound(format!("progress for ({}, {})", challenge_id, user_id))
            })
        })
    }

    pub fn history(&self, challenge_id: &str, user_id: &str) -> Result<Vec<ReviewRecord>> {
        self.with_conn(|conn| history::for_pair(conn, challenge_id, user_id))
    }

    /// Recomputes a pair's progress from its review log.
    pub fn replay(&self, challenge_id: &str, user_id: &str) -> Result<Option<Progress>> {
        let records = self.history(challenge_id, user_id)?;
        history::replay(&records, &self.config.scheduler)
    }

    // --- Reporting ---

    pub fn stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<Statistics> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            stats::collect(&tx, user_id, now, &self.config.stats)
        })
    }

    /// Consistent copy of the whole store for a sync layer to merge.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            Ok(Snapshot {
                taken_at: now,
                challenges: repository::load_all_challenges(&tx)?,
                paths: repository::load_all_paths(&tx)?,
                progress: repository::load_all_progress(&tx)?,
                reviews: repository::load_all_reviews(&tx)?,
            })
        })
    }
}

/// Runs `op` until it succeeds, fails for a reason a re-read cannot fix, or
/// has been tried `attempts` times.
fn retry_on_conflict<T>(
    attempts: u32,
    challenge_id: &str,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    "[Scheduler] Attempt {}/{} for {} lost a race: {}",
                    attempt, attempts, challenge_id, e
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}
