use chrono::{DateTime, Duration, TimeZone, Utc};
use coderecall::models::{
    ChallengeDocument, ChallengeFilter, IngestResult, MemoryState, ReviewSubmission,
};
use coderecall::{Trainer, TrainerConfig, TrainerError};
use std::path::Path;
use std::thread;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

fn open(path: &Path) -> Trainer {
    Trainer::open(path, TrainerConfig::default()).expect("failed to open trainer")
}

const TWO_SUM: &str = "---
title: Two Sum
author: someone
tags: [arrays, hashing]
pattern: Hash Map
difficulty: easy
---
Given an array of integers, return indices of the two numbers that add up to a target.
";

#[test]
fn stale_progress_from_two_handles_conflicts_once() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("coderecall.db");
    let first = open(&db);
    let second = open(&db);

    let id = first
        .ingest(&ChallengeDocument::new("two-sum.md", TWO_SUM), t0())
        .unwrap()
        .id()
        .to_string();
    first
        .review(&ReviewSubmission::new(id.as_str(), "u1", 3), t0())
        .unwrap();

    // both handles read the same version
    let seen_by_first = first.progress(&id, "u1").unwrap();
    let seen_by_second = second.progress(&id, "u1").unwrap();
    assert_eq!(seen_by_first, seen_by_second);

    let later = t0() + Duration::days(6);
    let a = first.schedule(&seen_by_first, 3, None, later);
    let b = second.schedule(&seen_by_second, 4, None, later);

    assert!(a.is_ok());
    assert!(matches!(b, Err(TrainerError::Conflict(_))));
    assert_eq!(second.history(&id, "u1").unwrap().len(), 2);
    assert_eq!(second.progress(&id, "u1").unwrap(), a.unwrap());
}

#[test]
fn concurrent_reviews_are_both_applied() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("coderecall.db");
    let setup = open(&db);
    let id = setup
        .ingest(&ChallengeDocument::new("two-sum.md", TWO_SUM), t0())
        .unwrap()
        .id()
        .to_string();
    setup
        .review(&ReviewSubmission::new(id.as_str(), "u1", 3), t0())
        .unwrap();

    let later = t0() + Duration::days(6);
    thread::scope(|s| {
        for rating in [3, 4] {
            let db = db.clone();
            let id = id.clone();
            s.spawn(move || {
                let trainer = open(&db);
                trainer
                    .review(&ReviewSubmission::new(id.as_str(), "u1", rating), later)
                    .expect("review should survive one lost race");
            });
        }
    });

    let progress = setup.progress(&id, "u1").unwrap();
    assert_eq!(progress.review_count, 3);
    assert_eq!(progress.version, 3);
    assert_eq!(setup.history(&id, "u1").unwrap().len(), 3);
}

#[test]
fn ingest_review_and_report() {
    let dir = TempDir::new().unwrap();
    let trainer = open(&dir.path().join("coderecall.db"));

    let created = trainer
        .ingest(&ChallengeDocument::new("arrays/two-sum.md", TWO_SUM), t0())
        .unwrap();
    let id = match &created {
        IngestResult::Created { id, version: 1 } => id.clone(),
        other => panic!("expected created, got {:?}", other),
    };

    let challenge = trainer.get(&id).unwrap();
    assert_eq!(challenge.pattern.as_deref(), Some("Hash Map"));
    assert!(challenge.tags.contains("hashing"));
    assert!(challenge.extra.contains_key("difficulty"));

    // the same content under another path is not a new challenge
    let copy = trainer
        .ingest(&ChallengeDocument::new("copies/two-sum.md", TWO_SUM), t0())
        .unwrap();
    assert_eq!(copy, IngestResult::Duplicate { id: id.clone() });

    let nothing_yet = trainer
        .list_due("u1", t0() + Duration::days(30), &ChallengeFilter::default())
        .unwrap();
    assert!(nothing_yet.is_empty());

    let progress = trainer
        .review(
            &ReviewSubmission::new(id.as_str(), "u1", 3).with_response_time(95_000),
            t0(),
        )
        .unwrap();
    assert_eq!(progress.memory_state(), MemoryState::Learning);
    assert_eq!(progress.due_date, t0() + Duration::days(6));

    let before_due = trainer
        .list_due("u1", t0() + Duration::days(5), &ChallengeFilter::default())
        .unwrap();
    assert!(before_due.is_empty());
    let on_due = trainer
        .list_due("u1", t0() + Duration::days(6), &ChallengeFilter::default())
        .unwrap();
    assert_eq!(on_due.len(), 1);
    assert_eq!(on_due[0].id, id);

    let again = trainer
        .review(
            &ReviewSubmission::new(id.as_str(), "u1", 3),
            t0() + Duration::days(6),
        )
        .unwrap();
    assert_eq!(again.repetitions, 2);
    assert_eq!(again.memory_state(), MemoryState::Review);
    assert!(again.stability >= progress.stability);

    let stats = trainer.stats("u1", t0() + Duration::days(6)).unwrap();
    assert_eq!(stats.total_challenges, 1);
    assert_eq!(stats.total_reviews, 2);
    assert_eq!(stats.review_count, 1);
    assert_eq!(stats.due_today, 0);
    assert_eq!(stats.current_streak, 1);
    assert!((stats.average_rating - 3.0).abs() < 1e-12);

    // a fresh handle sees the same state
    drop(trainer);
    let reopened = open(&dir.path().join("coderecall.db"));
    assert_eq!(reopened.progress(&id, "u1").unwrap(), again);
    assert_eq!(reopened.snapshot(t0()).unwrap().reviews.len(), 2);
}
