// src/store.rs
//! Identity and versioning decisions for challenge documents. Callers run
//! `ingest` inside a write transaction so the hash lookup and the insert
//! commit together.

use crate::error::{Result, TrainerError};
use crate::hasher;
use crate::models::{
    Challenge, ChallengeDocument, ChallengeFilter, DueCursor, DuePage, DueQuery, IngestResult,
    PathPointer,
};
use crate::parser;
use crate::repository;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;

pub fn ingest(conn: &Connection, doc: &ChallengeDocument, now: DateTime<Utc>) -> Result<IngestResult> {
    let parsed = parser::parse(&doc.raw)?;
    let content_hash = hasher::content_hash(&parsed);

    if let Some(existing) = repository::load_challenge_by_hash(conn, &content_hash)? {
        info!(
            "[Store] {} duplicates '{}' ({})",
            doc.path, existing.title, existing.id
        );
        return Ok(IngestResult::Duplicate { id: existing.id });
    }

    let id = hasher::challenge_id(&content_hash);
    let previous = repository::load_path_pointer(conn, &doc.path)?;
    let version = previous.as_ref().map_or(1, |p| p.version + 1);

    let challenge = Challenge {
        id: id.clone(),
        content_hash,
        title: parsed.title,
        author: parsed.author,
        source: parsed.source,
        tags: parsed.tags,
        pattern: parsed.pattern,
        file_path: doc.path.clone(),
        version,
        superseded_by: None,
        created_at: now,
        last_modified: now,
        content: parsed.body,
        extra: parsed.extra,
    };

    if !repository::save_challenge(conn, &challenge)? {
        // another writer stored the same content between lookup and insert
        warn!("[Store] Lost insert race for {}, reporting duplicate", id);
        return Ok(IngestResult::Duplicate { id });
    }

    repository::save_path_pointer(
        conn,
        &PathPointer {
            path: doc.path.clone(),
            challenge_id: id.clone(),
            version,
        },
    )?;

    match previous {
        Some(prev) => {
            repository::mark_superseded(conn, &prev.challenge_id, &id, now)?;
            info!(
                "[Store] Updated {} to v{}: {} supersedes {}",
                doc.path, version, id, prev.challenge_id
            );
            Ok(IngestResult::Updated {
                id,
                previous_id: prev.challenge_id,
                version,
            })
        }
        None => {
            info!("[Store] Created '{}' ({}) from {}", challenge.title, id, doc.path);
            Ok(IngestResult::Created { id, version })
        }
    }
}

pub fn get(conn: &Connection, id: &str) -> Result<Challenge> {
    repository::load_challenge(conn, id)?
        .ok_or_else(|| TrainerError::NotFound(format!("challenge {}", id)))
}

pub fn get_by_path(conn: &Connection, path: &str) -> Result<Challenge> {
    repository::load_challenge_by_path(conn, path)?
        .ok_or_else(|| TrainerError::NotFound(format!("challenge at {}", path)))
}

pub fn list(conn: &Connection, filter: &ChallengeFilter) -> Result<Vec<Challenge>> {
    repository::list_challenges(conn, filter)
}

/// One page of due challenges. The scan stops at `query.limit`; resume with
/// the returned cursor.
pub fn list_due(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    query: &DueQuery,
) -> Result<DuePage> {
    // one extra row tells us whether another page exists
    let fetch = query.limit.map(|l| l.saturating_add(1));
    let mut rows = repository::query_due(conn, user_id, now, query, fetch)?;

    let next_cursor = match query.limit {
        Some(limit) if rows.len() > limit => {
            rows.truncate(limit);
            rows.last().map(|(challenge, due_date)| DueCursor {
                due_date: *due_date,
                challenge_id: challenge.id.clone(),
            })
        }
        _ => None,
    };

    Ok(DuePage {
        challenges: rows.into_iter().map(|(challenge, _)| challenge).collect(),
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use crate::error::ValidationError;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn doc(path: &str, title: &str, body: &str) -> ChallengeDocument {
        ChallengeDocument::new(
            path,
            format!("---\ntitle: {}\ntags: [arrays]\n---\n{}\n", title, body),
        )
    }

    #[test]
    fn test_first_ingest_creates_version_one() {
        let conn = setup();
        let result = ingest(&conn, &doc("two-sum.md", "Two Sum", "body"), t0()).unwrap();
        let id = match &result {
            IngestResult::Created { id, version } => {
                assert_eq!(*version, 1);
                id.clone()
            }
            other => panic!("expected created, got {:?}", other),
        };

        let stored = get(&conn, &id).unwrap();
        assert_eq!(stored.title, "Two Sum");
        assert_eq!(stored.file_path, "two-sum.md");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.id, hasher::challenge_id(&stored.content_hash));
    }

    #[test]
    fn test_same_content_elsewhere_is_duplicate() {
        let conn = setup();
        let first = ingest(&conn, &doc("a/two-sum.md", "Two Sum", "body"), t0()).unwrap();
        let second = ingest(&conn, &doc("b/copy.md", "Two Sum", "body"), t0()).unwrap();

        assert_eq!(second, IngestResult::Duplicate { id: first.id().to_string() });
        assert_eq!(list(&conn, &ChallengeFilter::default()).unwrap().len(), 1);
        // the copy's path gets no pointer of its own
        assert!(matches!(
            get_by_path(&conn, "b/copy.md"),
            Err(TrainerError::NotFound(_))
        ));
    }

    #[test]
    fn test_edit_at_same_path_supersedes() {
        let conn = setup();
        let v1 = ingest(&conn, &doc("lru.md", "LRU Cache", "first draft"), t0()).unwrap();
        let v2 = ingest(&conn, &doc("lru.md", "LRU Cache", "second draft"), t0()).unwrap();

        match &v2 {
            IngestResult::Updated {
                id,
                previous_id,
                version,
            } => {
                assert_ne!(id, previous_id);
                assert_eq!(previous_id, v1.id());
                assert_eq!(*version, 2);
            }
            other => panic!("expected updated, got {:?}", other),
        }

        let old = get(&conn, v1.id()).unwrap();
        assert_eq!(old.superseded_by.as_deref(), Some(v2.id()));
        let current = get_by_path(&conn, "lru.md").unwrap();
        assert_eq!(current.id, v2.id());
        assert_eq!(current.version, 2);

        let listed = list(&conn, &ChallengeFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, v2.id());

        let v3 = ingest(&conn, &doc("lru.md", "LRU Cache", "third draft"), t0()).unwrap();
        assert!(matches!(v3, IngestResult::Updated { version: 3, .. }));
    }

    #[test]
    fn test_cosmetic_edit_is_duplicate() {
        let conn = setup();
        let raw = "---\ntitle: Two Sum\nauthor: a\n---\nbody\n";
        let edited = "---\ntitle: Two Sum\nauthor: someone else\n---\nbody   \n\n";
        let first = ingest(&conn, &ChallengeDocument::new("x.md", raw), t0()).unwrap();
        let second = ingest(&conn, &ChallengeDocument::new("x.md", edited), t0()).unwrap();
        assert_eq!(second, IngestResult::Duplicate { id: first.id().to_string() });
    }

    #[test]
    fn test_missing_title_fails_validation() {
        let conn = setup();
        let err = ingest(
            &conn,
            &ChallengeDocument::new("bad.md", "---\ntitle: \"\"\n---\nbody"),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TrainerError::Validation(ValidationError::MissingTitle)
        ));
        assert!(list(&conn, &ChallengeFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_get_unknown_id() {
        let conn = setup();
        assert!(matches!(get(&conn, "nope"), Err(TrainerError::NotFound(_))));
    }

    #[test]
    fn test_list_filters_by_tag_and_pattern() {
        let conn = setup();
        let graph = "---\ntitle: Clone Graph\ntags: [graphs]\npattern: BFS\n---\nbody";
        let tree = "---\ntitle: Invert Tree\ntags: [trees]\npattern: dfs\n---\nbody";
        ingest(&conn, &ChallengeDocument::new("g.md", graph), t0()).unwrap();
        ingest(&conn, &ChallengeDocument::new("t.md", tree), t0()).unwrap();

        let by_tag = list(
            &conn,
            &ChallengeFilter {
                tag: Some("graphs".into()),
                pattern: None,
            },
        )
        .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].title, "Clone Graph");

        let by_pattern = list(
            &conn,
            &ChallengeFilter {
                tag: None,
                pattern: Some("bfs".into()),
            },
        )
        .unwrap();
        assert_eq!(by_pattern.len(), 1);
        assert_eq!(by_pattern[0].title, "Clone Graph");

        let titles: Vec<_> = list(&conn, &ChallengeFilter::default())
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Clone Graph", "Invert Tree"]);
    }
}
