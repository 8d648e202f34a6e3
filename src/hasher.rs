// src/hasher.rs
//! Content identity. Only title, normalized body, sorted tags and pattern
//! feed the fingerprint; path, author, source and timestamps never do.

use crate::models::ParsedChallenge;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Namespace for content-derived challenge ids.
const CHALLENGE_NAMESPACE: Uuid = Uuid::from_u128(0x5c0d_e4ec_a11f_4b1e_9d5e_c0de_4eca_11a7);

#[derive(Serialize)]
struct CanonicalForm<'a> {
    title: &'a str,
    body: String,
    tags: Vec<&'a str>,
    pattern: Option<&'a str>,
}

/// Strips trailing whitespace per line and blank lines at either end.
pub fn normalize_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

pub fn content_hash(parsed: &ParsedChallenge) -> String {
    let canonical = CanonicalForm {
        title: parsed.title.trim(),
        body: normalize_body(&parsed.body),
        // BTreeSet iteration is already sorted
        tags: parsed.tags.iter().map(String::as_str).collect(),
        pattern: parsed.pattern.as_deref().map(str::trim),
    };
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

pub fn challenge_id(content_hash: &str) -> String {
    Uuid::new_v5(&CHALLENGE_NAMESPACE, content_hash.as_bytes()).to_string()
}
