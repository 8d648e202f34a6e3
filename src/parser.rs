// src/parser.rs
//! Challenge documents are Markdown with a YAML front-matter block:
//!
//! ```text
//! ---
//! title: Two Sum
//! tags: [arrays, hashing]
//! pattern: hash-map
//! ---
//! Given an array of integers...
//! ```

use crate::constants::TAG_MAX_LEN;
use crate::error::ValidationError;
use crate::models::ParsedChallenge;
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Deserialize, Default)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    tags: Option<TagList>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// `tags: [a, b]` or `tags: "a, b"`. List items may be bare YAML scalars
/// such as `1` or `true`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    List(Vec<serde_yaml::Value>),
    Inline(String),
}

pub fn parse(raw: &str) -> Result<ParsedChallenge, ValidationError> {
    let normalized = raw.replace("\r\n", "\n");
    let text = normalized.trim_start_matches('\u{feff}');

    let (yaml, body) = split_front_matter(text)?;
    let front = match yaml {
        Some(y) if !y.trim().is_empty() => serde_yaml::from_str::<FrontMatter>(y)
            .map_err(|e| ValidationError::MalformedFrontMatter(e.to_string()))?,
        _ => FrontMatter::default(),
    };

    let title = clean(front.title).ok_or(ValidationError::MissingTitle)?;
    let tags = collect_tags(front.tags)?;

    debug!(
        "[Parser] Parsed '{}' ({} tags, {} extra keys)",
        title,
        tags.len(),
        front.extra.len()
    );

    Ok(ParsedChallenge {
        title,
        author: clean(front.author),
        source: clean(front.source),
        tags,
        pattern: clean(front.pattern),
        body: body.to_string(),
        extra: front.extra,
    })
}

pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= TAG_MAX_LEN
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Returns (front matter yaml, body). A document that does not open with
/// `---` has no front matter at all.
fn split_front_matter(text: &str) -> Result<(Option<&str>, &str), ValidationError> {
    let (first, rest) = match text.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (text, ""),
    };
    if first.trim_end() != "---" {
        return Ok((None, text));
    }

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let marker = line.trim_end();
        if marker == "---" || marker == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err(ValidationError::MalformedFrontMatter(
        "front matter block is not closed with '---'".to_string(),
    ))
}

fn collect_tags(tags: Option<TagList>) -> Result<BTreeSet<String>, ValidationError> {
    let raw: Vec<String> = match tags {
        None => Vec::new(),
        Some(TagList::List(list)) => list
            .into_iter()
            .map(scalar_tag)
            .collect::<Result<_, _>>()?,
        Some(TagList::Inline(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let mut set = BTreeSet::new();
    for tag in raw {
        if !is_valid_tag(&tag) {
            return Err(ValidationError::InvalidTag(tag));
        }
        set.insert(tag);
    }
    Ok(set)
}

fn scalar_tag(value: serde_yaml::Value) -> Result<String, ValidationError> {
    use serde_yaml::Value;
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => {
            let shown = serde_yaml::to_string(&other)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| format!("{:?}", other));
            Err(ValidationError::InvalidTag(shown))
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
