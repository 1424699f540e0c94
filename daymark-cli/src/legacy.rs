//! Parser for legacy local-storage dumps (`~/.daymark/legacy.json`).
//!
//! Early revisions persisted JSON under flat keys: `todos`, `doneTodos`,
//! `tags`, later prefixed per context (`work_todos`, `work_doneTodos`,
//! `work_tags`). Values are sometimes arrays and sometimes JSON re-encoded
//! as a string, depending on which revision wrote them. Parsing is lenient:
//! records missing or malformed are skipped, never fatal, so a half-broken
//! dump still migrates what it can.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use daymark_core::migrate::LegacySnapshot;
use daymark_core::store::{TagSeed, TodoSeed};
use daymark_core::todo::TagSnapshot;

/// Read and parse a legacy dump. A missing file yields an empty snapshot.
pub fn load_legacy_snapshot(path: &Path) -> Result<LegacySnapshot> {
    if !path.exists() {
        return Ok(LegacySnapshot::default());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let root: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(parse_snapshot(&root))
}

pub fn parse_snapshot(root: &Value) -> LegacySnapshot {
    LegacySnapshot {
        todos: lookup_array(root, "todos", "work_todos")
            .iter()
            .filter_map(|v| parse_todo(v, false))
            .collect(),
        done_todos: lookup_array(root, "doneTodos", "work_doneTodos")
            .iter()
            .filter_map(|v| parse_todo(v, true))
            .collect(),
        tags: lookup_array(root, "tags", "work_tags")
            .iter()
            .filter_map(parse_tag)
            .collect(),
    }
}

/// Find the first of two keys, unwrapping the string-encoded-JSON variant.
fn lookup_array(root: &Value, plain: &str, prefixed: &str) -> Vec<Value> {
    let value = root.get(plain).or_else(|| root.get(prefixed));
    let Some(value) = value else {
        return Vec::new();
    };
    let decoded;
    let value = match value {
        Value::String(inner) => match serde_json::from_str::<Value>(inner) {
            Ok(v) => {
                decoded = v;
                &decoded
            }
            Err(err) => {
                warn!(%err, key = plain, "legacy value is a string but not JSON; skipping");
                return Vec::new();
            }
        },
        other => other,
    };
    match value {
        Value::Array(items) => items.clone(),
        _ => {
            warn!(key = plain, "legacy value is not an array; skipping");
            Vec::new()
        }
    }
}

fn parse_todo(value: &Value, completed: bool) -> Option<TodoSeed> {
    let text = value.get("text")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    let completed = value
        .get("completed")
        .and_then(Value::as_bool)
        .unwrap_or(completed);
    Some(TodoSeed {
        text: text.to_string(),
        tags: value
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_tag_snapshot).collect())
            .unwrap_or_default(),
        completed,
        completed_date: completed
            .then(|| {
                value
                    .get("completedDate")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            })
            .flatten(),
        deadline: value
            .get("deadline")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<NaiveDate>().ok()),
    })
}

fn parse_tag_snapshot(value: &Value) -> Option<TagSnapshot> {
    // Oldest dumps stored tags on todos as bare name strings.
    if let Some(name) = value.as_str() {
        return Some(TagSnapshot {
            id: String::new(),
            name: name.to_string(),
            color: String::new(),
        });
    }
    Some(TagSnapshot {
        id: value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: value.get("name")?.as_str()?.to_string(),
        color: value
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn parse_tag(value: &Value) -> Option<TagSeed> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(TagSeed {
        name: name.to_string(),
        color: value
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or("#888888")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_keys() {
        let root = json!({
            "todos": [
                { "text": "write report", "deadline": "2026-09-01" },
                { "text": "" }
            ],
            "doneTodos": [
                { "text": "book flights", "completedDate": "2026-08-01T12:00:00Z" }
            ],
            "tags": [
                { "name": "errand", "color": "#ff0000" }
            ]
        });
        let snapshot = parse_snapshot(&root);
        assert_eq!(snapshot.todos.len(), 1);
        assert_eq!(snapshot.todos[0].text, "write report");
        assert_eq!(
            snapshot.todos[0].deadline,
            Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap())
        );
        assert_eq!(snapshot.done_todos.len(), 1);
        assert!(snapshot.done_todos[0].completed);
        assert!(snapshot.done_todos[0].completed_date.is_some());
        assert_eq!(snapshot.tags.len(), 1);
    }

    #[test]
    fn parses_prefixed_keys_and_string_encoded_values() {
        let root = json!({
            "work_todos": "[{\"text\":\"standup notes\"}]",
            "work_tags": "[{\"name\":\"meeting\",\"color\":\"#00ff00\"}]"
        });
        let snapshot = parse_snapshot(&root);
        assert_eq!(snapshot.todos.len(), 1);
        assert_eq!(snapshot.todos[0].text, "standup notes");
        assert_eq!(snapshot.tags[0].name, "meeting");
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let root = json!({
            "todos": [
                { "text": "keep me", "tags": ["old-style-tag"] },
                { "no_text": true },
                42
            ],
            "tags": "not even json arrays {{",
        });
        let snapshot = parse_snapshot(&root);
        assert_eq!(snapshot.todos.len(), 1);
        assert_eq!(snapshot.todos[0].tags[0].name, "old-style-tag");
        assert!(snapshot.tags.is_empty());
    }

    #[test]
    fn missing_file_is_an_empty_snapshot() {
        let path = std::env::temp_dir().join("daymark-no-such-legacy.json");
        let snapshot = load_legacy_snapshot(&path).unwrap();
        assert!(snapshot.is_empty());
    }
}
