//! Todo model: the record shape shared by every storage backend.

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user-chosen partition of todos, tags and weekly tasks.
///
/// Agendas are deliberately not partitioned; see `crate::agenda`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Work,
    Personal,
}

impl Context {
    pub const ALL: [Context; 2] = [Context::Work, Context::Personal];

    pub fn as_str(self) -> &'static str {
        match self {
            Context::Work => "work",
            Context::Personal => "personal",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Context::Work),
            "personal" => Ok(Context::Personal),
            other => bail!("unknown context: {other} (expected work|personal)"),
        }
    }
}

/// Denormalized tag reference carried on a todo.
///
/// Todos store snapshots, not foreign keys, so a tag rename or recolor does
/// not rewrite history; deletion cascades are handled by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Core todo record.
///
/// Kept small and serializable; storage backends exchange it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub context: Context,
    pub text: String,

    #[serde(default)]
    pub tags: Vec<TagSnapshot>,

    pub completed: bool,
    pub completed_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub wont_do: bool,
    #[serde(default)]
    pub wont_do_date: Option<DateTime<Utc>>,

    /// Calendar-date deadline; urgency is derived lazily at sort time.
    pub deadline: Option<NaiveDate>,

    /// Manual position within the active list. Null until the user reorders;
    /// rewritten dense 0..n-1 on every persisted reorder.
    pub sort_order: Option<i64>,

    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(id: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            context: Context::Work,
            text: text.into(),
            tags: vec![],
            completed: false,
            completed_date: None,
            wont_do: false,
            wont_do_date: None,
            deadline: None,
            sort_order: None,
            created_at,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn with_tags(mut self, tags: Vec<TagSnapshot>) -> Self {
        self.tags = tags;
        self
    }

    pub fn is_active(&self) -> bool {
        !self.completed && !self.wont_do
    }
}

/// Partial update sent to the store. Fields left `None` are untouched;
/// `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wont_do: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wont_do_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<Option<i64>>,
}

impl TodoPatch {
    /// Transition to completed. Clears won't-do in the same update so the
    /// two terminal-ish states can never both be set: last transition wins.
    pub fn completed(now: DateTime<Utc>) -> Self {
        Self {
            completed: Some(true),
            completed_date: Some(Some(now)),
            wont_do: Some(false),
            wont_do_date: Some(None),
            ..Self::default()
        }
    }

    /// Transition back to active from completed.
    pub fn uncompleted() -> Self {
        Self {
            completed: Some(false),
            completed_date: Some(None),
            ..Self::default()
        }
    }

    /// Transition to won't-do. Clears completion, same rationale as
    /// [`TodoPatch::completed`].
    pub fn wont_do(now: DateTime<Utc>) -> Self {
        Self {
            wont_do: Some(true),
            wont_do_date: Some(Some(now)),
            completed: Some(false),
            completed_date: Some(None),
            ..Self::default()
        }
    }

    /// Transition back to active from won't-do.
    pub fn will_do() -> Self {
        Self {
            wont_do: Some(false),
            wont_do_date: Some(None),
            ..Self::default()
        }
    }

    pub fn set_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn set_deadline(deadline: Option<NaiveDate>) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn set_tags(tags: Vec<TagSnapshot>) -> Self {
        Self {
            tags: Some(tags),
            ..Self::default()
        }
    }

    /// Apply this patch to a record in place. Backends that own their rows
    /// (memory, local file) use this; the HTTP backend sends the patch over
    /// the wire instead.
    pub fn apply(&self, todo: &mut Todo) {
        if let Some(text) = &self.text {
            todo.text = text.clone();
        }
        if let Some(tags) = &self.tags {
            todo.tags = tags.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(completed_date) = self.completed_date {
            todo.completed_date = completed_date;
        }
        if let Some(wont_do) = self.wont_do {
            todo.wont_do = wont_do;
        }
        if let Some(wont_do_date) = self.wont_do_date {
            todo.wont_do_date = wont_do_date;
        }
        if let Some(deadline) = self.deadline {
            todo.deadline = deadline;
        }
        if let Some(sort_order) = self.sort_order {
            todo.sort_order = sort_order;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn context_round_trips_through_str() {
        for ctx in Context::ALL {
            assert_eq!(ctx.as_str().parse::<Context>().unwrap(), ctx);
        }
        assert!("school".parse::<Context>().is_err());
    }

    #[test]
    fn completed_patch_clears_wont_do() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut t = Todo::new("t1", "write report", now);
        t.wont_do = true;
        t.wont_do_date = Some(now);

        TodoPatch::completed(now).apply(&mut t);

        assert!(t.completed);
        assert_eq!(t.completed_date, Some(now));
        assert!(!t.wont_do);
        assert_eq!(t.wont_do_date, None);
    }

    #[test]
    fn wont_do_patch_clears_completion() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut t = Todo::new("t1", "write report", now);
        t.completed = true;
        t.completed_date = Some(now);

        TodoPatch::wont_do(now).apply(&mut t);

        assert!(t.wont_do);
        assert!(!t.completed);
        assert_eq!(t.completed_date, None);
    }

    #[test]
    fn patch_serializes_cleared_fields_as_null() {
        let patch = TodoPatch::uncompleted();
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["completed"], serde_json::json!(false));
        assert_eq!(json["completed_date"], serde_json::Value::Null);
        assert!(json.get("wont_do").is_none());
    }
}
