//! Storage and auth contracts.
//!
//! The engine is generic over these traits; any CRUD backend (HTTP, local
//! file, in-memory) is conformant as long as it honors the operation shapes
//! and reports failures through [`StoreError`] kinds. The engine branches on
//! kind, never on message text.
//!
//! Methods take `&mut self`: mutations are sequential, discrete user
//! actions. There is no request fencing below the engine's reorder
//! sequencer.

#![allow(async_fn_in_trait)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agenda::{Agenda, AgendaItem};
use crate::tag::Tag;
use crate::todo::{Context, TagSnapshot, Todo, TodoPatch};
use crate::weekly::{NewWeeklyTask, WeeklyTask};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation, e.g. a duplicate tag name.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Network or backend failure; the mutation may be retried by the user,
    /// never automatically.
    #[error("store failure: {0}")]
    Transient(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Create request for a todo. The store assigns id, sort position and
/// creation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTodo {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<TagSnapshot>,
    pub deadline: Option<NaiveDate>,
}

/// Create request for a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

/// Bulk-create record for the one-shot legacy migration. Unlike [`NewTodo`]
/// it carries completion state so done items survive the move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoSeed {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<TagSnapshot>,
    #[serde(default)]
    pub completed: bool,
    pub completed_date: Option<DateTime<Utc>>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSeed {
    pub name: String,
    pub color: String,
}

pub trait TodoStore {
    async fn list_active(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>>;
    async fn list_completed(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>>;
    async fn list_wont_do(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>>;

    async fn create_todo(
        &mut self,
        user: &str,
        context: Context,
        new: NewTodo,
    ) -> StoreResult<Todo>;

    async fn update_todo(&mut self, id: &str, patch: TodoPatch) -> StoreResult<Todo>;
    async fn delete_todo(&mut self, id: &str) -> StoreResult<()>;

    /// Persist manual order: positions are rewritten dense, 0..n-1, in the
    /// order given.
    async fn reorder_todos(&mut self, todos: &[Todo]) -> StoreResult<()>;

    async fn bulk_create_todos(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TodoSeed],
    ) -> StoreResult<Vec<Todo>>;

    // Completion-state transition conveniences; the patch constructors
    // guarantee the vacated state's fields are cleared in the same update.

    async fn mark_completed(&mut self, id: &str, now: DateTime<Utc>) -> StoreResult<Todo> {
        self.update_todo(id, TodoPatch::completed(now)).await
    }

    async fn mark_uncompleted(&mut self, id: &str) -> StoreResult<Todo> {
        self.update_todo(id, TodoPatch::uncompleted()).await
    }

    async fn mark_wont_do(&mut self, id: &str, now: DateTime<Utc>) -> StoreResult<Todo> {
        self.update_todo(id, TodoPatch::wont_do(now)).await
    }

    async fn mark_will_do(&mut self, id: &str) -> StoreResult<Todo> {
        self.update_todo(id, TodoPatch::will_do()).await
    }
}

pub trait TagStore {
    async fn list_tags(&mut self, user: &str, context: Context) -> StoreResult<Vec<Tag>>;

    /// Fails with [`StoreError::Conflict`] when the name already exists in
    /// this (user, context).
    async fn create_tag(&mut self, user: &str, context: Context, new: NewTag) -> StoreResult<Tag>;

    /// Deletes the tag record only; cascading the reference out of todo tag
    /// sets is the engine's job.
    async fn delete_tag(&mut self, id: &str) -> StoreResult<()>;

    async fn bulk_create_tags(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TagSeed],
    ) -> StoreResult<Vec<Tag>>;
}

pub trait WeeklyTaskStore {
    async fn list_weekly_tasks(
        &mut self,
        user: &str,
        context: Context,
    ) -> StoreResult<Vec<WeeklyTask>>;

    async fn create_weekly_task(
        &mut self,
        user: &str,
        context: Context,
        new: NewWeeklyTask,
    ) -> StoreResult<WeeklyTask>;

    async fn complete_weekly_task(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<WeeklyTask>;

    async fn uncomplete_weekly_task(&mut self, id: &str) -> StoreResult<WeeklyTask>;

    async fn delete_weekly_task(&mut self, id: &str) -> StoreResult<()>;

    /// Clear every completion flag for a (user, context). The once-per-day
    /// gate lives above this, in the engine.
    async fn reset_weekly_tasks(&mut self, user: &str, context: Context) -> StoreResult<()>;
}

pub trait AgendaStore {
    async fn list_agendas(&mut self, user: &str) -> StoreResult<Vec<Agenda>>;
    async fn create_agenda(&mut self, user: &str, title: &str) -> StoreResult<Agenda>;
    async fn set_agenda_collapsed(&mut self, id: &str, collapsed: bool) -> StoreResult<Agenda>;
    async fn delete_agenda(&mut self, id: &str) -> StoreResult<()>;

    async fn add_agenda_item(&mut self, agenda_id: &str, text: &str) -> StoreResult<AgendaItem>;
    async fn delete_agenda_item(&mut self, item_id: &str) -> StoreResult<()>;
    async fn reorder_agenda_items(
        &mut self,
        agenda_id: &str,
        items: &[AgendaItem],
    ) -> StoreResult<()>;
}

/// Everything the engine needs from a backend.
pub trait Stores: TodoStore + TagStore + WeeklyTaskStore + AgendaStore {}
impl<S: TodoStore + TagStore + WeeklyTaskStore + AgendaStore> Stores for S {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

impl User {
    /// The fixed local identity used by the file-backed backend when no
    /// remote service is configured.
    pub fn local() -> Self {
        Self {
            id: "local-user".to_string(),
            email: "local@daymark".to_string(),
        }
    }
}

/// Auth collaborator. A session change in a CLI process is observed by the
/// next `current_user` call; there is no push notification channel.
pub trait AuthProvider {
    async fn current_user(&mut self) -> StoreResult<Option<User>>;
    async fn sign_in(&mut self, token: &str) -> StoreResult<User>;
    async fn sign_out(&mut self) -> StoreResult<()>;
}
