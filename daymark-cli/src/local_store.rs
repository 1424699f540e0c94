//! File-backed store: the in-memory backend serialized to one JSON file,
//! written after every successful mutation. This is what runs when no
//! `[remote]` section is configured.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};

use daymark_core::agenda::{Agenda, AgendaItem};
use daymark_core::memstore::MemoryStore;
use daymark_core::store::{
    AgendaStore, NewTag, NewTodo, StoreError, StoreResult, TagSeed, TagStore, TodoSeed,
    TodoStore, WeeklyTaskStore,
};
use daymark_core::tag::Tag;
use daymark_core::todo::{Context, Todo, TodoPatch};
use daymark_core::weekly::{NewWeeklyTask, WeeklyTask};

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = if path.exists() {
            let raw =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        } else {
            MemoryStore::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn persist(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.inner)
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| {
            StoreError::Transient(format!("write {}: {e}", self.path.display()))
        })
    }
}

impl TodoStore for LocalStore {
    async fn list_active(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.inner.list_active(user, context).await
    }

    async fn list_completed(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.inner.list_completed(user, context).await
    }

    async fn list_wont_do(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.inner.list_wont_do(user, context).await
    }

    async fn create_todo(
        &mut self,
        user: &str,
        context: Context,
        new: NewTodo,
    ) -> StoreResult<Todo> {
        let todo = self.inner.create_todo(user, context, new).await?;
        self.persist()?;
        Ok(todo)
    }

    async fn update_todo(&mut self, id: &str, patch: TodoPatch) -> StoreResult<Todo> {
        let todo = self.inner.update_todo(id, patch).await?;
        self.persist()?;
        Ok(todo)
    }

    async fn delete_todo(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_todo(id).await?;
        self.persist()
    }

    async fn reorder_todos(&mut self, todos: &[Todo]) -> StoreResult<()> {
        self.inner.reorder_todos(todos).await?;
        self.persist()
    }

    async fn bulk_create_todos(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TodoSeed],
    ) -> StoreResult<Vec<Todo>> {
        let todos = self.inner.bulk_create_todos(user, context, seeds).await?;
        self.persist()?;
        Ok(todos)
    }
}

impl TagStore for LocalStore {
    async fn list_tags(&mut self, user: &str, context: Context) -> StoreResult<Vec<Tag>> {
        self.inner.list_tags(user, context).await
    }

    async fn create_tag(&mut self, user: &str, context: Context, new: NewTag) -> StoreResult<Tag> {
        let tag = self.inner.create_tag(user, context, new).await?;
        self.persist()?;
        Ok(tag)
    }

    async fn delete_tag(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_tag(id).await?;
        self.persist()
    }

    async fn bulk_create_tags(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TagSeed],
    ) -> StoreResult<Vec<Tag>> {
        let tags = self.inner.bulk_create_tags(user, context, seeds).await?;
        self.persist()?;
        Ok(tags)
    }
}

impl WeeklyTaskStore for LocalStore {
    async fn list_weekly_tasks(
        &mut self,
        user: &str,
        context: Context,
    ) -> StoreResult<Vec<WeeklyTask>> {
        self.inner.list_weekly_tasks(user, context).await
    }

    async fn create_weekly_task(
        &mut self,
        user: &str,
        context: Context,
        new: NewWeeklyTask,
    ) -> StoreResult<WeeklyTask> {
        let task = self.inner.create_weekly_task(user, context, new).await?;
        self.persist()?;
        Ok(task)
    }

    async fn complete_weekly_task(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<WeeklyTask> {
        let task = self.inner.complete_weekly_task(id, now).await?;
        self.persist()?;
        Ok(task)
    }

    async fn uncomplete_weekly_task(&mut self, id: &str) -> StoreResult<WeeklyTask> {
        let task = self.inner.uncomplete_weekly_task(id).await?;
        self.persist()?;
        Ok(task)
    }

    async fn delete_weekly_task(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_weekly_task(id).await?;
        self.persist()
    }

    async fn reset_weekly_tasks(&mut self, user: &str, context: Context) -> StoreResult<()> {
        self.inner.reset_weekly_tasks(user, context).await?;
        self.persist()
    }
}

impl AgendaStore for LocalStore {
    async fn list_agendas(&mut self, user: &str) -> StoreResult<Vec<Agenda>> {
        self.inner.list_agendas(user).await
    }

    async fn create_agenda(&mut self, user: &str, title: &str) -> StoreResult<Agenda> {
        let agenda = self.inner.create_agenda(user, title).await?;
        self.persist()?;
        Ok(agenda)
    }

    async fn set_agenda_collapsed(&mut self, id: &str, collapsed: bool) -> StoreResult<Agenda> {
        let agenda = self.inner.set_agenda_collapsed(id, collapsed).await?;
        self.persist()?;
        Ok(agenda)
    }

    async fn delete_agenda(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_agenda(id).await?;
        self.persist()
    }

    async fn add_agenda_item(&mut self, agenda_id: &str, text: &str) -> StoreResult<AgendaItem> {
        let item = self.inner.add_agenda_item(agenda_id, text).await?;
        self.persist()?;
        Ok(item)
    }

    async fn delete_agenda_item(&mut self, item_id: &str) -> StoreResult<()> {
        self.inner.delete_agenda_item(item_id).await?;
        self.persist()
    }

    async fn reorder_agenda_items(
        &mut self,
        agenda_id: &str,
        items: &[AgendaItem],
    ) -> StoreResult<()> {
        self.inner.reorder_agenda_items(agenda_id, items).await?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daymark_core::store::User;

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let dir = std::env::temp_dir().join(format!("daymark-local-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        let user = User::local();

        {
            let mut store = LocalStore::open(&path).unwrap();
            store
                .create_todo(&user.id, Context::Work, NewTodo {
                    text: "persisted".to_string(),
                    ..NewTodo::default()
                })
                .await
                .unwrap();
        }

        let mut reopened = LocalStore::open(&path).unwrap();
        let todos = reopened.list_active(&user.id, Context::Work).await.unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].text, "persisted");

        fs::remove_dir_all(&dir).unwrap();
    }
}
