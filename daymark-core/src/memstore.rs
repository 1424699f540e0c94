//! In-memory store: the backend behind offline mode and the test double
//! for the engine. Holds every record in plain vectors; the CLI's file
//! backend serializes the whole thing to disk around each mutation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use serde::{Deserialize, Serialize};

use crate::agenda::{Agenda, AgendaItem};
use crate::store::{
    AgendaStore, NewTag, NewTodo, StoreError, StoreResult, TagSeed, TagStore, TodoSeed, TodoStore,
    WeeklyTaskStore,
};
use crate::tag::Tag;
use crate::todo::{Context, Todo, TodoPatch};
use crate::weekly::{NewWeeklyTask, WeeklyTask};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    pub todos: Vec<Todo>,
    pub tags: Vec<Tag>,
    pub weekly_tasks: Vec<WeeklyTask>,
    pub agendas: Vec<Agenda>,

    /// When set, every write fails with `Transient`. Lets tests (and fault
    /// drills) verify that a failed mutation leaves engine state untouched.
    #[serde(skip)]
    pub fail_writes: bool,

    /// Write-path counters, observable by integration tests.
    #[serde(skip)]
    pub reorder_calls: usize,
    #[serde(skip)]
    pub bulk_todo_calls: usize,
    #[serde(skip)]
    pub bulk_tag_calls: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Transient("write failure injected".to_string()));
        }
        Ok(())
    }

    fn next_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn next_sort_order(&self, user: &str, context: Context) -> i64 {
        self.todos
            .iter()
            .filter(|t| t.user_id == user && t.context == context && t.is_active())
            .filter_map(|t| t.sort_order)
            .max()
            .map_or(0, |max| max + 1)
    }

    fn todo_mut(&mut self, id: &str) -> StoreResult<&mut Todo> {
        self.todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("todo {id}")))
    }

    fn seeded_todo(&self, user: &str, context: Context, seed: &TodoSeed, now: DateTime<Utc>) -> Todo {
        Todo {
            id: Self::next_id(),
            user_id: user.to_string(),
            context,
            text: seed.text.clone(),
            tags: seed.tags.clone(),
            completed: seed.completed,
            completed_date: seed.completed_date,
            wont_do: false,
            wont_do_date: None,
            deadline: seed.deadline,
            sort_order: None,
            created_at: now,
        }
    }
}

impl TodoStore for MemoryStore {
    async fn list_active(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        let mut out: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| t.user_id == user && t.context == context && t.is_active())
            .cloned()
            .collect();
        // Positions ascending nulls-last, then creation time: the order the
        // backing query would return.
        out.sort_by(|a, b| match (a.sort_order, b.sort_order) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        });
        Ok(out)
    }

    async fn list_completed(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        let mut out: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| t.user_id == user && t.context == context && t.completed)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.completed_date.cmp(&a.completed_date));
        Ok(out)
    }

    async fn list_wont_do(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        let mut out: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| t.user_id == user && t.context == context && t.wont_do)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.wont_do_date.cmp(&a.wont_do_date));
        Ok(out)
    }

    async fn create_todo(
        &mut self,
        user: &str,
        context: Context,
        new: NewTodo,
    ) -> StoreResult<Todo> {
        self.check_writable()?;
        let todo = Todo {
            id: Self::next_id(),
            user_id: user.to_string(),
            context,
            text: new.text,
            tags: new.tags,
            completed: false,
            completed_date: None,
            wont_do: false,
            wont_do_date: None,
            deadline: new.deadline,
            sort_order: Some(self.next_sort_order(user, context)),
            created_at: Utc::now(),
        };
        self.todos.push(todo.clone());
        Ok(todo)
    }

    async fn update_todo(&mut self, id: &str, patch: TodoPatch) -> StoreResult<Todo> {
        self.check_writable()?;
        let todo = self.todo_mut(id)?;
        patch.apply(todo);
        Ok(todo.clone())
    }

    async fn delete_todo(&mut self, id: &str) -> StoreResult<()> {
        self.check_writable()?;
        let before = self.todos.len();
        self.todos.retain(|t| t.id != id);
        if self.todos.len() == before {
            return Err(StoreError::NotFound(format!("todo {id}")));
        }
        Ok(())
    }

    async fn reorder_todos(&mut self, todos: &[Todo]) -> StoreResult<()> {
        self.check_writable()?;
        self.reorder_calls += 1;
        for (index, ordered) in todos.iter().enumerate() {
            let row = self.todo_mut(&ordered.id)?;
            row.sort_order = Some(index as i64);
        }
        Ok(())
    }

    async fn bulk_create_todos(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TodoSeed],
    ) -> StoreResult<Vec<Todo>> {
        self.check_writable()?;
        self.bulk_todo_calls += 1;
        let now = Utc::now();
        let created: Vec<Todo> = seeds
            .iter()
            .map(|seed| self.seeded_todo(user, context, seed, now))
            .collect();
        self.todos.extend(created.iter().cloned());
        Ok(created)
    }
}

impl TagStore for MemoryStore {
    async fn list_tags(&mut self, user: &str, context: Context) -> StoreResult<Vec<Tag>> {
        let mut out: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| t.user_id == user && t.context == context)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn create_tag(&mut self, user: &str, context: Context, new: NewTag) -> StoreResult<Tag> {
        self.check_writable()?;
        let duplicate = self
            .tags
            .iter()
            .any(|t| t.user_id == user && t.context == context && t.name == new.name);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "tag name already exists: {}",
                new.name
            )));
        }
        let tag = Tag {
            id: Self::next_id(),
            user_id: user.to_string(),
            context,
            name: new.name,
            color: new.color,
            created_at: Utc::now(),
        };
        self.tags.push(tag.clone());
        Ok(tag)
    }

    async fn delete_tag(&mut self, id: &str) -> StoreResult<()> {
        self.check_writable()?;
        let before = self.tags.len();
        self.tags.retain(|t| t.id != id);
        if self.tags.len() == before {
            return Err(StoreError::NotFound(format!("tag {id}")));
        }
        Ok(())
    }

    async fn bulk_create_tags(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TagSeed],
    ) -> StoreResult<Vec<Tag>> {
        self.check_writable()?;
        self.bulk_tag_calls += 1;
        let now = Utc::now();
        let created: Vec<Tag> = seeds
            .iter()
            .map(|seed| Tag {
                id: Self::next_id(),
                user_id: user.to_string(),
                context,
                name: seed.name.clone(),
                color: seed.color.clone(),
                created_at: now,
            })
            .collect();
        self.tags.extend(created.iter().cloned());
        Ok(created)
    }
}

impl WeeklyTaskStore for MemoryStore {
    async fn list_weekly_tasks(
        &mut self,
        user: &str,
        context: Context,
    ) -> StoreResult<Vec<WeeklyTask>> {
        let mut out: Vec<WeeklyTask> = self
            .weekly_tasks
            .iter()
            .filter(|t| t.user_id == user && t.context == context)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.day_of_week);
        Ok(out)
    }

    async fn create_weekly_task(
        &mut self,
        user: &str,
        context: Context,
        new: NewWeeklyTask,
    ) -> StoreResult<WeeklyTask> {
        self.check_writable()?;
        let task = WeeklyTask {
            id: Self::next_id(),
            user_id: user.to_string(),
            context,
            text: new.text,
            day_of_week: new.day_of_week,
            completed_this_week: false,
            last_completed_date: None,
            created_at: Utc::now(),
        };
        self.weekly_tasks.push(task.clone());
        Ok(task)
    }

    async fn complete_weekly_task(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<WeeklyTask> {
        self.check_writable()?;
        let task = self
            .weekly_tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("weekly task {id}")))?;
        task.completed_this_week = true;
        task.last_completed_date = Some(now);
        Ok(task.clone())
    }

    async fn uncomplete_weekly_task(&mut self, id: &str) -> StoreResult<WeeklyTask> {
        self.check_writable()?;
        let task = self
            .weekly_tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("weekly task {id}")))?;
        task.completed_this_week = false;
        Ok(task.clone())
    }

    async fn delete_weekly_task(&mut self, id: &str) -> StoreResult<()> {
        self.check_writable()?;
        let before = self.weekly_tasks.len();
        self.weekly_tasks.retain(|t| t.id != id);
        if self.weekly_tasks.len() == before {
            return Err(StoreError::NotFound(format!("weekly task {id}")));
        }
        Ok(())
    }

    async fn reset_weekly_tasks(&mut self, user: &str, context: Context) -> StoreResult<()> {
        self.check_writable()?;
        for task in self
            .weekly_tasks
            .iter_mut()
            .filter(|t| t.user_id == user && t.context == context)
        {
            task.completed_this_week = false;
        }
        Ok(())
    }
}

impl AgendaStore for MemoryStore {
    async fn list_agendas(&mut self, user: &str) -> StoreResult<Vec<Agenda>> {
        let mut out: Vec<Agenda> = self
            .agendas
            .iter()
            .filter(|a| a.user_id == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn create_agenda(&mut self, user: &str, title: &str) -> StoreResult<Agenda> {
        self.check_writable()?;
        let now = Utc::now();
        let agenda = Agenda {
            id: Self::next_id(),
            user_id: user.to_string(),
            title: title.to_string(),
            is_collapsed: true,
            items: vec![],
            created_at: now,
            updated_at: now,
        };
        self.agendas.push(agenda.clone());
        Ok(agenda)
    }

    async fn set_agenda_collapsed(&mut self, id: &str, collapsed: bool) -> StoreResult<Agenda> {
        self.check_writable()?;
        let agenda = self
            .agendas
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("agenda {id}")))?;
        agenda.is_collapsed = collapsed;
        agenda.updated_at = Utc::now();
        Ok(agenda.clone())
    }

    async fn delete_agenda(&mut self, id: &str) -> StoreResult<()> {
        self.check_writable()?;
        let before = self.agendas.len();
        self.agendas.retain(|a| a.id != id);
        if self.agendas.len() == before {
            return Err(StoreError::NotFound(format!("agenda {id}")));
        }
        Ok(())
    }

    async fn add_agenda_item(&mut self, agenda_id: &str, text: &str) -> StoreResult<AgendaItem> {
        self.check_writable()?;
        let agenda = self
            .agendas
            .iter_mut()
            .find(|a| a.id == agenda_id)
            .ok_or_else(|| StoreError::NotFound(format!("agenda {agenda_id}")))?;
        let item = AgendaItem {
            id: Self::next_id(),
            agenda_id: agenda_id.to_string(),
            text: text.to_string(),
            sort_order: agenda.items.len() as i64,
            created_at: Utc::now(),
        };
        agenda.items.push(item.clone());
        agenda.updated_at = item.created_at;
        Ok(item)
    }

    async fn delete_agenda_item(&mut self, item_id: &str) -> StoreResult<()> {
        self.check_writable()?;
        for agenda in self.agendas.iter_mut() {
            let before = agenda.items.len();
            agenda.items.retain(|i| i.id != item_id);
            if agenda.items.len() != before {
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("agenda item {item_id}")))
    }

    async fn reorder_agenda_items(
        &mut self,
        agenda_id: &str,
        items: &[AgendaItem],
    ) -> StoreResult<()> {
        self.check_writable()?;
        let agenda = self
            .agendas
            .iter_mut()
            .find(|a| a.id == agenda_id)
            .ok_or_else(|| StoreError::NotFound(format!("agenda {agenda_id}")))?;
        for (index, ordered) in items.iter().enumerate() {
            if let Some(item) = agenda.items.iter_mut().find(|i| i.id == ordered.id) {
                item.sort_order = index as i64;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_tag_name_is_a_conflict() {
        let mut store = MemoryStore::new();
        let new = NewTag {
            name: "errands".to_string(),
            color: "#14b8a6".to_string(),
        };
        store
            .create_tag("u1", Context::Work, new.clone())
            .await
            .unwrap();

        let err = store.create_tag("u1", Context::Work, new.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Same name in the other context is fine.
        store.create_tag("u1", Context::Personal, new).await.unwrap();
    }

    #[tokio::test]
    async fn reorder_rewrites_positions_dense() {
        let mut store = MemoryStore::new();
        for text in ["a", "b", "c"] {
            store
                .create_todo("u1", Context::Work, NewTodo {
                    text: text.to_string(),
                    ..NewTodo::default()
                })
                .await
                .unwrap();
        }
        let mut active = store.list_active("u1", Context::Work).await.unwrap();
        active.reverse();
        store.reorder_todos(&active).await.unwrap();

        let after = store.list_active("u1", Context::Work).await.unwrap();
        let positions: Vec<Option<i64>> = after.iter().map(|t| t.sort_order).collect();
        assert_eq!(positions, [Some(0), Some(1), Some(2)]);
        assert_eq!(after[0].text, "c");
    }

    #[tokio::test]
    async fn create_assigns_next_position() {
        let mut store = MemoryStore::new();
        let first = store
            .create_todo("u1", Context::Work, NewTodo {
                text: "first".to_string(),
                ..NewTodo::default()
            })
            .await
            .unwrap();
        let second = store
            .create_todo("u1", Context::Work, NewTodo {
                text: "second".to_string(),
                ..NewTodo::default()
            })
            .await
            .unwrap();
        assert_eq!(first.sort_order, Some(0));
        assert_eq!(second.sort_order, Some(1));
    }

    #[tokio::test]
    async fn injected_failure_blocks_writes() {
        let mut store = MemoryStore::new();
        store.fail_writes = true;
        let err = store
            .create_todo("u1", Context::Work, NewTodo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));
        assert!(store.todos.is_empty());
    }
}
