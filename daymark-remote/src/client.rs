//! REST store client.
//!
//! JSON over HTTP against a generic CRUD backend. Failures are folded into
//! `StoreError` kinds so callers branch on kind, never on message text:
//! 401/403 -> Unauthorized, 404 -> NotFound, 409 -> Conflict, anything else
//! (including transport errors) -> Transient.

use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use daymark_core::agenda::{Agenda, AgendaItem};
use daymark_core::store::{
    AgendaStore, NewTag, NewTodo, StoreError, StoreResult, TagSeed, TagStore, TodoSeed,
    TodoStore, WeeklyTaskStore,
};
use daymark_core::tag::Tag;
use daymark_core::todo::{Context, Todo, TodoPatch};
use daymark_core::weekly::{NewWeeklyTask, WeeklyTask};

#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<T> {
        debug!(path, "GET");
        let req = self.http.get(self.endpoint(path)).query(query);
        let resp = self.authed(req).send().await.map_err(transport)?;
        read_json(resp).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> StoreResult<T> {
        debug!(%method, path, "request");
        let req = self
            .http
            .request(method, self.endpoint(path))
            .query(query)
            .json(body);
        let resp = self.authed(req).send().await.map_err(transport)?;
        read_json(resp).await
    }

    async fn send_no_content<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> StoreResult<()> {
        debug!(%method, path, "request");
        let mut req = self.http.request(method, self.endpoint(path)).query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = self.authed(req).send().await.map_err(transport)?;
        expect_success(resp).await
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.send_no_content::<()>(reqwest::Method::DELETE, path, &[], None)
            .await
    }

    async fn list_todos(
        &self,
        user: &str,
        context: Context,
        bucket: &str,
    ) -> StoreResult<Vec<Todo>> {
        self.get_json(
            "todos",
            &[
                ("user_id", user),
                ("context", context.as_str()),
                ("bucket", bucket),
            ],
        )
        .await
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transient(err.to_string())
}

pub(crate) fn error_from_status(status: StatusCode, body: String) -> StoreError {
    match status.as_u16() {
        401 | 403 => StoreError::Unauthorized,
        404 => StoreError::NotFound(body),
        409 => StoreError::Conflict(body),
        _ => StoreError::Transient(format!("http {status}: {body}")),
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> StoreResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_from_status(status, body));
    }
    resp.json().await.map_err(transport)
}

async fn expect_success(resp: Response) -> StoreResult<()> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_from_status(status, body));
    }
    Ok(())
}

#[derive(Serialize)]
struct OrderEntry<'a> {
    id: &'a str,
    sort_order: i64,
}

fn order_entries<'a, I, T>(items: I, id: fn(&'a T) -> &'a str) -> Vec<OrderEntry<'a>>
where
    I: IntoIterator<Item = &'a T>,
    T: 'a,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| OrderEntry {
            id: id(item),
            sort_order: index as i64,
        })
        .collect()
}

impl TodoStore for RemoteStore {
    async fn list_active(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.list_todos(user, context, "active").await
    }

    async fn list_completed(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.list_todos(user, context, "completed").await
    }

    async fn list_wont_do(&mut self, user: &str, context: Context) -> StoreResult<Vec<Todo>> {
        self.list_todos(user, context, "wont_do").await
    }

    async fn create_todo(
        &mut self,
        user: &str,
        context: Context,
        new: NewTodo,
    ) -> StoreResult<Todo> {
        self.send_json(
            reqwest::Method::POST,
            "todos",
            &[("user_id", user), ("context", context.as_str())],
            &new,
        )
        .await
    }

    async fn update_todo(&mut self, id: &str, patch: TodoPatch) -> StoreResult<Todo> {
        self.send_json(reqwest::Method::PATCH, &format!("todos/{id}"), &[], &patch)
            .await
    }

    async fn delete_todo(&mut self, id: &str) -> StoreResult<()> {
        self.delete(&format!("todos/{id}")).await
    }

    async fn reorder_todos(&mut self, todos: &[Todo]) -> StoreResult<()> {
        let entries = order_entries(todos, |t: &Todo| t.id.as_str());
        self.send_no_content(reqwest::Method::POST, "todos/reorder", &[], Some(&entries))
            .await
    }

    async fn bulk_create_todos(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TodoSeed],
    ) -> StoreResult<Vec<Todo>> {
        self.send_json(
            reqwest::Method::POST,
            "todos/bulk",
            &[("user_id", user), ("context", context.as_str())],
            &seeds,
        )
        .await
    }
}

impl TagStore for RemoteStore {
    async fn list_tags(&mut self, user: &str, context: Context) -> StoreResult<Vec<Tag>> {
        self.get_json(
            "tags",
            &[("user_id", user), ("context", context.as_str())],
        )
        .await
    }

    async fn create_tag(&mut self, user: &str, context: Context, new: NewTag) -> StoreResult<Tag> {
        self.send_json(
            reqwest::Method::POST,
            "tags",
            &[("user_id", user), ("context", context.as_str())],
            &new,
        )
        .await
    }

    async fn delete_tag(&mut self, id: &str) -> StoreResult<()> {
        self.delete(&format!("tags/{id}")).await
    }

    async fn bulk_create_tags(
        &mut self,
        user: &str,
        context: Context,
        seeds: &[TagSeed],
    ) -> StoreResult<Vec<Tag>> {
        self.send_json(
            reqwest::Method::POST,
            "tags/bulk",
            &[("user_id", user), ("context", context.as_str())],
            &seeds,
        )
        .await
    }
}

#[derive(Serialize)]
struct WeeklyCompletionPatch {
    completed_this_week: bool,
    last_completed_date: Option<DateTime<Utc>>,
}

impl WeeklyTaskStore for RemoteStore {
    async fn list_weekly_tasks(
        &mut self,
        user: &str,
        context: Context,
    ) -> StoreResult<Vec<WeeklyTask>> {
        self.get_json(
            "weekly-tasks",
            &[("user_id", user), ("context", context.as_str())],
        )
        .await
    }

    async fn create_weekly_task(
        &mut self,
        user: &str,
        context: Context,
        new: NewWeeklyTask,
    ) -> StoreResult<WeeklyTask> {
        self.send_json(
            reqwest::Method::POST,
            "weekly-tasks",
            &[("user_id", user), ("context", context.as_str())],
            &new,
        )
        .await
    }

    async fn complete_weekly_task(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<WeeklyTask> {
        self.send_json(
            reqwest::Method::PATCH,
            &format!("weekly-tasks/{id}"),
            &[],
            &WeeklyCompletionPatch {
                completed_this_week: true,
                last_completed_date: Some(now),
            },
        )
        .await
    }

    async fn uncomplete_weekly_task(&mut self, id: &str) -> StoreResult<WeeklyTask> {
        #[derive(Serialize)]
        struct Patch {
            completed_this_week: bool,
        }
        self.send_json(
            reqwest::Method::PATCH,
            &format!("weekly-tasks/{id}"),
            &[],
            &Patch {
                completed_this_week: false,
            },
        )
        .await
    }

    async fn delete_weekly_task(&mut self, id: &str) -> StoreResult<()> {
        self.delete(&format!("weekly-tasks/{id}")).await
    }

    async fn reset_weekly_tasks(&mut self, user: &str, context: Context) -> StoreResult<()> {
        self.send_no_content::<()>(
            reqwest::Method::POST,
            "weekly-tasks/reset",
            &[("user_id", user), ("context", context.as_str())],
            None,
        )
        .await
    }
}

impl AgendaStore for RemoteStore {
    async fn list_agendas(&mut self, user: &str) -> StoreResult<Vec<Agenda>> {
        self.get_json("agendas", &[("user_id", user)]).await
    }

    async fn create_agenda(&mut self, user: &str, title: &str) -> StoreResult<Agenda> {
        #[derive(Serialize)]
        struct Body<'a> {
            title: &'a str,
        }
        self.send_json(
            reqwest::Method::POST,
            "agendas",
            &[("user_id", user)],
            &Body { title },
        )
        .await
    }

    async fn set_agenda_collapsed(&mut self, id: &str, collapsed: bool) -> StoreResult<Agenda> {
        #[derive(Serialize)]
        struct Body {
            is_collapsed: bool,
        }
        self.send_json(
            reqwest::Method::PATCH,
            &format!("agendas/{id}"),
            &[],
            &Body {
                is_collapsed: collapsed,
            },
        )
        .await
    }

    async fn delete_agenda(&mut self, id: &str) -> StoreResult<()> {
        self.delete(&format!("agendas/{id}")).await
    }

    async fn add_agenda_item(&mut self, agenda_id: &str, text: &str) -> StoreResult<AgendaItem> {
        #[derive(Serialize)]
        struct Body<'a> {
            text: &'a str,
        }
        self.send_json(
            reqwest::Method::POST,
            &format!("agendas/{agenda_id}/items"),
            &[],
            &Body { text },
        )
        .await
    }

    async fn delete_agenda_item(&mut self, item_id: &str) -> StoreResult<()> {
        self.delete(&format!("agenda-items/{item_id}")).await
    }

    async fn reorder_agenda_items(
        &mut self,
        agenda_id: &str,
        items: &[AgendaItem],
    ) -> StoreResult<()> {
        let entries = order_entries(items, |i: &AgendaItem| i.id.as_str());
        self.send_no_content(
            reqwest::Method::POST,
            &format!("agendas/{agenda_id}/items/reorder"),
            &[],
            Some(&entries),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_error_kind() {
        assert!(matches!(
            error_from_status(StatusCode::UNAUTHORIZED, String::new()),
            StoreError::Unauthorized
        ));
        assert!(matches!(
            error_from_status(StatusCode::FORBIDDEN, String::new()),
            StoreError::Unauthorized
        ));
        assert!(matches!(
            error_from_status(StatusCode::NOT_FOUND, "todo x".into()),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::CONFLICT, "duplicate tag".into()),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::BAD_GATEWAY, String::new()),
            StoreError::Transient(_)
        ));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let store = RemoteStore::new("https://api.example.com/");
        assert_eq!(
            store.endpoint("/todos/reorder"),
            "https://api.example.com/todos/reorder"
        );
        let store = RemoteStore::new("https://api.example.com");
        assert_eq!(store.endpoint("tags"), "https://api.example.com/tags");
    }

    #[test]
    fn order_entries_are_dense_from_zero() {
        let now = chrono::Utc::now();
        let todos = vec![
            Todo::new("b", "b", now).with_sort_order(9),
            Todo::new("a", "a", now),
        ];
        let entries = order_entries(&todos, |t: &Todo| t.id.as_str());
        let rendered = serde_json::to_value(&entries).unwrap();
        assert_eq!(
            rendered,
            serde_json::json!([
                {"id": "b", "sort_order": 0},
                {"id": "a", "sort_order": 1},
            ])
        );
    }
}
