//! Meeting agendas: a titled, collapsible, ordered list of discussion
//! items. Agendas are not partitioned by context; an item can spawn a
//! follow-up todo in whichever context the user picks, without mutating
//! the agenda itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::NewTodo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub id: String,
    pub agenda_id: String,
    pub text: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl AgendaItem {
    /// Build the follow-up todo request. Pure: the agenda and the item are
    /// untouched; the caller routes the request through the normal
    /// todo-creation path in whichever context the user picked.
    pub fn follow_up(&self) -> NewTodo {
        NewTodo {
            text: self.text.clone(),
            tags: vec![],
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agenda {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub is_collapsed: bool,
    #[serde(default)]
    pub items: Vec<AgendaItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agenda {
    /// Items in display order.
    pub fn sorted_items(&self) -> Vec<&AgendaItem> {
        let mut items: Vec<&AgendaItem> = self.items.iter().collect();
        items.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        items
    }
}
