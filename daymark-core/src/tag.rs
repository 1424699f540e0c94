//! Tag model. Names are unique per (user, context); the store enforces the
//! constraint and reports violations as `StoreError::Conflict`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::todo::{Context, TagSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub context: Context,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn snapshot(&self) -> TagSnapshot {
        TagSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}
