//! One-time legacy-to-remote migration.
//!
//! Early revisions kept todos and tags in per-device local storage. On the
//! first authenticated load, if the remote store has nothing under the
//! `work` context and a legacy snapshot exists, the snapshot is bulk-created
//! remotely: tags first, then todos. Best effort — errors are logged and
//! not retried — and it never merges with existing remote data.

use tracing::{info, warn};

use crate::store::{StoreResult, TagSeed, TagStore, TodoSeed, TodoStore};
use crate::todo::Context;

/// Parsed legacy snapshot, assembled by the caller from whatever local
/// storage the old revisions wrote (`todos`/`doneTodos`/`tags` or the
/// per-context `work_*` keys).
#[derive(Debug, Clone, Default)]
pub struct LegacySnapshot {
    pub todos: Vec<TodoSeed>,
    pub done_todos: Vec<TodoSeed>,
    pub tags: Vec<TagSeed>,
}

impl LegacySnapshot {
    pub fn is_empty(&self) -> bool {
        self.todos.is_empty() && self.done_todos.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Remote already holds data for `work`; nothing written.
    SkippedRemoteData,
    /// No legacy data on this device; nothing written.
    SkippedNoLegacy,
    /// The in-memory once-per-session guard already fired.
    SkippedAlreadyRan,
    /// Snapshot written; the caller should reload from remote.
    Migrated { tags: usize, todos: usize },
}

/// Run the migration against the `work` context.
///
/// Tags are created before todos so tag records exist by the time todos are
/// read back — a convenience, not a hard dependency, since todos carry tag
/// snapshots rather than normalized references.
pub async fn migrate_legacy<S>(
    store: &mut S,
    user: &str,
    snapshot: &LegacySnapshot,
) -> StoreResult<MigrationOutcome>
where
    S: TodoStore + TagStore,
{
    let context = Context::Work;

    let remote_tags = store.list_tags(user, context).await?;
    let remote_active = store.list_active(user, context).await?;
    let remote_completed = store.list_completed(user, context).await?;
    if !remote_tags.is_empty() || !remote_active.is_empty() || !remote_completed.is_empty() {
        info!("legacy migration skipped: remote data already present");
        return Ok(MigrationOutcome::SkippedRemoteData);
    }

    if snapshot.is_empty() {
        return Ok(MigrationOutcome::SkippedNoLegacy);
    }

    let mut tag_count = 0;
    if !snapshot.tags.is_empty() {
        let created = store.bulk_create_tags(user, context, &snapshot.tags).await?;
        tag_count = created.len();
    }

    let mut seeds: Vec<TodoSeed> = snapshot.todos.clone();
    seeds.extend(snapshot.done_todos.iter().cloned());

    let mut todo_count = 0;
    if !seeds.is_empty() {
        let created = store.bulk_create_todos(user, context, &seeds).await?;
        todo_count = created.len();
    }

    if tag_count + todo_count == 0 {
        warn!("legacy snapshot was non-empty but nothing was created");
    }
    info!(tags = tag_count, todos = todo_count, "legacy migration complete");

    Ok(MigrationOutcome::Migrated {
        tags: tag_count,
        todos: todo_count,
    })
}
