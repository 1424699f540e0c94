//! State-synchronization engine.
//!
//! Keeps the in-memory lists consistent with an external, eventually-updated
//! store across mutations. Discipline: issue the write, and only on success
//! splice the authoritative returned record into the right bucket; a failed
//! write leaves prior state untouched. Two deliberate exceptions, both
//! around reordering, are documented on their methods.
//!
//! All mutators take the context explicitly; there is no ambient "current
//! list" being re-routed behind the scenes.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, warn};

use crate::agenda::{Agenda, AgendaItem};
use crate::migrate::{LegacySnapshot, MigrationOutcome, migrate_legacy};
use crate::ordering::sort_todos;
use crate::store::{NewTag, NewTodo, StoreError, StoreResult, Stores, User};
use crate::tag::Tag;
use crate::todo::{Context, Todo, TodoPatch};
use crate::weekly::{self, NewWeeklyTask, WeeklyTask};

/// Everything held in memory for one (user, context) scope.
#[derive(Debug, Default, Clone)]
pub struct ContextState {
    /// Kept in display order: re-sorted after every splice, never on a timer.
    pub active: Vec<Todo>,
    /// Most recently completed first.
    pub completed: Vec<Todo>,
    /// Most recently abandoned first.
    pub wont_do: Vec<Todo>,
    pub tags: Vec<Tag>,
    pub weekly_tasks: Vec<WeeklyTask>,
    /// Eastern-time date of the last weekly reset; gates `reset_weekly_if_due`.
    pub last_weekly_reset: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// A staged manual move: the visual swap the user already saw, waiting for
/// its authoritative commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub generation: u64,
    pub context: Context,
    pub ordered_ids: Vec<String>,
}

/// Monotonic generation counter for reorders. Each staged move takes the
/// next generation; only the newest staged move may commit, so rapid
/// repeated moves coalesce instead of interleaving their commits.
#[derive(Debug, Default)]
pub struct ReorderSequencer {
    latest: u64,
}

impl ReorderSequencer {
    pub fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }

    /// Invalidate every staged move without starting a new one.
    pub fn supersede(&mut self) {
        self.latest += 1;
    }
}

#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    user: User,
    pub current_context: Context,
    contexts: HashMap<Context, ContextState>,
    pub agendas: Vec<Agenda>,
    sequencer: ReorderSequencer,
    migration_attempted: bool,
}

impl<S: Stores> Engine<S> {
    pub fn new(store: S, user: User, current_context: Context) -> Self {
        Self {
            store,
            user,
            current_context,
            contexts: HashMap::new(),
            agendas: Vec::new(),
            sequencer: ReorderSequencer::default(),
            migration_attempted: false,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn state(&self, context: Context) -> Option<&ContextState> {
        self.contexts.get(&context)
    }

    fn ctx_mut(&mut self, context: Context) -> &mut ContextState {
        self.contexts.entry(context).or_default()
    }

    /// Load (or reload) one context from the store.
    ///
    /// Read failures are absorbed: logged, lists left empty, loading never
    /// wedges the process. The weekly-reset marker survives reloads.
    pub async fn load_context(&mut self, context: Context, now: DateTime<Utc>) {
        let marker = self
            .contexts
            .get(&context)
            .and_then(|s| s.last_weekly_reset);

        match self.fetch_context(context).await {
            Ok(mut state) => {
                sort_todos(&mut state.active, now);
                state.last_weekly_reset = marker;
                self.contexts.insert(context, state);
            }
            Err(err) => {
                error!(%err, %context, "failed to load context; leaving lists empty");
                let state = self.ctx_mut(context);
                *state = ContextState {
                    last_weekly_reset: marker,
                    ..ContextState::default()
                };
            }
        }
    }

    async fn fetch_context(&mut self, context: Context) -> StoreResult<ContextState> {
        let user = self.user.id.clone();
        Ok(ContextState {
            active: self.store.list_active(&user, context).await?,
            completed: self.store.list_completed(&user, context).await?,
            wont_do: self.store.list_wont_do(&user, context).await?,
            tags: self.store.list_tags(&user, context).await?,
            weekly_tasks: self.store.list_weekly_tasks(&user, context).await?,
            last_weekly_reset: None,
        })
    }

    // ---- todos ----

    pub async fn add_todo(
        &mut self,
        context: Context,
        new: NewTodo,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let user = self.user.id.clone();
        let created = match self.store.create_todo(&user, context, new).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, %context, "create todo failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.active.push(created.clone());
        sort_todos(&mut state.active, now);
        Ok(created)
    }

    pub async fn complete_todo(
        &mut self,
        context: Context,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let updated = match self.store.mark_completed(id, now).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, id, "complete todo failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.active.retain(|t| t.id != id);
        state.wont_do.retain(|t| t.id != id);
        state.completed.insert(0, updated.clone());
        Ok(updated)
    }

    pub async fn uncomplete_todo(
        &mut self,
        context: Context,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let updated = match self.store.mark_uncompleted(id).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, id, "uncomplete todo failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.completed.retain(|t| t.id != id);
        state.active.push(updated.clone());
        sort_todos(&mut state.active, now);
        Ok(updated)
    }

    pub async fn mark_wont_do(
        &mut self,
        context: Context,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let updated = match self.store.mark_wont_do(id, now).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, id, "won't-do transition failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.active.retain(|t| t.id != id);
        state.completed.retain(|t| t.id != id);
        state.wont_do.insert(0, updated.clone());
        Ok(updated)
    }

    pub async fn mark_will_do(
        &mut self,
        context: Context,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let updated = match self.store.mark_will_do(id).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, id, "will-do transition failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.wont_do.retain(|t| t.id != id);
        state.active.push(updated.clone());
        sort_todos(&mut state.active, now);
        Ok(updated)
    }

    pub async fn delete_todo(&mut self, context: Context, id: &str) -> StoreResult<()> {
        if let Err(err) = self.store.delete_todo(id).await {
            warn!(%err, id, "delete todo failed; state unchanged");
            return Err(err);
        }
        let state = self.ctx_mut(context);
        state.active.retain(|t| t.id != id);
        state.completed.retain(|t| t.id != id);
        state.wont_do.retain(|t| t.id != id);
        Ok(())
    }

    /// Field edit (text, tags, deadline). The returned record is re-bucketed
    /// by its authoritative flags, so an edit that also flips state lands in
    /// the right list.
    pub async fn update_todo(
        &mut self,
        context: Context,
        id: &str,
        patch: TodoPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let updated = match self.store.update_todo(id, patch).await {
            Ok(todo) => todo,
            Err(err) => {
                warn!(%err, id, "update todo failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.active.retain(|t| t.id != id);
        state.completed.retain(|t| t.id != id);
        state.wont_do.retain(|t| t.id != id);
        if updated.completed {
            state.completed.insert(0, updated.clone());
        } else if updated.wont_do {
            state.wont_do.insert(0, updated.clone());
        } else {
            state.active.push(updated.clone());
            sort_todos(&mut state.active, now);
        }
        Ok(updated)
    }

    // ---- reordering ----

    /// Drag-and-drop path: the new order applies locally *before* the store
    /// write, and stays applied even if persistence fails — the UI the user
    /// just arranged is not yanked back. A failed persist leaves memory
    /// ahead of storage until the next reload; accepted, not silently fixed.
    pub async fn apply_drag_reorder(
        &mut self,
        context: Context,
        ordered_ids: &[String],
    ) -> StoreResult<()> {
        self.sequencer.supersede();
        let state = self.ctx_mut(context);
        apply_order(&mut state.active, ordered_ids);
        let snapshot = state.active.clone();
        if let Err(err) = self.store.reorder_todos(&snapshot).await {
            warn!(%err, %context, "reorder persistence failed; local order ahead of storage until reload");
            return Err(err);
        }
        Ok(())
    }

    /// Stage a one-step manual move (the visual swap). Returns `None` when
    /// the item is already at the edge. Nothing commits until
    /// [`Engine::commit_move`]; a newer stage supersedes this one.
    pub fn stage_move(
        &mut self,
        context: Context,
        id: &str,
        direction: MoveDirection,
    ) -> StoreResult<Option<PendingMove>> {
        let state = self.ctx_mut(context);
        let index = state
            .active
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("todo {id}")))?;

        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < state.active.len() => index + 1,
            _ => return Ok(None),
        };

        let mut ordered_ids: Vec<String> = state.active.iter().map(|t| t.id.clone()).collect();
        ordered_ids.swap(index, target);

        Ok(Some(PendingMove {
            generation: self.sequencer.begin(),
            context,
            ordered_ids,
        }))
    }

    /// Commit a staged move. Stale generations are dropped without touching
    /// the store (returns `Ok(false)`); the newest commit applies locally
    /// and persists exactly once.
    pub async fn commit_move(&mut self, pending: &PendingMove) -> StoreResult<bool> {
        if !self.sequencer.is_current(pending.generation) {
            debug!(
                generation = pending.generation,
                "dropping superseded reorder commit"
            );
            return Ok(false);
        }
        let state = self.ctx_mut(pending.context);
        apply_order(&mut state.active, &pending.ordered_ids);
        let snapshot = state.active.clone();
        if let Err(err) = self.store.reorder_todos(&snapshot).await {
            warn!(%err, "move persistence failed; local order ahead of storage until reload");
            return Err(err);
        }
        // A committed generation is spent; replaying it must not persist twice.
        self.sequencer.supersede();
        Ok(true)
    }

    // ---- tags ----

    pub async fn add_tag(&mut self, context: Context, new: NewTag) -> StoreResult<Tag> {
        let user = self.user.id.clone();
        let created = match self.store.create_tag(&user, context, new).await {
            Ok(tag) => tag,
            Err(err @ StoreError::Conflict(_)) => {
                // The one failure the user is always told about.
                warn!(%err, %context, "duplicate tag name");
                return Err(err);
            }
            Err(err) => {
                warn!(%err, %context, "create tag failed; state unchanged");
                return Err(err);
            }
        };
        self.ctx_mut(context).tags.push(created.clone());
        Ok(created)
    }

    /// Delete a tag and cascade the reference out of every todo's tag set in
    /// all three buckets. The cascade mirrors the remote delete but is not
    /// transactional with it; a crash between the two leaves stale snapshots
    /// that reappear on the next full reload.
    pub async fn delete_tag(&mut self, context: Context, tag_id: &str) -> StoreResult<()> {
        if let Err(err) = self.store.delete_tag(tag_id).await {
            warn!(%err, tag_id, "delete tag failed; state unchanged");
            return Err(err);
        }
        let state = self.ctx_mut(context);
        state.tags.retain(|t| t.id != tag_id);
        for bucket in [
            &mut state.active,
            &mut state.completed,
            &mut state.wont_do,
        ] {
            for todo in bucket.iter_mut() {
                todo.tags.retain(|t| t.id != tag_id);
            }
        }
        Ok(())
    }

    // ---- weekly tasks ----

    pub async fn add_weekly_task(
        &mut self,
        context: Context,
        new: NewWeeklyTask,
    ) -> StoreResult<WeeklyTask> {
        let user = self.user.id.clone();
        let created = match self.store.create_weekly_task(&user, context, new).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, %context, "create weekly task failed; state unchanged");
                return Err(err);
            }
        };
        let state = self.ctx_mut(context);
        state.weekly_tasks.push(created.clone());
        state.weekly_tasks.sort_by_key(|t| t.day_of_week);
        Ok(created)
    }

    pub async fn complete_weekly_task(
        &mut self,
        context: Context,
        id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<WeeklyTask> {
        let updated = match self.store.complete_weekly_task(id, now).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, id, "complete weekly task failed; state unchanged");
                return Err(err);
            }
        };
        splice_weekly(self.ctx_mut(context), &updated);
        Ok(updated)
    }

    pub async fn uncomplete_weekly_task(
        &mut self,
        context: Context,
        id: &str,
    ) -> StoreResult<WeeklyTask> {
        let updated = match self.store.uncomplete_weekly_task(id).await {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, id, "uncomplete weekly task failed; state unchanged");
                return Err(err);
            }
        };
        splice_weekly(self.ctx_mut(context), &updated);
        Ok(updated)
    }

    pub async fn delete_weekly_task(&mut self, context: Context, id: &str) -> StoreResult<()> {
        if let Err(err) = self.store.delete_weekly_task(id).await {
            warn!(%err, id, "delete weekly task failed; state unchanged");
            return Err(err);
        }
        self.ctx_mut(context).weekly_tasks.retain(|t| t.id != id);
        Ok(())
    }

    pub fn weekly_reset_marker(&self, context: Context) -> Option<NaiveDate> {
        self.contexts
            .get(&context)
            .and_then(|s| s.last_weekly_reset)
    }

    /// Seed the gate marker (the CLI persists it across runs).
    pub fn set_weekly_reset_marker(&mut self, context: Context, marker: Option<NaiveDate>) {
        self.ctx_mut(context).last_weekly_reset = marker;
    }

    /// Clear weekly completion flags at most once per Eastern-time day.
    /// Returns whether a reset ran.
    pub async fn reset_weekly_if_due(
        &mut self,
        context: Context,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let marker = self.ctx_mut(context).last_weekly_reset;
        if !weekly::should_reset(marker, now) {
            return Ok(false);
        }
        let user = self.user.id.clone();
        if let Err(err) = self.store.reset_weekly_tasks(&user, context).await {
            warn!(%err, %context, "weekly reset failed; will retry on next check");
            return Err(err);
        }
        let state = self.ctx_mut(context);
        for task in &mut state.weekly_tasks {
            task.completed_this_week = false;
        }
        state.last_weekly_reset = Some(weekly::reset_date(now));
        Ok(true)
    }

    // ---- agendas ----

    /// Agendas are context-independent; one flat list per user.
    pub async fn load_agendas(&mut self) {
        let user = self.user.id.clone();
        match self.store.list_agendas(&user).await {
            Ok(agendas) => self.agendas = agendas,
            Err(err) => {
                error!(%err, "failed to load agendas; leaving list empty");
                self.agendas.clear();
            }
        }
    }

    pub async fn add_agenda(&mut self, title: &str) -> StoreResult<Agenda> {
        let user = self.user.id.clone();
        let created = match self.store.create_agenda(&user, title).await {
            Ok(agenda) => agenda,
            Err(err) => {
                warn!(%err, "create agenda failed; state unchanged");
                return Err(err);
            }
        };
        self.agendas.push(created.clone());
        Ok(created)
    }

    pub async fn set_agenda_collapsed(&mut self, id: &str, collapsed: bool) -> StoreResult<Agenda> {
        let updated = match self.store.set_agenda_collapsed(id, collapsed).await {
            Ok(agenda) => agenda,
            Err(err) => {
                warn!(%err, id, "collapse toggle failed; state unchanged");
                return Err(err);
            }
        };
        if let Some(slot) = self.agendas.iter_mut().find(|a| a.id == id) {
            // Keep the locally known items; the toggle endpoint returns the
            // bare agenda row.
            let items = std::mem::take(&mut slot.items);
            *slot = updated.clone();
            slot.items = items;
        }
        Ok(updated)
    }

    pub async fn delete_agenda(&mut self, id: &str) -> StoreResult<()> {
        if let Err(err) = self.store.delete_agenda(id).await {
            warn!(%err, id, "delete agenda failed; state unchanged");
            return Err(err);
        }
        self.agendas.retain(|a| a.id != id);
        Ok(())
    }

    pub async fn add_agenda_item(
        &mut self,
        agenda_id: &str,
        text: &str,
    ) -> StoreResult<AgendaItem> {
        let created = match self.store.add_agenda_item(agenda_id, text).await {
            Ok(item) => item,
            Err(err) => {
                warn!(%err, agenda_id, "add agenda item failed; state unchanged");
                return Err(err);
            }
        };
        if let Some(agenda) = self.agendas.iter_mut().find(|a| a.id == agenda_id) {
            agenda.items.push(created.clone());
        }
        Ok(created)
    }

    pub async fn delete_agenda_item(&mut self, item_id: &str) -> StoreResult<()> {
        if let Err(err) = self.store.delete_agenda_item(item_id).await {
            warn!(%err, item_id, "delete agenda item failed; state unchanged");
            return Err(err);
        }
        for agenda in self.agendas.iter_mut() {
            agenda.items.retain(|i| i.id != item_id);
        }
        Ok(())
    }

    /// Move an agenda item one step within its agenda. Returns `false` when
    /// the item is already at that edge. Item moves persist immediately;
    /// agenda lists are short enough that coalescing never mattered here.
    pub async fn move_agenda_item(
        &mut self,
        item_id: &str,
        direction: MoveDirection,
    ) -> StoreResult<bool> {
        let agenda = self
            .agendas
            .iter()
            .find(|a| a.items.iter().any(|i| i.id == item_id))
            .ok_or_else(|| StoreError::NotFound(format!("agenda item {item_id}")))?;

        let mut ordered: Vec<AgendaItem> = agenda.sorted_items().into_iter().cloned().collect();
        let index = ordered
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("agenda item {item_id}")))?;
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < ordered.len() => index + 1,
            _ => return Ok(false),
        };
        ordered.swap(index, target);
        for (position, item) in ordered.iter_mut().enumerate() {
            item.sort_order = position as i64;
        }

        let agenda_id = agenda.id.clone();
        if let Err(err) = self.store.reorder_agenda_items(&agenda_id, &ordered).await {
            warn!(%err, agenda_id, "agenda item reorder failed; state unchanged");
            return Err(err);
        }
        if let Some(agenda) = self.agendas.iter_mut().find(|a| a.id == agenda_id) {
            agenda.items = ordered;
        }
        Ok(true)
    }

    /// Follow-up: spawn a todo from an agenda item's text in the chosen
    /// context. The agenda itself is untouched.
    pub async fn follow_up(
        &mut self,
        item_id: &str,
        target: Context,
        now: DateTime<Utc>,
    ) -> StoreResult<Todo> {
        let item = self
            .agendas
            .iter()
            .flat_map(|a| a.items.iter())
            .find(|i| i.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("agenda item {item_id}")))?
            .clone();
        self.add_todo(target, item.follow_up(), now).await
    }

    // ---- migration ----

    /// Run the legacy migration at most once per process. The guard is an
    /// in-memory flag by design: a crashed attempt is retried on the next
    /// launch, a failed one is not retried within the session.
    pub async fn migrate_legacy_if_needed(
        &mut self,
        snapshot: &LegacySnapshot,
        now: DateTime<Utc>,
    ) -> StoreResult<MigrationOutcome> {
        if self.migration_attempted {
            return Ok(MigrationOutcome::SkippedAlreadyRan);
        }
        self.migration_attempted = true;

        let user = self.user.id.clone();
        let outcome = migrate_legacy(&mut self.store, &user, snapshot).await?;
        if matches!(outcome, MigrationOutcome::Migrated { .. }) {
            self.load_context(Context::Work, now).await;
        }
        Ok(outcome)
    }
}

/// Rearrange `list` to match `ordered_ids` and rewrite positions dense,
/// 0..n-1. Ids missing from `ordered_ids` keep their relative order at the
/// tail.
fn apply_order(list: &mut Vec<Todo>, ordered_ids: &[String]) {
    let mut next: Vec<Todo> = Vec::with_capacity(list.len());
    for id in ordered_ids {
        if let Some(pos) = list.iter().position(|t| &t.id == id) {
            next.push(list.remove(pos));
        }
    }
    next.append(list);
    for (index, todo) in next.iter_mut().enumerate() {
        todo.sort_order = Some(index as i64);
    }
    *list = next;
}

fn splice_weekly(state: &mut ContextState, updated: &WeeklyTask) {
    if let Some(slot) = state.weekly_tasks.iter_mut().find(|t| t.id == updated.id) {
        *slot = updated.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequencer_newest_generation_wins() {
        let mut seq = ReorderSequencer::default();
        let first = seq.begin();
        let second = seq.begin();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));

        seq.supersede();
        assert!(!seq.is_current(second));
    }

    #[test]
    fn apply_order_rewrites_dense_positions() {
        let now = Utc::now();
        let mut list = vec![
            Todo::new("a", "a", now),
            Todo::new("b", "b", now),
            Todo::new("c", "c", now),
        ];
        apply_order(
            &mut list,
            &["c".to_string(), "a".to_string(), "b".to_string()],
        );
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        let positions: Vec<Option<i64>> = list.iter().map(|t| t.sort_order).collect();
        assert_eq!(positions, [Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn apply_order_keeps_unmentioned_ids_at_tail() {
        let now = Utc::now();
        let mut list = vec![
            Todo::new("a", "a", now),
            Todo::new("b", "b", now),
            Todo::new("c", "c", now),
        ];
        apply_order(&mut list, &["b".to_string()]);
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }
}
