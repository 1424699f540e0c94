//! daymark-core: domain model and synchronization engine for Daymark.
//!
//! Pure logic only: urgency classification, the ordering policy, the weekly
//! reset gate, and an engine that keeps in-memory lists consistent with an
//! external CRUD store through the trait seams in `store`. Backends live in
//! sibling crates (`daymark-remote`) or in `memstore` for offline use.

pub mod agenda;
pub mod engine;
pub mod memstore;
pub mod migrate;
pub mod ordering;
pub mod store;
pub mod tag;
pub mod todo;
pub mod urgency;
pub mod weekly;

pub use agenda::{Agenda, AgendaItem};
pub use engine::{ContextState, Engine, MoveDirection, PendingMove, ReorderSequencer};
pub use memstore::MemoryStore;
pub use migrate::{LegacySnapshot, MigrationOutcome, migrate_legacy};
pub use ordering::{compare, sort_todos};
pub use store::{
    AgendaStore, AuthProvider, NewTag, NewTodo, StoreError, StoreResult, Stores, TagSeed,
    TagStore, TodoSeed, TodoStore, User, WeeklyTaskStore,
};
pub use tag::Tag;
pub use todo::{Context, TagSnapshot, Todo, TodoPatch};
pub use urgency::Urgency;
pub use weekly::{NewWeeklyTask, WeeklyTask};
