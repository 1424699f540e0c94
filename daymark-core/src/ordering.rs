//! Todo ordering policy.
//!
//! Comparator-based, not a key extraction: the manual-position fallback in
//! [`manual_then_created`] is conditional on the *pair* being compared, so a
//! `(tier, position ?? created)` key sort would diverge whenever one item
//! has a position and its neighbor does not.
//!
//! Order:
//! 1. pinned (Warning/Urgent/Overdue) before unpinned
//! 2. within pinned, descending urgency tier
//! 3. any tier tie, and the whole unpinned region, falls to manual position
//!    ascending when both sides have one, else created_at ascending

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::todo::Todo;
use crate::urgency::Urgency;

/// Total, deterministic comparator for active todos at a given instant.
pub fn compare(a: &Todo, b: &Todo, now: DateTime<Utc>) -> Ordering {
    let ua = Urgency::classify(a.deadline, now);
    let ub = Urgency::classify(b.deadline, now);

    match (ua.is_pinned(), ub.is_pinned()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => ub
            .tier()
            .cmp(&ua.tier())
            .then_with(|| manual_then_created(a, b)),
        // Unpinned items share no pinning distinction: Caution does not
        // outrank Normal here.
        (false, false) => manual_then_created(a, b),
    }
}

fn manual_then_created(a: &Todo, b: &Todo) -> Ordering {
    let by_created = || {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    };

    match (a.sort_order, b.sort_order) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(by_created),
        // One or both positions null: the pairwise fallback is creation
        // time, not a null-first/null-last rule.
        _ => by_created(),
    }
}

/// Sort the active list in place. Recomputed whenever the set or any
/// deadline/completion state changes; urgency is evaluated here, lazily.
pub fn sort_todos(todos: &mut [Todo], now: DateTime<Utc>) {
    todos.sort_by(|a, b| compare(a, b, now));
}
