//! Terminal rendering for list commands.

use chrono::{DateTime, Utc};

use daymark_core::agenda::Agenda;
use daymark_core::tag::Tag;
use daymark_core::todo::Todo;
use daymark_core::urgency::Urgency;
use daymark_core::weekly::{WeeklyTask, day_name};

/// Short id prefix shown in listings; long enough to stay unambiguous for a
/// personal-sized list.
const SHORT_ID: usize = 8;

pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(SHORT_ID)]
}

fn urgency_marker(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Normal => " ",
        Urgency::Caution => "~",
        Urgency::Warning => "!",
        Urgency::Urgent => "!!",
        Urgency::Overdue => "!!!",
    }
}

pub fn print_active(todos: &[Todo], now: DateTime<Utc>) {
    if todos.is_empty() {
        println!("(no active todos)");
        return;
    }
    for todo in todos {
        let urgency = Urgency::classify(todo.deadline, now);
        let mut line = format!(
            "{:>3} {}  {}",
            urgency_marker(urgency),
            short_id(&todo.id),
            todo.text
        );
        if let Some(deadline) = todo.deadline {
            line.push_str(&format!("  (due {deadline})"));
        }
        if !todo.tags.is_empty() {
            let names: Vec<&str> = todo.tags.iter().map(|t| t.name.as_str()).collect();
            line.push_str(&format!("  [{}]", names.join(", ")));
        }
        println!("{line}");
    }
}

pub fn print_resolved(todos: &[Todo], label: &str) {
    if todos.is_empty() {
        println!("(no {label} todos)");
        return;
    }
    for todo in todos {
        let stamp = todo
            .completed_date
            .or(todo.wont_do_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("    {}  {}  ({stamp})", short_id(&todo.id), todo.text);
    }
}

pub fn print_tags(tags: &[Tag]) {
    if tags.is_empty() {
        println!("(no tags)");
        return;
    }
    for tag in tags {
        println!("    {}  {}  {}", short_id(&tag.id), tag.name, tag.color);
    }
}

pub fn print_weekly(tasks: &[WeeklyTask]) {
    if tasks.is_empty() {
        println!("(no weekly tasks)");
        return;
    }
    for task in tasks {
        let mark = if task.completed_this_week { "x" } else { " " };
        println!(
            "[{mark}] {}  {:<9} {}",
            short_id(&task.id),
            day_name(task.day_of_week),
            task.text
        );
    }
}

pub fn print_agendas(agendas: &[Agenda]) {
    if agendas.is_empty() {
        println!("(no agendas)");
        return;
    }
    for agenda in agendas {
        let state = if agenda.is_collapsed { "+" } else { "-" };
        println!("{state} {}  {}", short_id(&agenda.id), agenda.title);
        if !agenda.is_collapsed {
            for item in agenda.sorted_items() {
                println!("    {}  {}", short_id(&item.id), item.text);
            }
        }
    }
}
