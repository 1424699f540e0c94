use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use daymark_core::engine::{Engine, MoveDirection};
use daymark_core::migrate::MigrationOutcome;
use daymark_core::store::{AuthProvider, NewTag, NewTodo, StoreError, Stores, User};
use daymark_core::todo::{Context, TagSnapshot, TodoPatch};
use daymark_core::weekly::NewWeeklyTask;
use daymark_remote::auth::{clear_session, load_session, save_session};
use daymark_remote::{AuthClient, RemoteStore};

mod config;
mod legacy;
mod local_store;
mod output;
mod state;

use local_store::LocalStore;
use state::Profile;

#[derive(Parser, Debug)]
#[command(name = "daymark", version, about = "Daymark personal task manager")]
struct Cli {
    /// Act in this context instead of the profile's current one
    #[arg(long, global = true)]
    context: Option<Context>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config under ~/.daymark
    Init,

    /// Add a todo
    Add {
        text: String,

        /// Deadline date, YYYY-MM-DD
        #[arg(long)]
        deadline: Option<NaiveDate>,

        /// Attach an existing tag by name (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },

    /// List todos (active by default, sorted by urgency and manual order)
    Ls {
        /// Show completed todos instead
        #[arg(long)]
        done: bool,

        /// Show won't-do todos instead
        #[arg(long)]
        wont_do: bool,
    },

    /// Mark a todo completed
    Done { id: String },

    /// Move a completed todo back to active
    Undone { id: String },

    /// Mark a todo won't-do
    WontDo { id: String },

    /// Move a won't-do todo back to active
    WillDo { id: String },

    /// Delete a todo
    Rm { id: String },

    /// Edit a todo's text, deadline or tags
    Edit {
        id: String,

        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        deadline: Option<NaiveDate>,

        /// Remove the deadline
        #[arg(long, conflicts_with = "deadline")]
        clear_deadline: bool,

        /// Replace the tag set with these names (repeatable; none clears)
        #[arg(long)]
        tag: Option<Vec<String>>,
    },

    /// Move a todo one step up or down in the active list
    Move { id: String, direction: Direction },

    /// Rearrange the whole active list; applies locally before persisting
    Reorder {
        /// Every active todo id (or unambiguous prefix) in the desired order
        ids: Vec<String>,
    },

    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },

    /// Manage weekly recurring tasks
    Weekly {
        #[command(subcommand)]
        command: WeeklyCommand,
    },

    /// Manage meeting agendas
    Agenda {
        #[command(subcommand)]
        command: AgendaCommand,
    },

    /// Show or switch the current context
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },

    /// Import a legacy local-storage dump into the work context
    Migrate {
        /// Dump file (default: ~/.daymark/legacy.json)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Sign in and out of the remote backend
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for MoveDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => MoveDirection::Up,
            Direction::Down => MoveDirection::Down,
        }
    }
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    /// Create a tag
    Add {
        name: String,

        #[arg(long, default_value = "#888888")]
        color: String,
    },

    /// Delete a tag and strip it from every todo
    Rm { id: String },

    /// List tags
    Ls,
}

#[derive(Subcommand, Debug)]
enum WeeklyCommand {
    /// Create a weekly task
    Add {
        text: String,

        /// Day of week: 0-6 or a name (sunday..saturday)
        day: String,
    },

    /// Mark a weekly task done for this week
    Done { id: String },

    /// Clear a weekly task's done flag
    Undone { id: String },

    /// Delete a weekly task
    Rm { id: String },

    /// List weekly tasks
    Ls,
}

#[derive(Subcommand, Debug)]
enum AgendaCommand {
    /// Create an agenda
    New { title: String },

    /// Delete an agenda and its items
    Rm { id: String },

    /// List agendas and their items
    Ls,

    /// Collapse an agenda in listings
    Collapse { id: String },

    /// Expand an agenda in listings
    Expand { id: String },

    /// Manage agenda items
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },

    /// Spawn a todo from an agenda item (the agenda is untouched)
    FollowUp { item_id: String },
}

#[derive(Subcommand, Debug)]
enum ItemCommand {
    Add { agenda_id: String, text: String },
    Rm { item_id: String },
    /// Move an item one step within its agenda
    Move {
        item_id: String,
        direction: Direction,
    },
}

#[derive(Subcommand, Debug)]
enum ContextCommand {
    Show,

    /// Switch the default context for future invocations
    Switch { context: Context },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Exchange a token for a session
    Login { token: String },

    /// Drop the cached session
    Logout,

    /// Show the signed-in user
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Command::Init => return config::init_config(),
        Command::Auth { command } => {
            let cfg = config::load_config()?;
            return run_auth(&cfg, command).await;
        }
        command => command,
    };

    let cfg = config::load_config()?;
    let mut profile = state::read_profile()?;
    let context = cli.context.unwrap_or(profile.current_context);
    let now = Utc::now();

    match &cfg.remote {
        Some(remote) => {
            let session = load_session(&state::session_path()?)?
                .context("not signed in; run: daymark auth login <token>")?;
            let store = RemoteStore::new(&remote.base_url).with_token(&session.token);
            let mut engine = Engine::new(store, session.user, context);
            auto_migrate(&mut engine, now).await;
            run(&mut engine, &mut profile, context, command, now).await?;
        }
        None => {
            let store = LocalStore::open(&state::store_path()?)?;
            let mut engine = Engine::new(store, User::local(), context);
            run(&mut engine, &mut profile, context, command, now).await?;
        }
    }

    state::write_profile(&profile)?;
    Ok(())
}

/// First authenticated load: if a legacy dump is sitting on disk and the
/// remote work context is empty, import it. Failures are logged, not fatal.
async fn auto_migrate<S: Stores>(engine: &mut Engine<S>, now: DateTime<Utc>) {
    let snapshot = match state::legacy_path().and_then(|p| legacy::load_legacy_snapshot(&p)) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(%err, "legacy dump unreadable; skipping migration");
            return;
        }
    };
    if snapshot.is_empty() {
        return;
    }
    match engine.migrate_legacy_if_needed(&snapshot, now).await {
        Ok(MigrationOutcome::Migrated { tags, todos }) => {
            println!("Imported legacy data: {tags} tags, {todos} todos");
        }
        Ok(_) => {}
        Err(err) => warn!(%err, "legacy migration failed; will not retry this run"),
    }
}

async fn run_auth(cfg: &config::Config, command: AuthCommand) -> Result<()> {
    let Some(remote) = &cfg.remote else {
        bail!("no [remote] section in config.toml; auth applies to the remote backend only");
    };
    let path = state::session_path()?;
    let mut client = AuthClient::new(&remote.base_url);
    if let Some(session) = load_session(&path)? {
        client = client.with_session(session);
    }

    match command {
        AuthCommand::Login { token } => {
            let user = client.sign_in(&token).await?;
            let session = client.session().context("sign-in left no session")?;
            save_session(&path, session)?;
            println!("Signed in as {}", user.email);
        }
        AuthCommand::Logout => {
            client.sign_out().await?;
            clear_session(&path)?;
            println!("Signed out");
        }
        AuthCommand::Whoami => match client.session() {
            Some(session) => println!("{} ({})", session.user.email, session.user.id),
            None => println!("Not signed in"),
        },
    }
    Ok(())
}

async fn run<S: Stores>(
    engine: &mut Engine<S>,
    profile: &mut Profile,
    context: Context,
    command: Command,
    now: DateTime<Utc>,
) -> Result<()> {
    engine.set_weekly_reset_marker(
        context,
        profile.last_weekly_reset.get(&context).copied(),
    );
    engine.load_context(context, now).await;
    if engine.reset_weekly_if_due(context, now).await.unwrap_or(false) {
        println!("(weekly tasks reset for a new day)");
    }
    if let Some(marker) = engine.weekly_reset_marker(context) {
        profile.last_weekly_reset.insert(context, marker);
    }

    match command {
        Command::Init | Command::Auth { .. } => unreachable!("handled before backend selection"),

        Command::Add {
            text,
            deadline,
            tag,
        } => {
            let tags = resolve_tag_names(engine, context, &tag)?;
            let new = NewTodo {
                text,
                tags,
                deadline,
            };
            let todo = engine.add_todo(context, new, now).await?;
            println!("Added {}  {}", output::short_id(&todo.id), todo.text);
        }

        Command::Ls { done, wont_do } => {
            let state = engine.state(context).context("context not loaded")?;
            if done {
                output::print_resolved(&state.completed, "completed");
            } else if wont_do {
                output::print_resolved(&state.wont_do, "won't-do");
            } else {
                output::print_active(&state.active, now);
            }
        }

        Command::Done { id } => {
            let id = resolve_todo_id(engine, context, &id)?;
            let todo = engine.complete_todo(context, &id, now).await?;
            println!("Done: {}", todo.text);
        }

        Command::Undone { id } => {
            let id = resolve_todo_id(engine, context, &id)?;
            let todo = engine.uncomplete_todo(context, &id, now).await?;
            println!("Back to active: {}", todo.text);
        }

        Command::WontDo { id } => {
            let id = resolve_todo_id(engine, context, &id)?;
            let todo = engine.mark_wont_do(context, &id, now).await?;
            println!("Won't do: {}", todo.text);
        }

        Command::WillDo { id } => {
            let id = resolve_todo_id(engine, context, &id)?;
            let todo = engine.mark_will_do(context, &id, now).await?;
            println!("Back to active: {}", todo.text);
        }

        Command::Rm { id } => {
            let id = resolve_todo_id(engine, context, &id)?;
            engine.delete_todo(context, &id).await?;
            println!("Deleted {}", output::short_id(&id));
        }

        Command::Edit {
            id,
            text,
            deadline,
            clear_deadline,
            tag,
        } => {
            let id = resolve_todo_id(engine, context, &id)?;
            let mut patch = TodoPatch {
                text,
                ..TodoPatch::default()
            };
            if clear_deadline {
                patch.deadline = Some(None);
            } else if deadline.is_some() {
                patch.deadline = Some(deadline);
            }
            if let Some(names) = tag {
                patch.tags = Some(resolve_tag_names(engine, context, &names)?);
            }
            let todo = engine.update_todo(context, &id, patch, now).await?;
            println!("Updated {}  {}", output::short_id(&todo.id), todo.text);
        }

        Command::Move { id, direction } => {
            let id = resolve_todo_id(engine, context, &id)?;
            match engine.stage_move(context, &id, direction.into())? {
                Some(pending) => {
                    engine.commit_move(&pending).await?;
                    println!("Moved {}", output::short_id(&id));
                }
                None => println!("Already at the edge of the list"),
            }
        }

        Command::Reorder { ids } => {
            let resolved: Vec<String> = ids
                .iter()
                .map(|prefix| resolve_todo_id(engine, context, prefix))
                .collect::<Result<_>>()?;
            engine.apply_drag_reorder(context, &resolved).await?;
            println!("Reordered {} todos", resolved.len());
        }

        Command::Tag { command } => match command {
            TagCommand::Add { name, color } => {
                match engine.add_tag(context, NewTag { name: name.clone(), color }).await {
                    Ok(tag) => println!("Added tag {}  {}", output::short_id(&tag.id), tag.name),
                    Err(StoreError::Conflict(_)) => {
                        bail!("tag '{name}' already exists in the {context} context")
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            TagCommand::Rm { id } => {
                let id = resolve_tag_id(engine, context, &id)?;
                engine.delete_tag(context, &id).await?;
                println!("Deleted tag {}", output::short_id(&id));
            }
            TagCommand::Ls => {
                let state = engine.state(context).context("context not loaded")?;
                output::print_tags(&state.tags);
            }
        },

        Command::Weekly { command } => match command {
            WeeklyCommand::Add { text, day } => {
                let new = NewWeeklyTask::new(text, parse_day(&day)?)?;
                let task = engine.add_weekly_task(context, new).await?;
                println!("Added weekly {}  {}", output::short_id(&task.id), task.text);
            }
            WeeklyCommand::Done { id } => {
                let id = resolve_weekly_id(engine, context, &id)?;
                let task = engine.complete_weekly_task(context, &id, now).await?;
                println!("Done this week: {}", task.text);
            }
            WeeklyCommand::Undone { id } => {
                let id = resolve_weekly_id(engine, context, &id)?;
                let task = engine.uncomplete_weekly_task(context, &id).await?;
                println!("Cleared: {}", task.text);
            }
            WeeklyCommand::Rm { id } => {
                let id = resolve_weekly_id(engine, context, &id)?;
                engine.delete_weekly_task(context, &id).await?;
                println!("Deleted weekly {}", output::short_id(&id));
            }
            WeeklyCommand::Ls => {
                let state = engine.state(context).context("context not loaded")?;
                output::print_weekly(&state.weekly_tasks);
            }
        },

        Command::Agenda { command } => {
            engine.load_agendas().await;
            match command {
                AgendaCommand::New { title } => {
                    let agenda = engine.add_agenda(&title).await?;
                    println!("Added agenda {}  {}", output::short_id(&agenda.id), agenda.title);
                }
                AgendaCommand::Rm { id } => {
                    let id = resolve_agenda_id(engine, &id)?;
                    engine.delete_agenda(&id).await?;
                    println!("Deleted agenda {}", output::short_id(&id));
                }
                AgendaCommand::Ls => {
                    output::print_agendas(&engine.agendas);
                }
                AgendaCommand::Collapse { id } => {
                    let id = resolve_agenda_id(engine, &id)?;
                    engine.set_agenda_collapsed(&id, true).await?;
                }
                AgendaCommand::Expand { id } => {
                    let id = resolve_agenda_id(engine, &id)?;
                    engine.set_agenda_collapsed(&id, false).await?;
                }
                AgendaCommand::Item { command } => match command {
                    ItemCommand::Add { agenda_id, text } => {
                        let agenda_id = resolve_agenda_id(engine, &agenda_id)?;
                        let item = engine.add_agenda_item(&agenda_id, &text).await?;
                        println!("Added item {}  {}", output::short_id(&item.id), item.text);
                    }
                    ItemCommand::Rm { item_id } => {
                        let item_id = resolve_item_id(engine, &item_id)?;
                        engine.delete_agenda_item(&item_id).await?;
                        println!("Deleted item {}", output::short_id(&item_id));
                    }
                    ItemCommand::Move { item_id, direction } => {
                        let item_id = resolve_item_id(engine, &item_id)?;
                        if engine.move_agenda_item(&item_id, direction.into()).await? {
                            println!("Moved item {}", output::short_id(&item_id));
                        } else {
                            println!("Already at the edge of the agenda");
                        }
                    }
                },
                AgendaCommand::FollowUp { item_id } => {
                    let item_id = resolve_item_id(engine, &item_id)?;
                    let todo = engine.follow_up(&item_id, context, now).await?;
                    println!(
                        "Follow-up added to {context}: {}  {}",
                        output::short_id(&todo.id),
                        todo.text
                    );
                }
            }
        }

        Command::Context { command } => match command {
            ContextCommand::Show => println!("{}", profile.current_context),
            ContextCommand::Switch { context } => {
                profile.current_context = context;
                println!("Switched to {context}");
            }
        },

        Command::Migrate { file } => {
            let path = match file {
                Some(p) => p,
                None => state::legacy_path()?,
            };
            let snapshot = legacy::load_legacy_snapshot(&path)?;
            match engine.migrate_legacy_if_needed(&snapshot, now).await? {
                MigrationOutcome::Migrated { tags, todos } => {
                    println!("Imported {tags} tags and {todos} todos into work");
                }
                MigrationOutcome::SkippedRemoteData => {
                    println!("Skipped: the work context already has data");
                }
                MigrationOutcome::SkippedNoLegacy => {
                    println!("Nothing to import from {}", path.display());
                }
                MigrationOutcome::SkippedAlreadyRan => {
                    println!("Migration already attempted this run");
                }
            }
        }
    }

    Ok(())
}

/// Resolve an id prefix against a set of known ids. A prefix matching more
/// than one id is an error, never a guess.
fn resolve_prefix<'a, I>(ids: I, prefix: &str, kind: &str) -> Result<String>
where
    I: Iterator<Item = &'a str>,
{
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [only] => Ok((*only).to_string()),
        [] => bail!("no {kind} matching '{prefix}'"),
        _ => bail!("'{prefix}' is ambiguous: matches {} {kind}s", matches.len()),
    }
}

fn resolve_todo_id<S: Stores>(
    engine: &Engine<S>,
    context: Context,
    prefix: &str,
) -> Result<String> {
    let state = engine.state(context).context("context not loaded")?;
    let ids = state
        .active
        .iter()
        .chain(&state.completed)
        .chain(&state.wont_do)
        .map(|t| t.id.as_str());
    resolve_prefix(ids, prefix, "todo")
}

fn resolve_tag_id<S: Stores>(engine: &Engine<S>, context: Context, prefix: &str) -> Result<String> {
    let state = engine.state(context).context("context not loaded")?;
    resolve_prefix(state.tags.iter().map(|t| t.id.as_str()), prefix, "tag")
}

fn resolve_weekly_id<S: Stores>(
    engine: &Engine<S>,
    context: Context,
    prefix: &str,
) -> Result<String> {
    let state = engine.state(context).context("context not loaded")?;
    resolve_prefix(
        state.weekly_tasks.iter().map(|t| t.id.as_str()),
        prefix,
        "weekly task",
    )
}

fn resolve_agenda_id<S: Stores>(engine: &Engine<S>, prefix: &str) -> Result<String> {
    resolve_prefix(engine.agendas.iter().map(|a| a.id.as_str()), prefix, "agenda")
}

fn resolve_item_id<S: Stores>(engine: &Engine<S>, prefix: &str) -> Result<String> {
    resolve_prefix(
        engine
            .agendas
            .iter()
            .flat_map(|a| a.items.iter())
            .map(|i| i.id.as_str()),
        prefix,
        "agenda item",
    )
}

/// Tags attach by name; the tag must already exist in this context.
fn resolve_tag_names<S: Stores>(
    engine: &Engine<S>,
    context: Context,
    names: &[String],
) -> Result<Vec<TagSnapshot>> {
    let state = engine.state(context).context("context not loaded")?;
    names
        .iter()
        .map(|name| {
            state
                .tags
                .iter()
                .find(|t| t.name == *name)
                .map(|t| t.snapshot())
                .with_context(|| {
                    format!("unknown tag '{name}' (create it with: daymark tag add {name})")
                })
        })
        .collect()
}

fn parse_day(input: &str) -> Result<u8> {
    if let Ok(n) = input.parse::<u8>() {
        return Ok(n);
    }
    let lowered = input.to_ascii_lowercase();
    daymark_core::weekly::DAY_NAMES
        .iter()
        .position(|name| name.to_ascii_lowercase() == lowered)
        .map(|i| i as u8)
        .with_context(|| format!("unknown day: {input} (expected 0-6 or sunday..saturday)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_parses_numbers_and_names() {
        assert_eq!(parse_day("0").unwrap(), 0);
        assert_eq!(parse_day("Saturday").unwrap(), 6);
        assert_eq!(parse_day("wednesday").unwrap(), 3);
        assert!(parse_day("someday").is_err());
    }

    #[test]
    fn prefix_resolution_rejects_ambiguity() {
        let ids = ["abc123", "abd456", "zzz789"];
        assert_eq!(
            resolve_prefix(ids.iter().copied(), "z", "todo").unwrap(),
            "zzz789"
        );
        assert!(resolve_prefix(ids.iter().copied(), "ab", "todo").is_err());
        assert!(resolve_prefix(ids.iter().copied(), "q", "todo").is_err());
    }
}
