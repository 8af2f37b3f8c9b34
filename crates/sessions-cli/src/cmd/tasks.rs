use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use sessions_core::{
    config::Config,
    index, paths,
    state::{Mode, State},
    store::Store,
    task::{self, TaskCatalog},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum TasksSubcommand {
    /// List open tasks grouped by index
    List,
    /// Make a task current
    Start {
        /// Task reference: `fix-login.md`, `fix-login`, or `refactor/`
        name: String,
    },
    /// Clear the current task
    Clear,
}

pub fn run(root: &Path, subcmd: TasksSubcommand, json: bool) -> anyhow::Result<()> {
    let store = Store::new(root);
    match subcmd {
        TasksSubcommand::List => list(&store, json),
        TasksSubcommand::Start { name } => start(&store, &name, json),
        TasksSubcommand::Clear => clear(&store, json),
    }
}

fn list(store: &Store, json: bool) -> anyhow::Result<()> {
    let root = store.root();
    let catalog = TaskCatalog::scan(&paths::tasks_dir(root));
    let (indexes, mut warnings) = index::load_indexes(&paths::indexes_dir(root));
    let mut listing = index::reconcile(&catalog, &indexes);
    warnings.append(&mut listing.warnings);
    listing.warnings = warnings;

    if json {
        return print_json(&listing);
    }
    let config: Config = store.load().context("failed to load config")?;
    print!("{}", index::render(&listing, &config.trigger_phrases));
    Ok(())
}

fn start(store: &Store, name: &str, json: bool) -> anyhow::Result<()> {
    let current = task::resolve_current(store.root(), name)
        .with_context(|| format!("cannot start task '{name}'"))?;

    let (stashed, task) = store
        .edit_recovering(|s: &mut State| {
            let switching = s
                .current_task
                .as_ref()
                .is_some_and(|t| t.file != current.file);
            let stashed = if switching { s.stash_active() } else { 0 };
            s.set_mode(Mode::Discussion);
            s.set_task(current.clone());
            (stashed, current)
        })
        .context("failed to update state")?;
    tracing::info!(task = %task.name, file = %task.file, "task started");

    if json {
        return print_json(&serde_json::json!({
            "current_task": task,
            "stashed_todos": stashed,
        }));
    }
    println!("Current task: {} ({})", task.name, task.file);
    if let Some(branch) = task.branch() {
        println!("Branch: {branch}");
    }
    if stashed > 0 {
        println!("Stashed {stashed} todo(s) from the previous task.");
    }
    Ok(())
}

fn clear(store: &Store, json: bool) -> anyhow::Result<()> {
    let cleared = store
        .edit_recovering(|s: &mut State| {
            s.clear_todos();
            s.clear_task()
        })
        .context("failed to update state")?;

    if json {
        return print_json(&serde_json::json!({ "cleared": cleared }));
    }
    match cleared {
        Some(t) => println!("Cleared current task: {}", t.name),
        None => println!("No current task."),
    }
    Ok(())
}
