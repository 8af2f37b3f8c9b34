use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use sessions_core::{
    state::{Mode, State},
    store::Store,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Show the full session state
    Show,
    /// Show the mode, or set it (discussion | implementation)
    Mode { mode: Option<String> },
    /// Flip between discussion and implementation mode
    Toggle,
    /// Show session flags
    Flags {
        /// Reset every flag to false
        #[arg(long)]
        clear: bool,
    },
    /// Inspect or manipulate todo lists
    Todos {
        #[command(subcommand)]
        subcommand: Option<TodosSubcommand>,
    },
    /// Show the current task
    Task,
}

#[derive(Subcommand)]
pub enum TodosSubcommand {
    /// List active and stashed todos
    List,
    /// Drop the active todo list
    Clear,
    /// Move active todos to the stash
    Stash,
    /// Restore stashed todos onto the active list
    Restore,
}

pub fn run(root: &Path, subcmd: Option<StateSubcommand>, json: bool) -> anyhow::Result<()> {
    let store = Store::new(root);
    match subcmd.unwrap_or(StateSubcommand::Show) {
        StateSubcommand::Show => show(&store, json),
        StateSubcommand::Mode { mode: None } => {
            let state = load(&store)?;
            print_mode(state.mode, false, json)
        }
        StateSubcommand::Mode { mode: Some(mode) } => {
            let mode: Mode = mode.parse()?;
            let changed = store
                .edit_recovering(|s: &mut State| s.set_mode(mode))
                .context("failed to update state")?;
            print_mode(mode, changed, json)
        }
        StateSubcommand::Toggle => {
            let mode = store
                .edit_recovering(|s: &mut State| s.toggle_mode())
                .context("failed to update state")?;
            print_mode(mode, true, json)
        }
        StateSubcommand::Flags { clear } => flags(&store, clear, json),
        StateSubcommand::Todos { subcommand } => {
            todos(&store, subcommand.unwrap_or(TodosSubcommand::List), json)
        }
        StateSubcommand::Task => task(&store, json),
    }
}

fn load(store: &Store) -> anyhow::Result<State> {
    store.load().context("failed to load session state")
}

fn show(store: &Store, json: bool) -> anyhow::Result<()> {
    let state = load(store)?;
    if json {
        return print_json(&state);
    }

    println!("Mode:  {}", state.mode);
    println!("Model: {}", state.model);
    match &state.current_task {
        Some(t) => println!("Task:  {} ({})", t.name, t.file),
        None => println!("Task:  none"),
    }
    println!(
        "Todos: {} active, {} stashed",
        state.todos.active.len(),
        state.todos.stashed.len()
    );
    if let Some(at) = state.last_updated {
        let local = at.with_timezone(&chrono::Local);
        println!("Updated: {}", local.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

fn print_mode(mode: Mode, changed: bool, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({ "mode": mode, "changed": changed }));
    }
    if changed {
        println!("Mode set to {mode}.");
    } else {
        println!("{mode}");
    }
    Ok(())
}

fn flags(store: &Store, clear: bool, json: bool) -> anyhow::Result<()> {
    let flags = if clear {
        store
            .edit_recovering(|s: &mut State| {
                s.flags.reset();
                s.flags.clone()
            })
            .context("failed to update state")?
    } else {
        load(store)?.flags
    };

    if json {
        return print_json(&flags);
    }
    let rows = [
        ("subagent", flags.subagent),
        ("noob", flags.noob),
        ("bypass_mode", flags.bypass_mode),
        ("context_85", flags.context_85),
        ("context_90", flags.context_90),
    ]
    .iter()
    .map(|(name, on)| vec![name.to_string(), on.to_string()])
    .collect::<Vec<_>>();
    print_table(&["FLAG", "VALUE"], &rows);
    Ok(())
}

fn todos(store: &Store, subcmd: TodosSubcommand, json: bool) -> anyhow::Result<()> {
    let state = match subcmd {
        TodosSubcommand::List => load(store)?,
        TodosSubcommand::Clear => edit(store, State::clear_todos)?,
        TodosSubcommand::Stash => edit(store, |s| {
            s.stash_active();
        })?,
        TodosSubcommand::Restore => edit(store, |s| {
            s.restore_stashed();
        })?,
    };

    if json {
        return print_json(&state.todos);
    }
    if state.todos.active.is_empty() && state.todos.stashed.is_empty() {
        println!("No todos.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = state
        .todos
        .active
        .iter()
        .map(|t| ("active", t))
        .chain(state.todos.stashed.iter().map(|t| ("stashed", t)))
        .map(|(list, t)| vec![list.to_string(), t.status.to_string(), t.content.clone()])
        .collect();
    print_table(&["LIST", "STATUS", "TODO"], &rows);
    Ok(())
}

fn edit(store: &Store, f: impl FnOnce(&mut State)) -> anyhow::Result<State> {
    store
        .edit_recovering(|s: &mut State| {
            f(s);
            s.clone()
        })
        .context("failed to update state")
}

fn task(store: &Store, json: bool) -> anyhow::Result<()> {
    let state = load(store)?;
    let active = state.active_task(store.root());
    if json {
        return print_json(&serde_json::json!({
            "current_task": state.current_task,
            "file_exists": active.is_some(),
        }));
    }
    match (&state.current_task, active) {
        (None, _) => println!("No current task."),
        (Some(t), None) => println!("{} (task file missing: {})", t.name, t.file),
        (Some(t), Some(_)) => {
            println!("{} ({})", t.name, t.file);
            if let Some(branch) = t.branch() {
                println!("branch: {branch}");
            }
        }
    }
    Ok(())
}
