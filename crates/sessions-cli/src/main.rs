mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, hook::HookKind, state::StateSubcommand, tasks::TasksSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sessions",
    about = "Session workflow state for AI coding assistants: modes, tasks, todos and hooks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from sessions/ or .git/)
    #[arg(long, global = true, env = "SESSIONS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the sessions/ directory, default config and state
    Init,

    /// Inspect and change session state (mode, flags, todos)
    State {
        #[command(subcommand)]
        subcommand: Option<StateSubcommand>,
    },

    /// Show the mode, or set it (discussion | implementation)
    Mode { mode: Option<String> },

    /// Inspect and change the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// List, start and clear tasks
    Tasks {
        #[command(subcommand)]
        subcommand: TasksSubcommand,
    },

    /// Split text into byte-bounded chunks
    Chunk {
        /// Input file (default: stdin)
        file: Option<PathBuf>,

        /// Maximum bytes per chunk
        #[arg(long, default_value_t = sessions_core::transcript::CHUNK_BUDGET)]
        max_bytes: usize,

        /// Treat the input as a runtime transcript and write chunk files for this agent
        #[arg(long)]
        agent: Option<String>,
    },

    /// Run a hook for the assistant runtime (reads the JSON payload on stdin)
    Hook {
        #[arg(value_enum)]
        event: HookKind,
    },
}

fn main() {
    let cli = Cli::parse();

    // Hook stdout is a JSON channel; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref(), None);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::State { subcommand } => cmd::state::run(&root, subcommand, cli.json),
        Commands::Mode { mode } => {
            cmd::state::run(&root, Some(StateSubcommand::Mode { mode }), cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Tasks { subcommand } => cmd::tasks::run(&root, subcommand, cli.json),
        Commands::Chunk {
            file,
            max_bytes,
            agent,
        } => cmd::chunk::run(&root, file.as_deref(), max_bytes, agent.as_deref(), cli.json),
        // Hooks resolve their own root from the payload's cwd.
        Commands::Hook { event } => cmd::hook::run(cli.root.as_deref(), event),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
