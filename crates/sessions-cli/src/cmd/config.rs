use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use sessions_core::{
    config::{Config, TriggerCategory, WarnLevel},
    store::Store,
};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the full configuration
    Show,

    /// Set a scalar value, e.g. `features.auto_ultrathink false`
    Set { key: String, value: String },

    /// Manage trigger phrases
    Trigger {
        #[command(subcommand)]
        subcommand: TriggerSubcommand,
    },

    /// Manage tools blocked in discussion mode
    Tools {
        #[command(subcommand)]
        subcommand: ToolsSubcommand,
    },

    /// Manage bash read/write command patterns
    Bash {
        #[command(subcommand)]
        subcommand: BashSubcommand,
    },

    /// Validate the config for common mistakes
    Validate,
}

#[derive(Subcommand)]
pub enum TriggerSubcommand {
    /// List phrases, optionally for one category
    List { category: Option<String> },
    /// Add a phrase to a category
    Add {
        category: String,
        #[arg(required = true)]
        phrase: Vec<String>,
    },
    /// Remove a phrase from a category
    Remove {
        category: String,
        #[arg(required = true)]
        phrase: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ToolsSubcommand {
    /// List tools blocked in discussion mode
    List,
    /// Block a tool in discussion mode
    Block { tool: String },
    /// Allow a tool in discussion mode
    Unblock { tool: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PatternKind {
    Read,
    Write,
}

#[derive(Subcommand)]
pub enum BashSubcommand {
    /// List configured patterns
    List,
    /// Add a pattern
    Add {
        #[arg(value_enum)]
        kind: PatternKind,
        #[arg(required = true)]
        pattern: Vec<String>,
    },
    /// Remove a pattern
    Remove {
        #[arg(value_enum)]
        kind: PatternKind,
        #[arg(required = true)]
        pattern: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let store = Store::new(root);
    match subcmd {
        ConfigSubcommand::Show => show(&store, json),
        ConfigSubcommand::Set { key, value } => {
            store
                .try_edit_recovering(|c: &mut Config| c.set_value(&key, &value))
                .with_context(|| format!("failed to set {key}"))?;
            if json {
                print_json(&serde_json::json!({ "key": key, "value": value }))
            } else {
                println!("Set {key} = {value}");
                Ok(())
            }
        }
        ConfigSubcommand::Trigger { subcommand } => trigger(&store, subcommand, json),
        ConfigSubcommand::Tools { subcommand } => tools(&store, subcommand, json),
        ConfigSubcommand::Bash { subcommand } => bash(&store, subcommand, json),
        ConfigSubcommand::Validate => validate(&store, json),
    }
}

fn load(store: &Store) -> anyhow::Result<Config> {
    store.load().context("failed to load config")
}

fn show(store: &Store, json: bool) -> anyhow::Result<()> {
    let config = load(store)?;
    if json {
        return print_json(&config);
    }
    let git = &config.git_preferences;
    let env = &config.environment;
    let features = &config.features;
    println!("git_preferences:");
    println!("  default_branch: {}", git.default_branch);
    println!("  add_pattern:    {}", git.add_pattern);
    println!("  commit_style:   {}", git.commit_style);
    println!("  auto_merge:     {}", git.auto_merge);
    println!("  auto_push:      {}", git.auto_push);
    println!("environment:");
    println!("  developer_name: {}", env.developer_name);
    println!("  os:             {}", env.os);
    println!("  shell:          {}", env.shell);
    println!("features:");
    println!("  branch_enforcement: {}", features.branch_enforcement);
    println!("  auto_ultrathink:    {}", features.auto_ultrathink);
    println!(
        "  context_warnings:   85%={} 90%={}",
        features.context_warnings.warn_85, features.context_warnings.warn_90
    );
    println!("\nRun `sessions config trigger list` for trigger phrases.");
    Ok(())
}

// ---------------------------------------------------------------------------
// trigger
// ---------------------------------------------------------------------------

fn trigger(store: &Store, subcmd: TriggerSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TriggerSubcommand::List { category } => {
            let config = load(store)?;
            let categories: Vec<TriggerCategory> = match category {
                Some(c) => vec![c.parse()?],
                None => TriggerCategory::all().to_vec(),
            };
            if json {
                let map: serde_json::Map<String, serde_json::Value> = categories
                    .iter()
                    .map(|&c| (c.to_string(), serde_json::json!(config.trigger_phrases.phrases(c))))
                    .collect();
                return print_json(&map);
            }
            let rows: Vec<Vec<String>> = categories
                .iter()
                .flat_map(|&c| {
                    config
                        .trigger_phrases
                        .phrases(c)
                        .iter()
                        .map(move |p| vec![c.to_string(), p.clone()])
                })
                .collect();
            print_table(&["CATEGORY", "PHRASE"], &rows);
            Ok(())
        }
        TriggerSubcommand::Add { category, phrase } => {
            let category: TriggerCategory = category.parse()?;
            let phrase = phrase.join(" ");
            store
                .try_edit_recovering(|c: &mut Config| c.trigger_phrases.add(category, &phrase))
                .context("failed to add trigger phrase")?;
            report(json, "added", category, &phrase)
        }
        TriggerSubcommand::Remove { category, phrase } => {
            let category: TriggerCategory = category.parse()?;
            let phrase = phrase.join(" ");
            store
                .try_edit_recovering(|c: &mut Config| c.trigger_phrases.remove(category, &phrase))
                .context("failed to remove trigger phrase")?;
            report(json, "removed", category, &phrase)
        }
    }
}

fn report(json: bool, action: &str, category: TriggerCategory, phrase: &str) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({
            "action": action,
            "category": category.to_string(),
            "phrase": phrase,
        }))
    } else {
        println!("{action} '{phrase}' ({category})");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// tools / bash
// ---------------------------------------------------------------------------

fn tools(store: &Store, subcmd: ToolsSubcommand, json: bool) -> anyhow::Result<()> {
    let config = match subcmd {
        ToolsSubcommand::List => load(store)?,
        ToolsSubcommand::Block { tool } => store
            .edit_recovering(|c: &mut Config| {
                c.blocked_actions.implementation_only_tools.insert(tool);
                c.clone()
            })
            .context("failed to update config")?,
        ToolsSubcommand::Unblock { tool } => store
            .edit_recovering(|c: &mut Config| {
                c.blocked_actions.implementation_only_tools.remove(&tool);
                c.clone()
            })
            .context("failed to update config")?,
    };
    let tools = &config.blocked_actions.implementation_only_tools;
    if json {
        return print_json(tools);
    }
    for tool in tools {
        println!("{tool}");
    }
    Ok(())
}

fn bash(store: &Store, subcmd: BashSubcommand, json: bool) -> anyhow::Result<()> {
    let edit = |kind: PatternKind, add: bool, pattern: String| {
        store
            .edit_recovering(|c: &mut Config| {
                let set = match kind {
                    PatternKind::Read => &mut c.blocked_actions.bash_read_patterns,
                    PatternKind::Write => &mut c.blocked_actions.bash_write_patterns,
                };
                if add {
                    set.insert(pattern);
                } else {
                    set.remove(&pattern);
                }
                c.clone()
            })
            .context("failed to update config")
    };
    let config = match subcmd {
        BashSubcommand::List => load(store)?,
        BashSubcommand::Add { kind, pattern } => edit(kind, true, pattern.join(" "))?,
        BashSubcommand::Remove { kind, pattern } => edit(kind, false, pattern.join(" "))?,
    };

    let blocked = &config.blocked_actions;
    if json {
        return print_json(&serde_json::json!({
            "bash_read_patterns": blocked.bash_read_patterns,
            "bash_write_patterns": blocked.bash_write_patterns,
            "extrasafe": blocked.extrasafe,
        }));
    }
    let rows: Vec<Vec<String>> = blocked
        .bash_read_patterns
        .iter()
        .map(|p| vec!["read".to_string(), p.clone()])
        .chain(
            blocked
                .bash_write_patterns
                .iter()
                .map(|p| vec!["write".to_string(), p.clone()]),
        )
        .collect();
    if rows.is_empty() {
        println!("No custom bash patterns (built-in lists apply).");
    } else {
        print_table(&["KIND", "PATTERN"], &rows);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(store: &Store, json: bool) -> anyhow::Result<()> {
    let config = load(store)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
