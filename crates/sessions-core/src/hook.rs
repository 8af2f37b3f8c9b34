//! Hook contract with the assistant runtime and the per-event handlers.
//!
//! Each hook invocation receives one JSON payload on stdin and answers with one JSON
//! object on stdout. Handlers here are pure with respect to stdio; the binary does the
//! reading and printing.

use crate::config::{Config, TriggerCategory};
use crate::error::Result;
use crate::index;
use crate::paths;
use crate::policy::{self, Decision};
use crate::state::{Mode, Model, State, TodoItem};
use crate::store::Store;
use crate::task::TaskCatalog;
use crate::transcript::{self, Transcript};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::PathBuf;

pub const ULTRATHINK: &str = "[[ ultrathink ]]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
}

impl HookEvent {
    /// Name used in the runtime's `hookEventName` field.
    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::SessionStart => "SessionStart",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub display_name: String,
}

/// Payload the runtime sends on stdin. Every field is optional in practice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub session_id: String,
    pub transcript_path: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub hook_event_name: String,
    pub tool_name: Option<String>,
    pub tool_input: Value,
    pub prompt: Option<String>,
    pub model: Option<ModelInfo>,
}

impl HookInput {
    fn transcript(&self) -> Transcript {
        let Some(path) = &self.transcript_path else {
            return Transcript::default();
        };
        Transcript::read(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read transcript");
            Transcript::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
}

impl HookOutput {
    pub fn context(event: HookEvent, text: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: event.as_str().to_string(),
                additional_context: text.into(),
                permission_decision: None,
                permission_decision_reason: None,
            },
        }
    }

    pub fn with_decision(mut self, decision: &Decision) -> Self {
        if let Decision::Deny { reason } = decision {
            self.hook_specific_output.permission_decision = Some("deny".to_string());
            self.hook_specific_output.permission_decision_reason = Some(reason.clone());
        }
        self
    }

    pub fn append_context(&mut self, text: &str) {
        let ctx = &mut self.hook_specific_output.additional_context;
        if !ctx.is_empty() {
            ctx.push_str("\n\n");
        }
        ctx.push_str(text);
    }
}

/// Emitted on stdout when a hook fails unexpectedly.
#[derive(Debug, Clone, Serialize)]
pub struct HookError {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn handle(event: HookEvent, store: &Store, input: &HookInput) -> Result<HookOutput> {
    tracing::debug!(event = %event, session = %input.session_id, "hook invoked");
    match event {
        HookEvent::SessionStart => session_start(store, input),
        HookEvent::UserPromptSubmit => user_prompt_submit(store, input),
        HookEvent::PreToolUse => pre_tool_use(store, input),
        HookEvent::PostToolUse => post_tool_use(store, input),
    }
}

// ---------------------------------------------------------------------------
// SessionStart
// ---------------------------------------------------------------------------

pub fn session_start(store: &Store, input: &HookInput) -> Result<HookOutput> {
    let model = input
        .model
        .as_ref()
        .map(|m| Model::from_display_name(&m.display_name));
    let state = store.edit_or_degrade(|s: &mut State| {
        if let Some(model) = model {
            s.model = model;
        }
        s.begin_session();
        s.clone()
    })?;
    let config: Config = store.load_or_recover();
    let root = store.root();

    let mut text = String::new();
    match state.active_task(root) {
        Some(task) => match std::fs::read_to_string(task.resolved_path(root)) {
            Ok(contents) => {
                let _ = writeln!(text, "Current task: {} ({})\n", task.name, task.file);
                text.push_str(&contents);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read current task file");
                text.push_str(&task_listing(store, &config));
            }
        },
        None => text.push_str(&task_listing(store, &config)),
    }

    if !state.todos.active.is_empty() {
        text.push_str("\n\nRestored todos:\n");
        for todo in &state.todos.active {
            let _ = writeln!(text, "- [{}] {}", todo.status, todo.content);
        }
    }

    Ok(HookOutput::context(HookEvent::SessionStart, text))
}

fn task_listing(store: &Store, config: &Config) -> String {
    let root = store.root();
    let catalog = TaskCatalog::scan(&paths::tasks_dir(root));
    let (indexes, _) = index::load_indexes(&paths::indexes_dir(root));
    let listing = index::reconcile(&catalog, &indexes);
    format!(
        "No active task.\n\n{}",
        index::render(&listing, &config.trigger_phrases)
    )
}

// ---------------------------------------------------------------------------
// UserPromptSubmit
// ---------------------------------------------------------------------------

fn protocol_context(category: TriggerCategory, phrase: &str) -> Option<String> {
    let text = match category {
        TriggerCategory::TaskCreation => format!(
            "[Task creation: '{phrase}'] Create a new task file in sessions/tasks/ from \
             sessions/tasks/TEMPLATE.md with `status: pending`, then propose it to the user."
        ),
        TriggerCategory::TaskStartup => format!(
            "[Task startup: '{phrase}'] Identify the task the user named and run \
             `sessions tasks start <task name>`. Current todos have been stashed."
        ),
        TriggerCategory::TaskCompletion => format!(
            "[Task completion: '{phrase}'] Set the task's `status: complete`, move it to \
             sessions/tasks/done/, and run `sessions tasks clear`."
        ),
        TriggerCategory::ContextCompaction => format!(
            "[Context compaction: '{phrase}'] Record progress in the task file so work can \
             resume in a fresh session. Current todos have been stashed."
        ),
        TriggerCategory::ImplementationMode | TriggerCategory::DiscussionMode => return None,
    };
    Some(text)
}

pub fn user_prompt_submit(store: &Store, input: &HookInput) -> Result<HookOutput> {
    let config: Config = store.load_or_recover();
    let triggers = &config.trigger_phrases;
    let prompt = input.prompt.as_deref().unwrap_or_default();
    let transcript = input.transcript();

    let contexts = store.edit_or_degrade(|s: &mut State| {
        let mut contexts = Vec::new();
        let mut fired = false;

        match s.mode {
            Mode::Discussion => {
                if let Some(phrase) = triggers.find_in(TriggerCategory::ImplementationMode, prompt) {
                    s.set_mode(Mode::Implementation);
                    fired = true;
                    contexts.push(format!(
                        "[Mode: implementation] '{phrase}' approved the proposed changes. \
                         Record them as todos, work through them, and stay within their scope."
                    ));
                }
            }
            Mode::Implementation => {
                if let Some(phrase) = triggers.find_in(TriggerCategory::DiscussionMode, prompt) {
                    s.set_mode(Mode::Discussion);
                    s.clear_todos();
                    fired = true;
                    contexts.push(format!(
                        "[Mode: discussion] '{phrase}' stopped implementation. \
                         Do not edit files until the user approves a new plan."
                    ));
                }
            }
        }

        for &category in &[
            TriggerCategory::TaskCreation,
            TriggerCategory::TaskStartup,
            TriggerCategory::TaskCompletion,
            TriggerCategory::ContextCompaction,
        ] {
            let Some(phrase) = triggers.find_in(category, prompt) else {
                continue;
            };
            if matches!(
                category,
                TriggerCategory::TaskStartup | TriggerCategory::ContextCompaction
            ) {
                s.stash_active();
            }
            fired = true;
            contexts.extend(protocol_context(category, phrase));
        }

        if !fired && config.features.auto_ultrathink && !prompt.trim_start().starts_with('/') {
            contexts.push(ULTRATHINK.to_string());
        }

        if let Some(usage) = transcript.context_usage(s.model) {
            let warnings = &config.features.context_warnings;
            let pct = usage.percent();
            if pct >= 90.0 && warnings.warn_90 && !s.flags.context_90 {
                s.flags.context_90 = true;
                s.flags.context_85 = true;
                contexts.push(format!(
                    "[Context: {pct:.0}% used ({}/{} tokens)] Wrap up now and compact context before continuing.",
                    usage.used, usage.limit
                ));
            } else if pct >= 85.0 && warnings.warn_85 && !s.flags.context_85 {
                s.flags.context_85 = true;
                contexts.push(format!(
                    "[Context: {pct:.0}% used ({}/{} tokens)] Consider compacting context soon.",
                    usage.used, usage.limit
                ));
            }
        }

        contexts
    })?;

    Ok(HookOutput::context(
        HookEvent::UserPromptSubmit,
        contexts.join("\n\n"),
    ))
}

// ---------------------------------------------------------------------------
// PreToolUse / PostToolUse
// ---------------------------------------------------------------------------

pub fn pre_tool_use(store: &Store, input: &HookInput) -> Result<HookOutput> {
    let config: Config = store.load_or_recover();
    let state: State = store.load_or_recover();
    let tool = input.tool_name.as_deref().unwrap_or_default();

    let decision = policy::evaluate(&config, &state, store.root(), tool, &input.tool_input);
    if let Decision::Deny { reason } = &decision {
        tracing::info!(tool, reason = %reason, "tool call denied");
        return Ok(HookOutput::context(HookEvent::PreToolUse, "").with_decision(&decision));
    }

    let mut text = String::new();
    if tool == "Task" {
        let agent = input
            .tool_input
            .get("subagent_type")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty() && !a.contains(['/', '\\']) && *a != "..")
            .unwrap_or(transcript::SHARED_AGENT);
        store.edit_or_degrade(|s: &mut State| s.flags.subagent = true)?;
        match transcript::write_chunks(
            store.root(),
            agent,
            &input.transcript(),
            transcript::CHUNK_BUDGET,
        ) {
            Ok(chunks) => {
                let _ = write!(
                    text,
                    "Conversation transcript for the {agent} agent: {} file(s) in {}/{agent}/",
                    chunks.len(),
                    paths::TRANSCRIPTS_DIR
                );
            }
            Err(e) => tracing::warn!(error = %e, agent, "failed to write transcript chunks"),
        }
    }

    Ok(HookOutput::context(HookEvent::PreToolUse, text))
}

#[derive(Deserialize)]
struct TodoWriteInput {
    #[serde(default)]
    todos: Vec<TodoItem>,
}

pub fn post_tool_use(store: &Store, input: &HookInput) -> Result<HookOutput> {
    let text = match input.tool_name.as_deref() {
        Some("Task") => {
            store.edit_or_degrade(|s: &mut State| s.flags.subagent = false)?;
            String::new()
        }
        Some("TodoWrite") => {
            let todos = serde_json::from_value::<TodoWriteInput>(input.tool_input.clone())
                .map(|t| t.todos)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring malformed TodoWrite input");
                    Vec::new()
                });
            let finished = store.edit_or_degrade(|s: &mut State| {
                s.store_todos(todos);
                let finished = s.mode == Mode::Implementation && s.all_todos_complete();
                if finished {
                    s.set_mode(Mode::Discussion);
                    s.clear_todos();
                }
                finished
            })?;
            if finished {
                "[Mode: discussion] All todos are complete. Summarize the work and \
                 wait for the user before making further changes."
                    .to_string()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    };
    Ok(HookOutput::context(HookEvent::PostToolUse, text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
