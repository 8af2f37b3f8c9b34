use crate::error::{Result, SessionsError};
use crate::paths;
use crate::schema::{lenient_enum_serde, LenientEnum};
use crate::store::{Document, DocumentKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Whether write-capable tools are currently permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Discussion,
    Implementation,
}

impl LenientEnum for Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Discussion => "discussion",
            Mode::Implementation => "implementation",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "discussion" | "discuss" | "no" => Some(Mode::Discussion),
            "implementation" | "implement" | "go" => Some(Mode::Implementation),
            _ => None,
        }
    }
}

lenient_enum_serde!(Mode);

impl std::str::FromStr for Mode {
    type Err = SessionsError;

    fn from_str(s: &str) -> Result<Self> {
        Mode::from_legacy(s.trim()).ok_or_else(|| SessionsError::InvalidMode(s.to_string()))
    }
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Discussion => Mode::Implementation,
            Mode::Implementation => Mode::Discussion,
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    Sonnet,
    Opus,
    #[default]
    Unknown,
}

impl LenientEnum for Model {
    fn as_str(self) -> &'static str {
        match self {
            Model::Sonnet => "sonnet",
            Model::Opus => "opus",
            Model::Unknown => "unknown",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sonnet" => Some(Model::Sonnet),
            "opus" => Some(Model::Opus),
            "unknown" => Some(Model::Unknown),
            _ => None,
        }
    }
}

lenient_enum_serde!(Model);

impl Model {
    /// Classify the runtime's display name (e.g. "Sonnet 4.5 (1M context)").
    pub fn from_display_name(name: &str) -> Model {
        let lower = name.to_ascii_lowercase();
        if lower.contains("sonnet") {
            Model::Sonnet
        } else if lower.contains("opus") {
            Model::Opus
        } else {
            Model::Unknown
        }
    }

    /// Usable context window in tokens.
    pub fn context_limit(self) -> u64 {
        match self {
            Model::Sonnet => 800_000,
            Model::Opus | Model::Unknown => 160_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Todos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl LenientEnum for TodoStatus {
    fn as_str(self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" | "todo" => Some(TodoStatus::Pending),
            "in_progress" | "active" => Some(TodoStatus::InProgress),
            "completed" | "complete" | "done" => Some(TodoStatus::Completed),
            _ => None,
        }
    }
}

lenient_enum_serde!(TodoStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(
        rename = "activeForm",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub active_form: Option<String>,
}

impl TodoItem {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: TodoStatus::Pending,
            active_form: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Todos {
    pub active: Vec<TodoItem>,
    pub stashed: Vec<TodoItem>,
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// Ephemeral per-session booleans. Nothing here survives a session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFlags {
    /// A subagent (Task tool) is running.
    pub subagent: bool,
    /// Onboarding walkthrough in progress.
    pub noob: bool,
    pub bypass_mode: bool,
    /// Context warnings already emitted this session.
    pub context_85: bool,
    pub context_90: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionFlags {
    pub fn reset(&mut self) {
        *self = SessionFlags::default();
    }
}

// ---------------------------------------------------------------------------
// CurrentTask / Learnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTask {
    pub name: String,
    /// Path relative to the tasks directory.
    pub file: String,
    #[serde(rename = "filePath")]
    pub file_path: PathBuf,
    /// Frontmatter snapshot taken when the task was started.
    #[serde(default)]
    pub task_state: Map<String, Value>,
}

impl CurrentTask {
    pub fn branch(&self) -> Option<&str> {
        self.task_state
            .get("branch")
            .and_then(Value::as_str)
            .filter(|b| !b.trim().is_empty())
    }

    /// Absolute location of the task file, resolving a relative `filePath` against `root`.
    pub fn resolved_path(&self, root: &Path) -> PathBuf {
        if self.file_path.as_os_str().is_empty() {
            paths::tasks_dir(root).join(&self.file)
        } else if self.file_path.is_absolute() {
            self.file_path.clone()
        } else {
            root.join(&self.file_path)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Learnings {
    pub enabled: bool,
    pub auto_load: bool,
    pub active_topics: Vec<String>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub mode: Mode,
    pub model: Model,
    pub current_task: Option<CurrentTask>,
    pub flags: SessionFlags,
    pub todos: Todos,
    pub metadata: BTreeMap<String, Value>,
    pub learnings: Learnings,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document for State {
    const KIND: DocumentKind = DocumentKind::State;

    fn touch(&mut self) {
        self.last_updated = Some(Utc::now());
    }
}

impl State {
    // -----------------------------------------------------------------------
    // Mode
    // -----------------------------------------------------------------------

    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Set the mode; returns whether it changed.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    pub fn writes_allowed(&self) -> bool {
        self.mode == Mode::Implementation
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Reset ephemeral state for a new session: flags cleared, active todos dropped,
    /// stashed todos restored.
    pub fn begin_session(&mut self) {
        self.flags.reset();
        self.todos.active.clear();
        self.restore_stashed();
    }

    // -----------------------------------------------------------------------
    // Todos
    // -----------------------------------------------------------------------

    /// Move the active list to the stash, replacing any previous stash.
    pub fn stash_active(&mut self) -> usize {
        self.todos.stashed = std::mem::take(&mut self.todos.active);
        self.todos.stashed.len()
    }

    /// Drain the stash onto the end of the active list. Returns how many were restored.
    pub fn restore_stashed(&mut self) -> usize {
        let restored = std::mem::take(&mut self.todos.stashed);
        let count = restored.len();
        self.todos.active.extend(restored);
        count
    }

    pub fn store_todos(&mut self, todos: Vec<TodoItem>) {
        self.todos.active = todos;
    }

    pub fn clear_todos(&mut self) {
        self.todos.active.clear();
    }

    /// True when there is at least one active todo and every one is completed.
    pub fn all_todos_complete(&self) -> bool {
        !self.todos.active.is_empty()
            && self
                .todos
                .active
                .iter()
                .all(|t| t.status == TodoStatus::Completed)
    }

    // -----------------------------------------------------------------------
    // Current task
    // -----------------------------------------------------------------------

    pub fn set_task(&mut self, task: CurrentTask) {
        self.current_task = Some(task);
    }

    pub fn clear_task(&mut self) -> Option<CurrentTask> {
        self.current_task.take()
    }

    /// The current task, if one is selected and its file still exists.
    pub fn active_task(&self, root: &Path) -> Option<&CurrentTask> {
        let task = self.current_task.as_ref()?;
        let path = task.resolved_path(root);
        if path.is_file() {
            Some(task)
        } else {
            tracing::warn!(
                error = %SessionsError::MissingTaskFile(path),
                task = %task.name,
                "current task file missing, treating as no active task"
            );
            None
        }
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub fn meta(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.metadata.get(namespace).and_then(Value::as_object)
    }

    /// Mutable view of a feature's metadata namespace, created (or replaced, if it
    /// is not an object) on first use.
    pub fn meta_mut(&mut self, namespace: &str) -> &mut Map<String, Value> {
        let slot = self
            .metadata
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("metadata slot was just made an object"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
