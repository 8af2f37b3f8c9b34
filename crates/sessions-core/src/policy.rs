//! Allow/deny decisions for tool calls made by the assistant.
//!
//! Discussion mode blocks write-capable tools and Bash commands that modify the
//! filesystem. Implementation mode may additionally require the checked-out branch to
//! match the current task's branch.

use crate::config::Config;
use crate::paths;
use crate::state::{Mode, State};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

/// Tools whose input names a file that the state-file guard inspects.
const FILE_WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Commands that only read. Anchored at the start of a segment.
const READ_PATTERNS: &[&str] = &[
    r"ls", r"ll", r"cat", r"head", r"tail", r"less", r"more", r"grep", r"rg", r"ag",
    r"find", r"fd", r"wc", r"pwd", r"echo", r"printf", r"which", r"type", r"tree",
    r"file", r"stat", r"du", r"df", r"ps", r"env", r"date", r"whoami", r"uname",
    r"sort", r"uniq", r"cut", r"diff", r"jq", r"basename", r"dirname", r"realpath",
    r"true", r"false", r"test", r"cd",
    r"git (?:status|log|diff|show|branch|blame|rev-parse|remote|ls-files|describe)",
    r"cargo (?:check|tree|metadata)", r"npm (?:ls|list|view)",
];

/// Commands that modify files or repository state.
const WRITE_PATTERNS: &[&str] = &[
    r"rm", r"rmdir", r"mv", r"cp", r"mkdir", r"touch", r"chmod", r"chown", r"ln",
    r"truncate", r"dd", r"tee", r"install", r"patch", r"sed\s.*-i\S*", r"perl\s.*-i\S*",
    r"git (?:add|commit|push|pull|reset|checkout|switch|merge|rebase|stash|rm|mv|restore|clean|cherry-pick|tag)",
    r"npm (?:install|i|uninstall|update|ci)", r"yarn(?: add| remove)?", r"pnpm (?:add|install|remove)",
    r"pip3? (?:install|uninstall)", r"cargo (?:add|remove|install|update|fmt)",
];

static REDIRECT_RE: OnceLock<Regex> = OnceLock::new();
static ENV_ASSIGN_RE: OnceLock<Regex> = OnceLock::new();

fn redirect_re() -> &'static Regex {
    REDIRECT_RE.get_or_init(|| Regex::new(r">>?\s*(&?[^\s;&|<>]*)").unwrap())
}

fn env_assign_re() -> &'static Regex {
    ENV_ASSIGN_RE.get_or_init(|| Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*=\S*\s+)+").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Decision {
        Decision::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

// ---------------------------------------------------------------------------
// Command patterns
// ---------------------------------------------------------------------------

/// Compiled command prefixes. User patterns that are not valid regexes match literally.
#[derive(Debug)]
pub struct CommandPatterns {
    patterns: Vec<Regex>,
}

impl CommandPatterns {
    pub fn new<'a>(builtin: &[&str], extra: impl IntoIterator<Item = &'a String>) -> Self {
        let mut patterns: Vec<Regex> = builtin.iter().filter_map(|p| anchored(p)).collect();
        for p in extra {
            match anchored(p) {
                Some(re) => patterns.push(re),
                None => {
                    tracing::warn!(pattern = %p, "invalid bash pattern, matching literally");
                    patterns.extend(anchored(&regex::escape(p)));
                }
            }
        }
        Self { patterns }
    }

    pub fn reads(config: &Config) -> Self {
        Self::new(READ_PATTERNS, &config.blocked_actions.bash_read_patterns)
    }

    pub fn writes(config: &Config) -> Self {
        Self::new(WRITE_PATTERNS, &config.blocked_actions.bash_write_patterns)
    }

    pub fn matches(&self, segment: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(segment))
    }
}

fn anchored(pattern: &str) -> Option<Regex> {
    Regex::new(&format!(r"^(?:{pattern})(?:\s|$)")).ok()
}

// ---------------------------------------------------------------------------
// Bash parsing
// ---------------------------------------------------------------------------

/// A command segment with its quoted regions blanked out, so operators and
/// redirections inside string literals are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub unquoted: String,
}

/// Split on `&&`, `||`, `;` and `|` outside quotes.
pub fn split_segments(command: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut unquoted = String::new();
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    let mut flush = |text: &mut String, unquoted: &mut String| {
        let t = text.trim();
        if !t.is_empty() {
            segments.push(Segment {
                text: t.to_string(),
                unquoted: unquoted.trim().to_string(),
            });
        }
        text.clear();
        unquoted.clear();
    };

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                text.push(c);
                if c == q {
                    quote = None;
                    unquoted.push(c);
                } else {
                    unquoted.push(' ');
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    text.push(c);
                    unquoted.push(c);
                }
                ';' => flush(&mut text, &mut unquoted),
                '|' => {
                    if chars.peek() == Some(&'|') {
                        chars.next();
                    }
                    flush(&mut text, &mut unquoted);
                }
                '&' if chars.peek() == Some(&'&') => {
                    chars.next();
                    flush(&mut text, &mut unquoted);
                }
                _ => {
                    text.push(c);
                    unquoted.push(c);
                }
            },
        }
    }
    flush(&mut text, &mut unquoted);
    segments
}

impl Segment {
    /// The command with leading `VAR=value` assignments removed.
    pub fn command(&self) -> &str {
        match env_assign_re().find(&self.text) {
            Some(m) => &self.text[m.end()..],
            None => &self.text,
        }
    }

    /// First output redirection to a real file, if any. `/dev/null` and fd
    /// duplication (`2>&1`) are not file writes.
    pub fn file_redirect(&self) -> Option<String> {
        redirect_re().captures_iter(&self.unquoted).find_map(|caps| {
            let target = caps.get(1).map_or("", |m| m.as_str());
            if target.starts_with('&') || target == "/dev/null" {
                None
            } else {
                Some(target.to_string())
            }
        })
    }
}

/// Why a Bash command may not run in discussion mode, if it may not.
pub fn bash_violation(command: &str, config: &Config) -> Option<String> {
    let reads = CommandPatterns::reads(config);
    let writes = CommandPatterns::writes(config);
    for segment in split_segments(command) {
        if let Some(target) = segment.file_redirect() {
            return Some(format!("`{}` redirects output to '{target}'", segment.text));
        }
        let cmd = segment.command();
        if writes.matches(cmd) {
            return Some(format!("`{cmd}` modifies files"));
        }
        if config.blocked_actions.extrasafe && !reads.matches(cmd) {
            return Some(format!("`{cmd}` is not a known read-only command"));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn targets_state_file(root: &Path, tool_input: &Value) -> bool {
    let Some(file) = tool_input
        .get("file_path")
        .or_else(|| tool_input.get("notebook_path"))
        .and_then(Value::as_str)
    else {
        return false;
    };
    let path = Path::new(file);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    path == paths::state_path(root) || path.ends_with(paths::STATE_FILE)
}

/// Branch checked out in `root`. `None` on any git failure.
pub fn git_current_branch(root: &Path) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(root)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!branch.is_empty()).then_some(branch)
}

pub fn evaluate(
    config: &Config,
    state: &State,
    root: &Path,
    tool_name: &str,
    tool_input: &Value,
) -> Decision {
    evaluate_with(config, state, root, tool_name, tool_input, git_current_branch)
}

/// [`evaluate`] with the branch lookup supplied by the caller.
pub fn evaluate_with(
    config: &Config,
    state: &State,
    root: &Path,
    tool_name: &str,
    tool_input: &Value,
    current_branch: impl FnOnce(&Path) -> Option<String>,
) -> Decision {
    if FILE_WRITE_TOOLS.contains(&tool_name) && targets_state_file(root, tool_input) {
        return Decision::deny(
            "The session state file is managed by the sessions tool. Use `sessions state` commands instead of editing it.",
        );
    }

    let write_tool = config
        .blocked_actions
        .implementation_only_tools
        .contains(tool_name);

    match state.mode {
        Mode::Discussion if state.flags.bypass_mode => Decision::Allow,
        Mode::Discussion => {
            if write_tool {
                return Decision::deny(format!(
                    "{tool_name} is blocked in discussion mode. Propose the change and wait for the user to approve implementation."
                ));
            }
            if tool_name == "Bash" {
                let command = tool_input
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(why) = bash_violation(command, config) {
                    return Decision::deny(format!(
                        "Bash command blocked in discussion mode: {why}."
                    ));
                }
            }
            Decision::Allow
        }
        Mode::Implementation => {
            if !write_tool || !config.features.branch_enforcement {
                return Decision::Allow;
            }
            let Some(expected) = state.active_task(root).and_then(|t| t.branch()) else {
                return Decision::Allow;
            };
            match current_branch(root) {
                Some(actual) if actual != expected => Decision::deny(format!(
                    "You are on branch '{actual}' but the current task expects '{expected}'. Switch branches before editing."
                )),
                Some(_) => Decision::Allow,
                None => {
                    tracing::debug!("git branch lookup failed, skipping branch enforcement");
                    Decision::Allow
                }
            }
        }
    }
}
