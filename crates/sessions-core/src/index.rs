//! Curated task indexes and the open-task listing built from them.
//!
//! Index files live in `sessions/tasks/indexes/` and group task references under a
//! human-meaningful heading:
//!
//! ```text
//! ---
//! index: auth
//! name: Authentication
//! description: Login, sessions and tokens
//! ---
//! - `fix-login.md` - broken redirect after login
//! - `sso/` - single sign-on rollout
//! ```
//!
//! Indexes are processed in file-name order. A task referenced by more than one index
//! is listed under the first index only; later claims are reported as warnings.

use crate::config::{TriggerCategory, TriggerPhrases};
use crate::error::SessionsError;
use crate::frontmatter::Frontmatter;
use crate::task::{DirectoryTask, TaskCatalog, TaskEntry};
use crate::walk;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

pub const UNCATEGORIZED: &str = "Uncategorized";

static REFERENCE_RE: OnceLock<Regex> = OnceLock::new();

fn reference_re() -> &'static Regex {
    REFERENCE_RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("valid reference regex"))
}

// ---------------------------------------------------------------------------
// IndexFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFile {
    /// File name within the indexes directory.
    pub file: String,
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub references: Vec<String>,
}

impl IndexFile {
    /// Parse an index file. Malformed list entries are returned alongside the index
    /// rather than failing it.
    pub fn parse(file_name: &str, text: &str) -> (IndexFile, Vec<SessionsError>) {
        let (fm, body) = Frontmatter::parse(text).unwrap_or((Frontmatter::default(), text));
        let stem = file_name.strip_suffix(".md").unwrap_or(file_name);
        let body_offset = text[..text.len() - body.len()].lines().count();

        let mut references = Vec::new();
        let mut malformed = Vec::new();
        for (i, line) in body.lines().enumerate() {
            let trimmed = line.trim_start();
            let Some(item) = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
            else {
                continue;
            };
            match reference_re().captures(item) {
                Some(caps) => references.push(caps[1].trim().to_string()),
                None => malformed.push(SessionsError::MalformedIndexEntry {
                    file: file_name.to_string(),
                    line: body_offset + i + 1,
                    text: line.trim().to_string(),
                }),
            }
        }

        let index = IndexFile {
            file: file_name.to_string(),
            id: fm.get("index").unwrap_or(stem).to_string(),
            name: fm.get("name").map(str::to_string),
            description: fm.get("description").map(str::to_string),
            references,
        };
        (index, malformed)
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Load every `*.md` index in `dir`, sorted by file name. Two files declaring the same
/// `index:` id are both kept and reported.
pub fn load_indexes(dir: &Path) -> (Vec<IndexFile>, Vec<String>) {
    let mut indexes: Vec<IndexFile> = Vec::new();
    let mut warnings = Vec::new();
    for entry in walk::children(dir, |e| !walk::is_markdown(e)) {
        let text = match std::fs::read_to_string(&entry.path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %entry.name, error = %e, "skipping unreadable index");
                continue;
            }
        };
        let (index, malformed) = IndexFile::parse(&entry.name, &text);
        for err in malformed {
            tracing::warn!(error = %err, "skipping index entry");
            warnings.push(err.to_string());
        }
        if let Some(first) = indexes.iter().find(|i| i.id == index.id) {
            let warning = format!(
                "index id '{}' is declared by both {} and {}",
                index.id, first.file, index.file
            );
            tracing::warn!("{warning}");
            warnings.push(warning);
        }
        indexes.push(index);
    }
    (indexes, warnings)
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedTask {
    pub name: String,
    pub status: String,
    /// 0 for tasks, 1 for subtasks of a directory task.
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tasks: Vec<ListedTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub sections: Vec<Section>,
    pub uncategorized: Vec<ListedTask>,
    pub warnings: Vec<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.uncategorized.is_empty()
    }
}

enum OpenTask<'a> {
    File(&'a TaskEntry),
    Directory(&'a DirectoryTask),
}

impl OpenTask<'_> {
    fn key(&self) -> &str {
        match self {
            OpenTask::File(t) => &t.name,
            OpenTask::Directory(d) => &d.entry.name,
        }
    }

    fn expand(&self, out: &mut Vec<ListedTask>) {
        let listed = |t: &TaskEntry, depth| ListedTask {
            name: t.name.clone(),
            status: t.status.clone(),
            depth,
        };
        match self {
            OpenTask::File(t) => out.push(listed(t, 0)),
            OpenTask::Directory(d) => {
                out.push(listed(&d.entry, 0));
                out.extend(d.open_subtasks().map(|s| listed(s, 1)));
            }
        }
    }
}

/// Flat references match exactly; directory references match with or without the
/// trailing slash.
fn lookup<'a>(
    files: &BTreeMap<&str, &'a TaskEntry>,
    dirs: &BTreeMap<&str, &'a DirectoryTask>,
    reference: &str,
) -> Option<OpenTask<'a>> {
    if let Some(t) = files.get(reference) {
        return Some(OpenTask::File(*t));
    }
    dirs.get(reference.trim_end_matches('/'))
        .map(|d| OpenTask::Directory(*d))
}

/// Group the catalog's open tasks under the indexes that reference them.
pub fn reconcile(catalog: &TaskCatalog, indexes: &[IndexFile]) -> Listing {
    let files: BTreeMap<&str, &TaskEntry> = catalog
        .open_files()
        .map(|t| (t.name.as_str(), t))
        .collect();
    let dirs: BTreeMap<&str, &DirectoryTask> = catalog
        .open_directories()
        .map(|d| (d.dir_name(), d))
        .collect();

    let mut listing = Listing::default();
    // task key -> position of the index that claimed it
    let mut claimed: HashMap<String, usize> = HashMap::new();

    for (pos, index) in indexes.iter().enumerate() {
        let mut tasks = Vec::new();
        for reference in &index.references {
            let Some(task) = lookup(&files, &dirs, reference) else {
                tracing::debug!(index = %index.id, reference = %reference, "reference is not an open task");
                continue;
            };
            match claimed.get(task.key()) {
                Some(&owner) if owner == pos => continue,
                Some(&owner) => {
                    let owner = &indexes[owner];
                    let warning = format!(
                        "task '{}' is listed in index '{}' ({}) and '{}' ({}); showing it under '{}'",
                        task.key(),
                        owner.id,
                        owner.file,
                        index.id,
                        index.file,
                        owner.id
                    );
                    tracing::warn!("{warning}");
                    listing.warnings.push(warning);
                    continue;
                }
                None => {}
            }
            claimed.insert(task.key().to_string(), pos);
            task.expand(&mut tasks);
        }
        if !tasks.is_empty() {
            listing.sections.push(Section {
                id: index.id.clone(),
                title: index.title().to_string(),
                description: index.description.clone().unwrap_or_default(),
                tasks,
            });
        }
    }

    let mut leftovers: Vec<OpenTask<'_>> = files
        .values()
        .map(|t| OpenTask::File(*t))
        .chain(dirs.values().map(|d| OpenTask::Directory(*d)))
        .filter(|t| !claimed.contains_key(t.key()))
        .collect();
    leftovers.sort_by(|a, b| a.key().cmp(b.key()));
    for task in leftovers {
        task.expand(&mut listing.uncategorized);
    }

    listing
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn quoted_phrases(triggers: &TriggerPhrases, category: TriggerCategory, suffix: &str) -> String {
    triggers
        .phrases(category)
        .iter()
        .map(|p| format!("\"{p} {suffix}\""))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn render_task(out: &mut String, task: &ListedTask) {
    let indent = "  ".repeat(task.depth + 1);
    out.push_str(&format!("{indent}• {} ({})\n", task.name, task.status));
}

/// Human-readable listing followed by instructions for starting (or creating) a task.
pub fn render(listing: &Listing, triggers: &TriggerPhrases) -> String {
    let mut out = String::new();

    if listing.is_empty() {
        out.push_str("No open tasks.\n");
        let create = quoted_phrases(triggers, TriggerCategory::TaskCreation, "<description>");
        if create.is_empty() {
            out.push_str("\nCreate a task file in sessions/tasks/ to get started.\n");
        } else {
            out.push_str(&format!("\nTo create a task, say {create}.\n"));
        }
        return out;
    }

    for section in &listing.sections {
        out.push_str(&format!("## {}\n", section.title));
        if !section.description.is_empty() {
            out.push_str(&section.description);
            out.push('\n');
        }
        for task in &section.tasks {
            render_task(&mut out, task);
        }
        out.push('\n');
    }

    if !listing.uncategorized.is_empty() {
        out.push_str(&format!("## {UNCATEGORIZED}\n"));
        for task in &listing.uncategorized {
            render_task(&mut out, task);
        }
        out.push('\n');
    }

    for warning in &listing.warnings {
        out.push_str(&format!("Note: {warning}\n"));
    }
    if !listing.warnings.is_empty() {
        out.push('\n');
    }

    let start = quoted_phrases(triggers, TriggerCategory::TaskStartup, "<task name>");
    if start.is_empty() {
        out.push_str("To start a task, run `sessions tasks start <task name>`.\n");
    } else {
        out.push_str(&format!("To start a task, say {start}.\n"));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
