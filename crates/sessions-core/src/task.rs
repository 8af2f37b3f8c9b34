use crate::error::{Result, SessionsError};
use crate::frontmatter;
use crate::paths::{self, DONE_DIR_NAME, INDEXES_DIR_NAME, TASK_README, TASK_TEMPLATE};
use crate::state::CurrentTask;
use crate::walk;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const STATUS_COMPLETE: &str = "complete";

/// One listable task: a flat file (`fix-login.md`), a directory task (`refactor/`), or a
/// subtask (`refactor/api.md`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEntry {
    pub name: String,
    pub status: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl TaskEntry {
    pub fn is_open(&self) -> bool {
        self.status != STATUS_COMPLETE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryTask {
    pub entry: TaskEntry,
    pub subtasks: Vec<TaskEntry>,
}

impl DirectoryTask {
    /// Directory name without the trailing slash.
    pub fn dir_name(&self) -> &str {
        self.entry.name.trim_end_matches('/')
    }

    pub fn open_subtasks(&self) -> impl Iterator<Item = &TaskEntry> {
        self.subtasks.iter().filter(|t| t.is_open())
    }
}

/// Every task found in the tasks directory, complete ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCatalog {
    pub files: Vec<TaskEntry>,
    pub directories: Vec<DirectoryTask>,
}

fn excluded_top_level(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name();
    name == DONE_DIR_NAME || name == INDEXES_DIR_NAME || name == TASK_TEMPLATE
}

impl TaskCatalog {
    /// Scan `tasks_dir`. Files without a parseable status are skipped, as are
    /// directories whose README has none.
    pub fn scan(tasks_dir: &Path) -> TaskCatalog {
        let mut catalog = TaskCatalog::default();

        for item in walk::children(tasks_dir, excluded_top_level) {
            if item.is_dir {
                if let Some(dir) = scan_directory(&item.path, &item.name) {
                    catalog.directories.push(dir);
                }
            } else if item.name.ends_with(".md") {
                match frontmatter::read_status(&item.path) {
                    Some(status) => catalog.files.push(TaskEntry {
                        name: item.name,
                        status,
                        path: item.path,
                    }),
                    None => tracing::debug!(file = %item.name, "task file has no status"),
                }
            }
        }

        catalog
    }

    pub fn open_files(&self) -> impl Iterator<Item = &TaskEntry> {
        self.files.iter().filter(|t| t.is_open())
    }

    pub fn open_directories(&self) -> impl Iterator<Item = &DirectoryTask> {
        self.directories.iter().filter(|d| d.entry.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.open_files().count()
            + self
                .open_directories()
                .map(|d| 1 + d.open_subtasks().count())
                .sum::<usize>()
    }
}

fn scan_directory(dir: &Path, dir_name: &str) -> Option<DirectoryTask> {
    let readme = dir.join(TASK_README);
    let status = frontmatter::read_status(&readme)?;
    let subtasks = walk::children(dir, |e| !walk::is_markdown(e))
        .into_iter()
        .filter(|e| e.name != TASK_README && e.name != TASK_TEMPLATE)
        .filter_map(|e| {
            let status = frontmatter::read_status(&e.path)?;
            Some(TaskEntry {
                name: format!("{dir_name}/{}", e.name),
                status,
                path: e.path,
            })
        })
        .collect();
    Some(DirectoryTask {
        entry: TaskEntry {
            name: format!("{dir_name}/"),
            status,
            path: readme,
        },
        subtasks,
    })
}

/// Build the current-task record for a task reference, snapshotting its frontmatter.
pub fn resolve_current(root: &Path, name: &str) -> Result<CurrentTask> {
    let path = paths::task_file(root, name)
        .ok_or_else(|| SessionsError::TaskNotFound(name.to_string()))?;
    let fm = frontmatter::read(&path)?.unwrap_or_default();
    let tasks_dir = paths::tasks_dir(root);
    let file = path
        .strip_prefix(&tasks_dir)
        .unwrap_or(path.as_path())
        .to_string_lossy()
        .replace('\\', "/");
    Ok(CurrentTask {
        name: fm
            .get("name")
            .map(str::to_string)
            .unwrap_or_else(|| display_name(name)),
        file,
        file_path: path,
        task_state: fm.to_json(),
    })
}

fn display_name(reference: &str) -> String {
    let trimmed = reference.trim_end_matches('/');
    trimmed.strip_suffix(".md").unwrap_or(trimmed).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_task(dir: &Path, rel: &str, status: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("---\nname: {rel}\nstatus: {status}\n---\n# {rel}\n")).unwrap();
    }

    #[test]
    fn scan_finds_files_and_directories() {
        let dir = TempDir::new().unwrap();
        let tasks = dir.path();
        write_task(tasks, "a.md", "pending");
        write_task(tasks, "b.md", "complete");
        write_task(tasks, "proj/README.md", "in-progress");
        write_task(tasks, "proj/x.md", "pending");
        write_task(tasks, "proj/y.md", "complete");
        write_task(tasks, "TEMPLATE.md", "pending");
        write_task(tasks, "done/old.md", "pending");
        write_task(tasks, "indexes/all.md", "pending");
        std::fs::create_dir_all(tasks.join("notes")).unwrap();
        std::fs::write(tasks.join("notes/readme.txt"), "").unwrap();
        std::fs::write(tasks.join("scratch.md"), "no frontmatter").unwrap();

        let catalog = TaskCatalog::scan(tasks);
        let files: Vec<&str> = catalog.files.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(files, ["a.md", "b.md"]);
        assert_eq!(catalog.directories.len(), 1);
        let proj = &catalog.directories[0];
        assert_eq!(proj.entry.name, "proj/");
        assert_eq!(proj.dir_name(), "proj");
        let subs: Vec<&str> = proj.subtasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(subs, ["proj/x.md", "proj/y.md"]);

        assert_eq!(catalog.open_files().count(), 1);
        assert_eq!(catalog.open_count(), 3);
    }

    #[test]
    fn complete_status_is_case_sensitive() {
        let entry = TaskEntry {
            name: "a.md".to_string(),
            status: "Complete".to_string(),
            path: PathBuf::new(),
        };
        assert!(entry.is_open());
    }

    #[test]
    fn resolve_current_snapshots_frontmatter() {
        let dir = TempDir::new().unwrap();
        let tasks = paths::tasks_dir(dir.path());
        std::fs::create_dir_all(&tasks).unwrap();
        std::fs::write(
            tasks.join("fix-login.md"),
            "---\nname: h-fix-login\nbranch: fix/login\nstatus: pending\n---\n",
        )
        .unwrap();

        let task = resolve_current(dir.path(), "fix-login").unwrap();
        assert_eq!(task.name, "h-fix-login");
        assert_eq!(task.file, "fix-login.md");
        assert_eq!(task.branch(), Some("fix/login"));
        assert!(task.file_path.ends_with("sessions/tasks/fix-login.md"));
    }

    #[test]
    fn resolve_current_keeps_structured_fields() {
        let dir = TempDir::new().unwrap();
        let tasks = paths::tasks_dir(dir.path());
        std::fs::create_dir_all(&tasks).unwrap();
        std::fs::write(
            tasks.join("t.md"),
            "---\nname: t\nstatus: pending\ndependencies:\n  - other.md\n  - more.md\ntags: [a, b]\n---\n",
        )
        .unwrap();

        let task = resolve_current(dir.path(), "t.md").unwrap();
        assert_eq!(
            task.task_state["dependencies"],
            serde_json::json!(["other.md", "more.md"])
        );
        assert_eq!(task.task_state["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(task.task_state["status"], "pending");
    }

    #[test]
    fn resolve_current_directory_task() {
        let dir = TempDir::new().unwrap();
        let tasks = paths::tasks_dir(dir.path());
        std::fs::create_dir_all(tasks.join("proj")).unwrap();
        std::fs::write(tasks.join("proj/README.md"), "---\nstatus: pending\n---\n").unwrap();

        let task = resolve_current(dir.path(), "proj/").unwrap();
        assert_eq!(task.name, "proj");
        assert_eq!(task.file, "proj/README.md");
    }

    #[test]
    fn resolve_current_unknown_task() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_current(dir.path(), "ghost.md"),
            Err(SessionsError::TaskNotFound(_))
        ));
    }
}
