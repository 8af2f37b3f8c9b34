use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SESSIONS_DIR: &str = "sessions";
pub const TASKS_DIR: &str = "sessions/tasks";
pub const TRANSCRIPTS_DIR: &str = "sessions/transcripts";

pub const CONFIG_FILE: &str = "sessions/sessions-config.json";
pub const STATE_FILE: &str = "sessions/sessions-state.json";

/// Subdirectories of the tasks directory that never hold open tasks.
pub const DONE_DIR_NAME: &str = "done";
pub const INDEXES_DIR_NAME: &str = "indexes";

pub const TASK_TEMPLATE: &str = "TEMPLATE.md";
pub const TASK_README: &str = "README.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn sessions_dir(root: &Path) -> PathBuf {
    root.join(SESSIONS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn tasks_dir(root: &Path) -> PathBuf {
    root.join(TASKS_DIR)
}

pub fn indexes_dir(root: &Path) -> PathBuf {
    tasks_dir(root).join(INDEXES_DIR_NAME)
}

pub fn transcript_dir(root: &Path, agent: &str) -> PathBuf {
    root.join(TRANSCRIPTS_DIR).join(agent)
}

/// Resolve a task reference (`fix-login.md`, `refactor/`, `refactor`) to the file that
/// carries its frontmatter: the file itself, or the directory's README.
pub fn task_file(root: &Path, name: &str) -> Option<PathBuf> {
    let dir = tasks_dir(root);
    let trimmed = name.trim_end_matches('/');
    let as_dir = dir.join(trimmed);
    if as_dir.is_dir() {
        let readme = as_dir.join(TASK_README);
        return readme.is_file().then_some(readme);
    }
    let as_file = dir.join(trimmed);
    if as_file.is_file() {
        return Some(as_file);
    }
    let with_ext = dir.join(format!("{trimmed}.md"));
    with_ext.is_file().then_some(with_ext)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/sessions/sessions-config.json")
        );
        assert_eq!(
            state_path(root),
            PathBuf::from("/tmp/proj/sessions/sessions-state.json")
        );
        assert_eq!(
            indexes_dir(root),
            PathBuf::from("/tmp/proj/sessions/tasks/indexes")
        );
    }

    #[test]
    fn task_file_resolves_files_and_directories() {
        let dir = TempDir::new().unwrap();
        let tasks = tasks_dir(dir.path());
        std::fs::create_dir_all(tasks.join("proj")).unwrap();
        std::fs::write(tasks.join("a.md"), "---\nstatus: pending\n---\n").unwrap();
        std::fs::write(tasks.join("proj/README.md"), "---\nstatus: pending\n---\n").unwrap();

        assert_eq!(task_file(dir.path(), "a.md"), Some(tasks.join("a.md")));
        assert_eq!(task_file(dir.path(), "a"), Some(tasks.join("a.md")));
        assert_eq!(
            task_file(dir.path(), "proj/"),
            Some(tasks.join("proj/README.md"))
        );
        assert_eq!(task_file(dir.path(), "missing.md"), None);
    }
}
