use sessions_core::paths::SESSIONS_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `SESSIONS_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `start` (default: cwd) looking for `sessions/`
/// 3. Walk upward from `start` looking for `.git/`
/// 4. Fall back to `start`
pub fn resolve_root(explicit: Option<&Path>, start: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let start = match start {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    find_upward(&start, SESSIONS_DIR)
        .or_else(|| find_upward(&start, ".git"))
        .unwrap_or(start)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("other/sessions")).unwrap();
        let result = resolve_root(Some(dir.path()), Some(&dir.path().join("other")));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn finds_sessions_dir_above_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(resolve_root(None, Some(&deep)), dir.path());
    }

    #[test]
    fn sessions_dir_beats_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("app/sessions")).unwrap();
        let start = dir.path().join("app/src");
        std::fs::create_dir_all(&start).unwrap();
        assert_eq!(resolve_root(None, Some(&start)), dir.path().join("app"));
    }

    #[test]
    fn falls_back_to_git_then_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("repo/.git")).unwrap();
        let inner = dir.path().join("repo/pkg");
        std::fs::create_dir_all(&inner).unwrap();
        assert_eq!(resolve_root(None, Some(&inner)), dir.path().join("repo"));

        let bare = dir.path().join("bare");
        std::fs::create_dir_all(&bare).unwrap();
        // TempDir may sit under a git checkout; only assert when it does not.
        if find_upward(&bare, ".git").is_none() && find_upward(&bare, SESSIONS_DIR).is_none() {
            assert_eq!(resolve_root(None, Some(&bare)), bare);
        }
    }
}
