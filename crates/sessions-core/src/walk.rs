use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// 1 for direct children of the walk root.
    pub depth: usize,
}

/// Walk `root` up to `max_depth` levels, sorted by file name, skipping anything
/// `exclude` returns true for. Excluded directories are not descended into. The root
/// itself is never passed to `exclude`.
///
/// A missing root yields no entries; unreadable entries are logged and skipped.
pub fn walk<F>(root: &Path, max_depth: usize, mut exclude: F) -> Vec<Entry>
where
    F: FnMut(&DirEntry) -> bool,
{
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| e.depth() == 0 || !exclude(e))
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .map(|e| Entry {
            name: e.file_name().to_string_lossy().into_owned(),
            is_dir: e.file_type().is_dir(),
            depth: e.depth(),
            path: e.into_path(),
        })
        .collect()
}

/// Direct children of `dir`.
pub fn children<F>(dir: &Path, exclude: F) -> Vec<Entry>
where
    F: FnMut(&DirEntry) -> bool,
{
    walk(dir, 1, exclude)
}

/// True for markdown files by extension.
pub fn is_markdown(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn children_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.md"));
        touch(&dir.path().join("a.md"));
        touch(&dir.path().join("done/old.md"));

        let names: Vec<String> = children(dir.path(), |e| e.file_name() == "done")
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["a.md", "b.md"]);
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("keep/x.md"));
        touch(&dir.path().join("skip/y.md"));

        let paths: Vec<String> = walk(dir.path(), 3, |e| e.file_name() == "skip")
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name)
            .collect();
        assert_eq!(paths, ["x.md"]);
    }

    #[test]
    fn root_is_never_excluded() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("core.md"));
        touch(&dir.path().join("notes.txt"));

        let names: Vec<String> = children(dir.path(), |e| !is_markdown(e))
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["core.md"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(children(&dir.path().join("nope"), |_| false).is_empty());
    }
}
