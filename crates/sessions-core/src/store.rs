//! Persistence port for the state and config documents.
//!
//! Every invocation is a short-lived process, so these two JSON files are the only
//! continuity between hook runs. All mutation goes through [`Store::atomic_edit`]:
//! load (with defaults merged in), mutate in memory, write through a temp file and
//! rename. Concurrent writers resolve last-writer-wins; no reader ever sees a torn file.

use crate::error::{Result, SessionsError};
use crate::io;
use crate::paths;
use crate::schema::fill_missing;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    State,
    Config,
}

impl DocumentKind {
    pub fn path(self, root: &Path) -> PathBuf {
        match self {
            DocumentKind::State => paths::state_path(root),
            DocumentKind::Config => paths::config_path(root),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::State => "state",
            DocumentKind::Config => "config",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON document managed by the [`Store`].
pub trait Document: Serialize + DeserializeOwned + Default {
    const KIND: DocumentKind;

    /// Fix up values after load (dedupe lists and similar).
    fn normalize(&mut self) {}

    /// Stamp bookkeeping fields before an edit is written.
    fn touch(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, kind: DocumentKind) -> PathBuf {
        kind.path(&self.root)
    }

    /// Load a document, constructing defaults when the file is absent and filling in
    /// keys an older version did not write. Keys this version does not know are kept.
    pub fn load<D: Document>(&self) -> Result<D> {
        let path = self.path_of(D::KIND);
        if !path.exists() {
            return Ok(D::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let corrupt = |source| SessionsError::CorruptDocument {
            path: path.clone(),
            source,
        };
        let mut raw: serde_json::Value = serde_json::from_str(&data).map_err(corrupt)?;
        let defaults = serde_json::to_value(D::default())?;
        fill_missing(&mut raw, &defaults);
        let mut doc: D = serde_json::from_value(raw).map_err(corrupt)?;
        doc.normalize();
        Ok(doc)
    }

    /// Load a document, never failing.
    ///
    /// A corrupt file is moved aside as `*.corrupt-<timestamp>` and replaced with
    /// defaults; any other error yields defaults for this invocation only.
    pub fn load_or_recover<D: Document>(&self) -> D {
        match self.load::<D>() {
            Ok(doc) => doc,
            Err(SessionsError::CorruptDocument { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "{} document is corrupt, reinitializing with defaults",
                    D::KIND
                );
                match io::backup_corrupt(&path) {
                    Ok(backup) => tracing::info!(backup = %backup.display(), "corrupt document preserved"),
                    Err(e) => tracing::warn!(error = %e, "failed to preserve corrupt document"),
                }
                let doc = D::default();
                if let Err(e) = self.save(&doc) {
                    tracing::warn!(error = %e, "failed to write default {} document", D::KIND);
                }
                doc
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load {} document, using defaults", D::KIND);
                D::default()
            }
        }
    }

    /// Serialize and atomically write the whole document.
    pub fn save<D: Document>(&self, doc: &D) -> Result<()> {
        let path = self.path_of(D::KIND);
        let mut data = serde_json::to_string_pretty(doc)?;
        data.push('\n');
        io::atomic_write(&path, data.as_bytes())
    }

    /// Read-modify-write. The mutator's return value is passed through.
    pub fn atomic_edit<D, T>(&self, mutate: impl FnOnce(&mut D) -> T) -> Result<T>
    where
        D: Document,
    {
        self.try_edit(|doc: &mut D| Ok(mutate(doc)))
    }

    /// Like [`Store::atomic_edit`] but the mutator may fail, in which case nothing is
    /// written.
    pub fn try_edit<D, T>(&self, mutate: impl FnOnce(&mut D) -> Result<T>) -> Result<T>
    where
        D: Document,
    {
        let mut doc = self.load::<D>()?;
        let out = mutate(&mut doc)?;
        doc.touch();
        self.save(&doc)?;
        tracing::debug!(kind = %D::KIND, "document updated");
        Ok(out)
    }

    /// [`Store::atomic_edit`] that first replaces a corrupt document with defaults
    /// (preserving the bad file) instead of failing. Other errors still surface.
    pub fn edit_recovering<D, T>(&self, mutate: impl FnOnce(&mut D) -> T) -> Result<T>
    where
        D: Document,
    {
        self.try_edit_recovering(|doc: &mut D| Ok(mutate(doc)))
    }

    /// [`Store::try_edit`] with the corrupt-document recovery of
    /// [`Store::edit_recovering`].
    pub fn try_edit_recovering<D, T>(&self, mutate: impl FnOnce(&mut D) -> Result<T>) -> Result<T>
    where
        D: Document,
    {
        let mut doc = match self.load::<D>() {
            Ok(doc) => doc,
            Err(SessionsError::CorruptDocument { .. }) => self.load_or_recover::<D>(),
            Err(e) => return Err(e),
        };
        let out = mutate(&mut doc)?;
        doc.touch();
        self.save(&doc)?;
        Ok(out)
    }

    /// Edit for hook invocations, which must keep producing context when the sessions
    /// directory cannot be written. A [`SessionsError::StoreWrite`] is logged and the
    /// mutator's result, computed on the in-memory document, is returned anyway; the
    /// change is lost for this invocation only.
    pub fn edit_or_degrade<D, T>(&self, mutate: impl FnOnce(&mut D) -> T) -> Result<T>
    where
        D: Document,
    {
        let mut doc = self.load_or_recover::<D>();
        let out = mutate(&mut doc);
        doc.touch();
        match self.save(&doc) {
            Ok(()) => Ok(out),
            Err(SessionsError::StoreWrite { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "cannot write {} document, continuing without saving",
                    D::KIND
                );
                Ok(out)
            }
            Err(e) => Err(e),
        }
    }

    /// Write defaults for a document that does not exist yet. Returns true if written.
    pub fn init<D: Document>(&self) -> Result<bool> {
        if self.path_of(D::KIND).exists() {
            return Ok(false);
        }
        self.save(&D::default())?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Os};
    use crate::state::{Mode, State, TodoItem};
    use serde_json::json;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_raw(store: &Store, kind: DocumentKind, text: &str) {
        let path = store.path_of(kind);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let state: State = store.load().unwrap();
        assert_eq!(state, State::default());
        assert!(!store.path_of(DocumentKind::State).exists());
    }

    #[test]
    fn missing_keys_are_filled_and_extras_kept() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(
            &store,
            DocumentKind::Config,
            r#"{"features": {"use_nerd_fonts": true}, "statusline": {"theme": "dark"}}"#,
        );

        let cfg: Config = store.load().unwrap();
        assert!(cfg.features.use_nerd_fonts);
        assert!(cfg.features.auto_ultrathink);
        assert_eq!(cfg.git_preferences.default_branch, "main");

        store.save(&cfg).unwrap();
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path_of(DocumentKind::Config)).unwrap())
                .unwrap();
        assert_eq!(on_disk["statusline"]["theme"], "dark");
        assert_eq!(on_disk["trigger_phrases"]["task_startup"], json!(["start^"]));
    }

    #[test]
    fn save_then_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::State, r#"{"mode": "go", "unknown_field": [1, 2]}"#);

        let first: State = store.load().unwrap();
        store.save(&first).unwrap();
        let bytes_first = std::fs::read(store.path_of(DocumentKind::State)).unwrap();

        let second: State = store.load().unwrap();
        assert_eq!(first, second);
        store.save(&second).unwrap();
        let bytes_second = std::fs::read(store.path_of(DocumentKind::State)).unwrap();
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn invalid_json_is_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::State, "{\"mode\": ");
        assert!(matches!(
            store.load::<State>(),
            Err(SessionsError::CorruptDocument { .. })
        ));
    }

    #[test]
    fn load_or_recover_preserves_bad_file() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::State, "not json at all");

        let state: State = store.load_or_recover();
        assert_eq!(state, State::default());

        let sessions = dir.path().join("sessions");
        let backups: Vec<_> = std::fs::read_dir(&sessions)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            std::fs::read_to_string(backups[0].path()).unwrap(),
            "not json at all"
        );
        assert!(store.load::<State>().is_ok());
    }

    #[test]
    fn interrupted_write_leaves_original_intact() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        store
            .atomic_edit(|s: &mut State| s.set_mode(Mode::Implementation))
            .unwrap();

        // A writer that died after writing its temp file but before the rename.
        let sessions = dir.path().join("sessions");
        let mut tmp = NamedTempFile::new_in(&sessions).unwrap();
        tmp.write_all(b"{\"mode\": \"discussion\", \"todos\": {\"act").unwrap();
        let (_file, _stray) = tmp.keep().unwrap();

        let state: State = store.load().unwrap();
        assert_eq!(state.mode, Mode::Implementation);
    }

    #[test]
    fn atomic_edit_persists_and_returns() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let mode = store
            .atomic_edit(|s: &mut State| s.toggle_mode())
            .unwrap();
        assert_eq!(mode, Mode::Implementation);

        let state: State = store.load().unwrap();
        assert_eq!(state.mode, Mode::Implementation);
        assert!(state.last_updated.is_some());
    }

    #[test]
    fn failed_mutation_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        store
            .atomic_edit(|s: &mut State| s.store_todos(vec![TodoItem::new("keep")]))
            .unwrap();
        let before = std::fs::read(store.path_of(DocumentKind::State)).unwrap();

        let result = store.try_edit(|s: &mut State| {
            s.clear_todos();
            Err::<(), _>(SessionsError::TaskNotFound("x".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(store.path_of(DocumentKind::State)).unwrap(), before);
    }

    #[test]
    fn edit_recovering_replaces_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::State, "{{{");
        assert!(store.atomic_edit(|s: &mut State| s.toggle_mode()).is_err());

        let mode = store
            .edit_recovering(|s: &mut State| s.toggle_mode())
            .unwrap();
        assert_eq!(mode, Mode::Implementation);
        assert_eq!(store.load::<State>().unwrap().mode, Mode::Implementation);
    }

    #[test]
    fn try_edit_recovering_replaces_corrupt_config() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::Config, "not json");

        store
            .try_edit_recovering(|c: &mut Config| c.set_value("features.auto_ultrathink", "false"))
            .unwrap();
        assert!(!store.load::<Config>().unwrap().features.auto_ultrathink);

        let err = store
            .try_edit_recovering(|c: &mut Config| c.set_value("features.nope", "true"))
            .unwrap_err();
        assert!(matches!(err, SessionsError::UnknownConfigKey(_)));
    }

    #[test]
    fn edit_or_degrade_survives_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sessions"), "not a directory").unwrap();
        let store = Store::new(dir.path());

        assert!(matches!(
            store.atomic_edit(|s: &mut State| s.toggle_mode()),
            Err(SessionsError::StoreWrite { .. })
        ));
        let mode = store
            .edit_or_degrade(|s: &mut State| s.toggle_mode())
            .unwrap();
        assert_eq!(mode, Mode::Implementation);
        assert!(dir.path().join("sessions").is_file());
    }

    #[test]
    fn unknown_os_in_config_file_normalizes() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(&store, DocumentKind::Config, r#"{"environment": {"os": "plan9"}}"#);
        let cfg: Config = store.load().unwrap();
        assert_eq!(cfg.environment.os, Os::Linux);
    }

    #[test]
    fn duplicate_trigger_phrases_deduped_on_load() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        write_raw(
            &store,
            DocumentKind::Config,
            r#"{"trigger_phrases": {"implementation_mode": ["yert", "Yert", "go"]}}"#,
        );
        let cfg: Config = store.load().unwrap();
        assert_eq!(cfg.trigger_phrases.implementation_mode, vec!["yert", "go"]);
    }

    #[test]
    fn init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        assert!(store.init::<State>().unwrap());
        store
            .atomic_edit(|s: &mut State| s.toggle_mode())
            .unwrap();
        assert!(!store.init::<State>().unwrap());
        assert_eq!(store.load::<State>().unwrap().mode, Mode::Implementation);
    }
}
