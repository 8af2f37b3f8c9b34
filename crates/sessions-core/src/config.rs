use crate::error::{Result, SessionsError};
use crate::schema::{lenient_enum_serde, LenientEnum};
use crate::store::{Document, DocumentKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TriggerCategory / TriggerPhrases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerCategory {
    ImplementationMode,
    DiscussionMode,
    TaskCreation,
    TaskStartup,
    TaskCompletion,
    ContextCompaction,
}

impl TriggerCategory {
    pub fn all() -> &'static [TriggerCategory] {
        &[
            TriggerCategory::ImplementationMode,
            TriggerCategory::DiscussionMode,
            TriggerCategory::TaskCreation,
            TriggerCategory::TaskStartup,
            TriggerCategory::TaskCompletion,
            TriggerCategory::ContextCompaction,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerCategory::ImplementationMode => "implementation_mode",
            TriggerCategory::DiscussionMode => "discussion_mode",
            TriggerCategory::TaskCreation => "task_creation",
            TriggerCategory::TaskStartup => "task_startup",
            TriggerCategory::TaskCompletion => "task_completion",
            TriggerCategory::ContextCompaction => "context_compaction",
        }
    }
}

impl std::fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerCategory {
    type Err = SessionsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "implementation_mode" | "implementation" | "go" => {
                Ok(TriggerCategory::ImplementationMode)
            }
            "discussion_mode" | "discussion" | "no" => Ok(TriggerCategory::DiscussionMode),
            "task_creation" => Ok(TriggerCategory::TaskCreation),
            "task_startup" => Ok(TriggerCategory::TaskStartup),
            "task_completion" => Ok(TriggerCategory::TaskCompletion),
            "context_compaction" => Ok(TriggerCategory::ContextCompaction),
            _ => Err(SessionsError::UnknownTriggerCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerPhrases {
    pub implementation_mode: Vec<String>,
    pub discussion_mode: Vec<String>,
    pub task_creation: Vec<String>,
    pub task_startup: Vec<String>,
    pub task_completion: Vec<String>,
    pub context_compaction: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TriggerPhrases {
    fn default() -> Self {
        let phrases = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            implementation_mode: phrases(&["yert", "make it so", "run that"]),
            discussion_mode: phrases(&["SILENCE", "stop"]),
            task_creation: phrases(&["mek:"]),
            task_startup: phrases(&["start^"]),
            task_completion: phrases(&["finito"]),
            context_compaction: phrases(&["squish", "lets compact"]),
            extra: Map::new(),
        }
    }
}

impl TriggerPhrases {
    pub fn phrases(&self, category: TriggerCategory) -> &[String] {
        match category {
            TriggerCategory::ImplementationMode => &self.implementation_mode,
            TriggerCategory::DiscussionMode => &self.discussion_mode,
            TriggerCategory::TaskCreation => &self.task_creation,
            TriggerCategory::TaskStartup => &self.task_startup,
            TriggerCategory::TaskCompletion => &self.task_completion,
            TriggerCategory::ContextCompaction => &self.context_compaction,
        }
    }

    fn phrases_mut(&mut self, category: TriggerCategory) -> &mut Vec<String> {
        match category {
            TriggerCategory::ImplementationMode => &mut self.implementation_mode,
            TriggerCategory::DiscussionMode => &mut self.discussion_mode,
            TriggerCategory::TaskCreation => &mut self.task_creation,
            TriggerCategory::TaskStartup => &mut self.task_startup,
            TriggerCategory::TaskCompletion => &mut self.task_completion,
            TriggerCategory::ContextCompaction => &mut self.context_compaction,
        }
    }

    /// Append a phrase, rejecting blanks and case-insensitive duplicates.
    pub fn add(&mut self, category: TriggerCategory, phrase: &str) -> Result<()> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Err(SessionsError::InvalidConfigValue {
                key: format!("trigger_phrases.{category}"),
                value: phrase.to_string(),
            });
        }
        let list = self.phrases_mut(category);
        if list.iter().any(|p| p.eq_ignore_ascii_case(phrase)) {
            return Err(SessionsError::DuplicateTrigger {
                category: category.to_string(),
                phrase: phrase.to_string(),
            });
        }
        list.push(phrase.to_string());
        Ok(())
    }

    pub fn remove(&mut self, category: TriggerCategory, phrase: &str) -> Result<()> {
        let list = self.phrases_mut(category);
        let before = list.len();
        list.retain(|p| !p.eq_ignore_ascii_case(phrase.trim()));
        if list.len() == before {
            return Err(SessionsError::TriggerNotFound {
                category: category.to_string(),
                phrase: phrase.to_string(),
            });
        }
        Ok(())
    }

    /// Drop blank and repeated phrases, keeping the first occurrence in each category.
    pub fn dedupe(&mut self) {
        for &category in TriggerCategory::all() {
            let list = self.phrases_mut(category);
            let mut seen = BTreeSet::new();
            list.retain(|p| {
                let key = p.trim().to_lowercase();
                !key.is_empty() && seen.insert(key)
            });
        }
    }

    /// First phrase of `category` contained in `text`, compared case-insensitively.
    pub fn find_in(&self, category: TriggerCategory, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.phrases(category)
            .iter()
            .find(|p| haystack.contains(&p.to_lowercase()))
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// GitPreferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddPattern {
    #[default]
    Ask,
    All,
}

impl LenientEnum for AddPattern {
    fn as_str(self) -> &'static str {
        match self {
            AddPattern::Ask => "ask",
            AddPattern::All => "all",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Some(AddPattern::Ask),
            "all" => Some(AddPattern::All),
            _ => None,
        }
    }
}

lenient_enum_serde!(AddPattern);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitStyle {
    Detailed,
    #[default]
    Conventional,
    Simple,
}

impl LenientEnum for CommitStyle {
    fn as_str(self) -> &'static str {
        match self {
            CommitStyle::Detailed => "detailed",
            CommitStyle::Conventional => "conventional",
            CommitStyle::Simple => "simple",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "detailed" | "reg" => Some(CommitStyle::Detailed),
            "conventional" | "op" => Some(CommitStyle::Conventional),
            "simple" | "ez" => Some(CommitStyle::Simple),
            _ => None,
        }
    }
}

lenient_enum_serde!(CommitStyle);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitPreferences {
    pub default_branch: String,
    pub has_submodules: bool,
    pub add_pattern: AddPattern,
    pub commit_style: CommitStyle,
    pub auto_merge: bool,
    pub auto_push: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GitPreferences {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            has_submodules: false,
            add_pattern: AddPattern::default(),
            commit_style: CommitStyle::default(),
            auto_merge: false,
            auto_push: false,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Os {
    Windows,
    #[default]
    Linux,
    Macos,
}

impl LenientEnum for Os {
    fn as_str(self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::Macos => "macos",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win32" | "win" => Some(Os::Windows),
            "linux" => Some(Os::Linux),
            "macos" | "darwin" | "osx" | "mac" => Some(Os::Macos),
            _ => None,
        }
    }
}

lenient_enum_serde!(Os);

impl Os {
    pub fn current() -> Self {
        Os::from_legacy(std::env::consts::OS).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    #[default]
    Bash,
    Zsh,
    Fish,
    Powershell,
    Cmd,
}

impl LenientEnum for Shell {
    fn as_str(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
            Shell::Powershell => "powershell",
            Shell::Cmd => "cmd",
        }
    }

    fn from_legacy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bash" | "sh" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            "powershell" | "pwsh" => Some(Shell::Powershell),
            "cmd" => Some(Shell::Cmd),
            _ => None,
        }
    }
}

lenient_enum_serde!(Shell);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub developer_name: String,
    pub os: Os,
    pub shell: Shell,
    pub project_root: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            developer_name: "developer".to_string(),
            os: Os::current(),
            shell: Shell::default(),
            project_root: None,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// BlockedActions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockedActions {
    pub implementation_only_tools: BTreeSet<String>,
    pub bash_read_patterns: BTreeSet<String>,
    pub bash_write_patterns: BTreeSet<String>,
    pub extrasafe: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BlockedActions {
    fn default() -> Self {
        Self {
            implementation_only_tools: ["Edit", "Write", "MultiEdit", "NotebookEdit"]
                .into_iter()
                .map(String::from)
                .collect(),
            bash_read_patterns: BTreeSet::new(),
            bash_write_patterns: BTreeSet::new(),
            extrasafe: false,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWarnings {
    pub warn_85: bool,
    pub warn_90: bool,
}

impl Default for ContextWarnings {
    fn default() -> Self {
        Self {
            warn_85: true,
            warn_90: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub branch_enforcement: bool,
    pub auto_ultrathink: bool,
    pub use_nerd_fonts: bool,
    pub context_warnings: ContextWarnings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            branch_enforcement: true,
            auto_ultrathink: true,
            use_nerd_fonts: false,
            context_warnings: ContextWarnings::default(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trigger_phrases: TriggerPhrases,
    pub git_preferences: GitPreferences,
    pub environment: Environment,
    pub blocked_actions: BlockedActions,
    pub features: Features,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document for Config {
    const KIND: DocumentKind = DocumentKind::Config;

    fn normalize(&mut self) {
        self.trigger_phrases.dedupe();
    }
}

impl Config {
    /// Set a scalar field addressed as `section.field` from its string form.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || SessionsError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || value.trim().parse::<bool>().map_err(|_| invalid());

        match key {
            "git_preferences.default_branch" => {
                if value.trim().is_empty() {
                    return Err(invalid());
                }
                self.git_preferences.default_branch = value.trim().to_string();
            }
            "git_preferences.has_submodules" => self.git_preferences.has_submodules = flag()?,
            "git_preferences.add_pattern" => {
                self.git_preferences.add_pattern =
                    AddPattern::from_legacy(value).ok_or_else(invalid)?
            }
            "git_preferences.commit_style" => {
                self.git_preferences.commit_style =
                    CommitStyle::from_legacy(value).ok_or_else(invalid)?
            }
            "git_preferences.auto_merge" => self.git_preferences.auto_merge = flag()?,
            "git_preferences.auto_push" => self.git_preferences.auto_push = flag()?,
            "environment.developer_name" => {
                self.environment.developer_name = value.trim().to_string()
            }
            "environment.os" => {
                self.environment.os = Os::from_legacy(value).ok_or_else(invalid)?
            }
            "environment.shell" => {
                self.environment.shell = Shell::from_legacy(value).ok_or_else(invalid)?
            }
            "environment.project_root" => {
                self.environment.project_root =
                    (!value.trim().is_empty()).then(|| PathBuf::from(value.trim()))
            }
            "blocked_actions.extrasafe" => self.blocked_actions.extrasafe = flag()?,
            "features.branch_enforcement" => self.features.branch_enforcement = flag()?,
            "features.auto_ultrathink" => self.features.auto_ultrathink = flag()?,
            "features.use_nerd_fonts" => self.features.use_nerd_fonts = flag()?,
            "features.context_warnings.warn_85" => {
                self.features.context_warnings.warn_85 = flag()?
            }
            "features.context_warnings.warn_90" => {
                self.features.context_warnings.warn_90 = flag()?
            }
            _ => return Err(SessionsError::UnknownConfigKey(key.to_string())),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for &category in TriggerCategory::all() {
            if self.trigger_phrases.phrases(category).is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("no trigger phrases configured for '{category}'"),
                });
            }
        }

        // A phrase that both enters and leaves implementation mode makes the prompt hook
        // flip-flop on the same message.
        for phrase in &self.trigger_phrases.implementation_mode {
            if self
                .trigger_phrases
                .discussion_mode
                .iter()
                .any(|p| p.eq_ignore_ascii_case(phrase))
            {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "phrase '{phrase}' is both an implementation_mode and a discussion_mode trigger"
                    ),
                });
            }
        }

        if self.blocked_actions.implementation_only_tools.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "blocked_actions.implementation_only_tools is empty; discussion mode will not block any tool"
                    .to_string(),
            });
        }

        if self.git_preferences.default_branch.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "git_preferences.default_branch is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let text = serde_json::to_string(&cfg).unwrap();
        let parsed: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn unknown_os_coerces_to_default() {
        let cfg: Config =
            serde_json::from_value(json!({ "environment": { "os": "plan9" } })).unwrap();
        assert_eq!(cfg.environment.os, Os::Linux);
    }

    #[test]
    fn legacy_enum_spellings_normalize() {
        let cfg: Config = serde_json::from_value(json!({
            "git_preferences": { "add_pattern": "ALL", "commit_style": "op" },
            "environment": { "os": "darwin", "shell": "pwsh" }
        }))
        .unwrap();
        assert_eq!(cfg.git_preferences.add_pattern, AddPattern::All);
        assert_eq!(cfg.git_preferences.commit_style, CommitStyle::Conventional);
        assert_eq!(cfg.environment.os, Os::Macos);
        assert_eq!(cfg.environment.shell, Shell::Powershell);

        let out = serde_json::to_value(&cfg).unwrap();
        assert_eq!(out["git_preferences"]["add_pattern"], "all");
        assert_eq!(out["environment"]["os"], "macos");
    }

    #[test]
    fn non_string_enum_value_coerces() {
        let cfg: Config =
            serde_json::from_value(json!({ "environment": { "shell": 42 } })).unwrap();
        assert_eq!(cfg.environment.shell, Shell::Bash);
    }

    #[test]
    fn unknown_keys_survive_roundtrip() {
        let cfg: Config = serde_json::from_value(json!({
            "statusline": { "theme": "dark" },
            "features": { "new_feature": true }
        }))
        .unwrap();
        let out = serde_json::to_value(&cfg).unwrap();
        assert_eq!(out["statusline"]["theme"], "dark");
        assert_eq!(out["features"]["new_feature"], true);
    }

    #[test]
    fn trigger_add_rejects_duplicates() {
        let mut phrases = TriggerPhrases::default();
        phrases
            .add(TriggerCategory::ImplementationMode, "ship it")
            .unwrap();
        let err = phrases
            .add(TriggerCategory::ImplementationMode, "SHIP IT")
            .unwrap_err();
        assert!(matches!(err, SessionsError::DuplicateTrigger { .. }));
        assert_eq!(
            phrases.implementation_mode.last().map(String::as_str),
            Some("ship it")
        );
    }

    #[test]
    fn trigger_remove_missing_phrase_fails() {
        let mut phrases = TriggerPhrases::default();
        assert!(phrases
            .remove(TriggerCategory::TaskStartup, "nope")
            .is_err());
        phrases.remove(TriggerCategory::TaskStartup, "start^").unwrap();
        assert!(phrases.task_startup.is_empty());
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let mut phrases = TriggerPhrases {
            implementation_mode: vec![
                "yert".to_string(),
                "go ahead".to_string(),
                "YERT".to_string(),
                " ".to_string(),
            ],
            ..TriggerPhrases::default()
        };
        phrases.dedupe();
        assert_eq!(phrases.implementation_mode, vec!["yert", "go ahead"]);
    }

    #[test]
    fn find_in_is_case_insensitive() {
        let phrases = TriggerPhrases::default();
        assert_eq!(
            phrases.find_in(TriggerCategory::ImplementationMode, "ok, Make It So please"),
            Some("make it so")
        );
        assert_eq!(
            phrases.find_in(TriggerCategory::TaskCompletion, "keep going"),
            None
        );
    }

    #[test]
    fn trigger_category_parses_aliases() {
        assert_eq!(
            "task-startup".parse::<TriggerCategory>().unwrap(),
            TriggerCategory::TaskStartup
        );
        assert_eq!(
            "go".parse::<TriggerCategory>().unwrap(),
            TriggerCategory::ImplementationMode
        );
        assert!("bogus".parse::<TriggerCategory>().is_err());
    }

    #[test]
    fn set_value_updates_typed_fields() {
        let mut cfg = Config::default();
        cfg.set_value("git_preferences.commit_style", "simple").unwrap();
        cfg.set_value("features.context_warnings.warn_85", "false")
            .unwrap();
        cfg.set_value("environment.os", "windows").unwrap();
        assert_eq!(cfg.git_preferences.commit_style, CommitStyle::Simple);
        assert!(!cfg.features.context_warnings.warn_85);
        assert_eq!(cfg.environment.os, Os::Windows);
    }

    #[test]
    fn set_value_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("environment.os", "plan9"),
            Err(SessionsError::InvalidConfigValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("features.auto_ultrathink", "maybe"),
            Err(SessionsError::InvalidConfigValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("nope.nothing", "1"),
            Err(SessionsError::UnknownConfigKey(_))
        ));
    }

    #[test]
    fn validate_default_config_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_conflicting_mode_phrases() {
        let mut cfg = Config::default();
        cfg.trigger_phrases.discussion_mode.push("YERT".to_string());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("yert")));
    }

    #[test]
    fn validate_empty_category_warns() {
        let mut cfg = Config::default();
        cfg.trigger_phrases.task_creation.clear();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("task_creation")));
    }
}
