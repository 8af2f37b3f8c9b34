use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionsError {
    #[error("corrupt document {path}: {source}")]
    CorruptDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task file not found: {0}")]
    MissingTaskFile(PathBuf),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("malformed index entry in {file} line {line}: {text}")]
    MalformedIndexEntry {
        file: String,
        line: usize,
        text: String,
    },

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("unknown trigger category: {0}")]
    UnknownTriggerCategory(String),

    #[error("trigger phrase '{phrase}' already exists in {category}")]
    DuplicateTrigger { category: String, phrase: String },

    #[error("trigger phrase '{phrase}' not found in {category}")]
    TriggerNotFound { category: String, phrase: String },

    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidConfigValue { key: String, value: String },

    #[error("chunk budget must be at least 1 byte")]
    ZeroChunkBudget,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionsError>;
