//! The runtime's JSONL conversation transcript: subagent hand-off chunks and context
//! usage.

use crate::chunker;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::state::Model;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Byte budget for one chunk file handed to a subagent.
pub const CHUNK_BUDGET: usize = 24_000;
pub const CHUNK_PREFIX: &str = "current_transcript_";
/// Subagent directory used when the Task call names no agent type.
pub const SHARED_AGENT: &str = "shared";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

impl Usage {
    /// Tokens occupying the context window at the time of the response.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_read_input_tokens)
            .saturating_add(self.cache_creation_input_tokens)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextUsage {
    pub used: u64,
    pub limit: u64,
}

impl ContextUsage {
    pub fn percent(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.used as f64 * 100.0 / self.limit as f64
    }
}

/// One conversation message as handed to a subagent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Value,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Value>,
}

impl Transcript {
    /// Parse JSONL, collecting per-line errors instead of failing the whole file.
    pub fn parse(text: &str) -> (Transcript, Vec<(usize, serde_json::Error)>) {
        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(v) => entries.push(v),
                Err(e) => errors.push((i + 1, e)),
            }
        }
        (Transcript { entries }, errors)
    }

    /// Read a transcript file. A missing file is an empty transcript.
    pub fn read(path: &Path) -> Result<Transcript> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Transcript::default()),
            Err(e) => return Err(e.into()),
        };
        let (transcript, errors) = Transcript::parse(&text);
        for (line, err) in &errors {
            tracing::warn!(line, error = %err, "skipping unparseable transcript line");
        }
        Ok(transcript)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// User and assistant messages, in order.
    pub fn messages(&self) -> impl Iterator<Item = Message> + '_ {
        self.entries.iter().filter_map(|entry| {
            let kind = entry.get("type").and_then(Value::as_str)?;
            if kind != "user" && kind != "assistant" {
                return None;
            }
            let message = entry.get("message")?;
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or(kind)
                .to_string();
            let content = message.get("content").cloned().unwrap_or(Value::Null);
            Some(Message { role, content })
        })
    }

    /// Usage reported by the most recent main-thread assistant message.
    pub fn latest_usage(&self) -> Option<Usage> {
        self.entries.iter().rev().find_map(|entry| {
            if entry.get("type").and_then(Value::as_str) != Some("assistant") {
                return None;
            }
            if entry.get("isSidechain").and_then(Value::as_bool) == Some(true) {
                return None;
            }
            let usage = entry.get("message")?.get("usage")?;
            serde_json::from_value(usage.clone()).ok()
        })
    }

    pub fn context_usage(&self, model: Model) -> Option<ContextUsage> {
        self.latest_usage().map(|u| ContextUsage {
            used: u.context_tokens(),
            limit: model.context_limit(),
        })
    }

    /// One JSON object per line.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for message in self.messages() {
            out.push_str(&serde_json::to_string(&message)?);
            out.push('\n');
        }
        Ok(out)
    }
}

fn is_chunk_file(name: &str) -> bool {
    name.starts_with(CHUNK_PREFIX) && name.ends_with(".json")
}

/// Replace the chunk files in `sessions/transcripts/<agent>/` with the transcript's
/// messages, at most `max_bytes` per file. Returns the written paths in order.
pub fn write_chunks(
    root: &Path,
    agent: &str,
    transcript: &Transcript,
    max_bytes: usize,
) -> Result<Vec<PathBuf>> {
    let dir = paths::transcript_dir(root, agent);
    io::ensure_dir(&dir)?;

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if is_chunk_file(&entry.file_name().to_string_lossy()) {
            std::fs::remove_file(entry.path())?;
        }
    }

    let text = transcript.to_jsonl()?;
    let mut written = Vec::new();
    for (i, piece) in chunker::chunk(&text, max_bytes)?.enumerate() {
        let path = dir.join(format!("{CHUNK_PREFIX}{:03}.json", i + 1));
        io::atomic_write(&path, piece.as_bytes())?;
        written.push(path);
    }
    tracing::debug!(agent, chunks = written.len(), "wrote transcript chunks");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn line(v: Value) -> String {
        format!("{v}\n")
    }

    fn sample() -> String {
        let mut text = String::new();
        text.push_str(&line(json!({"type": "summary", "summary": "earlier"})));
        text.push_str(&line(json!({
            "type": "user",
            "message": {"role": "user", "content": "fix the login bug"}
        })));
        text.push_str(&line(json!({
            "type": "assistant",
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": "looking"}],
                "usage": {"input_tokens": 100, "cache_read_input_tokens": 40000, "cache_creation_input_tokens": 2000, "output_tokens": 50}
            }
        })));
        text.push_str("not json\n");
        text.push_str(&line(json!({
            "type": "assistant",
            "isSidechain": true,
            "message": {"role": "assistant", "content": "sub", "usage": {"input_tokens": 9}}
        })));
        text
    }

    #[test]
    fn parse_keeps_good_lines() {
        let (t, errors) = Transcript::parse(&sample());
        assert_eq!(t.len(), 4);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 4);
    }

    #[test]
    fn messages_are_user_and_assistant_only() {
        let (t, _) = Transcript::parse(&sample());
        let roles: Vec<String> = t.messages().map(|m| m.role).collect();
        assert_eq!(roles, ["user", "assistant", "assistant"]);
    }

    #[test]
    fn usage_skips_sidechain() {
        let (t, _) = Transcript::parse(&sample());
        let usage = t.latest_usage().unwrap();
        assert_eq!(usage.context_tokens(), 42_100);

        let ctx = t.context_usage(Model::Opus).unwrap();
        assert_eq!(ctx.limit, 160_000);
        assert!((ctx.percent() - 26.3125).abs() < 1e-9);
    }

    #[test]
    fn context_tokens_saturate() {
        let usage = Usage {
            input_tokens: u64::MAX,
            cache_read_input_tokens: 1,
            cache_creation_input_tokens: 1,
            ..Usage::default()
        };
        assert_eq!(usage.context_tokens(), u64::MAX);
    }

    #[test]
    fn no_usage_in_empty_transcript() {
        assert!(Transcript::default().context_usage(Model::Sonnet).is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let t = Transcript::read(&dir.path().join("nope.jsonl")).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn write_chunks_replaces_previous() {
        let dir = TempDir::new().unwrap();
        let mut text = String::new();
        for i in 0..600 {
            let kind = if i % 2 == 0 { "user" } else { "assistant" };
            text.push_str(&line(json!({
                "type": kind,
                "message": {"content": format!("message {i} {}", "x".repeat(60))}
            })));
        }
        let (t, _) = Transcript::parse(&text);

        let agent_dir = paths::transcript_dir(dir.path(), "code-review");
        std::fs::create_dir_all(&agent_dir).unwrap();
        std::fs::write(agent_dir.join("current_transcript_099.json"), "stale").unwrap();
        std::fs::write(agent_dir.join("notes.txt"), "keep").unwrap();

        let written = write_chunks(dir.path(), "code-review", &t, CHUNK_BUDGET).unwrap();
        assert!(written.len() > 1);
        assert!(written[0].ends_with("current_transcript_001.json"));
        assert!(!agent_dir.join("current_transcript_099.json").exists());
        assert!(agent_dir.join("notes.txt").exists());

        let mut joined = String::new();
        for path in &written {
            let piece = std::fs::read_to_string(path).unwrap();
            assert!(piece.len() <= CHUNK_BUDGET);
            joined.push_str(&piece);
        }
        assert_eq!(joined, t.to_jsonl().unwrap());
        let first: Value = serde_json::from_str(joined.lines().next().unwrap()).unwrap();
        assert_eq!(first["role"], "user");
    }
}
