//! YAML frontmatter between two `---` lines at the top of a markdown file.
//!
//! Hand-edited task files often still carry template placeholders such as
//! `name: [prefix]-[descriptive-name]`, which are not valid YAML. Such blocks fall
//! back to a flat `key: value` scan so `status` and friends stay readable.

use serde_yaml::Value as Yaml;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Status always sits near the top of a task file.
pub const STATUS_SCAN_LINES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub fields: BTreeMap<String, Yaml>,
}

/// Split `text` into the raw frontmatter block and the body after it. Returns `None`
/// when the text does not open with `---`. An unterminated block runs to the end.
fn extract_frontmatter(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    let start = first.len();
    let mut end = start;
    for line in lines {
        if line.trim_end() == "---" {
            return Some((&text[start..end], &text[end + line.len()..]));
        }
        end += line.len();
    }
    Some((&text[start..], ""))
}

impl Frontmatter {
    /// Parse the leading frontmatter block and return it with the remaining body.
    pub fn parse(text: &str) -> Option<(Frontmatter, &str)> {
        let (block, body) = extract_frontmatter(text)?;
        let fm = match serde_yaml::from_str::<Yaml>(block) {
            Ok(Yaml::Mapping(map)) => Frontmatter::from_mapping(map),
            Ok(Yaml::Null) => Frontmatter::default(),
            Ok(_) => Frontmatter::scan(block),
            Err(e) => {
                tracing::debug!(error = %e, "frontmatter is not valid YAML, scanning lines");
                Frontmatter::scan(block)
            }
        };
        Some((fm, body))
    }

    fn from_mapping(map: serde_yaml::Mapping) -> Frontmatter {
        let fields = map
            .into_iter()
            .filter_map(|(k, v)| match k {
                Yaml::String(k) => Some((k, v)),
                _ => None,
            })
            .collect();
        Frontmatter { fields }
    }

    /// Line-oriented fallback: every `key: value` line becomes a string field.
    fn scan(block: &str) -> Frontmatter {
        let mut fm = Frontmatter::default();
        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key.starts_with('#') || key.starts_with('-') || line.starts_with(' ') {
                continue;
            }
            let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
            fm.fields
                .insert(key.to_string(), Yaml::String(value.to_string()));
        }
        fm
    }

    /// String value of `key`; empty strings and non-string values read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Yaml::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status")
    }

    /// All fields as JSON values. Fields JSON cannot represent are dropped.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .filter_map(|(k, v)| match serde_json::to_value(v) {
                Ok(json) => Some((k.clone(), json)),
                Err(e) => {
                    tracing::debug!(key = %k, error = %e, "dropping frontmatter field");
                    None
                }
            })
            .collect()
    }
}

/// Read just the first [`STATUS_SCAN_LINES`] lines of `path` and extract `status`.
///
/// Returns `None` for unreadable files, files without frontmatter, and files whose
/// status is not within the scanned window.
pub fn read_status(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut head = String::new();
    for line in BufReader::new(file).lines().take(STATUS_SCAN_LINES) {
        let line = line.ok()?;
        head.push_str(&line);
        head.push('\n');
    }
    let (fm, _) = Frontmatter::parse(&head)?;
    fm.status().map(str::to_string)
}

/// Parse the full frontmatter of `path`.
pub fn read(path: &Path) -> std::io::Result<Option<Frontmatter>> {
    let text = std::fs::read_to_string(path)?;
    Ok(Frontmatter::parse(&text).map(|(fm, _)| fm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn parses_fields_and_body() {
        let text = "---\nname: fix-login\nstatus: in-progress\nbranch: \"fix/login\"\n---\n# Fix login\n";
        let (fm, body) = Frontmatter::parse(text).unwrap();
        assert_eq!(fm.get("name"), Some("fix-login"));
        assert_eq!(fm.status(), Some("in-progress"));
        assert_eq!(fm.get("branch"), Some("fix/login"));
        assert_eq!(body, "# Fix login\n");
    }

    #[test]
    fn no_opening_delimiter() {
        assert!(Frontmatter::parse("# Title\nstatus: pending\n").is_none());
        assert!(Frontmatter::parse("").is_none());
    }

    #[test]
    fn keeps_lists_as_sequences() {
        let text = "---\nname: t\nstatus: pending\ndependencies:\n  - other.md\n  - more.md\ntags: [a, b]\n---\n";
        let (fm, _) = Frontmatter::parse(text).unwrap();
        assert_eq!(fm.status(), Some("pending"));
        assert_eq!(fm.get("dependencies"), None);
        let json = fm.to_json();
        assert_eq!(json["dependencies"], json!(["other.md", "more.md"]));
        assert_eq!(json["tags"], json!(["a", "b"]));
        assert_eq!(json["name"], "t");
    }

    #[test]
    fn template_placeholders_fall_back_to_line_scan() {
        let text = "---\nname: [prefix]-[descriptive-name]\nbranch: feature/[name]\nstatus: pending\n---\n";
        let (fm, _) = Frontmatter::parse(text).unwrap();
        assert_eq!(fm.status(), Some("pending"));
        assert_eq!(fm.get("name"), Some("[prefix]-[descriptive-name]"));
    }

    #[test]
    fn empty_block_and_blank_values() {
        let (fm, body) = Frontmatter::parse("---\n---\nbody\n").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(body, "body\n");

        let (fm, _) = Frontmatter::parse("---\nbranch:\nstatus: pending\n---\n").unwrap();
        assert_eq!(fm.get("branch"), None);
        assert_eq!(fm.to_json()["branch"], serde_json::Value::Null);
    }

    #[test]
    fn handles_crlf() {
        let (fm, body) = Frontmatter::parse("---\r\nstatus: complete\r\n---\r\nbody").unwrap();
        assert_eq!(fm.status(), Some("complete"));
        assert_eq!(body, "body");
    }

    #[test]
    fn read_status_only_scans_head() {
        let dir = TempDir::new().unwrap();
        let near = dir.path().join("near.md");
        std::fs::write(&near, "---\nname: near\nstatus: pending\n---\n").unwrap();
        assert_eq!(read_status(&near).as_deref(), Some("pending"));

        let far = dir.path().join("far.md");
        let mut text = String::from("---\n");
        for i in 0..12 {
            text.push_str(&format!("field{i}: x\n"));
        }
        text.push_str("status: pending\n---\n");
        std::fs::write(&far, text).unwrap();
        assert_eq!(read_status(&far), None);

        assert_eq!(read_status(&dir.path().join("missing.md")), None);
    }
}
