use crate::output::print_json;
use anyhow::Context;
use sessions_core::{chunker, transcript::Transcript};
use std::io::Read;
use std::path::Path;

/// `sessions chunk` — split a file (or stdin) into byte-bounded chunks, or turn a runtime
/// transcript into subagent chunk files with `--agent`.
pub fn run(
    root: &Path,
    file: Option<&Path>,
    max_bytes: usize,
    agent: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(agent) = agent {
        let path = file.context("--agent requires a transcript file")?;
        let transcript = Transcript::read(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?;
        let written = sessions_core::transcript::write_chunks(root, agent, &transcript, max_bytes)
            .context("failed to write transcript chunks")?;
        if json {
            return print_json(&serde_json::json!({ "agent": agent, "files": written }));
        }
        for path in &written {
            println!("{}", path.strip_prefix(root).unwrap_or(path).display());
        }
        return Ok(());
    }

    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let chunks: Vec<&str> = chunker::chunk(&text, max_bytes)?.collect();
    if json {
        return print_json(&chunks);
    }
    let total = chunks.len();
    for (i, piece) in chunks.iter().enumerate() {
        println!("=== chunk {}/{total} ({} bytes) ===", i + 1, piece.len());
        print!("{piece}");
        if !piece.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
