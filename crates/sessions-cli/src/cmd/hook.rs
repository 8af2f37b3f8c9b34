use crate::cmd::update;
use crate::root;
use anyhow::Context;
use clap::ValueEnum;
use sessions_core::{
    hook::{self, HookError, HookEvent, HookInput},
    store::Store,
};
use std::io::Read;
use std::path::Path;

#[derive(Clone, Copy, ValueEnum)]
pub enum HookKind {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
}

impl From<HookKind> for HookEvent {
    fn from(kind: HookKind) -> Self {
        match kind {
            HookKind::SessionStart => HookEvent::SessionStart,
            HookKind::UserPromptSubmit => HookEvent::UserPromptSubmit,
            HookKind::PreToolUse => HookEvent::PreToolUse,
            HookKind::PostToolUse => HookEvent::PostToolUse,
        }
    }
}

/// Run one hook. Stdout carries exactly one JSON object, success or not.
pub fn run(explicit_root: Option<&Path>, kind: HookKind) -> anyhow::Result<()> {
    match handle(explicit_root, kind.into()) {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(e) => {
            let error = format!("{e:#}");
            tracing::error!(%error, "hook failed");
            let body = serde_json::to_string(&HookError { error })
                .unwrap_or_else(|_| r#"{"error":"hook failed"}"#.to_string());
            println!("{body}");
            std::process::exit(1);
        }
    }
}

fn handle(explicit_root: Option<&Path>, event: HookEvent) -> anyhow::Result<String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read hook payload")?;
    let input: HookInput = if raw.trim().is_empty() {
        HookInput::default()
    } else {
        serde_json::from_str(&raw).context("failed to parse hook payload")?
    };

    let root = root::resolve_root(explicit_root, input.cwd.as_deref());
    let store = Store::new(root);
    let mut output = hook::handle(event, &store, &input)
        .with_context(|| format!("{event} hook failed"))?;

    if event == HookEvent::SessionStart {
        if let Some(notice) = update::notice() {
            output.append_context(&notice);
        }
    }

    Ok(serde_json::to_string(&output)?)
}
