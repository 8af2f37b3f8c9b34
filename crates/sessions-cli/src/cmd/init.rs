use anyhow::Context;
use sessions_core::{
    config::Config,
    io, paths,
    state::State,
    store::{Document, Store},
};
use std::path::Path;

const TASK_TEMPLATE: &str = "\
---
name: [prefix]-[descriptive-name]
branch: feature/[name]
status: pending
created: YYYY-MM-DD
---

# [Human-Readable Title]

## Problem/Goal
[Clear description of what we're solving or building]

## Success Criteria
- [ ] Specific, measurable outcome

## Context Manifest
<!-- Gathered before implementation starts -->

## Work Log
<!-- Updated as work progresses -->
";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing sessions in: {}", root.display());

    let dirs = [
        paths::SESSIONS_DIR.to_string(),
        paths::TASKS_DIR.to_string(),
        format!("{}/{}", paths::TASKS_DIR, paths::DONE_DIR_NAME),
        format!("{}/{}", paths::TASKS_DIR, paths::INDEXES_DIR_NAME),
        paths::TRANSCRIPTS_DIR.to_string(),
    ];
    for dir in &dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let store = Store::new(root);
    init_document::<Config>(&store, paths::CONFIG_FILE)?;
    init_document::<State>(&store, paths::STATE_FILE)?;

    let template = paths::tasks_dir(root).join(paths::TASK_TEMPLATE);
    let rel = format!("{}/{}", paths::TASKS_DIR, paths::TASK_TEMPLATE);
    if template.exists() {
        println!("  exists:  {rel}");
    } else {
        io::atomic_write(&template, TASK_TEMPLATE.as_bytes())
            .with_context(|| format!("failed to write {rel}"))?;
        println!("  created: {rel}");
    }

    println!("\nsessions initialized.");
    Ok(())
}

fn init_document<D: Document>(store: &Store, rel: &str) -> anyhow::Result<()> {
    let created = store
        .init::<D>()
        .with_context(|| format!("failed to write {rel}"))?;
    if created {
        println!("  created: {rel}");
    } else {
        println!("  exists:  {rel}");
    }
    Ok(())
}
