// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merging sibling workspaces' overlay files back into the central overlay.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::Paths;
use crate::storage::StateStore;

use super::walk_files;

/// Relative path of the scratchpad, always treated as part of the overlay
/// set even before the central copy exists.
const SCRATCHPAD_REL: &str = ".claude/lore.jsonl";

/// Periodic sweep across all repos with workspaces.
pub async fn run_compounder(
    store: Arc<StateStore>,
    paths: Paths,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }

        let repos: BTreeSet<String> =
            store.workspaces().into_iter().map(|w| w.repo).collect();
        for repo in repos {
            compound_repo(&store, &paths, &repo);
        }
    }
}

/// Merge every workspace's overlay files for `repo` into the central overlay.
///
/// JSONL files take the union of lines (central order first, new lines in
/// encounter order). Other files are last-writer-wins by mtime; a losing
/// newer-than-central sibling is recorded as a warning.
pub fn compound_repo(store: &StateStore, paths: &Paths, repo: &str) {
    let central = paths.overlay_dir(repo);
    let workspaces: Vec<PathBuf> = store
        .workspaces()
        .into_iter()
        .filter(|w| w.repo == repo)
        .map(|w| w.path)
        .collect();
    if workspaces.is_empty() {
        return;
    }

    // The overlay path set: whatever the central overlay carries, plus the
    // default scratchpad.
    let mut rel_paths: BTreeSet<PathBuf> = walk_files(&central).into_iter().collect();
    rel_paths.insert(PathBuf::from(SCRATCHPAD_REL));

    for rel in rel_paths {
        let is_jsonl = rel.extension().and_then(|e| e.to_str()) == Some("jsonl");
        if is_jsonl {
            compound_jsonl(&central, &workspaces, &rel);
        } else {
            compound_lww(&central, &workspaces, &rel);
        }
    }
}

fn compound_jsonl(central: &Path, workspaces: &[PathBuf], rel: &Path) {
    let central_path = central.join(rel);
    let mut merged: Vec<String> = read_lines(&central_path);

    let mut grew = false;
    for workspace in workspaces {
        let lines = read_lines(&workspace.join(rel));
        if line_union(&mut merged, lines) {
            grew = true;
        }
    }

    if !grew && central_path.exists() {
        return;
    }
    if merged.is_empty() {
        return;
    }
    if let Err(e) = write_lines(&central_path, &merged) {
        tracing::warn!(path = %central_path.display(), error = %e, "compound write failed");
    }
}

fn compound_lww(central: &Path, workspaces: &[PathBuf], rel: &Path) {
    let central_path = central.join(rel);
    let central_mtime = mtime(&central_path);

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut contenders = 0usize;
    for workspace in workspaces {
        let candidate = workspace.join(rel);
        let Some(m) = mtime(&candidate) else { continue };
        if central_mtime.map(|c| m > c).unwrap_or(true) {
            contenders += 1;
            if newest.as_ref().map(|(n, _)| m > *n).unwrap_or(true) {
                newest = Some((m, candidate));
            }
        }
    }

    let Some((_, winner)) = newest else { return };
    if contenders > 1 {
        tracing::warn!(
            rel = %rel.display(),
            contenders,
            "multiple workspaces updated a non-JSONL overlay file; keeping the newest"
        );
    }
    if let Some(parent) = central_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::copy(&winner, &central_path) {
        tracing::warn!(path = %central_path.display(), error = %e, "compound copy failed");
    }
}

/// Append lines from `incoming` that `merged` does not already contain.
/// Returns whether anything was added. Identical lines collapse; order is
/// preserved (existing first, new in encounter order).
pub fn line_union(merged: &mut Vec<String>, incoming: Vec<String>) -> bool {
    let seen: std::collections::HashSet<String> = merged.iter().cloned().collect();
    let mut added = false;
    let mut seen = seen;
    for line in incoming {
        if line.trim().is_empty() {
            continue;
        }
        if seen.insert(line.clone()) {
            merged.push(line);
            added = true;
        }
    }
    added
}

fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = lines.join("\n");
    body.push('\n');
    // Rewrite via temp + rename so a reader never sees a partial merge.
    let tmp = path.with_extension("jsonl.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
