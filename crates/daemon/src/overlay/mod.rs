// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overlay propagation and compounding.
//!
//! An overlay is the set of local-only files (env files, secrets, the lore
//! scratchpad) kept under `<config-dir>/overlays/<repo>/` and mirrored into
//! every worktree of that repo. Propagation is gated on the worktree's
//! gitignore: a path git does not ignore is skipped with a warning, so an
//! overlay can never shadow a tracked file.
//!
//! Compounding runs the other way: it merges sibling worktrees' copies back
//! into the central overlay. JSONL files merge by line union; everything
//! else is last-writer-wins. The whole path is additive — failures mean
//! sibling workspaces see each other's entries later, never that a session
//! blocks.

mod compound;

pub use compound::{compound_repo, line_union, run_compounder};

use std::path::{Path, PathBuf};

use crate::workspace::gitops;

/// What an overlay application did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OverlayReport {
    /// Worktree-relative paths copied in.
    pub applied: Vec<String>,
    /// Paths skipped (not gitignored) or failed, with reasons.
    pub warnings: Vec<String>,
}

/// Copy every file under `overlay_dir` into `worktree` at the same relative
/// path, overwriting existing files, skipping paths the worktree does not
/// gitignore.
pub async fn apply_overlay(overlay_dir: &Path, worktree: &Path) -> OverlayReport {
    let mut report = OverlayReport::default();

    let files = walk_files(overlay_dir);
    for rel in files {
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        match gitops::check_ignored(worktree, &rel_str).await {
            Ok(true) => {}
            Ok(false) => {
                report
                    .warnings
                    .push(format!("{}: not matched by .gitignore; skipped", rel_str));
                continue;
            }
            Err(e) => {
                report.warnings.push(format!("{}: gitignore check failed: {}", rel_str, e));
                continue;
            }
        }

        let src = overlay_dir.join(&rel);
        let dest = worktree.join(&rel);
        if let Some(parent) = dest.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                report.warnings.push(format!("{}: {}", rel_str, e));
                continue;
            }
        }
        match std::fs::copy(&src, &dest) {
            Ok(_) => report.applied.push(rel_str),
            Err(e) => report.warnings.push(format!("{}: copy failed: {}", rel_str, e)),
        }
    }

    report
}

/// Relative paths of all regular files under `root`, depth-first.
pub(crate) fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_path_buf());
            }
        }
    }
    out.sort();
    out
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
