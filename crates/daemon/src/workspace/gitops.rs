// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git plumbing for the workspace manager.
//!
//! Every invocation goes through the bounded-timeout subprocess wrapper and
//! strips `GIT_DIR`/`GIT_WORK_TREE` from the environment so the daemon's own
//! context never leaks into workspace repos.

use std::path::Path;
use std::time::Duration;

use sx_core::GitFingerprint;

use crate::subprocess::{run_with_timeout, GIT_MUTATE_TIMEOUT, GIT_QUERY_TIMEOUT};

use super::WorkspaceError;

/// Run git with `-C dir`, requiring exit 0.
pub(super) async fn git(
    dir: &Path,
    args: &[&str],
    timeout: Duration,
    label: &'static str,
) -> Result<String, WorkspaceError> {
    let output = git_raw(dir, args, timeout, label).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkspaceError::Git {
            label,
            detail: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run git with `-C dir`, returning the raw output (callers inspect status).
pub(super) async fn git_raw(
    dir: &Path,
    args: &[&str],
    timeout: Duration,
    label: &'static str,
) -> Result<std::process::Output, WorkspaceError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
    run_with_timeout(cmd, timeout, label)
        .await
        .map_err(|e| WorkspaceError::Git { label, detail: e.to_string() })
}

/// Clone a bare repo for shared worktree use, configuring a standard fetch
/// refspec (bare clones omit it, which would leave worktrees without
/// `origin/*` tracking refs).
pub(super) async fn clone_bare(url: &str, dest: &Path) -> Result<(), WorkspaceError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| WorkspaceError::Io("create repos dir", e.to_string()))?;
    }
    let dest_str = dest.display().to_string();
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(["clone", "--bare", url, &dest_str])
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");
    let output = run_with_timeout(cmd, GIT_MUTATE_TIMEOUT, "git clone --bare")
        .await
        .map_err(|e| WorkspaceError::Git { label: "git clone --bare", detail: e.to_string() })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkspaceError::Git {
            label: "git clone --bare",
            detail: stderr.trim().to_string(),
        });
    }

    git(
        dest,
        &["config", "remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*"],
        GIT_QUERY_TIMEOUT,
        "git config fetch refspec",
    )
    .await?;
    // Populate origin/* from the refs the bare clone already has.
    git(dest, &["fetch", "origin"], GIT_MUTATE_TIMEOUT, "git fetch").await?;
    Ok(())
}

/// Fetch origin, tolerating offline operation (a warning, not an error).
pub(super) async fn fetch_best_effort(dir: &Path) {
    if let Err(e) = git(dir, &["fetch", "origin"], GIT_MUTATE_TIMEOUT, "git fetch").await {
        tracing::warn!(dir = %dir.display(), error = %e, "fetch failed; continuing with cached refs");
    }
}

/// Default branch of a bare clone (its HEAD symref), e.g. `main`.
pub(super) async fn default_branch(bare: &Path) -> Result<String, WorkspaceError> {
    let out =
        git(bare, &["symbolic-ref", "--short", "HEAD"], GIT_QUERY_TIMEOUT, "git symbolic-ref")
            .await?;
    Ok(out.trim().to_string())
}

/// Whether a local branch exists in the repo at `dir`.
pub(super) async fn branch_exists(dir: &Path, branch: &str) -> bool {
    let refname = format!("refs/heads/{}", branch);
    matches!(
        git_raw(dir, &["rev-parse", "--verify", "--quiet", &refname], GIT_QUERY_TIMEOUT, "git rev-parse")
            .await,
        Ok(output) if output.status.success()
    )
}

/// Whether `rel_path` is matched by the worktree's gitignore rules.
///
/// This is the overlay safety check: only ignored paths may be copied in,
/// so an overlay can never shadow a tracked file.
pub(crate) async fn check_ignored(worktree: &Path, rel_path: &str) -> Result<bool, WorkspaceError> {
    let output = git_raw(
        worktree,
        &["check-ignore", "--quiet", "--", rel_path],
        GIT_QUERY_TIMEOUT,
        "git check-ignore",
    )
    .await?;
    // exit 0 = ignored, 1 = not ignored, 128 = error
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(WorkspaceError::Git {
            label: "git check-ignore",
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Compute the five-tuple status fingerprint for a worktree.
pub(super) async fn fingerprint(
    worktree: &Path,
    branch: &str,
) -> Result<GitFingerprint, WorkspaceError> {
    let porcelain =
        git(worktree, &["status", "--porcelain"], GIT_QUERY_TIMEOUT, "git status").await?;
    let files_changed = count_porcelain(&porcelain);

    let numstat =
        git(worktree, &["diff", "--numstat", "HEAD"], GIT_QUERY_TIMEOUT, "git diff --numstat")
            .await
            .unwrap_or_default();
    let (lines_added, lines_removed) = sum_numstat(&numstat);

    let (ahead, behind) = ahead_behind(worktree, branch).await;

    Ok(GitFingerprint { files_changed, lines_added, lines_removed, ahead, behind })
}

/// Commits ahead/behind `origin/<branch>`. Missing upstream counts as (0, 0).
pub(super) async fn ahead_behind(worktree: &Path, branch: &str) -> (u32, u32) {
    let range = format!("origin/{}...HEAD", branch);
    match git_raw(
        worktree,
        &["rev-list", "--left-right", "--count", &range],
        GIT_QUERY_TIMEOUT,
        "git rev-list",
    )
    .await
    {
        Ok(output) if output.status.success() => {
            parse_left_right(&String::from_utf8_lossy(&output.stdout))
        }
        _ => (0, 0),
    }
}

/// Count changed paths in `git status --porcelain` output.
pub(super) fn count_porcelain(porcelain: &str) -> u32 {
    porcelain.lines().filter(|l| !l.trim().is_empty()).count() as u32
}

/// Sum added/removed lines from `git diff --numstat` output.
///
/// Binary files report `-` in both columns and contribute nothing.
pub(super) fn sum_numstat(numstat: &str) -> (u32, u32) {
    let mut added = 0u32;
    let mut removed = 0u32;
    for line in numstat.lines() {
        let mut cols = line.split_whitespace();
        let (Some(a), Some(r)) = (cols.next(), cols.next()) else { continue };
        added += a.parse::<u32>().unwrap_or(0);
        removed += r.parse::<u32>().unwrap_or(0);
    }
    (added, removed)
}

/// Parse `git rev-list --left-right --count A...B` output: `<left>\t<right>`.
///
/// With `origin/<branch>...HEAD`, left is commits only on the remote
/// (behind) and right is commits only local (ahead).
pub(super) fn parse_left_right(output: &str) -> (u32, u32) {
    let mut cols = output.split_whitespace();
    let behind = cols.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let ahead = cols.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (ahead, behind)
}

#[cfg(test)]
#[path = "gitops_tests.rs"]
mod tests;
