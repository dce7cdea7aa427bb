// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace record.
//!
//! A workspace is a git worktree (or legacy full clone) owned by the daemon,
//! sequentially numbered per repo. Sessions reference it by id; the record
//! never points back at them.

use crate::id::WorkspaceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version-control backing of a workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsKind {
    #[default]
    Git,
}

crate::simple_display! {
    VcsKind {
        Git => "git",
    }
}

/// Five-tuple summary of a workspace's git status.
///
/// Computed by the status poller from `git status --porcelain` and
/// `git rev-list --left-right --count`; a change in any field schedules a
/// dashboard broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitFingerprint {
    pub files_changed: u32,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub ahead: u32,
    pub behind: u32,
}

impl GitFingerprint {
    /// Uncommitted changes present in the worktree.
    pub fn is_dirty(&self) -> bool {
        self.files_changed > 0
    }

    /// Local commits not on the remote tracking branch.
    pub fn is_ahead(&self) -> bool {
        self.ahead > 0
    }
}

/// Persisted record of one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub repo: String,
    pub repo_url: String,
    pub branch: String,
    pub path: PathBuf,
    #[serde(default)]
    pub vcs: VcsKind,
    /// True when this workspace is a full clone rather than a worktree of the
    /// shared bare repo (the same-branch-elsewhere fallback).
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub fingerprint: GitFingerprint,
    pub default_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_on_branch: Option<String>,
    #[serde(default)]
    pub commits_synced_with_remote: bool,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// Disposal precondition: nothing in the worktree would be lost.
    pub fn is_clean(&self) -> bool {
        !self.fingerprint.is_dirty() && !self.fingerprint.is_ahead()
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
