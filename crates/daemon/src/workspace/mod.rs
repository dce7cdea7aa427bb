// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace manager: worktree allocation, git status polling, disposal.
//!
//! Workspaces are git worktrees rooted in a shared per-repo bare clone,
//! named `<repo>-NNN` with the lowest free suffix. When the requested branch
//! is already checked out in another worktree the allocation falls back to a
//! full clone (`legacy = true`) — git refuses double checkouts.

mod actions;
pub(crate) mod gitops;
mod graph;
mod naming;
mod status;
mod sync;

pub use graph::{GraphBranch, GraphNode, GraphOptions};
pub use status::run_status_poller;
pub use sync::{LinearSyncConflict, LinearSyncOutcome};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use chrono::Utc;
use sx_core::{Config, GitFingerprint, VcsKind, Workspace, WorkspaceId};

use crate::lifecycle::Paths;
use crate::storage::StateStore;
use crate::subprocess::{GIT_MUTATE_TIMEOUT, GIT_QUERY_TIMEOUT};

use naming::SuffixReservations;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("unknown repo: {0}")]
    UnknownRepo(String),
    #[error("branch {branch} is already checked out in {workspace_id}")]
    BranchConflict { branch: String, workspace_id: WorkspaceId },
    #[error("workspace not found: {0}")]
    NotFound(WorkspaceId),
    #[error("workspace {0} has uncommitted changes")]
    Dirty(WorkspaceId),
    #[error("workspace {0} has {1} unpushed commit(s)")]
    Ahead(WorkspaceId, u32),
    #[error("workspace {0} has {1} active session(s)")]
    HasSessions(WorkspaceId, usize),
    #[error("workspace {0} is the dev hot-reload source")]
    DevSource(WorkspaceId),
    #[error("workspace {0} is behind the remote; sync from main first")]
    Behind(WorkspaceId),
    #[error("{label}: {detail}")]
    Git { label: &'static str, detail: String },
    #[error("{0}: {1}")]
    Io(&'static str, String),
    #[error("nothing to uncommit in {0}")]
    NothingToUncommit(WorkspaceId),
}

impl WorkspaceError {
    /// Precondition errors map to 4xx; the rest are resource failures.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, WorkspaceError::Git { .. } | WorkspaceError::Io(..))
    }
}

pub struct WorkspaceManager {
    paths: Paths,
    config: Arc<Config>,
    store: Arc<StateStore>,
    reservations: Arc<SuffixReservations>,
    /// Parent directory for worktrees.
    workspace_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(paths: Paths, config: Arc<Config>, store: Arc<StateStore>) -> Arc<Self> {
        let workspace_root =
            config.workspace_dir.clone().unwrap_or_else(|| paths.workspaces_dir());
        Arc::new(Self {
            paths,
            config,
            store,
            reservations: SuffixReservations::new(),
            workspace_root,
        })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Which workspace, if any, already has `branch` checked out for `repo`.
    pub fn check_branch_conflict(&self, repo: &str, branch: &str) -> Option<WorkspaceId> {
        self.store.workspace_on_branch(repo, branch).map(|w| w.id)
    }

    /// Allocate a workspace for `repo`/`branch`: reserve a suffix, ensure the
    /// bare clone, add a worktree (or fall back to a full clone), apply the
    /// overlay, and register the record.
    pub async fn create(&self, repo: &str, branch: &str) -> Result<Workspace, WorkspaceError> {
        let repo_config = self
            .config
            .repo(repo)
            .ok_or_else(|| WorkspaceError::UnknownRepo(repo.to_string()))?;

        if let Some(occupant) = self.check_branch_conflict(repo, branch) {
            return Err(WorkspaceError::BranchConflict {
                branch: branch.to_string(),
                workspace_id: occupant,
            });
        }

        // Reserve the suffix before any filesystem work.
        let reservation = self.reservations.reserve(repo, &self.store.used_suffixes(repo));
        let workspace_id = reservation.id.clone();
        let path = self.workspace_root.join(workspace_id.as_str());

        let bare = self.paths.bare_repo(repo);
        if !bare.exists() {
            gitops::clone_bare(&repo_config.url, &bare).await?;
        } else {
            gitops::fetch_best_effort(&bare).await;
        }

        let default_branch = match &repo_config.default_branch {
            Some(b) => b.clone(),
            None => gitops::default_branch(&bare).await?,
        };

        tokio::fs::create_dir_all(&self.workspace_root)
            .await
            .map_err(|e| WorkspaceError::Io("create workspace root", e.to_string()))?;

        let legacy = self.add_worktree(&bare, &path, branch, &default_branch, &repo_config.url).await?;

        // Signal directory must exist before any session is spawned into it.
        tokio::fs::create_dir_all(crate::lifecycle::WorkspacePaths::signal_dir(&path))
            .await
            .map_err(|e| WorkspaceError::Io("create signal dir", e.to_string()))?;

        let workspace = Workspace {
            id: workspace_id,
            repo: repo.to_string(),
            repo_url: repo_config.url.clone(),
            branch: branch.to_string(),
            path: path.clone(),
            vcs: VcsKind::Git,
            legacy,
            fingerprint: GitFingerprint::default(),
            default_branch,
            conflict_on_branch: None,
            commits_synced_with_remote: false,
            created_at: Utc::now(),
        };

        let report = crate::overlay::apply_overlay(&self.paths.overlay_dir(repo), &path).await;
        for warning in &report.warnings {
            tracing::warn!(workspace = %workspace.id, warning = %warning, "overlay skipped a path");
        }

        self.store.add_workspace(workspace.clone());
        // Registration released the logical hold; drop the in-memory one.
        drop(reservation);

        tracing::info!(workspace = %workspace.id, path = %path.display(), legacy, "workspace created");
        Ok(workspace)
    }

    /// Create the worktree, falling back to a full clone when git refuses a
    /// double checkout. Returns `legacy` (true when a full clone was used).
    async fn add_worktree(
        &self,
        bare: &std::path::Path,
        path: &std::path::Path,
        branch: &str,
        default_branch: &str,
        url: &str,
    ) -> Result<bool, WorkspaceError> {
        let path_str = path.display().to_string();
        let output = if gitops::branch_exists(bare, branch).await {
            gitops::git_raw(
                bare,
                &["worktree", "add", &path_str, branch],
                GIT_MUTATE_TIMEOUT,
                "git worktree add",
            )
            .await?
        } else {
            let start_point = format!("origin/{}", default_branch);
            gitops::git_raw(
                bare,
                &["worktree", "add", "-b", branch, &path_str, &start_point],
                GIT_MUTATE_TIMEOUT,
                "git worktree add",
            )
            .await?
        };

        if output.status.success() {
            return Ok(false);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("already checked out") || stderr.contains("already used by worktree") {
            tracing::warn!(branch, "branch checked out elsewhere; falling back to full clone");
            self.full_clone(url, path, branch).await?;
            return Ok(true);
        }

        Err(WorkspaceError::Git { label: "git worktree add", detail: stderr.trim().to_string() })
    }

    async fn full_clone(
        &self,
        url: &str,
        path: &std::path::Path,
        branch: &str,
    ) -> Result<(), WorkspaceError> {
        let path_str = path.display().to_string();
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(["clone", "--branch", branch, url, &path_str])
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE");
        let output = crate::subprocess::run_with_timeout(cmd, GIT_MUTATE_TIMEOUT, "git clone")
            .await
            .map_err(|e| WorkspaceError::Git { label: "git clone", detail: e.to_string() })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkspaceError::Git {
                label: "git clone",
                detail: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Dispose of a workspace. Fails fast on dirty/ahead/sessions/dev-source
    /// unless `force` (the dispose-all path disposes sessions first, then
    /// calls this with `force = false` — force only bypasses git safety).
    pub async fn dispose(&self, id: &WorkspaceId, force: bool) -> Result<(), WorkspaceError> {
        let workspace =
            self.store.workspace(id).ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;

        let sessions = self.store.sessions_in_workspace(id);
        if !sessions.is_empty() {
            return Err(WorkspaceError::HasSessions(id.clone(), sessions.len()));
        }
        if let Some(dev) = crate::lifecycle::dev_source_dir() {
            if dev == workspace.path {
                return Err(WorkspaceError::DevSource(id.clone()));
            }
        }
        if !force {
            if workspace.fingerprint.is_dirty() {
                return Err(WorkspaceError::Dirty(id.clone()));
            }
            if workspace.fingerprint.is_ahead() {
                return Err(WorkspaceError::Ahead(id.clone(), workspace.fingerprint.ahead));
            }
        }

        self.remove_files(&workspace).await;
        self.store.remove_workspace(id);
        tracing::info!(workspace = %id, "workspace disposed");
        Ok(())
    }

    /// Remove worktree registration and directory, best-effort.
    async fn remove_files(&self, workspace: &Workspace) {
        if !workspace.legacy {
            let bare = self.paths.bare_repo(&workspace.repo);
            let path_str = workspace.path.display().to_string();
            let _ = gitops::git_raw(
                &bare,
                &["worktree", "remove", "--force", &path_str],
                GIT_MUTATE_TIMEOUT,
                "git worktree remove",
            )
            .await;
        }
        if workspace.path.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&workspace.path).await {
                tracing::warn!(
                    path = %workspace.path.display(),
                    error = %e,
                    "failed to remove workspace directory (best-effort)"
                );
            }
        }
    }

    /// Re-apply the central overlay into the worktree.
    pub async fn refresh_overlay(
        &self,
        id: &WorkspaceId,
    ) -> Result<crate::overlay::OverlayReport, WorkspaceError> {
        let workspace =
            self.store.workspace(id).ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        Ok(crate::overlay::apply_overlay(&self.paths.overlay_dir(&workspace.repo), &workspace.path)
            .await)
    }

    /// Unified diff of the worktree against HEAD.
    pub async fn diff(&self, id: &WorkspaceId) -> Result<String, WorkspaceError> {
        let workspace =
            self.store.workspace(id).ok_or_else(|| WorkspaceError::NotFound(id.clone()))?;
        gitops::git(&workspace.path, &["diff", "HEAD"], GIT_QUERY_TIMEOUT, "git diff").await
    }

    pub(crate) fn get(&self, id: &WorkspaceId) -> Result<Workspace, WorkspaceError> {
        self.store.workspace(id).ok_or_else(|| WorkspaceError::NotFound(id.clone()))
    }

    pub(crate) fn paths(&self) -> &Paths {
        &self.paths
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
