// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linear sync: keep workspace branches as a clean line of commits.
//!
//! "From main" replays the workspace's own commits on top of the default
//! branch by iterative cherry-pick, stopping at the first conflict. "To main"
//! is a fast-forward-only push of the current branch onto the default branch.

use serde::Serialize;

use sx_core::WorkspaceId;

use crate::subprocess::{GIT_MUTATE_TIMEOUT, GIT_QUERY_TIMEOUT};

use super::gitops;
use super::{WorkspaceError, WorkspaceManager};

/// Step-by-step progress callback: `(step, total, commit_subject)`.
pub type SyncProgress<'a> = &'a (dyn Fn(usize, usize, &str) + Send + Sync);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinearSyncConflict {
    pub commit: String,
    pub subject: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinearSyncOutcome {
    pub total: usize,
    pub success_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<LinearSyncConflict>,
}

impl WorkspaceManager {
    /// Replay this workspace's commits onto `origin/<default>`.
    ///
    /// Requires a clean tree. On conflict the in-progress cherry-pick is
    /// aborted; commits already replayed stay, and the conflicting commit is
    /// surfaced for the UI to decide (dismiss vs resolve by hand).
    pub async fn linear_sync_from_main(
        &self,
        id: &WorkspaceId,
        progress: SyncProgress<'_>,
    ) -> Result<LinearSyncOutcome, WorkspaceError> {
        let workspace = self.get(id)?;
        let dir = &workspace.path;

        let porcelain =
            gitops::git(dir, &["status", "--porcelain"], GIT_QUERY_TIMEOUT, "git status").await?;
        if gitops::count_porcelain(&porcelain) > 0 {
            return Err(WorkspaceError::Dirty(id.clone()));
        }

        gitops::fetch_best_effort(dir).await;
        let upstream = format!("origin/{}", workspace.default_branch);

        let range = format!("{}..HEAD", upstream);
        let list =
            gitops::git(dir, &["rev-list", "--reverse", &range], GIT_QUERY_TIMEOUT, "git rev-list")
                .await?;
        let commits: Vec<String> = list.lines().map(str::to_string).collect();
        let total = commits.len();

        gitops::git(dir, &["reset", "--hard", &upstream], GIT_MUTATE_TIMEOUT, "git reset").await?;

        let mut success_count = 0usize;
        for (step, commit) in commits.iter().enumerate() {
            let subject = self.commit_subject(dir, commit).await;
            progress(step + 1, total, &subject);

            let output = gitops::git_raw(
                dir,
                &["cherry-pick", commit],
                GIT_MUTATE_TIMEOUT,
                "git cherry-pick",
            )
            .await?;

            if !output.status.success() {
                let files = self.conflicted_files(dir).await;
                let _ = gitops::git_raw(
                    dir,
                    &["cherry-pick", "--abort"],
                    GIT_MUTATE_TIMEOUT,
                    "git cherry-pick --abort",
                )
                .await;
                self.store.set_workspace_conflict(id, Some(workspace.default_branch.clone()));
                return Ok(LinearSyncOutcome {
                    total,
                    success_count,
                    conflict: Some(LinearSyncConflict {
                        commit: commit.clone(),
                        subject,
                        files,
                    }),
                });
            }
            success_count += 1;
        }

        self.store.set_workspace_conflict(id, None);
        Ok(LinearSyncOutcome { total, success_count, conflict: None })
    }

    /// Fast-forward-only push of the workspace branch onto the default
    /// branch. Requires a clean tree and zero behind; pushing nothing is a
    /// success with `success_count = 0`.
    pub async fn linear_sync_to_main(
        &self,
        id: &WorkspaceId,
    ) -> Result<LinearSyncOutcome, WorkspaceError> {
        let workspace = self.get(id)?;
        let dir = &workspace.path;

        let porcelain =
            gitops::git(dir, &["status", "--porcelain"], GIT_QUERY_TIMEOUT, "git status").await?;
        if gitops::count_porcelain(&porcelain) > 0 {
            return Err(WorkspaceError::Dirty(id.clone()));
        }

        gitops::fetch_best_effort(dir).await;
        let (ahead, behind) = gitops::ahead_behind(dir, &workspace.default_branch).await;
        if behind > 0 {
            return Err(WorkspaceError::Behind(id.clone()));
        }
        if ahead == 0 {
            return Ok(LinearSyncOutcome { total: 0, success_count: 0, conflict: None });
        }

        let refspec = format!("HEAD:refs/heads/{}", workspace.default_branch);
        gitops::git(dir, &["push", "origin", &refspec], GIT_MUTATE_TIMEOUT, "git push").await?;

        let fp = gitops::fingerprint(dir, &workspace.default_branch).await.unwrap_or_default();
        self.store.update_workspace_fingerprint(id, fp);

        Ok(LinearSyncOutcome { total: ahead as usize, success_count: ahead as usize, conflict: None })
    }

    /// Push the current branch to an arbitrary remote branch.
    pub async fn push_to_branch(
        &self,
        id: &WorkspaceId,
        branch: &str,
    ) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        let refspec = format!("HEAD:refs/heads/{}", branch);
        gitops::git(
            &workspace.path,
            &["push", "origin", &refspec],
            GIT_MUTATE_TIMEOUT,
            "git push",
        )
        .await?;
        Ok(())
    }

    async fn commit_subject(&self, dir: &std::path::Path, commit: &str) -> String {
        gitops::git(
            dir,
            &["log", "-1", "--format=%s", commit],
            GIT_QUERY_TIMEOUT,
            "git log",
        )
        .await
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
    }

    async fn conflicted_files(&self, dir: &std::path::Path) -> Vec<String> {
        gitops::git(
            dir,
            &["diff", "--name-only", "--diff-filter=U"],
            GIT_QUERY_TIMEOUT,
            "git diff --name-only",
        )
        .await
        .map(|out| out.lines().map(str::to_string).collect())
        .unwrap_or_default()
    }
}
