// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-level git actions driven from the dashboard diff view.

use sx_core::WorkspaceId;

use crate::subprocess::{GIT_MUTATE_TIMEOUT, GIT_QUERY_TIMEOUT};

use super::gitops;
use super::{WorkspaceError, WorkspaceManager};

impl WorkspaceManager {
    /// Stage the given paths.
    pub async fn stage(&self, id: &WorkspaceId, files: &[String]) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        let mut args: Vec<&str> = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        gitops::git(&workspace.path, &args, GIT_MUTATE_TIMEOUT, "git add").await?;
        Ok(())
    }

    /// Amend the tip commit, optionally staging paths first and optionally
    /// replacing the message.
    pub async fn amend(
        &self,
        id: &WorkspaceId,
        files: &[String],
        message: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        if !files.is_empty() {
            self.stage(id, files).await?;
        }
        match message {
            Some(msg) => {
                gitops::git(
                    &workspace.path,
                    &["commit", "--amend", "-m", msg],
                    GIT_MUTATE_TIMEOUT,
                    "git commit --amend",
                )
                .await?;
            }
            None => {
                gitops::git(
                    &workspace.path,
                    &["commit", "--amend", "--no-edit"],
                    GIT_MUTATE_TIMEOUT,
                    "git commit --amend",
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Throw away changes to the given paths (tracked restored, untracked
    /// removed).
    pub async fn discard(&self, id: &WorkspaceId, files: &[String]) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        for file in files {
            let tracked = gitops::git_raw(
                &workspace.path,
                &["ls-files", "--error-unmatch", "--", file],
                GIT_QUERY_TIMEOUT,
                "git ls-files",
            )
            .await?
            .status
            .success();

            if tracked {
                gitops::git(
                    &workspace.path,
                    &["checkout", "--", file],
                    GIT_MUTATE_TIMEOUT,
                    "git checkout --",
                )
                .await?;
            } else {
                let target = workspace.path.join(file);
                if target.is_dir() {
                    let _ = tokio::fs::remove_dir_all(&target).await;
                } else {
                    let _ = tokio::fs::remove_file(&target).await;
                }
            }
        }
        Ok(())
    }

    /// Undo the tip commit, keeping its changes staged. Refuses when the
    /// workspace has nothing ahead of the remote, so pushed history is never
    /// rewritten.
    pub async fn uncommit(&self, id: &WorkspaceId) -> Result<(), WorkspaceError> {
        let workspace = self.get(id)?;
        let (ahead, _) = gitops::ahead_behind(&workspace.path, &workspace.default_branch).await;
        if ahead == 0 {
            return Err(WorkspaceError::NothingToUncommit(id.clone()));
        }
        gitops::git(
            &workspace.path,
            &["reset", "--soft", "HEAD~1"],
            GIT_MUTATE_TIMEOUT,
            "git reset --soft",
        )
        .await?;
        Ok(())
    }
}
