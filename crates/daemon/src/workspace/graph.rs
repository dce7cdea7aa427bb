// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit graph for the dashboard's history view.

use serde::Serialize;
use std::collections::HashSet;

use sx_core::WorkspaceId;

use crate::subprocess::GIT_QUERY_TIMEOUT;

use super::gitops;
use super::{WorkspaceError, WorkspaceManager};

/// Unit separator used in the log format — cannot appear in subjects.
const FIELD_SEP: char = '\u{1f}';

#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Cap on total commits returned.
    pub max_total: usize,
    /// How many commits of `origin/<default>` context to include.
    pub main_context: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self { max_total: 50, main_context: 5 }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphNode {
    pub sha: String,
    pub parents: Vec<String>,
    pub author: String,
    pub date: String,
    pub subject: String,
    /// True when the commit is reachable from `origin/<default>`.
    pub on_main: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphBranch {
    pub name: String,
    pub head: String,
    pub is_main: bool,
}

impl WorkspaceManager {
    /// Commit graph: workspace-branch commits plus a window of default-branch
    /// context, with the count of main commits not yet on this branch.
    pub async fn git_graph(
        &self,
        id: &WorkspaceId,
        opts: GraphOptions,
    ) -> Result<crate::protocol::GitGraphResponse, WorkspaceError> {
        let workspace = self.get(id)?;
        let dir = &workspace.path;
        let upstream = format!("origin/{}", workspace.default_branch);

        let main_shas: HashSet<String> = self
            .log_shas(dir, &upstream, opts.max_total)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

        let mut nodes = self.log_nodes(dir, "HEAD", opts.max_total, &main_shas).await?;
        let seen: HashSet<String> = nodes.iter().map(|n| n.sha.clone()).collect();

        if let Ok(context) = self.log_nodes(dir, &upstream, opts.main_context, &main_shas).await {
            for node in context {
                if !seen.contains(&node.sha) {
                    nodes.push(node);
                }
            }
        }
        nodes.truncate(opts.max_total);

        let head = self
            .rev_parse(dir, "HEAD")
            .await
            .unwrap_or_default();
        let main_head = self.rev_parse(dir, &upstream).await.unwrap_or_default();

        let branches = vec![
            GraphBranch { name: workspace.branch.clone(), head, is_main: false },
            GraphBranch {
                name: workspace.default_branch.clone(),
                head: main_head,
                is_main: true,
            },
        ];

        let range = format!("HEAD..{}", upstream);
        let main_ahead_count = gitops::git(
            dir,
            &["rev-list", "--count", &range],
            GIT_QUERY_TIMEOUT,
            "git rev-list --count",
        )
        .await
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);

        let dirty_state = if workspace.fingerprint.is_dirty() {
            Some(workspace.fingerprint)
        } else {
            None
        };

        Ok(crate::protocol::GitGraphResponse { nodes, branches, main_ahead_count, dirty_state })
    }

    async fn rev_parse(&self, dir: &std::path::Path, rev: &str) -> Option<String> {
        gitops::git(dir, &["rev-parse", rev], GIT_QUERY_TIMEOUT, "git rev-parse")
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }

    async fn log_shas(
        &self,
        dir: &std::path::Path,
        rev: &str,
        limit: usize,
    ) -> Result<Vec<String>, WorkspaceError> {
        let n = format!("-{}", limit);
        let out = gitops::git(dir, &["rev-list", &n, rev], GIT_QUERY_TIMEOUT, "git rev-list")
            .await?;
        Ok(out.lines().map(str::to_string).collect())
    }

    async fn log_nodes(
        &self,
        dir: &std::path::Path,
        rev: &str,
        limit: usize,
        main_shas: &HashSet<String>,
    ) -> Result<Vec<GraphNode>, WorkspaceError> {
        let n = format!("-{}", limit);
        let format = format!("--format=%H{0}%P{0}%an{0}%aI{0}%s", FIELD_SEP);
        let out = gitops::git(dir, &["log", &n, &format, rev], GIT_QUERY_TIMEOUT, "git log").await?;
        Ok(parse_log(&out, main_shas))
    }
}

/// Parse `git log` output using the unit-separator format above.
fn parse_log(out: &str, main_shas: &HashSet<String>) -> Vec<GraphNode> {
    out.lines()
        .filter_map(|line| {
            let mut fields = line.split(FIELD_SEP);
            let sha = fields.next()?.to_string();
            if sha.is_empty() {
                return None;
            }
            let parents =
                fields.next()?.split_whitespace().map(str::to_string).collect::<Vec<_>>();
            let author = fields.next()?.to_string();
            let date = fields.next()?.to_string();
            let subject = fields.next().unwrap_or_default().to_string();
            let on_main = main_shas.contains(&sha);
            Some(GraphNode { sha, parents, author, date, subject, on_main })
        })
        .collect()
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
