// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted state record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use sx_core::{RemoteHost, RemoteHostId, Session, SessionId, Workspace, WorkspaceId};

use super::persist::CURRENT_STATE_VERSION;

/// Complete daemon state, serialized to `state.json`.
///
/// Workspaces and sessions reference each other by id only; this record holds
/// the adjacency, so there is no cyclic ownership anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    /// Schema version for forward-compat rejection.
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub workspaces: HashMap<WorkspaceId, Workspace>,
    #[serde(default)]
    pub sessions: HashMap<SessionId, Session>,
    #[serde(default)]
    pub remote_hosts: HashMap<RemoteHostId, RemoteHost>,
}

fn default_version() -> u32 {
    CURRENT_STATE_VERSION
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            workspaces: HashMap::new(),
            sessions: HashMap::new(),
            remote_hosts: HashMap::new(),
        }
    }
}

impl PersistedState {
    /// Sessions bound to a workspace, unordered.
    pub fn sessions_in(&self, workspace_id: &WorkspaceId) -> Vec<&Session> {
        self.sessions.values().filter(|s| &s.workspace_id == workspace_id).collect()
    }

    /// Whether any live session uses this nickname (exact match).
    pub fn nickname_taken(&self, nickname: &str) -> bool {
        self.sessions.values().any(|s| s.nickname.as_deref() == Some(nickname))
    }

    /// Numeric suffixes currently in use for a repo's workspaces.
    pub fn used_suffixes(&self, repo: &str) -> Vec<u32> {
        self.workspaces
            .values()
            .filter_map(|w| w.id.split())
            .filter(|(r, _)| *r == repo)
            .map(|(_, n)| n)
            .collect()
    }

    /// Find the workspace (if any) that has `branch` checked out for `repo`.
    pub fn workspace_on_branch(&self, repo: &str, branch: &str) -> Option<&Workspace> {
        self.workspaces.values().find(|w| w.repo == repo && w.branch == branch)
    }
}
