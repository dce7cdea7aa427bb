// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request bodies.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/spawn`.
///
/// Either `workspace_id` names an existing workspace (no git ops), or `repo`
/// and `branch` are both required and a workspace is allocated. `targets`
/// maps target name → count, so one spawn can fan out several sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnRequest {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    pub targets: IndexMap<String, u32>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub resume: bool,
}

impl SpawnRequest {
    /// Total session count across all targets.
    pub fn total_count(&self) -> u32 {
        self.targets.values().sum()
    }
}

/// Body of `POST /api/sessions/<id>/rename`.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    pub nickname: String,
}

/// Body of `POST /api/workspaces/<id>/git`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitActionRequest {
    /// One of `stage`, `amend`, `discard`, `uncommit`.
    pub op: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /api/workspaces/<id>/push-branch`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushBranchRequest {
    pub branch: String,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
