// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response shapes and WebSocket frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use sx_core::{GitFingerprint, Nudge, Session, Workspace};

use crate::storage::PersistedState;

/// One session as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub workspace_id: String,
    /// Multiplexer window id, for `schmux attach`.
    pub window_id: String,
    pub created_at: DateTime<Utc>,
    pub last_output_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signal_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nudge: Option<Nudge>,
    pub nudge_seq: u64,
    pub running: bool,
}

impl From<&Session> for SessionEntry {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            target: session.target.clone(),
            nickname: session.nickname.clone(),
            workspace_id: session.workspace_id.to_string(),
            window_id: session.window_id.clone(),
            created_at: session.created_at,
            last_output_at: session.last_output_at,
            last_signal_at: session.last_signal_at,
            nudge: session.nudge.clone(),
            nudge_seq: session.nudge_seq,
            running: session.is_running(),
        }
    }
}

/// One workspace with its sessions nested, as the dashboard sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub id: String,
    pub repo: String,
    pub repo_url: String,
    pub branch: String,
    pub path: PathBuf,
    pub vcs: String,
    pub legacy: bool,
    pub fingerprint: GitFingerprint,
    pub default_branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_on_branch: Option<String>,
    pub commits_synced_with_remote: bool,
    pub sessions: Vec<SessionEntry>,
}

impl WorkspaceEntry {
    fn new(workspace: &Workspace, mut sessions: Vec<SessionEntry>) -> Self {
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Self {
            id: workspace.id.to_string(),
            repo: workspace.repo.clone(),
            repo_url: workspace.repo_url.clone(),
            branch: workspace.branch.clone(),
            path: workspace.path.clone(),
            vcs: workspace.vcs.to_string(),
            legacy: workspace.legacy,
            fingerprint: workspace.fingerprint,
            default_branch: workspace.default_branch.clone(),
            conflict_on_branch: workspace.conflict_on_branch.clone(),
            commits_synced_with_remote: workspace.commits_synced_with_remote,
            sessions,
        }
    }
}

/// The dashboard state frame; also the body of `GET /api/sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsMessage {
    /// Discriminator, always `"sessions"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub workspaces: Vec<WorkspaceEntry>,
}

/// Build the dashboard snapshot from state, deterministically ordered.
pub fn build_sessions_message(state: &PersistedState) -> SessionsMessage {
    let mut workspaces: Vec<WorkspaceEntry> = state
        .workspaces
        .values()
        .map(|workspace| {
            let sessions =
                state.sessions_in(&workspace.id).into_iter().map(SessionEntry::from).collect();
            WorkspaceEntry::new(workspace, sessions)
        })
        .collect();
    workspaces.sort_by(|a, b| a.id.cmp(&b.id));
    SessionsMessage { kind: "sessions".to_string(), workspaces }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_s: u64,
    pub sessions: usize,
    pub workspaces: usize,
    pub save_failures: u64,
}

/// One spawned session in a spawn response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnResult {
    pub session_id: String,
    pub workspace_id: String,
    pub target: String,
}

/// Body of `POST /api/spawn` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnResponse {
    pub results: Vec<SpawnResult>,
}

/// Body of `POST /api/check-branch-conflict` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConflictResponse {
    pub conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

/// Body of `GET /api/workspaces/<id>/diff`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResponse {
    pub diff: String,
}

/// Body of `GET /api/workspaces/<id>/git-graph`.
#[derive(Debug, Clone, Serialize)]
pub struct GitGraphResponse {
    pub nodes: Vec<crate::workspace::GraphNode>,
    pub branches: Vec<crate::workspace::GraphBranch>,
    pub main_ahead_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty_state: Option<GitFingerprint>,
}

/// Linear-sync endpoints reuse the workspace manager's outcome directly.
pub type LinearSyncResponse = crate::workspace::LinearSyncOutcome;

/// One proposal in `GET /api/lore/proposals`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: String,
    pub repo: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub diff_summary: String,
    pub files: Vec<String>,
}

/// Server→client frames on `/ws/terminal/<session-id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalServerFrame {
    /// Current trimmed log tail, sent once on connect.
    Full { content: String },
    /// New bytes appended to the log.
    Append { content: String },
    /// Another client took over this session's stream.
    Displaced,
    /// The log rotated; reopen the socket.
    Reconnect,
}

/// Client→server frames on `/ws/terminal/<session-id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalClientFrame {
    /// Keystrokes forwarded to the pane.
    Input { data: String },
    /// `data` is a JSON string: `{"cols":80,"rows":24}`.
    Resize { data: String },
    Pause,
    Resume,
}

/// Decoded resize payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TerminalResize {
    pub cols: u16,
    pub rows: u16,
}

/// A route-level error: HTTP status plus message, serialized as `{error}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: 400, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: 404, message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { status: 409, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { status: 500, message: message.into() }
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.message })
    }
}

impl From<crate::workspace::WorkspaceError> for ApiError {
    fn from(e: crate::workspace::WorkspaceError) -> Self {
        use crate::workspace::WorkspaceError as W;
        match &e {
            W::BranchConflict { .. } => Self::conflict(e.to_string()),
            W::NotFound(_) => Self::not_found(e.to_string()),
            other if other.is_precondition() => Self::bad_request(e.to_string()),
            _ => Self::internal(e.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
