// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record.
//!
//! A session is one run target (agent or shell) attached to a multiplexer
//! pane inside one workspace. It references its workspace by id only — the
//! state store holds the adjacency, never pointers.

use crate::id::{RemoteHostId, SessionId, WorkspaceId};
use crate::nudge::Nudge;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a session is in its lifecycle.
///
/// A session is `Running` iff the multiplexer reports its window exists; it
/// becomes `Done` when the window disappears (tracker state is retained for
/// review). Disposal removes the record entirely, so there is no `Disposed`
/// variant here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Done,
}

crate::simple_display! {
    SessionStatus {
        Running => "running",
        Done => "done",
    }
}

/// Persisted record of one spawned session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Name of the target definition this session runs.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub workspace_id: WorkspaceId,
    /// Multiplexer window identifier (e.g. tmux `@3`).
    pub window_id: String,
    /// Multiplexer pane identifier (e.g. tmux `%5`).
    pub pane_id: String,
    pub created_at: DateTime<Utc>,
    pub last_output_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signal_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nudge: Option<Nudge>,
    /// Monotonic counter advanced only by direct non-working agent signals.
    #[serde(default)]
    pub nudge_seq: u64,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_host_id: Option<RemoteHostId>,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Display name: nickname if set, otherwise the target name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.target)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
