// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the HTTP + WebSocket API.
//!
//! The shapes here are contracts with the dashboard and CLI: the sessions
//! list, the spawn request/response, the health payload, the dashboard frame
//! discriminator, and the terminal channel's four-message vocabulary.

mod request;
mod types;

pub use request::{GitActionRequest, PushBranchRequest, RenameRequest, SpawnRequest};
pub use types::{
    build_sessions_message, ApiError, BranchConflictResponse, DiffResponse, GitGraphResponse,
    HealthResponse, LinearSyncResponse, ProposalSummary, SessionEntry, SessionsMessage,
    SpawnResponse, SpawnResult, TerminalClientFrame, TerminalResize, TerminalServerFrame,
    WorkspaceEntry,
};
