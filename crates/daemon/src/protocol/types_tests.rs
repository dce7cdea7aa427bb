// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::storage::PersistedState;
use chrono::Utc;
use std::path::PathBuf;
use sx_core::{
    GitFingerprint, Nudge, Session, SessionId, SessionStatus, VcsKind, Workspace, WorkspaceId,
};

fn state_with(workspaces: &[&str], sessions: &[(&str, &str)]) -> PersistedState {
    let mut state = PersistedState::default();
    for id in workspaces {
        state.workspaces.insert(
            WorkspaceId::new(*id),
            Workspace {
                id: WorkspaceId::new(*id),
                repo: "demo".to_string(),
                repo_url: "git@example.com:demo.git".to_string(),
                branch: "main".to_string(),
                path: PathBuf::from("/tmp").join(id),
                vcs: VcsKind::Git,
                legacy: false,
                fingerprint: GitFingerprint::default(),
                default_branch: "main".to_string(),
                conflict_on_branch: None,
                commits_synced_with_remote: false,
                created_at: Utc::now(),
            },
        );
    }
    for (sid, wid) in sessions {
        state.sessions.insert(
            SessionId::new(*sid),
            Session {
                id: SessionId::new(*sid),
                target: "claude".to_string(),
                nickname: None,
                workspace_id: WorkspaceId::new(*wid),
                window_id: "@1".to_string(),
                pane_id: "%1".to_string(),
                created_at: Utc::now(),
                last_output_at: Utc::now(),
                last_signal_at: None,
                nudge: None,
                nudge_seq: 0,
                status: SessionStatus::Running,
                remote_host_id: None,
            },
        );
    }
    state
}

#[test]
fn sessions_message_shape() {
    let state = state_with(&["demo-001"], &[("s1", "demo-001")]);
    let message = build_sessions_message(&state);
    let json = serde_json::to_value(&message).unwrap();

    assert_eq!(json["type"], "sessions");
    assert_eq!(json["workspaces"][0]["id"], "demo-001");
    assert_eq!(json["workspaces"][0]["sessions"][0]["id"], "s1");
    assert_eq!(json["workspaces"][0]["sessions"][0]["running"], true);
    assert_eq!(json["workspaces"][0]["sessions"][0]["nudge_seq"], 0);
}

#[test]
fn sessions_message_orders_workspaces() {
    let state = state_with(&["demo-002", "demo-001"], &[]);
    let message = build_sessions_message(&state);
    let ids: Vec<&str> = message.workspaces.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["demo-001", "demo-002"]);
}

#[test]
fn sessions_nest_under_their_workspace() {
    let state = state_with(
        &["demo-001", "demo-002"],
        &[("s1", "demo-001"), ("s2", "demo-002"), ("s3", "demo-001")],
    );
    let message = build_sessions_message(&state);
    assert_eq!(message.workspaces[0].sessions.len(), 2);
    assert_eq!(message.workspaces[1].sessions.len(), 1);
}

#[test]
fn entry_carries_nudge() {
    let mut state = state_with(&["demo-001"], &[("s1", "demo-001")]);
    if let Some(s) = state.sessions.get_mut("s1") {
        s.nudge = Some(Nudge::from_agent("Completed", "done"));
        s.nudge_seq = 1;
    }
    let json = serde_json::to_value(build_sessions_message(&state)).unwrap();
    let session = &json["workspaces"][0]["sessions"][0];
    assert_eq!(session["nudge"]["state"], "Completed");
    assert_eq!(session["nudge"]["source"], "agent");
    assert_eq!(session["nudge_seq"], 1);
}

#[test]
fn terminal_server_frames_use_type_discriminator() {
    let full = TerminalServerFrame::Full { content: "hi".to_string() };
    assert_eq!(
        serde_json::to_value(&full).unwrap(),
        serde_json::json!({"type": "full", "content": "hi"})
    );
    assert_eq!(
        serde_json::to_value(TerminalServerFrame::Displaced).unwrap(),
        serde_json::json!({"type": "displaced"})
    );
    assert_eq!(
        serde_json::to_value(TerminalServerFrame::Reconnect).unwrap(),
        serde_json::json!({"type": "reconnect"})
    );
}

#[test]
fn terminal_client_frames_parse() {
    let input: TerminalClientFrame =
        serde_json::from_str(r#"{"type":"input","data":"ls\r"}"#).unwrap();
    assert_eq!(input, TerminalClientFrame::Input { data: "ls\r".to_string() });

    let resize: TerminalClientFrame =
        serde_json::from_str(r#"{"type":"resize","data":"{\"cols\":120,\"rows\":40}"}"#).unwrap();
    if let TerminalClientFrame::Resize { data } = resize {
        let parsed: TerminalResize = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed, TerminalResize { cols: 120, rows: 40 });
    } else {
        panic!("expected resize frame");
    }

    let pause: TerminalClientFrame = serde_json::from_str(r#"{"type":"pause"}"#).unwrap();
    assert_eq!(pause, TerminalClientFrame::Pause);
}

#[test]
fn api_error_body_shape() {
    let err = ApiError::conflict("branch main is already checked out in demo-001");
    assert_eq!(err.status, 409);
    assert_eq!(
        err.body(),
        serde_json::json!({"error": "branch main is already checked out in demo-001"})
    );
}

#[test]
fn workspace_error_maps_to_statuses() {
    use crate::workspace::WorkspaceError;
    let conflict: ApiError = WorkspaceError::BranchConflict {
        branch: "main".to_string(),
        workspace_id: WorkspaceId::new("demo-001"),
    }
    .into();
    assert_eq!(conflict.status, 409);

    let missing: ApiError = WorkspaceError::NotFound(WorkspaceId::new("demo-009")).into();
    assert_eq!(missing.status, 404);

    let dirty: ApiError = WorkspaceError::Dirty(WorkspaceId::new("demo-001")).into();
    assert_eq!(dirty.status, 400);

    let git: ApiError =
        WorkspaceError::Git { label: "git push", detail: "remote hung up".to_string() }.into();
    assert_eq!(git.status, 500);
}
