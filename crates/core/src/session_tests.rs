// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::nudge::Nudge;

fn sample() -> Session {
    Session {
        id: SessionId::new("abc-tok123"),
        target: "claude".to_string(),
        nickname: None,
        workspace_id: WorkspaceId::new("demo-001"),
        window_id: "@1".to_string(),
        pane_id: "%1".to_string(),
        created_at: Utc::now(),
        last_output_at: Utc::now(),
        last_signal_at: None,
        nudge: None,
        nudge_seq: 0,
        status: SessionStatus::Running,
        remote_host_id: None,
    }
}

#[test]
fn display_name_prefers_nickname() {
    let mut session = sample();
    assert_eq!(session.display_name(), "claude");
    session.nickname = Some("refactor (1)".to_string());
    assert_eq!(session.display_name(), "refactor (1)");
}

#[test]
fn running_status() {
    let mut session = sample();
    assert!(session.is_running());
    session.status = SessionStatus::Done;
    assert!(!session.is_running());
}

#[test]
fn serde_round_trip_with_nudge() {
    let mut session = sample();
    session.nudge = Some(Nudge::from_agent("Completed", "done"));
    session.nudge_seq = 3;
    let json = serde_json::to_string(&session).unwrap();
    let parsed: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, session);
}

#[test]
fn optional_fields_omitted_when_unset() {
    let session = sample();
    let json = serde_json::to_value(&session).unwrap();
    assert!(json.get("nickname").is_none());
    assert!(json.get("nudge").is_none());
    assert!(json.get("remote_host_id").is_none());
}

#[test]
fn status_defaults_to_running() {
    // Records persisted before the status field existed load as running.
    let json = r#"{
        "id": "s1", "target": "claude", "workspace_id": "demo-001",
        "window_id": "@1", "pane_id": "%1",
        "created_at": "2026-01-01T00:00:00Z",
        "last_output_at": "2026-01-01T00:00:00Z"
    }"#;
    let parsed: Session = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.status, SessionStatus::Running);
    assert_eq!(parsed.nudge_seq, 0);
}
