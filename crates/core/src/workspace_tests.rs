// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> Workspace {
    Workspace {
        id: WorkspaceId::new("demo-001"),
        repo: "demo".to_string(),
        repo_url: "git@example.com:demo.git".to_string(),
        branch: "main".to_string(),
        path: PathBuf::from("/tmp/workspaces/demo-001"),
        vcs: VcsKind::Git,
        legacy: false,
        fingerprint: GitFingerprint::default(),
        default_branch: "main".to_string(),
        conflict_on_branch: None,
        commits_synced_with_remote: false,
        created_at: Utc::now(),
    }
}

#[test]
fn clean_workspace() {
    let ws = sample();
    assert!(ws.is_clean());
}

#[test]
fn dirty_workspace_is_not_clean() {
    let mut ws = sample();
    ws.fingerprint.files_changed = 2;
    assert!(ws.fingerprint.is_dirty());
    assert!(!ws.is_clean());
}

#[test]
fn ahead_workspace_is_not_clean() {
    let mut ws = sample();
    ws.fingerprint.ahead = 1;
    assert!(ws.fingerprint.is_ahead());
    assert!(!ws.is_clean());
}

#[test]
fn fingerprint_equality_drives_change_detection() {
    let a = GitFingerprint { files_changed: 1, lines_added: 10, lines_removed: 2, ahead: 0, behind: 0 };
    let b = GitFingerprint { files_changed: 1, lines_added: 10, lines_removed: 2, ahead: 0, behind: 0 };
    assert_eq!(a, b);
    let c = GitFingerprint { behind: 1, ..a };
    assert_ne!(a, c);
}

#[test]
fn serde_round_trip() {
    let ws = sample();
    let json = serde_json::to_string(&ws).unwrap();
    let parsed: Workspace = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ws);
}

#[test]
fn legacy_defaults_false() {
    let json = serde_json::to_value(sample()).unwrap();
    assert_eq!(json["legacy"], false);
    assert_eq!(json["vcs"], "git");
}
