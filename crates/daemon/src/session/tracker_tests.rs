// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::Paths;
use crate::mux::{FakeMux, Multiplexer, MuxCall};
use crate::server::ws::{Broadcaster, TerminalRegistry};
use crate::storage::StateStore;
use chrono::Utc;
use std::sync::Arc;
use sx_core::{Config, Session, SessionId, SessionStatus};

fn fixture() -> (tempfile::TempDir, Arc<StateStore>, Arc<FakeMux>, Arc<TrackerSet>) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path().to_path_buf());
    let store = StateStore::open(dir.path().join("state.json"));
    let broadcaster = Broadcaster::new(Arc::clone(&store));
    let registry = TerminalRegistry::new();
    let mux = FakeMux::new();
    let mut config = Config::default();
    // Tiny limits so rotation is testable.
    config.log_max_bytes = 512;
    config.log_trim_bytes = 128;
    let set = TrackerSet::new(
        paths,
        Arc::new(config),
        Arc::clone(&store),
        mux.clone(),
        registry,
        broadcaster,
    );
    (dir, store, mux, set)
}

async fn spawned_session(mux: &Arc<FakeMux>, store: &Arc<StateStore>, id: &str) -> Session {
    let handle = mux
        .create_window(crate::mux::WindowSpec {
            name: id.to_string(),
            cwd: std::path::PathBuf::from("/tmp"),
            command: "sleep 3600".to_string(),
            env: vec![],
        })
        .await
        .unwrap();
    let session = Session {
        id: SessionId::new(id),
        target: "claude".to_string(),
        nickname: None,
        workspace_id: sx_core::WorkspaceId::new("demo-001"),
        window_id: handle.window_id,
        pane_id: handle.pane_id,
        created_at: Utc::now(),
        last_output_at: Utc::now(),
        last_signal_at: None,
        nudge: None,
        nudge_seq: 0,
        status: SessionStatus::Running,
        remote_host_id: None,
    };
    store.insert_session(session.clone());
    session
}

#[tokio::test]
async fn attach_pipes_pane_to_log() {
    let (_dir, store, mux, set) = fixture();
    let session = spawned_session(&mux, &store, "s1").await;

    set.attach(&session).await;
    assert_eq!(set.tracked_count(), 1);

    let piped = mux.calls.lock().iter().any(|c| {
        matches!(c, MuxCall::PipePane { pane, command: Some(cmd) }
            if pane == &session.pane_id && cmd.contains("s1.log"))
    });
    assert!(piped, "expected a pipe-pane call targeting the session log");

    set.stop(&session.id).await;
    assert_eq!(set.tracked_count(), 0);
}

#[tokio::test]
async fn window_gone_marks_session_done() {
    let (_dir, store, mux, set) = fixture();
    let session = spawned_session(&mux, &store, "s1").await;
    set.attach(&session).await;

    mux.drop_window(&session.window_id);

    // Liveness check fires within a second.
    for _ in 0..40 {
        if store.session(&session.id).map(|s| s.status == SessionStatus::Done).unwrap_or(false) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert_eq!(store.session(&session.id).unwrap().status, SessionStatus::Done);
}

#[tokio::test]
async fn attach_is_idempotent() {
    let (_dir, store, mux, set) = fixture();
    let session = spawned_session(&mux, &store, "s1").await;
    set.attach(&session).await;
    set.attach(&session).await;
    assert_eq!(set.tracked_count(), 1);
    set.stop(&session.id).await;
}

mod rotation {
    use super::*;

    #[test]
    fn rotate_keeps_tail_on_line_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let mut content = String::new();
        for i in 0..100 {
            content.push_str(&format!("line number {:04}\n", i));
        }
        std::fs::write(&path, &content).unwrap();

        let new_size = rotate_log(&path, 128).unwrap();
        let kept = std::fs::read_to_string(&path).unwrap();
        assert_eq!(kept.len() as u64, new_size);
        assert!(new_size <= 128);
        // Starts at a complete line after the trim.
        assert!(kept.starts_with("line number "));
        assert!(kept.ends_with("line number 0099\n"));
    }

    #[test]
    fn rotate_small_file_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "short\n").unwrap();
        let new_size = rotate_log(&path, 1024).unwrap();
        assert_eq!(new_size, 6);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short\n");
    }

    #[test]
    fn rotate_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "0123456789\nabcdefghij\n").unwrap();
        rotate_log(&path, 5).unwrap();
        assert!(!dir.path().join("s.log.tmp").exists());
    }
}

mod quoting {
    use super::*;

    #[test]
    fn plain_path() {
        assert_eq!(shell_quote("/tmp/s1.log"), "'/tmp/s1.log'");
    }

    #[test]
    fn path_with_single_quote() {
        assert_eq!(shell_quote("it's.log"), "'it'\\''s.log'");
    }
}
