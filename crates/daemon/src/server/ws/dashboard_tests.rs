// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::storage::StateStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use sx_core::{Session, SessionId, SessionStatus, WorkspaceId};
use tokio_util::sync::CancellationToken;

fn store() -> (tempfile::TempDir, Arc<StateStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state.json"));
    (dir, store)
}

fn session(id: &str) -> Session {
    Session {
        id: SessionId::new(id),
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

#[tokio::test]
async fn broadcast_now_reaches_all_connections() {
    let (_dir, store) = store();
    store.insert_session(session("s1"));
    let broadcaster = Broadcaster::new(store);

    let (_id_a, mut rx_a) = broadcaster.register();
    let (_id_b, mut rx_b) = broadcaster.register();
    broadcaster.broadcast_now();

    for rx in [&mut rx_a, &mut rx_b] {
        let frame = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "sessions");
        assert_eq!(json["workspaces"], serde_json::json!([]));
    }
}

#[tokio::test]
async fn unregister_stops_delivery() {
    let (_dir, store) = store();
    let broadcaster = Broadcaster::new(store);

    let (id, mut rx) = broadcaster.register();
    assert_eq!(broadcaster.connection_count(), 1);
    broadcaster.unregister(id);
    assert_eq!(broadcaster.connection_count(), 0);

    broadcaster.broadcast_now();
    // Sender was dropped with unregister — channel closes without a frame.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn debounce_coalesces_bursts() {
    let (_dir, store) = store();
    let broadcaster = Broadcaster::new(store);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&broadcaster).run(cancel.clone()));

    let (_id, mut rx) = broadcaster.register();

    // A burst of mutations while the debounce window is open.
    for _ in 0..10 {
        broadcaster.schedule();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Wait out the window and a little slack.
    tokio::time::sleep(crate::env::broadcast_debounce() * 4).await;

    let mut frames = 0;
    while rx.try_recv().is_ok() {
        frames += 1;
    }
    // Invariant: between 1 and 2 broadcasts for a sub-window burst.
    assert!((1..=2).contains(&frames), "expected 1-2 frames, got {}", frames);

    cancel.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn quiet_period_produces_no_frames() {
    let (_dir, store) = store();
    let broadcaster = Broadcaster::new(store);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&broadcaster).run(cancel.clone()));

    let (_id, mut rx) = broadcaster.register();
    tokio::time::sleep(crate::env::broadcast_debounce() * 3).await;
    assert!(rx.try_recv().is_err());

    cancel.cancel();
    let _ = task.await;
}

#[tokio::test]
async fn send_frame_fans_out_raw_json() {
    let (_dir, store) = store();
    let broadcaster = Broadcaster::new(store);
    let (_id, mut rx) = broadcaster.register();

    broadcaster.send_frame(&serde_json::json!({
        "type": "linear_sync_progress", "step": 1, "total": 3
    }));
    let frame = rx.recv().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(json["type"], "linear_sync_progress");
    assert_eq!(json["step"], 1);
}
