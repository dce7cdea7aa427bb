// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sx_core::SessionId;
use yare::parameterized;

#[test]
fn claim_displaces_previous_holder() {
    let registry = TerminalRegistry::new();
    let session = SessionId::new("s1");

    let (first_id, mut first_rx) = registry.claim(&session);
    let (second_id, mut second_rx) = registry.claim(&session);
    assert_ne!(first_id, second_id);

    // First holder got exactly one displaced signal.
    assert_eq!(first_rx.try_recv().ok(), Some(Takeover::Displaced));
    assert!(first_rx.try_recv().is_err());
    // The new holder got nothing.
    assert!(second_rx.try_recv().is_err());
}

#[test]
fn displaced_connection_cannot_release_displacer() {
    let registry = TerminalRegistry::new();
    let session = SessionId::new("s1");

    let (first_id, _first_rx) = registry.claim(&session);
    let (_second_id, _second_rx) = registry.claim(&session);

    registry.release(&session, first_id);
    // Still claimed by the second connection.
    assert!(registry.has_listener(&session));
}

#[test]
fn release_by_holder_clears_claim() {
    let registry = TerminalRegistry::new();
    let session = SessionId::new("s1");
    let (conn_id, _rx) = registry.claim(&session);
    registry.release(&session, conn_id);
    assert!(!registry.has_listener(&session));
}

#[test]
fn notify_reconnect_reaches_holder_only() {
    let registry = TerminalRegistry::new();
    let session = SessionId::new("s1");
    let other = SessionId::new("s2");

    let (_id, mut rx) = registry.claim(&session);
    registry.notify_reconnect(&other);
    assert!(rx.try_recv().is_err());

    registry.notify_reconnect(&session);
    assert_eq!(rx.try_recv().ok(), Some(Takeover::Reconnect));
}

#[parameterized(
    enter = { "\r", true },
    newline = { "\n", true },
    tab = { "\t", true },
    shift_tab = { "\x1b[Z", true },
    plain_text = { "ls -la", false },
    arrow_key = { "\x1b[A", false },
    empty = { "", false },
)]
fn input_clears_nudge_cases(data: &str, expected: bool) {
    assert_eq!(input_clears_nudge(data), expected);
}

mod tailing {
    use super::*;

    #[test]
    fn read_tail_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (content, pos) = read_tail(&dir.path().join("nope.log"), 1024);
        assert_eq!(content, "");
        assert_eq!(pos, 0);
    }

    #[test]
    fn read_tail_whole_file_when_small() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "line1\nline2\n").unwrap();
        let (content, pos) = read_tail(&path, 1024);
        assert_eq!(content, "line1\nline2\n");
        assert_eq!(pos, 12);
    }

    #[test]
    fn read_tail_trims_to_line_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "aaaa\nbbbb\ncccc\n").unwrap();
        // Trim small enough to cut into "bbbb" — the partial line is dropped.
        let (content, _pos) = read_tail(&path, 7);
        assert_eq!(content, "cccc\n");
    }

    #[test]
    fn read_appended_returns_only_new_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "old").unwrap();

        assert!(read_appended(&path, 3).unwrap().is_none());

        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"new"))
            .unwrap();
        let (content, pos) = read_appended(&path, 3).unwrap().unwrap();
        assert_eq!(content, "new");
        assert_eq!(pos, 6);
    }

    #[test]
    fn read_appended_resets_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "a long log line\n").unwrap();
        std::fs::write(&path, "短\n").unwrap();
        let (content, pos) = read_appended(&path, 16).unwrap().unwrap();
        assert_eq!(content, "");
        assert_eq!(pos, 4);
    }
}
