// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use similar_asserts::assert_eq;

#[test]
fn empty_file_gets_block_only() {
    let out = upsert_marker_block("", "body line\n");
    assert_eq!(out, format!("{}\nbody line\n{}\n", MARKER_BEGIN, MARKER_END));
}

#[test]
fn user_content_is_preserved_around_block() {
    let existing = "# My project\n\nUse tabs.\n";
    let out = upsert_marker_block(existing, "body");
    assert!(out.starts_with("# My project\n\nUse tabs.\n\n"));
    assert!(out.contains(MARKER_BEGIN));
    assert!(out.ends_with(format!("{}\n", MARKER_END).as_str()));
}

#[test]
fn existing_block_is_replaced_in_place() {
    let existing = format!(
        "before\n{}\nold body\n{}\nafter\n",
        MARKER_BEGIN, MARKER_END
    );
    let out = upsert_marker_block(&existing, "new body");
    assert_eq!(out, format!("before\n{}\nnew body\n{}\nafter\n", MARKER_BEGIN, MARKER_END));
}

#[test]
fn upsert_is_idempotent() {
    let once = upsert_marker_block("# Notes\n", "body");
    let twice = upsert_marker_block(&once, "body");
    assert_eq!(once, twice);
}

#[test]
fn malformed_markers_fall_back_to_append() {
    // END before BEGIN: treat as no block and append a fresh one.
    let existing = format!("{}\nstray\n{}\n", MARKER_END, MARKER_BEGIN);
    let out = upsert_marker_block(&existing, "body");
    assert!(out.starts_with(&existing));
    assert_eq!(out.matches(MARKER_BEGIN).count(), 2);
}

#[test]
fn instruction_file_routing() {
    assert_eq!(instruction_file_for("claude"), "CLAUDE.md");
    assert_eq!(instruction_file_for("my-claude-wrapper"), "CLAUDE.md");
    assert_eq!(instruction_file_for("codex"), "AGENTS.md");
    assert_eq!(instruction_file_for("gemini"), "AGENTS.md");
    assert_eq!(instruction_file_for("echo-agent"), "AGENTS.md");
}

#[test]
fn ensure_signaling_file_writes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = ensure_signaling_file(dir.path()).unwrap();
    let first = std::fs::metadata(&path).unwrap().modified().unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, SIGNALING_INSTRUCTIONS);

    // Unchanged content is not rewritten.
    std::thread::sleep(std::time::Duration::from_millis(20));
    ensure_signaling_file(dir.path()).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), first);
}

#[test]
fn ensure_instruction_block_creates_and_updates() {
    let dir = tempfile::tempdir().unwrap();
    ensure_instruction_block(dir.path(), "codex").unwrap();
    let path = dir.path().join("AGENTS.md");
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(MARKER_BEGIN));
    assert!(content.contains("$SCHMUX_STATUS_FILE"));

    // User edits outside the markers survive a re-ensure.
    let edited = format!("user preamble\n\n{}", content);
    std::fs::write(&path, &edited).unwrap();
    ensure_instruction_block(dir.path(), "codex").unwrap();
    let after = std::fs::read_to_string(&path).unwrap();
    assert!(after.starts_with("user preamble\n"));
    assert_eq!(after.matches(MARKER_BEGIN).count(), 1);
}
