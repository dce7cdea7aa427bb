// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::{Path, PathBuf};
use std::process::Command;

fn init_worktree(dir: &Path, gitignore: &str) {
    let run = |args: &[&str]| {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .status()
            .unwrap();
        assert!(status.success());
    };
    run(&["init", "-b", "main"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "test"]);
    std::fs::write(dir.join(".gitignore"), gitignore).unwrap();
    run(&["add", "."]);
    run(&["commit", "-m", "init"]);
}

#[tokio::test]
async fn apply_copies_ignored_paths() {
    let overlay = tempfile::tempdir().unwrap();
    let worktree = tempfile::tempdir().unwrap();
    init_worktree(worktree.path(), ".env\n.claude/\n");

    std::fs::write(overlay.path().join(".env"), "X=1\n").unwrap();
    std::fs::create_dir_all(overlay.path().join(".claude")).unwrap();
    std::fs::write(overlay.path().join(".claude/lore.jsonl"), "{\"a\":1}\n").unwrap();

    let report = apply_overlay(overlay.path(), worktree.path()).await;
    assert_eq!(report.applied, vec![".claude/lore.jsonl", ".env"]);
    assert!(report.warnings.is_empty());
    assert_eq!(std::fs::read_to_string(worktree.path().join(".env")).unwrap(), "X=1\n");
}

#[tokio::test]
async fn apply_skips_unignored_paths() {
    let overlay = tempfile::tempdir().unwrap();
    let worktree = tempfile::tempdir().unwrap();
    init_worktree(worktree.path(), ".env\n");

    std::fs::write(overlay.path().join(".env"), "X=1\n").unwrap();
    std::fs::write(overlay.path().join("README.md"), "shadowed!\n").unwrap();

    let report = apply_overlay(overlay.path(), worktree.path()).await;
    assert_eq!(report.applied, vec![".env"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("README.md"));
    // The unignored file was NOT copied.
    assert!(!worktree.path().join("README.md").exists());
}

#[tokio::test]
async fn apply_overwrites_existing_files() {
    let overlay = tempfile::tempdir().unwrap();
    let worktree = tempfile::tempdir().unwrap();
    init_worktree(worktree.path(), ".env\n");

    std::fs::write(worktree.path().join(".env"), "OLD=1\n").unwrap();
    std::fs::write(overlay.path().join(".env"), "NEW=2\n").unwrap();

    let report = apply_overlay(overlay.path(), worktree.path()).await;
    assert_eq!(report.applied, vec![".env"]);
    assert_eq!(std::fs::read_to_string(worktree.path().join(".env")).unwrap(), "NEW=2\n");
}

#[test]
fn walk_files_recurses_sorted() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
    std::fs::write(dir.path().join("a.txt"), "").unwrap();
    std::fs::write(dir.path().join("b/c/d.txt"), "").unwrap();

    let files = walk_files(dir.path());
    assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b/c/d.txt")]);
}

#[test]
fn walk_files_missing_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(walk_files(&dir.path().join("nope")).is_empty());
}

mod compounding {
    use super::*;

    #[test]
    fn line_union_dedups_preserving_order() {
        let mut merged = vec!["a".to_string(), "b".to_string()];
        let added = line_union(&mut merged, vec!["b".to_string(), "c".to_string(), "a".to_string()]);
        assert!(added);
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn line_union_skips_blank_lines() {
        let mut merged = Vec::new();
        line_union(&mut merged, vec!["".to_string(), "  ".to_string(), "x".to_string()]);
        assert_eq!(merged, vec!["x"]);
    }

    #[test]
    fn line_union_reports_no_growth() {
        let mut merged = vec!["a".to_string()];
        assert!(!line_union(&mut merged, vec!["a".to_string()]));
    }
}
