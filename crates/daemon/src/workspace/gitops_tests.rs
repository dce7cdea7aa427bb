// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn count_porcelain_counts_entries() {
    let out = " M src/main.rs\n?? new.txt\nA  staged.rs\n";
    assert_eq!(count_porcelain(out), 3);
    assert_eq!(count_porcelain(""), 0);
    assert_eq!(count_porcelain("\n\n"), 0);
}

#[test]
fn sum_numstat_totals() {
    let out = "10\t2\tsrc/main.rs\n3\t0\tREADME.md\n";
    assert_eq!(sum_numstat(out), (13, 2));
}

#[test]
fn sum_numstat_skips_binary() {
    let out = "-\t-\tlogo.png\n5\t1\tsrc/lib.rs\n";
    assert_eq!(sum_numstat(out), (5, 1));
}

#[parameterized(
    both = { "2\t3\n", (3, 2) },
    none = { "0\t0\n", (0, 0) },
    garbage = { "nonsense", (0, 0) },
    empty = { "", (0, 0) },
)]
fn parse_left_right_cases(output: &str, expected: (u32, u32)) {
    assert_eq!(parse_left_right(output), expected);
}

// Integration tests against a real local git repo (no network).
mod with_git {
    use super::*;
    use std::path::Path;
    use std::process::Command;

    fn run(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo(dir: &Path) {
        run(dir, &["init", "-b", "main"]);
        run(dir, &["config", "user.email", "test@example.com"]);
        run(dir, &["config", "user.name", "test"]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        run(dir, &["add", "."]);
        run(dir, &["commit", "-m", "init"]);
    }

    #[tokio::test]
    async fn fingerprint_clean_repo() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        let fp = fingerprint(tmp.path(), "main").await.unwrap();
        assert_eq!(fp, sx_core::GitFingerprint::default());
    }

    #[tokio::test]
    async fn fingerprint_sees_changes() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("README.md"), "hello\nworld\n").unwrap();
        std::fs::write(tmp.path().join("new.txt"), "x\n").unwrap();

        let fp = fingerprint(tmp.path(), "main").await.unwrap();
        assert_eq!(fp.files_changed, 2);
        assert_eq!(fp.lines_added, 1);
        assert_eq!(fp.lines_removed, 0);
    }

    #[tokio::test]
    async fn check_ignored_respects_gitignore() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join(".gitignore"), ".env\n.schmux/\n").unwrap();

        assert!(check_ignored(tmp.path(), ".env").await.unwrap());
        assert!(check_ignored(tmp.path(), ".schmux/signal/s1").await.unwrap());
        assert!(!check_ignored(tmp.path(), "README.md").await.unwrap());
        assert!(!check_ignored(tmp.path(), "unlisted.txt").await.unwrap());
    }

    #[tokio::test]
    async fn branch_exists_checks_local_heads() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        assert!(branch_exists(tmp.path(), "main").await);
        assert!(!branch_exists(tmp.path(), "missing").await);
    }
}
