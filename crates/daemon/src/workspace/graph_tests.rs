// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn line(sha: &str, parents: &str, subject: &str) -> String {
    format!("{sha}\u{1f}{parents}\u{1f}alice\u{1f}2026-01-02T03:04:05+00:00\u{1f}{subject}")
}

#[test]
fn parse_log_basic() {
    let out = [line("aaa", "bbb", "second"), line("bbb", "", "first")].join("\n");
    let nodes = parse_log(&out, &HashSet::new());
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].sha, "aaa");
    assert_eq!(nodes[0].parents, vec!["bbb"]);
    assert_eq!(nodes[0].subject, "second");
    assert!(nodes[1].parents.is_empty());
}

#[test]
fn parse_log_merge_commit_has_two_parents() {
    let out = line("mmm", "aaa bbb", "merge");
    let nodes = parse_log(&out, &HashSet::new());
    assert_eq!(nodes[0].parents, vec!["aaa", "bbb"]);
}

#[test]
fn parse_log_marks_main_membership() {
    let mut main = HashSet::new();
    main.insert("bbb".to_string());
    let out = [line("aaa", "bbb", "feat"), line("bbb", "", "init")].join("\n");
    let nodes = parse_log(&out, &main);
    assert!(!nodes[0].on_main);
    assert!(nodes[1].on_main);
}

#[test]
fn parse_log_subject_may_contain_separator_lookalikes() {
    // Tabs and pipes in subjects must not break field splitting.
    let out = line("ccc", "", "fix: a | b\tc");
    let nodes = parse_log(&out, &HashSet::new());
    assert_eq!(nodes[0].subject, "fix: a | b\tc");
}

#[test]
fn parse_log_skips_blank_lines() {
    let out = format!("\n{}\n\n", line("aaa", "", "only"));
    let nodes = parse_log(&out, &HashSet::new());
    assert_eq!(nodes.len(), 1);
}

#[test]
fn default_options() {
    let opts = GraphOptions::default();
    assert_eq!(opts.max_total, 50);
    assert_eq!(opts.main_context, 5);
}
