// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use indexmap::IndexMap;
use sx_core::ProposalId;

fn proposal(id: &str, repo: &str) -> Proposal {
    let mut proposed_files = IndexMap::new();
    proposed_files.insert("CLAUDE.md".to_string(), "# Instructions\n".to_string());
    let mut file_hashes = IndexMap::new();
    file_hashes.insert("CLAUDE.md".to_string(), content_hash("old content"));
    Proposal {
        id: ProposalId::new(id),
        repo: repo.to_string(),
        status: ProposalStatus::Pending,
        created_at: Utc::now(),
        proposed_files,
        file_hashes,
        diff_summary: "adds build instructions".to_string(),
        entries_used: vec![Utc::now()],
        entries_discarded: IndexMap::new(),
    }
}

#[test]
fn store_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let paths = crate::lifecycle::Paths::new(dir.path().to_path_buf());
    let p = proposal("100-abc", "demo");
    p.store(&paths).unwrap();

    let loaded = Proposal::load(&paths, "demo", "100-abc").unwrap();
    assert_eq!(loaded, p);
    assert!(Proposal::load(&paths, "demo", "missing").is_none());
}

#[test]
fn list_orders_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let paths = crate::lifecycle::Paths::new(dir.path().to_path_buf());
    proposal("100-aaa", "demo").store(&paths).unwrap();
    proposal("300-ccc", "demo").store(&paths).unwrap();
    proposal("200-bbb", "demo").store(&paths).unwrap();

    let ids: Vec<String> =
        Proposal::list(&paths, "demo").into_iter().map(|p| p.id.to_string()).collect();
    assert_eq!(ids, vec!["300-ccc", "200-bbb", "100-aaa"]);
    assert!(Proposal::list(&paths, "other").is_empty());
}

#[test]
fn content_hash_is_stable_sha256() {
    // sha256("") is a well-known constant.
    assert_eq!(
        content_hash(""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(content_hash("a"), content_hash("a"));
    assert_ne!(content_hash("a"), content_hash("b"));
}

#[test]
fn hashes_match_detects_single_byte_change() {
    let mut recorded = IndexMap::new();
    recorded.insert("CLAUDE.md".to_string(), content_hash("version one"));

    let mut current = IndexMap::new();
    current.insert("CLAUDE.md".to_string(), "version one".to_string());
    assert!(hashes_match(&recorded, &current));

    current.insert("CLAUDE.md".to_string(), "version one!".to_string());
    assert!(!hashes_match(&recorded, &current));
}

#[test]
fn hashes_match_requires_all_paths_present() {
    let mut recorded = IndexMap::new();
    recorded.insert("CLAUDE.md".to_string(), content_hash("x"));
    let current = IndexMap::new();
    assert!(!hashes_match(&recorded, &current));
}
