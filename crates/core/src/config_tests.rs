// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::target::TargetKind;

#[test]
fn missing_file_is_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("config.json")).unwrap();
    assert!(config.repos.is_empty());
    assert!(config.targets.is_empty());
    assert_eq!(config.git_poll_interval_ms, 5_000);
    assert_eq!(config.log_max_bytes, 50 * 1024 * 1024);
    assert_eq!(config.http_port, 7337);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "repos": [{"name": "demo", "url": "git@example.com:demo.git"}],
            "targets": {
                "claude": {"kind": "interactive", "command": "claude",
                           "resume_command": "claude --continue",
                           "system_prompt_flag": "--append-system-prompt"},
                "echo-agent": {"kind": "promptable", "command": "sh -c 'echo hi; sleep 3600'"}
            },
            "llm_target": "echo-agent",
            "git_poll_interval_ms": 1000
        }"#,
    )
    .unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.repo("demo").unwrap().url, "git@example.com:demo.git");
    assert_eq!(config.target("claude").unwrap().kind, TargetKind::Interactive);
    assert_eq!(config.target("echo-agent").unwrap().kind, TargetKind::Promptable);
    assert_eq!(config.llm_target.as_deref(), Some("echo-agent"));
    assert_eq!(config.git_poll_interval_ms, 1000);
    // Unspecified fields keep defaults
    assert_eq!(config.terminal_poll_interval_ms, 50);
    assert_eq!(config.lore.instruction_files, vec!["CLAUDE.md", "AGENTS.md"]);
}

#[test]
fn target_table_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"targets": {
            "zz": {"kind": "command", "command": "z"},
            "aa": {"kind": "command", "command": "a"},
            "mm": {"kind": "command", "command": "m"}
        }}"#,
    )
    .unwrap();
    let config = Config::load(&path).unwrap();
    let names: Vec<&str> = config.targets.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["zz", "aa", "mm"]);
}

#[test]
fn secrets_missing_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let secrets = Secrets::load(&dir.path().join("secrets.json")).unwrap();
    assert!(secrets.env_pairs().is_empty());
}

#[test]
fn secrets_env_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.json");
    std::fs::write(&path, r#"{"API_KEY": "abc", "TOKEN": "xyz"}"#).unwrap();
    let secrets = Secrets::load(&path).unwrap();
    assert_eq!(
        secrets.env_pairs(),
        vec![("API_KEY".to_string(), "abc".to_string()), ("TOKEN".to_string(), "xyz".to_string())]
    );
}
