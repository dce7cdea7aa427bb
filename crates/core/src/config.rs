// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: `config.json` and `secrets.json`.
//!
//! Both files are read-only for the daemon — edited out-of-band or via the
//! dashboard's config API, which rewrites the file and restarts. A missing
//! `config.json` yields defaults with empty repo and target tables.

use crate::target::Target;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One configured repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub name: String,
    pub url: String,
    /// Overrides remote HEAD detection when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

/// Lore capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoreConfig {
    /// Instruction files the curator may propose edits to, worktree-relative.
    #[serde(default = "default_instruction_files")]
    pub instruction_files: Vec<String>,
    /// Scratchpad entries in a terminal state older than this are pruned.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoreConfig {
    fn default() -> Self {
        Self {
            instruction_files: default_instruction_files(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_instruction_files() -> Vec<String> {
    vec!["CLAUDE.md".to_string(), "AGENTS.md".to_string()]
}

fn default_retention_days() -> u32 {
    30
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent directory for workspace worktrees. Defaults to
    /// `<config-dir>/workspaces` (resolved by the daemon, not here).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,
    pub repos: Vec<RepoConfig>,
    /// Ordered target table; iteration order matters for the dashboard.
    pub targets: IndexMap<String, Target>,
    /// Name of the promptable target used for NudgeNik classification and
    /// lore curation. None disables both LLM paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_target: Option<String>,
    pub lore: LoreConfig,
    pub git_poll_interval_ms: u64,
    pub terminal_poll_interval_ms: u64,
    pub log_max_bytes: u64,
    pub log_trim_bytes: u64,
    pub prompt_settle_ms: u64,
    pub http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            repos: Vec::new(),
            targets: IndexMap::new(),
            llm_target: None,
            lore: LoreConfig::default(),
            git_poll_interval_ms: 5_000,
            terminal_poll_interval_ms: 50,
            log_max_bytes: 50 * 1024 * 1024,
            log_trim_bytes: 1024 * 1024,
            prompt_settle_ms: 1_500,
            http_port: 7337,
        }
    }
}

impl Config {
    /// Load `config.json`; a missing file is defaults, a malformed one an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
        };
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
    }

    pub fn repo(&self, name: &str) -> Option<&RepoConfig> {
        self.repos.iter().find(|r| r.name == name)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }
}

/// Flat key → value map injected into spawned sessions as environment
/// variables. Never serialized into any API response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Secrets(pub IndexMap<String, String>);

impl Secrets {
    /// Load `secrets.json`; a missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
        };
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
    }

    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
