// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: paths, locking, startup, shutdown.

mod startup;
pub use startup::{startup, Daemon};

use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;

use sx_core::SessionId;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine config directory (no home dir; set SCHMUX_DIR)")]
    NoConfigDir,
    #[error("another daemon holds the lock at {0}")]
    AlreadyRunning(PathBuf),
    #[error("IO error during {0}: {1}")]
    Io(&'static str, std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] sx_core::ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// All on-disk locations the daemon owns, derived from the config dir.
///
/// The layout is part of the external contract (agents and users read these
/// paths), so everything is derived in one place.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Resolve from the environment (`SCHMUX_DIR` > `~/.schmux`).
    pub fn resolve() -> Result<Self, LifecycleError> {
        Ok(Self::new(crate::env::config_dir()?))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.config_dir.join("secrets.json")
    }

    pub fn state_file(&self) -> PathBuf {
        self.config_dir.join("state.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.config_dir.join("daemon.pid")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.config_dir.join("daemon.log")
    }

    /// Shared bare clones: `repos/<repo>.git`.
    pub fn bare_repo(&self, repo: &str) -> PathBuf {
        self.config_dir.join("repos").join(format!("{}.git", repo))
    }

    /// Per-repo overlay source tree.
    pub fn overlay_dir(&self, repo: &str) -> PathBuf {
        self.config_dir.join("overlays").join(repo)
    }

    /// System-prompt file handed to tools with a prompt flag.
    pub fn signaling_file(&self) -> PathBuf {
        self.config_dir.join("signaling.md")
    }

    /// Proposal documents: `lore-proposals/<repo>/<id>.json`.
    pub fn proposal_dir(&self, repo: &str) -> PathBuf {
        self.config_dir.join("lore-proposals").join(repo)
    }

    pub fn proposal_file(&self, repo: &str, id: &str) -> PathBuf {
        self.proposal_dir(repo).join(format!("{}.json", id))
    }

    /// PTY capture log for one session.
    pub fn session_log(&self, session_id: &SessionId) -> PathBuf {
        self.config_dir.join("logs").join(format!("{}.log", session_id))
    }

    /// Default parent directory for workspaces.
    pub fn workspaces_dir(&self) -> PathBuf {
        self.config_dir.join("workspaces")
    }
}

/// Per-workspace paths owned by the daemon.
pub struct WorkspacePaths;

impl WorkspacePaths {
    /// Signal file for a session: `<workspace>/.schmux/signal/<session-id>`.
    pub fn signal_file(workspace: &std::path::Path, session_id: &SessionId) -> PathBuf {
        workspace.join(".schmux").join("signal").join(session_id.as_str())
    }

    pub fn signal_dir(workspace: &std::path::Path) -> PathBuf {
        workspace.join(".schmux").join("signal")
    }

    /// Default scratchpad overlay file.
    pub fn scratchpad(workspace: &std::path::Path) -> PathBuf {
        workspace.join(".claude").join("lore.jsonl")
    }
}

/// Lock guard for single-daemon enforcement; the file lock releases on drop.
pub struct PidLock {
    // Held to maintain the exclusive flock until drop.
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Acquire the pid-file lock, writing our pid into it.
    pub fn acquire(path: PathBuf) -> Result<Self, LifecycleError> {
        use fs2::FileExt;
        use std::io::Write;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LifecycleError::Io("create config dir", e))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LifecycleError::Io("open pid file", e))?;
        file.try_lock_exclusive().map_err(|_| LifecycleError::AlreadyRunning(path.clone()))?;
        file.set_len(0).map_err(|e| LifecycleError::Io("truncate pid file", e))?;
        writeln!(file, "{}", std::process::id())
            .map_err(|e| LifecycleError::Io("write pid file", e))?;
        Ok(Self { file, path })
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// The dev hot-reload source directory, when the daemon was started from one.
/// A workspace serving as the dev source refuses disposal.
pub fn dev_source_dir() -> Option<PathBuf> {
    std::env::var("SCHMUX_DEV_SOURCE").ok().map(PathBuf::from)
}
