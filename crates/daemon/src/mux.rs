// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer adapter.
//!
//! All sessions live as windows of one tmux server session named `schmux`.
//! The trait keeps the session manager and trackers testable without a tmux
//! binary; any remote transport must satisfy the same contract (produce
//! window/pane ids, accept send-keys, support pipe-pane into a log).

use async_trait::async_trait;
use thiserror::Error;

use crate::subprocess::{run_with_timeout, MUX_TIMEOUT};

/// Name of the tmux session owning all schmux windows.
pub const TMUX_SESSION: &str = "schmux";

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("multiplexer unavailable: {0}")]
    Unavailable(String),
    #[error("window not found: {0}")]
    WindowNotFound(String),
    #[error("multiplexer command failed: {0}")]
    CommandFailed(String),
}

/// Handle to a created window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    /// Window identifier (tmux `@N`).
    pub window_id: String,
    /// Pane identifier (tmux `%N`).
    pub pane_id: String,
}

/// Request to create a new window.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    /// Window name shown in the tmux status line.
    pub name: String,
    /// Working directory for the command.
    pub cwd: std::path::PathBuf,
    /// Shell command to run in the pane.
    pub command: String,
    /// Environment variables set for the pane.
    pub env: Vec<(String, String)>,
}

#[async_trait]
pub trait Multiplexer: Send + Sync + 'static {
    /// Create a detached window running `spec.command` and return its ids.
    async fn create_window(&self, spec: WindowSpec) -> Result<WindowHandle, MuxError>;

    /// Whether the window still exists.
    async fn window_exists(&self, window_id: &str) -> bool;

    /// Kill a window. Missing windows are not an error.
    async fn kill_window(&self, window_id: &str) -> Result<(), MuxError>;

    /// Type literal text into a pane (no trailing newline).
    async fn send_text(&self, pane_id: &str, text: &str) -> Result<(), MuxError>;

    /// Send a named key (Enter, Tab, BTab, Escape, ...) to a pane.
    async fn send_key(&self, pane_id: &str, key: &str) -> Result<(), MuxError>;

    /// Capture the last `lines` lines of visible pane output.
    async fn capture_pane(&self, pane_id: &str, lines: u32) -> Result<String, MuxError>;

    /// Start or stop teeing pane output. `Some(shell_cmd)` starts the pipe,
    /// `None` cancels it.
    async fn pipe_pane(&self, pane_id: &str, command: Option<&str>) -> Result<(), MuxError>;

    /// Resize a pane.
    async fn resize_pane(&self, pane_id: &str, cols: u16, rows: u16) -> Result<(), MuxError>;
}

/// Real tmux implementation.
pub struct TmuxMux;

impl TmuxMux {
    async fn run(&self, args: &[&str], label: &'static str) -> Result<std::process::Output, MuxError> {
        let mut cmd = tokio::process::Command::new("tmux");
        cmd.args(args);
        run_with_timeout(cmd, MUX_TIMEOUT, label)
            .await
            .map_err(|e| MuxError::Unavailable(e.to_string()))
    }

    /// Ensure the `schmux` tmux session exists (idempotent).
    async fn ensure_session(&self) -> Result<(), MuxError> {
        let output = self.run(&["has-session", "-t", TMUX_SESSION], "tmux has-session").await?;
        if output.status.success() {
            return Ok(());
        }
        let output = self
            .run(&["new-session", "-d", "-s", TMUX_SESSION], "tmux new-session")
            .await?;
        if output.status.success() {
            return Ok(());
        }
        // Lost the race with another creator — fine as long as it exists now.
        let output = self.run(&["has-session", "-t", TMUX_SESSION], "tmux has-session").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MuxError::CommandFailed("failed to create tmux session".to_string()))
        }
    }
}

#[async_trait]
impl Multiplexer for TmuxMux {
    async fn create_window(&self, spec: WindowSpec) -> Result<WindowHandle, MuxError> {
        self.ensure_session().await?;

        let cwd = spec.cwd.display().to_string();
        let mut args: Vec<String> = vec![
            "new-window".into(),
            "-d".into(),
            "-t".into(),
            TMUX_SESSION.into(),
            "-n".into(),
            spec.name.clone(),
            "-c".into(),
            cwd,
            "-P".into(),
            "-F".into(),
            "#{window_id} #{pane_id}".into(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.command.clone());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs, "tmux new-window").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::CommandFailed(format!("new-window: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut parts = stdout.trim().split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(window_id), Some(pane_id)) => Ok(WindowHandle {
                window_id: window_id.to_string(),
                pane_id: pane_id.to_string(),
            }),
            _ => Err(MuxError::CommandFailed(format!(
                "new-window returned unexpected output: {:?}",
                stdout.trim()
            ))),
        }
    }

    async fn window_exists(&self, window_id: &str) -> bool {
        match self.run(&["list-panes", "-t", window_id], "tmux list-panes").await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    async fn kill_window(&self, window_id: &str) -> Result<(), MuxError> {
        // kill-window on a missing window exits non-zero; treat as success.
        let _ = self.run(&["kill-window", "-t", window_id], "tmux kill-window").await?;
        Ok(())
    }

    async fn send_text(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
        let output =
            self.run(&["send-keys", "-t", pane_id, "-l", "--", text], "tmux send-keys").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MuxError::WindowNotFound(pane_id.to_string()))
        }
    }

    async fn send_key(&self, pane_id: &str, key: &str) -> Result<(), MuxError> {
        let output = self.run(&["send-keys", "-t", pane_id, key], "tmux send-keys").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MuxError::WindowNotFound(pane_id.to_string()))
        }
    }

    async fn capture_pane(&self, pane_id: &str, lines: u32) -> Result<String, MuxError> {
        let start = format!("-{}", lines);
        let output = self
            .run(&["capture-pane", "-t", pane_id, "-p", "-S", &start], "tmux capture-pane")
            .await?;
        if !output.status.success() {
            return Err(MuxError::WindowNotFound(pane_id.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn pipe_pane(&self, pane_id: &str, command: Option<&str>) -> Result<(), MuxError> {
        let output = match command {
            Some(cmd) => self.run(&["pipe-pane", "-t", pane_id, cmd], "tmux pipe-pane").await?,
            None => self.run(&["pipe-pane", "-t", pane_id], "tmux pipe-pane").await?,
        };
        if output.status.success() {
            Ok(())
        } else {
            Err(MuxError::WindowNotFound(pane_id.to_string()))
        }
    }

    async fn resize_pane(&self, pane_id: &str, cols: u16, rows: u16) -> Result<(), MuxError> {
        let cols = cols.to_string();
        let rows = rows.to_string();
        let output = self
            .run(&["resize-pane", "-t", pane_id, "-x", &cols, "-y", &rows], "tmux resize-pane")
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MuxError::WindowNotFound(pane_id.to_string()))
        }
    }
}

// Test support
#[cfg(test)]
pub use fake::{FakeMux, MuxCall};

#[cfg(test)]
mod fake {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Recorded multiplexer calls, for assertions.
    #[derive(Debug, Clone, PartialEq)]
    pub enum MuxCall {
        CreateWindow { name: String, command: String, env: Vec<(String, String)> },
        KillWindow(String),
        SendText { pane: String, text: String },
        SendKey { pane: String, key: String },
        PipePane { pane: String, command: Option<String> },
    }

    /// In-memory multiplexer double.
    #[derive(Default)]
    pub struct FakeMux {
        next_id: AtomicU32,
        pub calls: Mutex<Vec<MuxCall>>,
        pub live_windows: Mutex<HashSet<String>>,
        pub captured: Mutex<String>,
    }

    impl FakeMux {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn set_capture(&self, content: &str) {
            *self.captured.lock() = content.to_string();
        }

        pub fn drop_window(&self, window_id: &str) {
            self.live_windows.lock().remove(window_id);
        }
    }

    #[async_trait]
    impl Multiplexer for FakeMux {
        async fn create_window(&self, spec: WindowSpec) -> Result<WindowHandle, MuxError> {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let handle =
                WindowHandle { window_id: format!("@{}", n), pane_id: format!("%{}", n) };
            self.live_windows.lock().insert(handle.window_id.clone());
            self.calls.lock().push(MuxCall::CreateWindow {
                name: spec.name,
                command: spec.command,
                env: spec.env,
            });
            Ok(handle)
        }

        async fn window_exists(&self, window_id: &str) -> bool {
            self.live_windows.lock().contains(window_id)
        }

        async fn kill_window(&self, window_id: &str) -> Result<(), MuxError> {
            self.live_windows.lock().remove(window_id);
            self.calls.lock().push(MuxCall::KillWindow(window_id.to_string()));
            Ok(())
        }

        async fn send_text(&self, pane_id: &str, text: &str) -> Result<(), MuxError> {
            self.calls
                .lock()
                .push(MuxCall::SendText { pane: pane_id.to_string(), text: text.to_string() });
            Ok(())
        }

        async fn send_key(&self, pane_id: &str, key: &str) -> Result<(), MuxError> {
            self.calls
                .lock()
                .push(MuxCall::SendKey { pane: pane_id.to_string(), key: key.to_string() });
            Ok(())
        }

        async fn capture_pane(&self, _pane_id: &str, _lines: u32) -> Result<String, MuxError> {
            Ok(self.captured.lock().clone())
        }

        async fn pipe_pane(&self, pane_id: &str, command: Option<&str>) -> Result<(), MuxError> {
            self.calls.lock().push(MuxCall::PipePane {
                pane: pane_id.to_string(),
                command: command.map(str::to_string),
            });
            Ok(())
        }

        async fn resize_pane(&self, _pane_id: &str, _cols: u16, _rows: u16) -> Result<(), MuxError> {
            Ok(())
        }
    }
}
