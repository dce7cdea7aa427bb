// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: the spawn/dispose lifecycle.
//!
//! A spawn resolves its target, acquires or creates a workspace, creates the
//! session's signal file, composes the environment contract, asks the
//! multiplexer for a window, registers the session, starts its tracker, and
//! finally injects the prompt. Disposal unwinds in the opposite order.

pub mod instructions;
pub mod tracker;

pub use tracker::TrackerSet;

use std::sync::Arc;
use thiserror::Error;

use chrono::Utc;
use sx_core::{
    Config, Secrets, Session, SessionId, SessionStatus, Target, TargetKind, Workspace,
};

use crate::lifecycle::{Paths, WorkspacePaths};
use crate::mux::{Multiplexer, MuxError, WindowSpec};
use crate::protocol::{SpawnRequest, SpawnResult};
use crate::server::ws::Broadcaster;
use crate::signal::SignalEngine;
use crate::storage::StateStore;
use crate::workspace::{WorkspaceError, WorkspaceManager};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("{0}")]
    Validation(String),
    #[error("unknown target: {0}")]
    UnknownTarget(String),
    #[error("nickname already in use: {0}")]
    NicknameTaken(String),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("multiplexer error: {0}")]
    Mux(#[from] MuxError),
    #[error("{0}: {1}")]
    Io(&'static str, String),
    #[error("signal engine is not running")]
    SignalEngineDown,
}

/// Asks the lore service to compound + curate a repo (sent on dispose).
pub type LoreTrigger = tokio::sync::mpsc::UnboundedSender<String>;

pub struct SessionManager {
    paths: Paths,
    config: Arc<Config>,
    secrets: Secrets,
    store: Arc<StateStore>,
    mux: Arc<dyn Multiplexer>,
    workspaces: Arc<WorkspaceManager>,
    signals: Arc<SignalEngine>,
    trackers: Arc<TrackerSet>,
    broadcaster: Arc<Broadcaster>,
    lore_trigger: LoreTrigger,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        paths: Paths,
        config: Arc<Config>,
        secrets: Secrets,
        store: Arc<StateStore>,
        mux: Arc<dyn Multiplexer>,
        workspaces: Arc<WorkspaceManager>,
        signals: Arc<SignalEngine>,
        trackers: Arc<TrackerSet>,
        broadcaster: Arc<Broadcaster>,
        lore_trigger: LoreTrigger,
    ) -> Arc<Self> {
        Arc::new(Self {
            paths,
            config,
            secrets,
            store,
            mux,
            workspaces,
            signals,
            trackers,
            broadcaster,
            lore_trigger,
        })
    }

    /// Spawn one or more sessions per the request. See `validate` for the
    /// request rules.
    pub async fn spawn(&self, req: &SpawnRequest) -> Result<Vec<SpawnResult>, SpawnError> {
        // Trackers would silently drop signals without the engine pump.
        if !self.signals.is_running() {
            tracing::error!("spawn refused: signal engine not running");
            return Err(SpawnError::SignalEngineDown);
        }

        let plan = self.validate(req)?;
        let workspace = self.acquire_workspace(req).await?;

        let mut results = Vec::new();
        for planned in plan {
            let result = self.spawn_one(&workspace, &planned, req).await?;
            results.push(result);
        }
        Ok(results)
    }

    /// Validate the request and produce one planned session per count.
    fn validate(&self, req: &SpawnRequest) -> Result<Vec<PlannedSession>, SpawnError> {
        if req.targets.is_empty() {
            return Err(SpawnError::Validation("at least one target is required".to_string()));
        }
        if req.workspace_id.is_none() {
            let repo_ok = req.repo.as_deref().is_some_and(|r| !r.is_empty());
            let branch_ok = req.branch.as_deref().is_some_and(|b| !b.is_empty());
            if !repo_ok || !branch_ok {
                return Err(SpawnError::Validation(
                    "repo and branch are required without a workspace_id".to_string(),
                ));
            }
        }

        let prompt = req.prompt.as_deref().unwrap_or("");
        if req.resume && !prompt.is_empty() {
            return Err(SpawnError::Validation("resume requires an empty prompt".to_string()));
        }

        let mut planned = Vec::new();
        for (name, count) in &req.targets {
            let target = self
                .config
                .target(name)
                .ok_or_else(|| SpawnError::UnknownTarget(name.clone()))?;

            if target.requires_prompt() && prompt.is_empty() && !req.resume {
                return Err(SpawnError::Validation(format!(
                    "target {} requires a prompt",
                    name
                )));
            }
            if !target.accepts_prompt() && !prompt.is_empty() {
                return Err(SpawnError::Validation(format!(
                    "target {} does not accept a prompt",
                    name
                )));
            }
            if let Some(max) = target.max_count() {
                if *count > max {
                    return Err(SpawnError::Validation(format!(
                        "target {} allows at most {} session(s) per spawn",
                        name, max
                    )));
                }
            }
            for _ in 0..*count {
                planned.push(PlannedSession {
                    target_name: name.clone(),
                    target: target.clone(),
                    nickname: None,
                });
            }
        }

        // Nickname: single spawn keeps the base; fan-out gets " (N)" suffixes.
        if let Some(base) = req.nickname.as_deref().filter(|n| !n.is_empty()) {
            if planned.len() == 1 {
                planned[0].nickname = Some(base.to_string());
            } else {
                for (i, p) in planned.iter_mut().enumerate() {
                    p.nickname = Some(format!("{} ({})", base, i + 1));
                }
            }
            for p in &planned {
                if let Some(nick) = &p.nickname {
                    if self.store.nickname_taken(nick) {
                        return Err(SpawnError::NicknameTaken(nick.clone()));
                    }
                }
            }
        }

        Ok(planned)
    }

    async fn acquire_workspace(&self, req: &SpawnRequest) -> Result<Workspace, SpawnError> {
        match req.workspace_id.as_deref().filter(|w| !w.is_empty()) {
            Some(id) => {
                let id = sx_core::WorkspaceId::new(id);
                self.store
                    .workspace(&id)
                    .ok_or(SpawnError::Workspace(WorkspaceError::NotFound(id)))
            }
            None => {
                // validate() guaranteed repo and branch are present.
                let repo = req.repo.as_deref().unwrap_or_default();
                let branch = req.branch.as_deref().unwrap_or_default();
                Ok(self.workspaces.create(repo, branch).await?)
            }
        }
    }

    async fn spawn_one(
        &self,
        workspace: &Workspace,
        planned: &PlannedSession,
        req: &SpawnRequest,
    ) -> Result<SpawnResult, SpawnError> {
        let session_id = SessionId::generate();
        let prompt = req.prompt.as_deref().unwrap_or("");

        // Signal file precedes the window: the agent may report immediately.
        let signal_file = WorkspacePaths::signal_file(&workspace.path, &session_id);
        if let Some(parent) = signal_file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SpawnError::Io("create signal dir", e.to_string()))?;
        }
        std::fs::write(&signal_file, "")
            .map_err(|e| SpawnError::Io("create signal file", e.to_string()))?;

        let mut env = vec![
            ("SCHMUX_ENABLED".to_string(), "1".to_string()),
            ("SCHMUX_SESSION_ID".to_string(), session_id.to_string()),
            ("SCHMUX_WORKSPACE_ID".to_string(), workspace.id.to_string()),
            (
                "SCHMUX_STATUS_FILE".to_string(),
                signal_file.display().to_string(),
            ),
        ];
        env.extend(self.secrets.env_pairs());

        let command = self.compose_command(&planned.target, &planned.target_name, workspace, prompt, req.resume)?;

        let window_name = planned
            .nickname
            .clone()
            .unwrap_or_else(|| format!("{}-{}", planned.target_name, session_id.token()));

        let handle = self
            .mux
            .create_window(WindowSpec {
                name: window_name,
                cwd: workspace.path.clone(),
                command,
                env,
            })
            .await?;

        let session = Session {
            id: session_id.clone(),
            target: planned.target_name.clone(),
            nickname: planned.nickname.clone(),
            workspace_id: workspace.id.clone(),
            window_id: handle.window_id,
            pane_id: handle.pane_id.clone(),
            created_at: Utc::now(),
            last_output_at: Utc::now(),
            last_signal_at: None,
            nudge: None,
            nudge_seq: 0,
            status: SessionStatus::Running,
            remote_host_id: None,
        };
        self.store.insert_session(session.clone());
        self.broadcaster.schedule();

        self.signals.watch_session(&session_id, &signal_file);
        self.trackers.attach(&session).await;

        // Interactive prompt injection: typed after a settle delay so the
        // tool's own startup does not eat the keystrokes.
        if planned.target.kind == TargetKind::Interactive && !prompt.is_empty() {
            let settle = std::time::Duration::from_millis(
                planned.target.settle_ms.unwrap_or(self.config.prompt_settle_ms),
            );
            let mux = Arc::clone(&self.mux);
            let pane = handle.pane_id;
            let text = prompt.to_string();
            let sid = session_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(settle).await;
                if let Err(e) = mux.send_text(&pane, &text).await {
                    tracing::warn!(session = %sid, error = %e, "prompt injection failed");
                    return;
                }
                let _ = mux.send_key(&pane, "Enter").await;
            });
        }

        tracing::info!(
            session = %session_id,
            workspace = %workspace.id,
            target = %planned.target_name,
            "session spawned"
        );

        Ok(SpawnResult {
            session_id: session_id.to_string(),
            workspace_id: workspace.id.to_string(),
            target: planned.target_name.clone(),
        })
    }

    /// Compose the shell command for a target.
    fn compose_command(
        &self,
        target: &Target,
        target_name: &str,
        workspace: &Workspace,
        prompt: &str,
        resume: bool,
    ) -> Result<String, SpawnError> {
        let mut command = if resume {
            target.resume_command.clone().unwrap_or_else(|| target.command.clone())
        } else {
            target.command.clone()
        };

        match &target.system_prompt_flag {
            Some(flag) => {
                let signaling = instructions::ensure_signaling_file(&self.paths.config_dir)
                    .map_err(|e| SpawnError::Io("write signaling.md", e.to_string()))?;
                command.push_str(&format!(
                    " {} {}",
                    flag,
                    tracker::shell_quote(&signaling.display().to_string())
                ));
            }
            None => {
                instructions::ensure_instruction_block(&workspace.path, target_name)
                    .map_err(|e| SpawnError::Io("write instruction file", e.to_string()))?;
            }
        }

        // Promptable targets take the prompt as the final positional argument.
        if target.kind == TargetKind::Promptable && !prompt.is_empty() {
            command.push(' ');
            command.push_str(&tracker::shell_quote(prompt));
        }

        Ok(command)
    }

    /// Dispose a session: kill the window, stop the tracker, remove the
    /// signal file, drop the record, and kick the lore pipeline.
    pub async fn dispose(&self, id: &SessionId) -> Result<(), SpawnError> {
        let Some(session) = self.store.session(id) else {
            return Err(SpawnError::Validation(format!("session not found: {}", id)));
        };

        let _ = self.mux.pipe_pane(&session.pane_id, None).await;
        if let Err(e) = self.mux.kill_window(&session.window_id).await {
            tracing::warn!(session = %id, error = %e, "kill-window failed (continuing)");
        }
        self.trackers.stop(id).await;
        self.signals.unwatch_session(id);

        if let Some(workspace) = self.store.workspace(&session.workspace_id) {
            let signal_file = WorkspacePaths::signal_file(&workspace.path, id);
            let _ = std::fs::remove_file(signal_file);
            let _ = self.lore_trigger.send(workspace.repo.clone());
        }

        // remove_session persists immediately (leading save on disposal).
        self.store.remove_session(id);
        self.broadcaster.broadcast_now();
        tracing::info!(session = %id, "session disposed");
        Ok(())
    }

    /// Dispose every session in a workspace (the dispose-all path).
    pub async fn dispose_all_in(&self, workspace_id: &sx_core::WorkspaceId) -> Result<(), SpawnError> {
        for session in self.store.sessions_in_workspace(workspace_id) {
            self.dispose(&session.id).await?;
        }
        Ok(())
    }

    /// Set or clear a session nickname (global uniqueness enforced).
    pub fn rename(&self, id: &SessionId, nickname: &str) -> Result<(), SpawnError> {
        if self.store.session(id).is_none() {
            return Err(SpawnError::Validation(format!("session not found: {}", id)));
        }
        let trimmed = nickname.trim();
        if trimmed.is_empty() {
            self.store.set_session_nickname(id, None);
        } else {
            if self.store.nickname_taken(trimmed) {
                return Err(SpawnError::NicknameTaken(trimmed.to_string()));
            }
            self.store.set_session_nickname(id, Some(trimmed.to_string()));
        }
        self.broadcaster.schedule();
        Ok(())
    }
}

struct PlannedSession {
    target_name: String,
    target: Target,
    nickname: Option<String>,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
