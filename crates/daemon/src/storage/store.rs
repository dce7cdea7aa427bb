// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state store: one lock, atomic mutators, debounced saves.
//!
//! Mutators never return errors to callers — a failed save is logged and
//! counted, and in-memory state stays authoritative until the next save
//! succeeds. Reads return deep copies so no caller can observe a torn state.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use sx_core::{Nudge, Session, SessionId, SessionStatus, Workspace, WorkspaceId};

use super::persist::{load_state, write_state};
use super::state::PersistedState;

pub struct StateStore {
    inner: RwLock<PersistedState>,
    path: PathBuf,
    dirty: Notify,
    save_failures: AtomicU64,
}

impl StateStore {
    /// Load (or initialize) state from `path`.
    pub fn open(path: PathBuf) -> Arc<Self> {
        let state = load_state(&path);
        Arc::new(Self {
            inner: RwLock::new(state),
            path,
            dirty: Notify::new(),
            save_failures: AtomicU64::new(0),
        })
    }

    /// Run the debounced saver until cancelled. Trailing debounce: a burst of
    /// `schedule_save` calls collapses into one write `debounce` after the
    /// first.
    pub async fn run_saver(self: Arc<Self>, cancel: CancellationToken) {
        let debounce = crate::env::save_debounce();
        loop {
            tokio::select! {
                _ = self.dirty.notified() => {}
                _ = cancel.cancelled() => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {}
                _ = cancel.cancelled() => {}
            }
            self.save_now();
            if cancel.is_cancelled() {
                break;
            }
        }
        // Final save so shutdown never loses a scheduled write.
        self.save_now();
    }

    /// Queue a debounced save.
    pub fn schedule_save(&self) {
        self.dirty.notify_one();
    }

    /// Write state to disk immediately (disposal and other critical paths).
    pub fn save_now(&self) {
        let snapshot = self.inner.read().clone();
        if let Err(e) = write_state(&self.path, &snapshot) {
            self.save_failures.fetch_add(1, Ordering::Relaxed);
            tracing::error!(path = %self.path.display(), error = %e, "state save failed");
        }
    }

    /// Number of failed saves since startup (health surface).
    pub fn save_failures(&self) -> u64 {
        self.save_failures.load(Ordering::Relaxed)
    }

    // ---- reads (deep copies) ----

    pub fn snapshot(&self) -> PersistedState {
        self.inner.read().clone()
    }

    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.inner.read().sessions.get(id).cloned()
    }

    pub fn workspace(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.inner.read().workspaces.get(id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.inner.read().sessions.values().cloned().collect()
    }

    pub fn workspaces(&self) -> Vec<Workspace> {
        self.inner.read().workspaces.values().cloned().collect()
    }

    pub fn sessions_in_workspace(&self, id: &WorkspaceId) -> Vec<Session> {
        self.inner.read().sessions_in(id).into_iter().cloned().collect()
    }

    pub fn nickname_taken(&self, nickname: &str) -> bool {
        self.inner.read().nickname_taken(nickname)
    }

    pub fn used_suffixes(&self, repo: &str) -> Vec<u32> {
        self.inner.read().used_suffixes(repo)
    }

    pub fn workspace_on_branch(&self, repo: &str, branch: &str) -> Option<Workspace> {
        self.inner.read().workspace_on_branch(repo, branch).cloned()
    }

    // ---- session mutators ----

    pub fn insert_session(&self, session: Session) {
        self.inner.write().sessions.insert(session.id.clone(), session);
        self.schedule_save();
    }

    pub fn remove_session(&self, id: &SessionId) -> Option<Session> {
        let removed = self.inner.write().sessions.remove(id);
        if removed.is_some() {
            self.save_now();
        }
        removed
    }

    /// Store a nudge. Returns false if the session is gone.
    pub fn update_session_nudge(&self, id: &SessionId, nudge: Nudge) -> bool {
        let mut state = self.inner.write();
        match state.sessions.get_mut(id) {
            Some(session) => {
                session.nudge = Some(nudge);
                drop(state);
                self.schedule_save();
                true
            }
            None => false,
        }
    }

    /// Clear the nudge; returns whether one was present.
    pub fn clear_session_nudge(&self, id: &SessionId) -> bool {
        let mut state = self.inner.write();
        match state.sessions.get_mut(id) {
            Some(session) => {
                let cleared = session.nudge.take().is_some();
                drop(state);
                if cleared {
                    self.schedule_save();
                }
                cleared
            }
            None => false,
        }
    }

    /// Advance the nudge sequence; returns the new value.
    ///
    /// Only the direct-agent-signal path may call this — LLM classifications
    /// and user clears must leave the counter untouched.
    pub fn increment_nudge_seq(&self, id: &SessionId) -> Option<u64> {
        let mut state = self.inner.write();
        let session = state.sessions.get_mut(id)?;
        session.nudge_seq += 1;
        let seq = session.nudge_seq;
        drop(state);
        self.schedule_save();
        Some(seq)
    }

    pub fn update_session_last_output(&self, id: &SessionId, at: DateTime<Utc>) {
        let mut state = self.inner.write();
        if let Some(session) = state.sessions.get_mut(id) {
            session.last_output_at = at;
            drop(state);
            self.schedule_save();
        }
    }

    pub fn update_session_last_signal(&self, id: &SessionId, at: DateTime<Utc>) {
        let mut state = self.inner.write();
        if let Some(session) = state.sessions.get_mut(id) {
            session.last_signal_at = Some(at);
            drop(state);
            self.schedule_save();
        }
    }

    /// Transition a session to done. Returns false if already done or gone.
    pub fn mark_session_done(&self, id: &SessionId) -> bool {
        let mut state = self.inner.write();
        match state.sessions.get_mut(id) {
            Some(session) if session.status == SessionStatus::Running => {
                session.status = SessionStatus::Done;
                drop(state);
                self.schedule_save();
                true
            }
            _ => false,
        }
    }

    pub fn set_session_nickname(&self, id: &SessionId, nickname: Option<String>) -> bool {
        let mut state = self.inner.write();
        match state.sessions.get_mut(id) {
            Some(session) => {
                session.nickname = nickname;
                drop(state);
                self.schedule_save();
                true
            }
            None => false,
        }
    }

    // ---- workspace mutators ----

    pub fn add_workspace(&self, workspace: Workspace) {
        self.inner.write().workspaces.insert(workspace.id.clone(), workspace);
        self.schedule_save();
    }

    pub fn remove_workspace(&self, id: &WorkspaceId) -> Option<Workspace> {
        let removed = self.inner.write().workspaces.remove(id);
        if removed.is_some() {
            self.save_now();
        }
        removed
    }

    /// Replace the fingerprint; returns true when it changed.
    pub fn update_workspace_fingerprint(
        &self,
        id: &WorkspaceId,
        fingerprint: sx_core::GitFingerprint,
    ) -> bool {
        let mut state = self.inner.write();
        match state.workspaces.get_mut(id) {
            Some(ws) if ws.fingerprint != fingerprint => {
                ws.fingerprint = fingerprint;
                ws.commits_synced_with_remote = fingerprint.ahead == 0 && fingerprint.behind == 0;
                drop(state);
                self.schedule_save();
                true
            }
            _ => false,
        }
    }

    pub fn set_workspace_conflict(&self, id: &WorkspaceId, branch: Option<String>) {
        let mut state = self.inner.write();
        if let Some(ws) = state.workspaces.get_mut(id) {
            ws.conflict_on_branch = branch;
            drop(state);
            self.schedule_save();
        }
    }

    pub fn set_workspace_branch(&self, id: &WorkspaceId, branch: String) {
        let mut state = self.inner.write();
        if let Some(ws) = state.workspaces.get_mut(id) {
            ws.branch = branch;
            drop(state);
            self.schedule_save();
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
