// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal engine: status-file watchers and the nudge sink.
//!
//! Source A is a per-session file watcher on
//! `<workspace>/.schmux/signal/<session-id>`; source B is the NudgeNik LLM
//! fallback (`nudgenik` module). Both land on a session's nudge field, but
//! only direct non-working agent signals advance `nudge_seq` — that counter
//! drives the frontend's notification dedup, and LLM guesses must never
//! ring the bell.

pub mod nudgenik;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use notify::Watcher;

use sx_core::{parse_signal_line, Nudge, SessionId, SignalState};

use crate::server::ws::Broadcaster;
use crate::storage::StateStore;

struct WatchEntry {
    // Held so the watcher thread stays alive until unwatch.
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    path: PathBuf,
    last_content: String,
}

pub struct SignalEngine {
    store: Arc<StateStore>,
    broadcaster: Arc<Broadcaster>,
    watchers: Mutex<HashMap<SessionId, WatchEntry>>,
    event_tx: mpsc::UnboundedSender<SessionId>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionId>>>,
    /// Set once the pump task is running; trackers refuse to start before it.
    running: AtomicBool,
}

impl SignalEngine {
    pub fn new(store: Arc<StateStore>, broadcaster: Arc<Broadcaster>) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            store,
            broadcaster,
            watchers: Mutex::new(HashMap::new()),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            running: AtomicBool::new(false),
        })
    }

    /// Whether the event pump is live. Session trackers assert this before
    /// starting: a watcher without a pump would silently drop signals.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pump watcher events until cancelled. Must be spawned before any
    /// session is spawned or re-attached.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut rx = match self.event_rx.lock().take() {
            Some(rx) => rx,
            None => {
                tracing::error!("signal engine started twice; refusing");
                return;
            }
        };
        self.running.store(true, Ordering::SeqCst);
        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(session_id) => self.process_file_change(&session_id),
                        None => return,
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// Watch a session's signal file. Idempotent per session.
    pub fn watch_session(&self, session_id: &SessionId, signal_file: &Path) {
        let tx = self.event_tx.clone();
        let id = session_id.clone();
        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = tx.send(id.clone());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(session = %id, error = %e, "signal watcher error"),
            }
        });

        let mut watcher = match watcher {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(session = %session_id, error = %e, "failed to create signal watcher");
                return;
            }
        };
        if let Err(e) = watcher.watch(signal_file, notify::RecursiveMode::NonRecursive) {
            tracing::error!(
                session = %session_id,
                path = %signal_file.display(),
                error = %e,
                "failed to watch signal file"
            );
            return;
        }

        self.watchers.lock().insert(
            session_id.clone(),
            WatchEntry {
                watcher,
                path: signal_file.to_path_buf(),
                last_content: String::new(),
            },
        );
    }

    /// Stop watching (session disposal).
    pub fn unwatch_session(&self, session_id: &SessionId) {
        self.watchers.lock().remove(session_id);
    }

    /// Read, dedup, parse, and deliver one file change.
    fn process_file_change(&self, session_id: &SessionId) {
        let (content, changed) = {
            let mut watchers = self.watchers.lock();
            let Some(entry) = watchers.get_mut(session_id) else { return };
            let content = std::fs::read_to_string(&entry.path).unwrap_or_default();
            let changed = content != entry.last_content;
            if changed {
                entry.last_content = content.clone();
            }
            (content, changed)
        };
        // Identical content twice produces exactly one signal event.
        if !changed {
            return;
        }

        match parse_signal_line(&content) {
            Ok((state, message)) => self.handle_agent_signal(session_id, state, message),
            Err(sx_core::SignalParseError::Empty) => {}
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "rejected signal");
            }
        }
    }

    /// The sink for direct agent signals.
    ///
    /// `working` clears the nudge without touching `nudge_seq`; every other
    /// state stores a nudge, advances the sequence, and broadcasts
    /// immediately (bypassing the dashboard debounce).
    pub fn handle_agent_signal(
        &self,
        session_id: &SessionId,
        state: SignalState,
        message: Option<String>,
    ) {
        let display = state.display_name();
        if state.is_clear() {
            self.store.clear_session_nudge(session_id);
        } else {
            let summary = message.unwrap_or_else(|| display.to_string());
            if !self.store.update_session_nudge(session_id, Nudge::from_agent(display, summary)) {
                tracing::warn!(session = %session_id, "signal for unknown session");
                return;
            }
            self.store.increment_nudge_seq(session_id);
        }
        self.store.update_session_last_signal(session_id, chrono::Utc::now());
        self.broadcaster.broadcast_now();
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
