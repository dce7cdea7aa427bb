// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NudgeNik: LLM fallback classification for silent sessions.
//!
//! Agents are supposed to keep their status file current, but some go quiet
//! mid-prompt. A background scheduler finds running sessions with no nudge,
//! no recent signal, and stalled-but-not-dead output, captures the latest
//! terminal turn, and asks an LLM what state the agent is in. Results land
//! on the nudge field with `source: "llm"` and never advance `nudge_seq`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use sx_core::{Clock, Nudge, Session, SessionId, SignalState};

use crate::llm::{extract_json, LlmClient};
use crate::mux::Multiplexer;
use crate::server::ws::Broadcaster;
use crate::storage::StateStore;

/// No classification while a signal is fresher than this.
const SIGNAL_QUIET: Duration = Duration::from_secs(5 * 60);
/// Output must have stalled at least this long.
const OUTPUT_STALL_MIN: Duration = Duration::from_secs(15);
/// ...but a session silent longer than this is just idle, not stuck.
const OUTPUT_RECENT_MAX: Duration = Duration::from_secs(30 * 60);
/// Per-session floor between classification attempts.
const RATE_LIMIT: Duration = Duration::from_secs(5 * 60);
/// Terminal lines captured for the classifier.
const CAPTURE_LINES: u32 = 100;

pub struct NudgeNik<C: Clock> {
    store: Arc<StateStore>,
    mux: Arc<dyn Multiplexer>,
    llm: Arc<dyn LlmClient>,
    broadcaster: Arc<Broadcaster>,
    clock: C,
    last_attempt: Mutex<HashMap<SessionId, Instant>>,
}

impl<C: Clock> NudgeNik<C> {
    pub fn new(
        store: Arc<StateStore>,
        mux: Arc<dyn Multiplexer>,
        llm: Arc<dyn LlmClient>,
        broadcaster: Arc<Broadcaster>,
        clock: C,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            mux,
            llm,
            broadcaster,
            clock,
            last_attempt: Mutex::new(HashMap::new()),
        })
    }

    /// Scheduler loop: first run after the startup delay, then fixed ticks.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(crate::env::nudgenik_startup_delay()) => {}
            _ = cancel.cancelled() => return,
        }
        loop {
            self.sweep().await;
            tokio::select! {
                _ = tokio::time::sleep(crate::env::nudgenik_interval()) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// One pass over all sessions.
    pub async fn sweep(&self) {
        let now_utc = self.clock.now_utc();
        for session in self.store.sessions() {
            if !eligible(&session, now_utc) {
                continue;
            }
            if self.rate_limited(&session.id) {
                continue;
            }
            self.classify(&session).await;
        }
    }

    fn rate_limited(&self, id: &SessionId) -> bool {
        let now = self.clock.now();
        let mut attempts = self.last_attempt.lock();
        match attempts.get(id) {
            Some(last) if now.duration_since(*last) < RATE_LIMIT => true,
            _ => {
                attempts.insert(id.clone(), now);
                false
            }
        }
    }

    async fn classify(&self, session: &Session) {
        let capture = match self.mux.capture_pane(&session.pane_id, CAPTURE_LINES).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(session = %session.id, error = %e, "capture for classification failed");
                return;
            }
        };
        let turn = latest_turn(&capture);
        if turn.trim().is_empty() {
            return;
        }

        let prompt = classification_prompt(&session.target, turn);
        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(session = %session.id, error = %e, "classifier call failed");
                return;
            }
        };

        match parse_classification(&reply) {
            Some(nudge) => {
                tracing::info!(
                    session = %session.id,
                    state = %nudge.state,
                    confidence = ?nudge.confidence,
                    "llm classification stored"
                );
                // LLM classifications never touch nudge_seq; the dashboard
                // updates on the debounced path.
                if self.store.update_session_nudge(&session.id, nudge) {
                    self.broadcaster.schedule();
                }
            }
            None => {
                tracing::warn!(session = %session.id, "classifier reply discarded");
            }
        }
    }
}

/// Eligibility: running, no nudge, no recent signal, output stalled but not
/// ancient.
pub(crate) fn eligible(session: &Session, now: chrono::DateTime<chrono::Utc>) -> bool {
    if !session.is_running() || session.nudge.is_some() {
        return false;
    }
    if let Some(last_signal) = session.last_signal_at {
        let age = (now - last_signal).to_std().unwrap_or_default();
        if age < SIGNAL_QUIET {
            return false;
        }
    }
    let output_age = (now - session.last_output_at).to_std().unwrap_or_default();
    output_age >= OUTPUT_STALL_MIN && output_age <= OUTPUT_RECENT_MAX
}

/// The latest agent turn: everything after the last blank-run boundary, so
/// the classifier sees the current question or error rather than scrollback.
pub(crate) fn latest_turn(capture: &str) -> &str {
    let trimmed = capture.trim_end();
    match trimmed.rfind("\n\n") {
        Some(idx) => trimmed[idx..].trim_start(),
        None => trimmed,
    }
}

fn classification_prompt(target: &str, turn: &str) -> String {
    format!(
        "You are classifying the state of an interactive coding agent ({target}) \
from its latest terminal output. Reply with JSON only:\n\
{{\"state\": \"completed|needs_input|needs_testing|error|working\", \
\"confidence\": 0.0-1.0, \"evidence\": [\"quoted lines\"], \"summary\": \"one sentence\"}}\n\n\
Terminal output:\n{turn}\n"
    )
}

/// Parse and validate a classifier reply into an LLM-sourced nudge.
///
/// Unknown states and `working` are discarded — a fallback guess must never
/// clear or invent a direct agent signal.
pub(crate) fn parse_classification(reply: &str) -> Option<Nudge> {
    let json = extract_json(reply).ok()?;
    let state: SignalState = json.get("state")?.as_str()?.parse().ok()?;
    if state.is_clear() {
        return None;
    }
    let summary = json.get("summary").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let confidence = json.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let evidence = json
        .get("evidence")
        .and_then(|v| v.as_array())
        .map(|items| {
            items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Some(Nudge::from_llm(state.display_name(), summary, evidence, confidence))
}

#[cfg(test)]
#[path = "nudgenik_tests.rs"]
mod tests;
