// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent signal vocabulary.
//!
//! Agents report state by rewriting a single-line status file:
//! `<state> [<message>]`. The five states are the entire contract between
//! agents and the daemon; anything else is rejected at parse time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// State written by an agent to its status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Completed,
    NeedsInput,
    NeedsTesting,
    Error,
    Working,
}

crate::simple_display! {
    SignalState {
        Completed => "completed",
        NeedsInput => "needs_input",
        NeedsTesting => "needs_testing",
        Error => "error",
        Working => "working",
    }
}

impl SignalState {
    /// Human-readable label shown in nudges and the dashboard.
    pub fn display_name(&self) -> &'static str {
        match self {
            SignalState::Completed => "Completed",
            SignalState::NeedsInput => "Needs Authorization",
            SignalState::NeedsTesting => "Needs Testing",
            SignalState::Error => "Error",
            SignalState::Working => "Working",
        }
    }

    /// `working` clears attention rather than requesting it; it must never
    /// advance the nudge sequence.
    pub fn is_clear(&self) -> bool {
        matches!(self, SignalState::Working)
    }
}

impl FromStr for SignalState {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SignalState::Completed),
            "needs_input" => Ok(SignalState::NeedsInput),
            "needs_testing" => Ok(SignalState::NeedsTesting),
            "error" => Ok(SignalState::Error),
            "working" => Ok(SignalState::Working),
            other => Err(SignalParseError::UnknownState(other.to_string())),
        }
    }
}

/// Errors from parsing a status-file line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalParseError {
    #[error("empty signal")]
    Empty,
    #[error("unknown signal state: {0}")]
    UnknownState(String),
}

/// A parsed signal event, from either the status file or the LLM fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub state: SignalState,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(state: SignalState, message: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self { state, message, timestamp }
    }
}

/// Parse one status-file line: `<state> [<message>]`.
///
/// The message is everything after the first whitespace run, trimmed. An
/// empty or whitespace-only file is `Empty` — the file is created empty at
/// spawn and only becomes a signal once the agent writes to it.
pub fn parse_signal_line(line: &str) -> Result<(SignalState, Option<String>), SignalParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SignalParseError::Empty);
    }
    let (state_str, rest) = match line.split_once(char::is_whitespace) {
        Some((s, r)) => (s, r.trim()),
        None => (line, ""),
    };
    let state = state_str.parse()?;
    let message = if rest.is_empty() { None } else { Some(rest.to_string()) };
    Ok((state, message))
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
