// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attention-state classification attached to a session.
//!
//! A nudge is derived data: either a direct agent signal or an LLM fallback
//! classification. The paired `nudge_seq` counter on the session is what the
//! frontend keys notification dedup on, and it advances only for direct
//! non-working agent signals.

use serde::{Deserialize, Serialize};

/// Where a nudge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeSource {
    /// Direct status-file signal written by the agent.
    Agent,
    /// Fallback classification of terminal output.
    Llm,
}

crate::simple_display! {
    NudgeSource {
        Agent => "agent",
        Llm => "llm",
    }
}

/// Serialized classification stored on a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nudge {
    /// Display state, e.g. "Completed", "Needs Authorization".
    pub state: String,
    pub summary: String,
    pub source: NudgeSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Nudge {
    /// A nudge from a direct agent signal.
    pub fn from_agent(state: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            summary: summary.into(),
            source: NudgeSource::Agent,
            evidence: Vec::new(),
            confidence: None,
        }
    }

    /// A nudge from the LLM fallback classifier.
    pub fn from_llm(
        state: impl Into<String>,
        summary: impl Into<String>,
        evidence: Vec<String>,
        confidence: f64,
    ) -> Self {
        Self {
            state: state.into(),
            summary: summary.into(),
            source: NudgeSource::Llm,
            evidence,
            confidence: Some(confidence),
        }
    }
}

#[cfg(test)]
#[path = "nudge_tests.rs"]
mod tests;
