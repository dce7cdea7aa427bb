// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn-target definitions.
//!
//! A target describes what a session executes: a detected interactive tool
//! (claude, codex, gemini), a user-defined promptable command that takes the
//! prompt as its final argument, or a plain command that takes no prompt.

use serde::{Deserialize, Serialize};

/// How a target consumes a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Interactive tool; prompt (if any) is typed into the pane after a
    /// settle delay.
    Interactive,
    /// Command that receives the prompt as its final positional argument.
    Promptable,
    /// Plain command; forbids a prompt and forces count=1.
    Command,
}

crate::simple_display! {
    TargetKind {
        Interactive => "interactive",
        Promptable => "promptable",
        Command => "command",
    }
}

/// One entry in the config's target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub command: String,
    /// Invocation used when `resume=true` (e.g. `claude --continue`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_command: Option<String>,
    /// CLI flag that accepts a system-prompt file (e.g.
    /// `--append-system-prompt`). When set, the daemon passes its signaling
    /// instructions via this flag instead of editing workspace instruction
    /// files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_flag: Option<String>,
    /// Per-target override of the prompt settle delay, milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_ms: Option<u64>,
}

impl Target {
    pub fn interactive(command: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Interactive,
            command: command.into(),
            resume_command: None,
            system_prompt_flag: None,
            settle_ms: None,
        }
    }

    pub fn promptable(command: impl Into<String>) -> Self {
        Self { kind: TargetKind::Promptable, ..Self::interactive(command) }
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self { kind: TargetKind::Command, ..Self::interactive(command) }
    }

    /// Whether a spawn of this target may carry a prompt.
    pub fn accepts_prompt(&self) -> bool {
        !matches!(self.kind, TargetKind::Command)
    }

    /// Whether a spawn of this target must carry a prompt.
    pub fn requires_prompt(&self) -> bool {
        matches!(self.kind, TargetKind::Promptable)
    }

    /// Command targets run exactly one session per spawn.
    pub fn max_count(&self) -> Option<u32> {
        match self.kind {
            TargetKind::Command => Some(1),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
