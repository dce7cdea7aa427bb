// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-timeout subprocess execution.
//!
//! Every external command the daemon runs (git, tmux, LLM targets) goes
//! through [`run_with_timeout`] so a wedged child can never block a
//! component indefinitely.

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Timeout for quick git queries (status, rev-parse, check-ignore).
pub const GIT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for git operations that touch the network or write trees
/// (clone, fetch, worktree add, push).
pub const GIT_MUTATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for tmux invocations.
pub const MUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for LLM target invocations.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label} timed out after {timeout:?}")]
    Timeout { label: &'static str, timeout: Duration },
    #[error("{label} failed to start: {source}")]
    Spawn {
        label: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command to completion, killing it on timeout.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &'static str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let fut = async { cmd.output().await.map_err(|source| SubprocessError::Spawn { label, source }) };
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SubprocessError::Timeout { label, timeout }),
    }
}

