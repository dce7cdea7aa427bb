// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM invocation for NudgeNik and the lore curator.
//!
//! schmux has no API client of its own: the "LLM" is one of the configured
//! promptable targets (typically the same claude binary the sessions run),
//! invoked non-interactively with the prompt as the final argument. Replies
//! are expected to be JSON; extraction tolerates surrounding prose.

use async_trait::async_trait;
use thiserror::Error;

use crate::subprocess::{run_with_timeout, LLM_TIMEOUT};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no llm target configured")]
    NotConfigured,
    #[error("llm invocation failed: {0}")]
    Invocation(String),
    #[error("llm reply was not valid JSON: {0}")]
    BadReply(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    /// Run one prompt to completion and return raw stdout.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Shells out to a configured promptable command.
pub struct CommandLlmClient {
    /// Full shell command; the prompt is appended as the final argument.
    command: String,
}

impl CommandLlmClient {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl LlmClient for CommandLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        // `"$@"` forwards the prompt without another layer of shell quoting.
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg("_")
            .arg(prompt)
            .stdin(std::process::Stdio::null());

        let output = run_with_timeout(cmd, LLM_TIMEOUT, "llm target")
            .await
            .map_err(|e| LlmError::Invocation(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LlmError::Invocation(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Extract the first JSON object from a reply that may wrap it in prose or a
/// markdown fence.
pub fn extract_json(reply: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    let start = trimmed.find('{').ok_or_else(|| LlmError::BadReply(snippet(trimmed)))?;
    let end = trimmed.rfind('}').ok_or_else(|| LlmError::BadReply(snippet(trimmed)))?;
    if end <= start {
        return Err(LlmError::BadReply(snippet(trimmed)));
    }
    serde_json::from_str(&trimmed[start..=end]).map_err(|_| LlmError::BadReply(snippet(trimmed)))
}

fn snippet(s: &str) -> String {
    sx_core::id::short(s, 120).to_string()
}

// Test support
#[cfg(test)]
pub use fake::FakeLlmClient;

#[cfg(test)]
mod fake {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted LLM double: pops canned replies, records prompts.
    #[derive(Default)]
    pub struct FakeLlmClient {
        pub replies: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeLlmClient {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn push_reply(&self, reply: &str) {
            self.replies.lock().push_back(Ok(reply.to_string()));
        }

        pub fn push_error(&self, message: &str) {
            self.replies.lock().push_back(Err(message.to_string()));
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlmClient {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().push(prompt.to_string());
            match self.replies.lock().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(LlmError::Invocation(message)),
                None => Err(LlmError::Invocation("no scripted reply".to_string())),
            }
        }
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
