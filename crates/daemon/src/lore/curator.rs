// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The curator: raw scratchpad entries → reviewable proposal → pushed branch.
//!
//! Instruction files are read out of the repo's bare clone, so curation
//! never needs an active worktree. The apply path re-hashes them first: any
//! out-of-band edit between curation and apply marks the proposal stale and
//! leaves the repo untouched.

use chrono::Utc;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use sx_core::{Clock, Config, ProposalId, SystemClock};

use crate::lifecycle::Paths;
use crate::llm::{extract_json, LlmClient, LlmError};
use crate::subprocess::{run_with_timeout, GIT_MUTATE_TIMEOUT, GIT_QUERY_TIMEOUT};

use super::proposal::{content_hash, hashes_match, Proposal, ProposalStatus};
use super::scratchpad::{self, EntryState, ScratchpadEntry};

#[derive(Debug, Error)]
pub enum LoreError {
    #[error("no llm target configured")]
    NoLlm,
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("proposal not found: {0}")]
    NotFound(String),
    #[error("proposal is {0}; only pending proposals can be applied")]
    NotPending(ProposalStatus),
    #[error("instruction files changed since curation; proposal marked stale")]
    Stale,
    #[error("curator reply missing {0}")]
    BadReply(&'static str),
    #[error("git {label}: {detail}")]
    Git { label: &'static str, detail: String },
    #[error("{0}: {1}")]
    Io(&'static str, String),
}

pub struct Curator {
    paths: Paths,
    config: Arc<Config>,
    llm: Option<Arc<dyn LlmClient>>,
    clock: SystemClock,
}

impl Curator {
    pub fn new(paths: Paths, config: Arc<Config>, llm: Option<Arc<dyn LlmClient>>) -> Arc<Self> {
        Arc::new(Self { paths, config, llm, clock: SystemClock })
    }

    fn scratchpad_path(&self, repo: &str) -> std::path::PathBuf {
        self.paths.overlay_dir(repo).join(".claude").join("lore.jsonl")
    }

    /// Run one curation pass for a repo. `Ok(None)` when there is nothing
    /// raw to curate.
    pub async fn curate(&self, repo: &str) -> Result<Option<Proposal>, LoreError> {
        let llm = self.llm.as_ref().ok_or(LoreError::NoLlm)?;

        let scratchpad_path = self.scratchpad_path(repo);
        let entries = scratchpad::raw_entries(&scratchpad_path);
        if entries.is_empty() {
            return Ok(None);
        }

        let files = self.read_instruction_files(repo).await?;
        let prompt = curation_prompt(&entries, &files, &self.config.lore.instruction_files);
        let reply = llm.complete(&prompt).await?;
        let parsed = parse_curation_reply(&reply, &entries)?;

        let mut file_hashes = IndexMap::new();
        for path in parsed.proposed_files.keys() {
            let current = files.get(path).map(String::as_str).unwrap_or("");
            file_hashes.insert(path.clone(), content_hash(current));
        }

        let now = self.clock.now_utc();
        let proposal = Proposal {
            id: ProposalId::generate(self.clock.epoch_ms()),
            repo: repo.to_string(),
            status: ProposalStatus::Pending,
            created_at: now,
            proposed_files: parsed.proposed_files,
            file_hashes,
            diff_summary: parsed.diff_summary,
            entries_used: parsed.entries_used.clone(),
            entries_discarded: parsed.entries_discarded,
        };
        proposal.store(&self.paths).map_err(|e| LoreError::Io("store proposal", e.to_string()))?;

        scratchpad::append_state_changes(
            &scratchpad_path,
            &parsed.entries_used,
            EntryState::Proposed,
            Some(proposal.id.as_str()),
            now,
        )
        .map_err(|e| LoreError::Io("mark entries proposed", e.to_string()))?;

        // Retention housekeeping rides along with curation.
        let retention = chrono::Duration::days(i64::from(self.config.lore.retention_days));
        if let Err(e) = scratchpad::prune(&scratchpad_path, retention, now) {
            tracing::warn!(repo, error = %e, "scratchpad prune failed");
        }

        tracing::info!(repo, proposal = %proposal.id, entries = proposal.entries_used.len(), "proposal created");
        Ok(Some(proposal))
    }

    /// Apply a pending proposal via an ephemeral worktree branch.
    pub async fn apply(&self, repo: &str, id: &str) -> Result<Proposal, LoreError> {
        let mut proposal = Proposal::load(&self.paths, repo, id)
            .ok_or_else(|| LoreError::NotFound(id.to_string()))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(LoreError::NotPending(proposal.status));
        }

        // Staleness gate: re-read and re-hash every referenced file.
        let current = self.read_instruction_files(repo).await?;
        if !hashes_match(&proposal.file_hashes, &current) {
            proposal.status = ProposalStatus::Stale;
            proposal
                .store(&self.paths)
                .map_err(|e| LoreError::Io("store proposal", e.to_string()))?;
            return Err(LoreError::Stale);
        }

        let branch = format!("schmux/lore-{}", self.clock.epoch_ms());
        self.commit_and_push(repo, &branch, &proposal).await?;

        proposal.status = ProposalStatus::Applied;
        proposal.store(&self.paths).map_err(|e| LoreError::Io("store proposal", e.to_string()))?;
        scratchpad::append_state_changes(
            &self.scratchpad_path(repo),
            &proposal.entries_used,
            EntryState::Applied,
            Some(proposal.id.as_str()),
            self.clock.now_utc(),
        )
        .map_err(|e| LoreError::Io("mark entries applied", e.to_string()))?;

        tracing::info!(repo, proposal = %proposal.id, branch = %branch, "proposal applied");
        Ok(proposal)
    }

    /// Dismiss a pending (or stale) proposal.
    pub async fn dismiss(&self, repo: &str, id: &str) -> Result<Proposal, LoreError> {
        let mut proposal = Proposal::load(&self.paths, repo, id)
            .ok_or_else(|| LoreError::NotFound(id.to_string()))?;
        if proposal.status == ProposalStatus::Applied {
            return Err(LoreError::NotPending(proposal.status));
        }
        proposal.status = ProposalStatus::Dismissed;
        proposal.store(&self.paths).map_err(|e| LoreError::Io("store proposal", e.to_string()))?;
        scratchpad::append_state_changes(
            &self.scratchpad_path(repo),
            &proposal.entries_used,
            EntryState::Dismissed,
            Some(proposal.id.as_str()),
            self.clock.now_utc(),
        )
        .map_err(|e| LoreError::Io("mark entries dismissed", e.to_string()))?;
        Ok(proposal)
    }

    /// Read every configured instruction file from the bare clone's HEAD.
    /// Missing files read as empty.
    async fn read_instruction_files(
        &self,
        repo: &str,
    ) -> Result<IndexMap<String, String>, LoreError> {
        let bare = self.paths.bare_repo(repo);
        let mut files = IndexMap::new();
        for path in &self.config.lore.instruction_files {
            let content = self.git_show(&bare, path).await.unwrap_or_default();
            files.insert(path.clone(), content);
        }
        Ok(files)
    }

    async fn git_show(&self, bare: &Path, rel_path: &str) -> Option<String> {
        let spec = format!("HEAD:{}", rel_path);
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C").arg(bare).args(["show", &spec]).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
        let output = run_with_timeout(cmd, GIT_QUERY_TIMEOUT, "git show").await.ok()?;
        if output.status.success() {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            None
        }
    }

    /// Write the proposed files in an ephemeral worktree, commit, push the
    /// branch, and remove the worktree (removal is best-effort).
    async fn commit_and_push(
        &self,
        repo: &str,
        branch: &str,
        proposal: &Proposal,
    ) -> Result<(), LoreError> {
        let bare = self.paths.bare_repo(repo);
        let scratch = self.paths.config_dir.join("lore-worktrees").join(branch.replace('/', "-"));
        if let Some(parent) = scratch.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LoreError::Io("create worktree parent", e.to_string()))?;
        }

        let scratch_str = scratch.display().to_string();
        self.git(&bare, &["worktree", "add", "-b", branch, &scratch_str, "HEAD"], "worktree add")
            .await?;

        let result = self.write_commit_push(&scratch, branch, proposal).await;

        // Always try to drop the throwaway worktree, success or not.
        let _ = self
            .git(&bare, &["worktree", "remove", "--force", &scratch_str], "worktree remove")
            .await;
        let _ = std::fs::remove_dir_all(&scratch);

        result
    }

    async fn write_commit_push(
        &self,
        scratch: &Path,
        branch: &str,
        proposal: &Proposal,
    ) -> Result<(), LoreError> {
        for (rel, content) in &proposal.proposed_files {
            let dest = scratch.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| LoreError::Io("create proposal dirs", e.to_string()))?;
            }
            std::fs::write(&dest, content)
                .map_err(|e| LoreError::Io("write proposed file", e.to_string()))?;
        }

        self.git(scratch, &["add", "--all"], "add").await?;
        let message = format!(
            "lore: curated updates from {} scratchpad entries",
            proposal.entries_used.len()
        );
        self.git(
            scratch,
            &[
                "-c",
                "user.name=schmux",
                "-c",
                "user.email=schmux@localhost",
                "commit",
                "-m",
                &message,
            ],
            "commit",
        )
        .await?;

        let refspec = format!("{}:refs/heads/{}", branch, branch);
        self.git(scratch, &["push", "origin", &refspec], "push").await?;
        Ok(())
    }

    async fn git(
        &self,
        dir: &Path,
        args: &[&str],
        label: &'static str,
    ) -> Result<String, LoreError> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C").arg(dir).args(args).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
        let output = run_with_timeout(cmd, GIT_MUTATE_TIMEOUT, label)
            .await
            .map_err(|e| LoreError::Git { label, detail: e.to_string() })?;
        if !output.status.success() {
            return Err(LoreError::Git {
                label,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

struct ParsedReply {
    proposed_files: IndexMap<String, String>,
    diff_summary: String,
    entries_used: Vec<chrono::DateTime<Utc>>,
    entries_discarded: IndexMap<String, String>,
}

/// The curation prompt: raw entries (numbered), current files, routing rules.
fn curation_prompt(
    entries: &[ScratchpadEntry],
    files: &IndexMap<String, String>,
    instruction_files: &[String],
) -> String {
    let mut prompt = String::from(
        "You curate agent instruction files for a repository. Fold the raw \
scratchpad entries below into the instruction files, deduplicating and \
keeping each file coherent. Routing rules: knowledge useful to every \
assistant goes in every configured file; assistant-specific knowledge goes \
only in that assistant's file. Reply with JSON only:\n\
{\"proposed_files\": {\"<path>\": \"<full new content>\"}, \
\"diff_summary\": \"...\", \"entries_used\": [1, 2], \
\"entries_discarded\": {\"3\": \"reason\"}}\n\n",
    );
    prompt.push_str(&format!("Configured instruction files: {:?}\n\n", instruction_files));
    prompt.push_str("Raw entries:\n");
    for (i, entry) in entries.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{} @ {}] {}\n",
            i + 1,
            entry.agent,
            entry.ws,
            entry.text
        ));
    }
    prompt.push_str("\nCurrent instruction files:\n");
    for (path, content) in files {
        prompt.push_str(&format!("--- {} ---\n{}\n", path, content));
    }
    prompt
}

/// Parse and validate the curator LLM reply.
fn parse_curation_reply(
    reply: &str,
    entries: &[ScratchpadEntry],
) -> Result<ParsedReply, LoreError> {
    let json = extract_json(reply)?;

    let proposed = json
        .get("proposed_files")
        .and_then(|v| v.as_object())
        .ok_or(LoreError::BadReply("proposed_files"))?;
    let mut proposed_files = IndexMap::new();
    for (path, content) in proposed {
        let content = content.as_str().ok_or(LoreError::BadReply("proposed_files content"))?;
        proposed_files.insert(path.clone(), content.to_string());
    }
    if proposed_files.is_empty() {
        return Err(LoreError::BadReply("proposed_files"));
    }

    let diff_summary =
        json.get("diff_summary").and_then(|v| v.as_str()).unwrap_or_default().to_string();

    // Entry references are 1-based indices into the prompt's numbering.
    let index_to_ts = |v: &serde_json::Value| -> Option<chrono::DateTime<Utc>> {
        let idx = v.as_u64()? as usize;
        entries.get(idx.checked_sub(1)?).map(|e| e.ts)
    };
    let entries_used: Vec<chrono::DateTime<Utc>> = json
        .get("entries_used")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(index_to_ts).collect())
        .unwrap_or_default();
    if entries_used.is_empty() {
        return Err(LoreError::BadReply("entries_used"));
    }

    let entries_discarded = json
        .get("entries_discarded")
        .and_then(|v| v.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect::<IndexMap<String, String>>()
        })
        .unwrap_or_default();

    Ok(ParsedReply { proposed_files, diff_summary, entries_used, entries_discarded })
}

#[cfg(test)]
#[path = "curator_tests.rs"]
mod tests;
