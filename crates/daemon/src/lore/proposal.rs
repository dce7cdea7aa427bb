// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proposal documents: curated multi-file edits awaiting review.
//!
//! A proposal records the proposed contents, the SHA-256 of each touched
//! instruction file at curation time (staleness detection), and the
//! scratchpad entries it consumed. The document is the unit of retry for
//! every failure on the apply path.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use sx_core::ProposalId;

use crate::lifecycle::Paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Stale,
    Applied,
    Dismissed,
}

sx_core::simple_display! {
    ProposalStatus {
        Pending => "pending",
        Stale => "stale",
        Applied => "applied",
        Dismissed => "dismissed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub repo: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    /// Path → full proposed content.
    pub proposed_files: IndexMap<String, String>,
    /// Path → SHA-256 of the file at curation time.
    pub file_hashes: IndexMap<String, String>,
    pub diff_summary: String,
    /// Timestamps of the scratchpad entries folded in.
    pub entries_used: Vec<DateTime<Utc>>,
    /// Entry ref → reason it was discarded.
    #[serde(default)]
    pub entries_discarded: IndexMap<String, String>,
}

impl Proposal {
    pub fn store(&self, paths: &Paths) -> std::io::Result<()> {
        let path = paths.proposal_file(&self.repo, self.id.as_str());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self).unwrap_or_default();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    pub fn load(paths: &Paths, repo: &str, id: &str) -> Option<Self> {
        let path = paths.proposal_file(repo, id);
        let contents = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// All proposals for a repo, newest first (ids sort by epoch prefix).
    pub fn list(paths: &Paths, repo: &str) -> Vec<Self> {
        let dir = paths.proposal_dir(repo);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut proposals: Vec<Self> = entries
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                let contents = std::fs::read_to_string(e.path()).ok()?;
                serde_json::from_str(&contents).ok()
            })
            .collect();
        proposals.sort_by(|a, b| b.id.as_str().cmp(a.id.as_str()));
        proposals
    }
}

/// SHA-256 hex digest of file content.
pub fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Compare recorded hashes against freshly-read contents.
pub fn hashes_match(
    recorded: &IndexMap<String, String>,
    current: &IndexMap<String, String>,
) -> bool {
    recorded.iter().all(|(path, hash)| {
        current.get(path).map(|content| content_hash(content) == *hash).unwrap_or(false)
    })
}

#[cfg(test)]
#[path = "proposal_tests.rs"]
mod tests;
