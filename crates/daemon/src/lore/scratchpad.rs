// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append-only agent scratchpad.
//!
//! Sessions append discovery lines to `.claude/lore.jsonl` in their
//! workspace; the compounder unions them into the central overlay copy,
//! which is what the curator reads. State transitions (`raw → proposed →
//! applied/dismissed`) are recorded as *new* audit lines referencing the
//! entry's timestamp — no prior line is ever rewritten. Pruning filters
//! into a fresh file flipped into place atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// What kind of knowledge an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// How to operate the repo (commands, workflows, gotchas).
    Operational,
    /// Facts about the code itself.
    Codebase,
}

/// Lifecycle state of an entry, derived from audit lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    #[default]
    Raw,
    Proposed,
    Applied,
    Dismissed,
}

/// A discovery line written by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub ts: DateTime<Utc>,
    /// Workspace the discovery was made in.
    pub ws: String,
    pub agent: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub text: String,
}

/// An audit line appended by the curator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub ts: DateTime<Utc>,
    pub state_change: EntryState,
    /// Timestamp of the entry this refers to.
    pub entry_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
}

/// An entry with its effective (latest-audit-wins) state.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveEntry {
    pub entry: ScratchpadEntry,
    pub state: EntryState,
}

/// Read the scratchpad, resolving each entry's effective state.
pub fn read_entries(path: &Path) -> Vec<EffectiveEntry> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut entries: Vec<ScratchpadEntry> = Vec::new();
    let mut states: HashMap<i64, EntryState> = HashMap::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(change) = serde_json::from_str::<StateChange>(line) {
            states.insert(change.entry_ts.timestamp_millis(), change.state_change);
            continue;
        }
        match serde_json::from_str::<ScratchpadEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable scratchpad line");
            }
        }
    }

    entries
        .into_iter()
        .map(|entry| {
            let state =
                states.get(&entry.ts.timestamp_millis()).copied().unwrap_or(EntryState::Raw);
            EffectiveEntry { entry, state }
        })
        .collect()
}

/// Only the entries still awaiting curation.
pub fn raw_entries(path: &Path) -> Vec<ScratchpadEntry> {
    read_entries(path)
        .into_iter()
        .filter(|e| e.state == EntryState::Raw)
        .map(|e| e.entry)
        .collect()
}

/// Append one discovery line (used by tests and the HTTP capture endpoint).
pub fn append_entry(path: &Path, entry: &ScratchpadEntry) -> std::io::Result<()> {
    append_line(path, &serde_json::to_string(entry).unwrap_or_default())
}

/// Append audit lines flipping `entry_refs` to `state`.
pub fn append_state_changes(
    path: &Path,
    entry_refs: &[DateTime<Utc>],
    state: EntryState,
    proposal_id: Option<&str>,
    now: DateTime<Utc>,
) -> std::io::Result<()> {
    for entry_ts in entry_refs {
        let change = StateChange {
            ts: now,
            state_change: state,
            entry_ts: *entry_ts,
            proposal_id: proposal_id.map(str::to_string),
        };
        append_line(path, &serde_json::to_string(&change).unwrap_or_default())?;
    }
    Ok(())
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

/// Drop applied/dismissed entries older than `retention` (and their audit
/// lines) by rewriting to a temp file and renaming into place. Raw and
/// proposed entries always survive.
pub fn prune(path: &Path, retention: chrono::Duration, now: DateTime<Utc>) -> std::io::Result<()> {
    let effective = read_entries(path);
    if effective.is_empty() {
        return Ok(());
    }

    let keep = |e: &EffectiveEntry| -> bool {
        match e.state {
            EntryState::Raw | EntryState::Proposed => true,
            EntryState::Applied | EntryState::Dismissed => now - e.entry.ts < retention,
        }
    };

    let kept: Vec<&EffectiveEntry> = effective.iter().filter(|e| keep(e)).collect();
    if kept.len() == effective.len() {
        return Ok(());
    }
    let kept_ts: std::collections::HashSet<i64> =
        kept.iter().map(|e| e.entry.ts.timestamp_millis()).collect();

    // Filter original lines so surviving entries keep their exact bytes.
    let contents = std::fs::read_to_string(path)?;
    let mut out = String::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let keep_line = if let Ok(change) = serde_json::from_str::<StateChange>(line) {
            kept_ts.contains(&change.entry_ts.timestamp_millis())
        } else if let Ok(entry) = serde_json::from_str::<ScratchpadEntry>(line) {
            kept_ts.contains(&entry.ts.timestamp_millis())
        } else {
            true
        };
        if keep_line {
            out.push_str(line);
            out.push('\n');
        }
    }

    let tmp = path.with_extension("jsonl.prune");
    std::fs::write(&tmp, out)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
#[path = "scratchpad_tests.rs"]
mod tests;
