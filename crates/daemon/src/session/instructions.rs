// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent signaling instructions.
//!
//! Tools that accept a system-prompt flag get `<config-dir>/signaling.md`
//! appended to their command line. Everything else gets a marker-wrapped
//! block inserted into the workspace's instruction file; user content
//! outside the markers is preserved byte-for-byte.

use std::path::{Path, PathBuf};

pub const MARKER_BEGIN: &str = "<!-- SCHMUX:BEGIN -->";
pub const MARKER_END: &str = "<!-- SCHMUX:END -->";

/// The signaling contract, phrased for the agent.
pub const SIGNALING_INSTRUCTIONS: &str = "\
# schmux status signaling

You are running under schmux. Report your state by overwriting the file at
`$SCHMUX_STATUS_FILE` with a single line:

    <state> [<message>]

Valid states:

- `working` — actively making progress (clears any pending notification)
- `completed <summary>` — the task is done
- `needs_input <question>` — you are blocked on the user
- `needs_testing <what to verify>` — changes are ready for a human to test
- `error <what failed>` — you hit a failure you cannot recover from

Rewrite the file whenever your state changes. Keep the message short; it is
shown in a dashboard. Example:

    echo \"completed refactored the session manager\" > \"$SCHMUX_STATUS_FILE\"
";

/// Write `signaling.md` if missing or out of date; returns its path.
pub fn ensure_signaling_file(config_dir: &Path) -> std::io::Result<PathBuf> {
    let path = config_dir.join("signaling.md");
    let current = std::fs::read_to_string(&path).unwrap_or_default();
    if current != SIGNALING_INSTRUCTIONS {
        std::fs::create_dir_all(config_dir)?;
        std::fs::write(&path, SIGNALING_INSTRUCTIONS)?;
    }
    Ok(path)
}

/// Which workspace instruction file a target reads.
pub fn instruction_file_for(target_name: &str) -> &'static str {
    if target_name.contains("claude") {
        "CLAUDE.md"
    } else {
        "AGENTS.md"
    }
}

/// Insert or replace the marker-wrapped block in `existing`.
///
/// Content outside the markers is untouched. A file without markers gets the
/// block appended (separated by a blank line when non-empty).
pub fn upsert_marker_block(existing: &str, block_body: &str) -> String {
    let block = format!("{}\n{}\n{}", MARKER_BEGIN, block_body.trim_end(), MARKER_END);

    if let (Some(begin), Some(end_start)) = (existing.find(MARKER_BEGIN), existing.find(MARKER_END))
    {
        if end_start >= begin {
            let end = end_start + MARKER_END.len();
            let mut out = String::with_capacity(existing.len());
            out.push_str(&existing[..begin]);
            out.push_str(&block);
            out.push_str(&existing[end..]);
            return out;
        }
    }

    if existing.trim().is_empty() {
        format!("{}\n", block)
    } else {
        let mut out = existing.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&block);
        out.push('\n');
        out
    }
}

/// Create or update the instruction file in a workspace.
pub fn ensure_instruction_block(workspace: &Path, target_name: &str) -> std::io::Result<()> {
    let path = workspace.join(instruction_file_for(target_name));
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    let updated = upsert_marker_block(&existing, SIGNALING_INSTRUCTIONS);
    if updated != existing {
        std::fs::write(&path, updated)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "instructions_tests.rs"]
mod tests;
