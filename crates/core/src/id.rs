// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! Workspace ids are sequential per repo (`demo-001`) and allocated by the
//! workspace manager; session ids are random (`<uuid>-<token>`); proposal ids
//! are time-ordered (`<epoch-ms>-<token>`). Only the random/time-ordered ids
//! have generators here — workspace ids come from the naming scan.

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

crate::string_id! {
    /// Unique identifier for a spawned session.
    ///
    /// A session is one run target attached to a multiplexer pane inside one
    /// workspace. The id doubles as the signal file name and the log file
    /// stem, so it must be filesystem-safe.
    pub struct SessionId;
}

impl SessionId {
    /// Generate a new random session id: `<uuid>-<6-char token>`.
    ///
    /// The uuid makes collisions implausible; the short token keeps tmux
    /// window names readable when truncated.
    pub fn generate() -> Self {
        Self(format!("{}-{}", uuid::Uuid::new_v4(), nanoid::nanoid!(6, &ALPHANUMERIC)))
    }

    /// The short token suffix, for display.
    pub fn token(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }
}

crate::string_id! {
    /// Identifier for a workspace: `<repoName>-NNN`.
    ///
    /// Allocated sequentially per repo by the workspace manager; a suffix is
    /// never reused while any workspace with that id exists.
    pub struct WorkspaceId;
}

impl WorkspaceId {
    /// Compose an id from repo name and numeric suffix.
    pub fn compose(repo: &str, suffix: u32) -> Self {
        Self(format!("{}-{:03}", repo, suffix))
    }

    /// Split the id into `(repo, suffix)` if it has the `<repo>-NNN` shape.
    /// The suffix is zero-padded to three digits but may grow past 999.
    pub fn split(&self) -> Option<(&str, u32)> {
        let (repo, digits) = self.0.rsplit_once('-')?;
        if repo.is_empty() || digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let suffix = digits.parse().ok()?;
        Some((repo, suffix))
    }
}

crate::string_id! {
    /// Identifier for a lore proposal: `<epoch-ms>-<token>`.
    pub struct ProposalId;
}

impl ProposalId {
    pub fn generate(epoch_ms: u64) -> Self {
        Self(format!("{}-{}", epoch_ms, nanoid::nanoid!(6, &ALPHANUMERIC)))
    }
}

crate::string_id! {
    /// Identifier for a remote host record (pass-through; no transport here).
    pub struct RemoteHostId;
}

// Filesystem-safe alphabet: the default nanoid alphabet includes `-` and `_`,
// and `-` would break the `rsplit('-')` token accessor.
const ALPHANUMERIC: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
