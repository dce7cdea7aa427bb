// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic state persistence.
//!
//! Writes go to a temp file in the same directory and are renamed into
//! place, so a crash mid-write can never leave a truncated `state.json`.
//! Loads reject malformed state (set aside as `.corrupt-<epoch-ms>`) rather
//! than silently starting from a partial record.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::state::PersistedState;

/// Current state schema version.
pub const CURRENT_STATE_VERSION: u32 = 1;

const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },
}

/// Load state from disk.
///
/// Missing file → default empty state. Malformed or future-versioned file →
/// renamed aside and default returned; the original bytes are preserved for
/// manual recovery.
pub fn load_state(path: &Path) -> PersistedState {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PersistedState::default(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read state file");
            return PersistedState::default();
        }
    };

    match parse_state(&contents) {
        Ok(state) => state,
        Err(e) => {
            let aside = set_aside_path(path);
            tracing::error!(
                path = %path.display(),
                aside = %aside.display(),
                error = %e,
                "rejecting malformed state file"
            );
            let _ = fs::rename(path, &aside);
            PersistedState::default()
        }
    }
}

fn parse_state(contents: &str) -> Result<PersistedState, StorageError> {
    let state: PersistedState = serde_json::from_str(contents)?;
    if state.version > CURRENT_STATE_VERSION {
        return Err(StorageError::VersionTooNew {
            found: state.version,
            supported: CURRENT_STATE_VERSION,
        });
    }
    Ok(state)
}

/// Write state atomically: rotate backups, write temp, rename into place.
pub fn write_state(path: &Path, state: &PersistedState) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(state)?;

    if path.exists() {
        let bak = rotate_bak_path(path);
        let _ = fs::copy(path, bak);
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

fn set_aside_path(path: &Path) -> PathBuf {
    let epoch_ms =
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
    path.with_extension(format!("corrupt-{}", epoch_ms))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
