// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential workspace naming.
//!
//! For repo `R`, new workspaces take the first unused suffix starting at 001.
//! The suffix is reserved in memory before any filesystem work so concurrent
//! spawns cannot collide; the reservation is released on drop (success paths
//! release it by registering the workspace first).

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use sx_core::WorkspaceId;

#[derive(Default)]
pub(super) struct SuffixReservations {
    held: Mutex<HashSet<(String, u32)>>,
}

impl SuffixReservations {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserve the first suffix not used in `existing` and not already held.
    pub fn reserve(self: &Arc<Self>, repo: &str, existing: &[u32]) -> Reservation {
        let mut held = self.held.lock();
        let suffix = first_free(existing, |n| held.contains(&(repo.to_string(), n)));
        held.insert((repo.to_string(), suffix));
        Reservation {
            repo: repo.to_string(),
            suffix,
            id: WorkspaceId::compose(repo, suffix),
            owner: Arc::clone(self),
        }
    }

    fn release(&self, repo: &str, suffix: u32) {
        self.held.lock().remove(&(repo.to_string(), suffix));
    }
}

/// A held suffix. Dropping it releases the reservation.
pub(super) struct Reservation {
    repo: String,
    suffix: u32,
    pub id: WorkspaceId,
    owner: Arc<SuffixReservations>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.owner.release(&self.repo, self.suffix);
    }
}

/// First suffix ≥ 1 absent from `existing` and not rejected by `held`.
fn first_free(existing: &[u32], held: impl Fn(u32) -> bool) -> u32 {
    let used: HashSet<u32> = existing.iter().copied().collect();
    (1..).find(|n| !used.contains(n) && !held(*n)).unwrap_or(1)
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
