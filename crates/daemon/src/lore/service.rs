// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lore service loop: dispose-triggered compounding and debounced curation.
//!
//! Session disposal sends the repo name here. The workspace's scratchpad is
//! compounded into the central overlay immediately; curation waits out a
//! per-repo debounce window so a burst of disposals produces one LLM call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::Paths;
use crate::storage::StateStore;

use super::curator::{Curator, LoreError};

const TICK: Duration = Duration::from_secs(1);

pub async fn run_lore_service(
    curator: Arc<Curator>,
    store: Arc<StateStore>,
    paths: Paths,
    mut triggers: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let debounce = crate::env::curate_debounce();
    let mut due: HashMap<String, Instant> = HashMap::new();

    loop {
        tokio::select! {
            trigger = triggers.recv() => {
                match trigger {
                    Some(repo) => {
                        // Compound right away so the curator sees the
                        // disposing workspace's entries even after the
                        // worktree goes.
                        crate::overlay::compound_repo(&store, &paths, &repo);
                        due.insert(repo, Instant::now() + debounce);
                    }
                    None => return,
                }
            }
            _ = tokio::time::sleep(TICK) => {
                let now = Instant::now();
                let ready: Vec<String> = due
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(repo, _)| repo.clone())
                    .collect();
                for repo in ready {
                    due.remove(&repo);
                    match curator.curate(&repo).await {
                        Ok(Some(proposal)) => {
                            tracing::info!(repo = %repo, proposal = %proposal.id, "curation produced a proposal");
                        }
                        Ok(None) => {}
                        Err(LoreError::NoLlm) => {}
                        Err(e) => {
                            tracing::warn!(repo = %repo, error = %e, "curation failed; will retry on next dispose");
                        }
                    }
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
