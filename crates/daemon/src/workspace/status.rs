// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background git-status polling.
//!
//! One loop sweeps every workspace at a fixed interval. A poll error keeps
//! the previous fingerprint (stale beats wrongly-clean) and is logged; a
//! changed fingerprint schedules a debounced dashboard broadcast.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::server::ws::Broadcaster;

use super::{gitops, WorkspaceManager};

pub async fn run_status_poller(
    manager: Arc<WorkspaceManager>,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }

        let workspaces = manager.store().workspaces();
        let mut any_changed = false;

        for workspace in workspaces {
            if cancel.is_cancelled() {
                return;
            }
            match gitops::fingerprint(&workspace.path, &workspace.default_branch).await {
                Ok(fp) => {
                    if manager.store().update_workspace_fingerprint(&workspace.id, fp) {
                        any_changed = true;
                    }
                }
                Err(e) => {
                    // Stale fingerprint, not "no changes".
                    tracing::warn!(
                        workspace = %workspace.id,
                        error = %e,
                        "status poll failed; keeping previous fingerprint"
                    );
                }
            }
        }

        if any_changed {
            broadcaster.schedule();
        }
    }
}
