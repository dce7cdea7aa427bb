// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session pane trackers.
//!
//! A tracker owns its session's on-disk log exclusively: tmux `pipe-pane`
//! tees pane output into `<config-dir>/logs/<session-id>.log`, and the
//! tracker task polls the file for growth (last-output updates, throttled by
//! the poll interval), rotates it when it exceeds the size cap, and detects
//! the window disappearing (session → done). Terminal WebSockets only ever
//! read the log.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sx_core::{Config, Session, SessionId};

use crate::lifecycle::Paths;
use crate::mux::Multiplexer;
use crate::server::ws::{Broadcaster, TerminalRegistry};
use crate::storage::StateStore;

/// Poll cadence; also the floor on last-output update frequency.
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Liveness (window-exists) check cadence, in poll ticks.
const LIVENESS_EVERY: u32 = 4;

struct TrackerHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

pub struct TrackerSet {
    paths: Paths,
    config: Arc<Config>,
    store: Arc<StateStore>,
    mux: Arc<dyn Multiplexer>,
    registry: Arc<TerminalRegistry>,
    broadcaster: Arc<Broadcaster>,
    trackers: Mutex<HashMap<SessionId, TrackerHandle>>,
}

impl TrackerSet {
    pub fn new(
        paths: Paths,
        config: Arc<Config>,
        store: Arc<StateStore>,
        mux: Arc<dyn Multiplexer>,
        registry: Arc<TerminalRegistry>,
        broadcaster: Arc<Broadcaster>,
    ) -> Arc<Self> {
        Arc::new(Self {
            paths,
            config,
            store,
            mux,
            registry,
            broadcaster,
            trackers: Mutex::new(HashMap::new()),
        })
    }

    /// Start piping and tracking a session. Idempotent: an existing tracker
    /// for the id is stopped first. Used both at spawn and when re-attaching
    /// to surviving windows after a daemon restart (`pipe-pane` replaces any
    /// previous pipe, so no command is re-run).
    pub async fn attach(&self, session: &Session) {
        self.stop(&session.id).await;

        let log_path = self.paths.session_log(&session.id);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let pipe_cmd = format!("cat >> {}", shell_quote(&log_path.display().to_string()));
        if let Err(e) = self.mux.pipe_pane(&session.pane_id, Some(&pipe_cmd)).await {
            tracing::error!(session = %session.id, error = %e, "pipe-pane failed");
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_tracker(TrackerCtx {
            session_id: session.id.clone(),
            window_id: session.window_id.clone(),
            pane_id: session.pane_id.clone(),
            log_path,
            max_bytes: self.config.log_max_bytes,
            trim_bytes: self.config.log_trim_bytes,
            store: Arc::clone(&self.store),
            mux: Arc::clone(&self.mux),
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::clone(&self.broadcaster),
            cancel: cancel.clone(),
        }));

        self.trackers.lock().insert(session.id.clone(), TrackerHandle { cancel, task });
    }

    /// Stop a tracker and wait for it to wind down.
    pub async fn stop(&self, session_id: &SessionId) {
        let handle = self.trackers.lock().remove(session_id);
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.task.await;
        }
    }

    /// Cancel all trackers and wait up to `timeout` for them to drain.
    pub async fn drain_all(&self, timeout: Duration) {
        let handles: Vec<TrackerHandle> = {
            let mut trackers = self.trackers.lock();
            trackers.drain().map(|(_, h)| h).collect()
        };
        for handle in &handles {
            handle.cancel.cancel();
        }
        let join_all = async {
            for handle in handles {
                let _ = handle.task.await;
            }
        };
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            tracing::warn!("tracker drain timed out");
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.trackers.lock().len()
    }
}

struct TrackerCtx {
    session_id: SessionId,
    window_id: String,
    pane_id: String,
    log_path: std::path::PathBuf,
    max_bytes: u64,
    trim_bytes: u64,
    store: Arc<StateStore>,
    mux: Arc<dyn Multiplexer>,
    registry: Arc<TerminalRegistry>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
}

async fn run_tracker(ctx: TrackerCtx) {
    let mut last_size: u64 = std::fs::metadata(&ctx.log_path).map(|m| m.len()).unwrap_or(0);
    let mut tick: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = ctx.cancel.cancelled() => return,
        }
        tick = tick.wrapping_add(1);

        let size = std::fs::metadata(&ctx.log_path).map(|m| m.len()).unwrap_or(0);
        if size != last_size {
            last_size = size;
            ctx.store.update_session_last_output(&ctx.session_id, chrono::Utc::now());
        }

        if size > ctx.max_bytes {
            // Single-writer rotation: stop the pipe, trim in place, resume.
            let _ = ctx.mux.pipe_pane(&ctx.pane_id, None).await;
            match rotate_log(&ctx.log_path, ctx.trim_bytes) {
                Ok(new_size) => {
                    last_size = new_size;
                    tracing::info!(
                        session = %ctx.session_id,
                        from = size,
                        to = new_size,
                        "log rotated"
                    );
                    // Tailing clients reopen; exactly one reconnect per rotation.
                    ctx.registry.notify_reconnect(&ctx.session_id);
                }
                Err(e) => {
                    tracing::error!(session = %ctx.session_id, error = %e, "log rotation failed");
                }
            }
            let pipe_cmd =
                format!("cat >> {}", shell_quote(&ctx.log_path.display().to_string()));
            let _ = ctx.mux.pipe_pane(&ctx.pane_id, Some(&pipe_cmd)).await;
        }

        if tick % LIVENESS_EVERY == 0 && !ctx.mux.window_exists(&ctx.window_id).await {
            if ctx.store.mark_session_done(&ctx.session_id) {
                tracing::info!(session = %ctx.session_id, "window gone; session done");
                ctx.broadcaster.schedule();
            }
            return;
        }
    }
}

/// Keep the last `trim_bytes` of the log (starting at a line boundary),
/// flipped into place via temp + rename. Returns the new size.
pub(crate) fn rotate_log(path: &Path, trim_bytes: u64) -> std::io::Result<u64> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(trim_bytes);
    file.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;
    drop(file);

    // Begin at the first complete line of the kept tail.
    if start > 0 {
        if let Some(idx) = tail.iter().position(|&b| b == b'\n') {
            tail.drain(..=idx);
        }
    }

    let tmp = path.with_extension("log.tmp");
    {
        let mut out = std::fs::File::create(&tmp)?;
        out.write_all(&tail)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(tail.len() as u64)
}

/// Single-quote a string for the shell (pipe-pane runs through `sh -c`).
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
