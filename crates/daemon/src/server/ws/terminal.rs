// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session terminal channel.
//!
//! One WebSocket may stream a session at a time: a newcomer displaces the
//! current holder, which receives exactly one `displaced` frame and is
//! closed before the newcomer starts streaming. Output is produced by
//! tailing the tracker's log file (the tracker is the only writer); input
//! goes to the pane via send-keys, with Enter/Tab/Shift-Tab doubling as the
//! nudge-clear side channel.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use sx_core::SessionId;

use crate::protocol::{TerminalClientFrame, TerminalResize, TerminalServerFrame};
use crate::server::Ctx;

/// Cap on the `full` frame sent at connect.
const FULL_TAIL_BYTES: u64 = 256 * 1024;

/// Control frames pushed to a connection by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Takeover {
    Displaced,
    Reconnect,
}

struct Active {
    conn_id: u64,
    tx: mpsc::Sender<Takeover>,
}

/// Tracks which connection currently streams each session.
#[derive(Default)]
pub struct TerminalRegistry {
    active: Mutex<HashMap<SessionId, Active>>,
    next_conn: AtomicU64,
}

impl TerminalRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the stream for `session_id`, displacing any current holder.
    pub(crate) fn claim(&self, session_id: &SessionId) -> (u64, mpsc::Receiver<Takeover>) {
        let conn_id = self.next_conn.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(2);
        let previous = self
            .active
            .lock()
            .insert(session_id.clone(), Active { conn_id, tx });
        if let Some(prev) = previous {
            // The displaced holder drains this before its socket closes.
            let _ = prev.tx.try_send(Takeover::Displaced);
        }
        (conn_id, rx)
    }

    /// Release the claim if `conn_id` still holds it (a displaced connection
    /// must not release its displacer).
    pub(crate) fn release(&self, session_id: &SessionId, conn_id: u64) {
        let mut active = self.active.lock();
        if active.get(session_id).map(|a| a.conn_id) == Some(conn_id) {
            active.remove(session_id);
        }
    }

    /// Tell the current holder (if any) to reconnect — used on log rotation.
    pub fn notify_reconnect(&self, session_id: &SessionId) {
        if let Some(active) = self.active.lock().get(session_id) {
            let _ = active.tx.try_send(Takeover::Reconnect);
        }
    }

    /// Whether any connection currently streams this session.
    pub fn has_listener(&self, session_id: &SessionId) -> bool {
        self.active.lock().contains_key(session_id)
    }
}

/// Serve one terminal WebSocket until close, displacement, or rotation.
pub async fn handle_terminal_ws<S>(
    ctx: Arc<Ctx>,
    session_id: SessionId,
    ws: WebSocketStream<S>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let Some(session) = ctx.store.session(&session_id) else {
        // Unknown session: close immediately; the route already 404s REST,
        // but a racing dispose can land here.
        let mut ws = ws;
        let _ = ws.close(None).await;
        return;
    };

    let (conn_id, mut takeover_rx) = ctx.terminal_registry.claim(&session_id);
    let (mut sink, mut stream) = ws.split();

    let log_path = ctx.paths.session_log(&session_id);
    let mut pos = match send_full(&mut sink, &log_path).await {
        Ok(pos) => pos,
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "terminal full frame failed");
            ctx.terminal_registry.release(&session_id, conn_id);
            return;
        }
    };

    let poll = std::time::Duration::from_millis(ctx.config.terminal_poll_interval_ms.max(10));
    let mut paused = false;

    loop {
        tokio::select! {
            takeover = takeover_rx.recv() => {
                let frame = match takeover {
                    Some(Takeover::Displaced) => TerminalServerFrame::Displaced,
                    Some(Takeover::Reconnect) => TerminalServerFrame::Reconnect,
                    None => break,
                };
                let _ = send_frame(&mut sink, &frame).await;
                let _ = sink.close().await;
                break;
            }
            _ = tokio::time::sleep(poll) => {
                if paused {
                    continue;
                }
                match read_appended(&log_path, pos) {
                    Ok(Some((content, new_pos))) => {
                        pos = new_pos;
                        if !content.is_empty()
                            && send_frame(&mut sink, &TerminalServerFrame::Append { content })
                                .await
                                .is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(session = %session_id, error = %e, "log tail read failed");
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TerminalClientFrame>(text.as_str()) {
                            Ok(frame) => {
                                handle_client_frame(&ctx, &session, frame, &mut paused).await;
                            }
                            Err(e) => {
                                tracing::debug!(session = %session_id, error = %e, "bad terminal frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session = %session_id, error = %e, "terminal ws error");
                        break;
                    }
                    _ => {} // Ping/Pong/Binary — ignore
                }
            }
        }
    }

    ctx.terminal_registry.release(&session_id, conn_id);
}

async fn handle_client_frame(
    ctx: &Arc<Ctx>,
    session: &sx_core::Session,
    frame: TerminalClientFrame,
    paused: &mut bool,
) {
    match frame {
        TerminalClientFrame::Input { data } => {
            if let Err(e) = ctx.mux.send_text(&session.pane_id, &data).await {
                tracing::warn!(session = %session.id, error = %e, "input forward failed");
            }
            // Enter/Tab/Shift-Tab acknowledge the pending nudge.
            if input_clears_nudge(&data) && ctx.store.clear_session_nudge(&session.id) {
                ctx.broadcaster.schedule();
            }
        }
        TerminalClientFrame::Resize { data } => {
            match serde_json::from_str::<TerminalResize>(&data) {
                Ok(size) => {
                    if let Err(e) = ctx.mux.resize_pane(&session.pane_id, size.cols, size.rows).await
                    {
                        tracing::debug!(session = %session.id, error = %e, "resize failed");
                    }
                }
                Err(e) => {
                    tracing::debug!(session = %session.id, error = %e, "bad resize payload");
                }
            }
        }
        TerminalClientFrame::Pause => *paused = true,
        TerminalClientFrame::Resume => *paused = false,
    }
}

/// Keys that acknowledge a nudge: Enter, Tab, Shift-Tab (CSI Z).
pub(crate) fn input_clears_nudge(data: &str) -> bool {
    data.contains('\r') || data.contains('\n') || data.contains('\t') || data.contains("\x1b[Z")
}

/// Send the `full` frame (trimmed log tail); returns the read position.
async fn send_full<S>(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    log_path: &Path,
) -> std::io::Result<u64>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (content, pos) = read_tail(log_path, FULL_TAIL_BYTES);
    send_frame(sink, &TerminalServerFrame::Full { content })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(pos)
}

async fn send_frame<S>(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    frame: &TerminalServerFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let json = serde_json::to_string(frame).unwrap_or_default();
    sink.send(Message::text(json)).await
}

/// Last `max_bytes` of the log (lossy UTF-8, starting at the first line
/// boundary when trimmed), plus the absolute end position.
pub(crate) fn read_tail(path: &Path, max_bytes: u64) -> (String, u64) {
    let Ok(mut file) = std::fs::File::open(path) else {
        return (String::new(), 0);
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let start = len.saturating_sub(max_bytes);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return (String::new(), 0);
    }
    let mut buf = Vec::new();
    if file.read_to_end(&mut buf).is_err() {
        return (String::new(), 0);
    }
    let mut content = String::from_utf8_lossy(&buf).into_owned();
    if start > 0 {
        // Drop the partial first line after a trim.
        if let Some(idx) = content.find('\n') {
            content = content.split_off(idx + 1);
        }
    }
    (content, len)
}

/// New bytes past `pos`, or `None` when unchanged. A shrunken file (rotation
/// by the tracker) resets the position.
pub(crate) fn read_appended(path: &Path, pos: u64) -> std::io::Result<Option<(String, u64)>> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len == pos {
        return Ok(None);
    }
    if len < pos {
        return Ok(Some((String::new(), len)));
    }
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(Some((String::from_utf8_lossy(&buf).into_owned(), len)))
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
