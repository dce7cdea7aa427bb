// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket listener.
//!
//! One TCP listener serves both surfaces: requests with an `Upgrade:
//! websocket` header hand the stream to tungstenite after a manual 101;
//! everything else is routed as a one-shot JSON request. Each connection
//! runs in its own task.

pub mod http;
mod routes;
pub mod ws;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use sx_core::{Config, SessionId};

use crate::lifecycle::Paths;
use crate::lore::Curator;
use crate::mux::Multiplexer;
use crate::session::SessionManager;
use crate::storage::StateStore;
use crate::workspace::WorkspaceManager;

use http::{read_request, write_json, write_ws_accept, HttpRequest};
use ws::{Broadcaster, TerminalRegistry};

/// Shared daemon context for all request handlers.
pub struct Ctx {
    pub paths: Paths,
    pub config: Arc<Config>,
    pub store: Arc<StateStore>,
    pub mux: Arc<dyn Multiplexer>,
    pub broadcaster: Arc<Broadcaster>,
    pub terminal_registry: Arc<TerminalRegistry>,
    pub workspaces: Arc<WorkspaceManager>,
    pub sessions: Arc<SessionManager>,
    pub curator: Arc<Curator>,
    pub start_time: Instant,
    pub shutdown: CancellationToken,
    pub restart_requested: Arc<AtomicBool>,
}

impl Ctx {
    pub fn uptime_s(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Accept loop; runs until shutdown.
pub async fn run_server(listener: TcpListener, ctx: Arc<Ctx>) {
    info!(addr = ?listener.local_addr().ok(), "api listener ready");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "connection accepted");
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            handle_connection(stream, ctx).await;
                        });
                    }
                    Err(e) => error!(error = %e, "accept error"),
                }
            }
            _ = ctx.shutdown.cancelled() => {
                info!("api listener stopping");
                return;
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: Arc<Ctx>) {
    let request = {
        let mut reader = BufReader::new(&mut stream);
        match read_request(&mut reader).await {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "dropping malformed connection");
                return;
            }
        }
    };

    if request.is_ws_upgrade() {
        handle_upgrade(stream, request, ctx).await;
        return;
    }

    let (status, body) = routes::dispatch(&ctx, &request).await;
    if let Err(e) = write_json(&mut stream, status, &body).await {
        debug!(error = %e, "response write failed");
    }
}

async fn handle_upgrade(mut stream: TcpStream, request: HttpRequest, ctx: Arc<Ctx>) {
    let Some(key) = request.header("sec-websocket-key").map(str::to_string) else {
        let _ = write_json(
            &mut stream,
            400,
            &serde_json::json!({"error": "missing Sec-WebSocket-Key"}),
        )
        .await;
        return;
    };

    let target = match ws_target(&request.path) {
        Some(target) => target,
        None => {
            let _ = write_json(&mut stream, 404, &serde_json::json!({"error": "unknown ws path"}))
                .await;
            return;
        }
    };

    if write_ws_accept(&mut stream, &key).await.is_err() {
        return;
    }
    let ws = WebSocketStream::from_raw_socket(stream, Role::Server, None).await;

    match target {
        WsTarget::Dashboard => handle_dashboard_ws(ctx, ws).await,
        WsTarget::Terminal(session_id) => {
            ws::handle_terminal_ws(ctx, session_id, ws).await;
        }
    }
}

enum WsTarget {
    Dashboard,
    Terminal(SessionId),
}

fn ws_target(path: &str) -> Option<WsTarget> {
    if path == "/ws/dashboard" {
        return Some(WsTarget::Dashboard);
    }
    let session = path.strip_prefix("/ws/terminal/")?;
    if session.is_empty() {
        return None;
    }
    Some(WsTarget::Terminal(SessionId::new(session)))
}

/// Dashboard connection: full snapshot on connect, then queued frames until
/// the client goes away. The queue is drained by this single task, so writes
/// are serialized per connection.
async fn handle_dashboard_ws<S>(ctx: Arc<Ctx>, ws: WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let (conn_id, mut frames) = ctx.broadcaster.register();
    let (mut sink, mut stream) = ws.split();

    // Snapshot first so a fresh dashboard renders without waiting.
    let snapshot = crate::protocol::build_sessions_message(&ctx.store.snapshot());
    let payload = serde_json::to_string(&snapshot).unwrap_or_default();
    if sink.send(Message::text(payload)).await.is_err() {
        ctx.broadcaster.unregister(conn_id);
        return;
    }

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if sink.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // Dashboard clients do not send data frames.
                }
            }
            _ = ctx.shutdown.cancelled() => {
                let _ = sink.close().await;
                break;
            }
        }
    }

    ctx.broadcaster.unregister(conn_id);
}
