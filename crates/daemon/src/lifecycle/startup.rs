// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and the run loop.
//!
//! Construction order matters: the signal engine's pump is started and
//! verified live before any tracker is created or re-attached — a tracker
//! whose signals have nowhere to go would drop them silently. Startup
//! recovery re-attaches to multiplexer windows that survived a daemon
//! restart without re-running their commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sx_core::{Config, Secrets, SystemClock};

use crate::llm::{CommandLlmClient, LlmClient};
use crate::lore::{run_lore_service, Curator};
use crate::mux::{Multiplexer, TmuxMux};
use crate::server::ws::{Broadcaster, TerminalRegistry};
use crate::server::Ctx;
use crate::session::{SessionManager, TrackerSet};
use crate::signal::nudgenik::NudgeNik;
use crate::signal::SignalEngine;
use crate::storage::StateStore;
use crate::workspace::{run_status_poller, WorkspaceManager};

use super::{LifecycleError, Paths, PidLock, WorkspacePaths};

/// A started daemon: context plus the resources the run loop owns.
pub struct Daemon {
    pub ctx: Arc<Ctx>,
    listener: TcpListener,
    trackers: Arc<TrackerSet>,
    // Held for the daemon's lifetime; releases the pid lock on drop.
    _pid_lock: PidLock,
}

/// Bring the daemon up. Returns the ready-to-run daemon; `Daemon::run`
/// drives it to completion.
pub async fn startup(paths: Paths) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&paths.config_dir)
        .map_err(|e| LifecycleError::Io("create config dir", e))?;

    let pid_lock = PidLock::acquire(paths.pid_file())?;

    let config = Arc::new(Config::load(&paths.config_file())?);
    let secrets = Secrets::load(&paths.secrets_file())?;

    let store = StateStore::open(paths.state_file());
    let broadcaster = Broadcaster::new(Arc::clone(&store));
    let terminal_registry = TerminalRegistry::new();
    let mux: Arc<dyn Multiplexer> = Arc::new(TmuxMux);
    let shutdown = CancellationToken::new();

    tokio::spawn(Arc::clone(&store).run_saver(shutdown.clone()));
    tokio::spawn(Arc::clone(&broadcaster).run(shutdown.clone()));

    // Signal pump first; trackers assert it is live before they start.
    let signals = SignalEngine::new(Arc::clone(&store), Arc::clone(&broadcaster));
    tokio::spawn(Arc::clone(&signals).run(shutdown.clone()));
    let pump_deadline = Instant::now() + Duration::from_secs(2);
    while !signals.is_running() {
        if Instant::now() > pump_deadline {
            return Err(LifecycleError::Io(
                "signal engine startup",
                std::io::Error::other("signal pump did not start"),
            ));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let llm: Option<Arc<dyn LlmClient>> = config
        .llm_target
        .as_deref()
        .and_then(|name| config.target(name))
        .map(|target| Arc::new(CommandLlmClient::new(&target.command)) as Arc<dyn LlmClient>);
    if config.llm_target.is_some() && llm.is_none() {
        warn!("llm_target does not name a configured target; LLM paths disabled");
    }

    let workspaces =
        WorkspaceManager::new(paths.clone(), Arc::clone(&config), Arc::clone(&store));
    let trackers = TrackerSet::new(
        paths.clone(),
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&mux),
        Arc::clone(&terminal_registry),
        Arc::clone(&broadcaster),
    );
    let curator = Curator::new(paths.clone(), Arc::clone(&config), llm.clone());

    let (lore_tx, lore_rx) = tokio::sync::mpsc::unbounded_channel();
    let sessions = SessionManager::new(
        paths.clone(),
        Arc::clone(&config),
        secrets,
        Arc::clone(&store),
        Arc::clone(&mux),
        Arc::clone(&workspaces),
        Arc::clone(&signals),
        Arc::clone(&trackers),
        Arc::clone(&broadcaster),
        lore_tx,
    );

    let ctx = Arc::new(Ctx {
        paths: paths.clone(),
        config: Arc::clone(&config),
        store: Arc::clone(&store),
        mux: Arc::clone(&mux),
        broadcaster: Arc::clone(&broadcaster),
        terminal_registry,
        workspaces: Arc::clone(&workspaces),
        sessions,
        curator: Arc::clone(&curator),
        start_time: Instant::now(),
        shutdown: shutdown.clone(),
        restart_requested: Arc::new(AtomicBool::new(false)),
    });

    recover_sessions(&ctx, &trackers, &signals).await;

    tokio::spawn(run_status_poller(
        Arc::clone(&workspaces),
        Arc::clone(&broadcaster),
        Duration::from_millis(config.git_poll_interval_ms.max(250)),
        shutdown.clone(),
    ));
    tokio::spawn(crate::overlay::run_compounder(
        Arc::clone(&store),
        paths.clone(),
        crate::env::compound_interval(),
        shutdown.clone(),
    ));
    tokio::spawn(run_lore_service(
        curator,
        Arc::clone(&store),
        paths.clone(),
        lore_rx,
        shutdown.clone(),
    ));
    if let Some(llm) = llm {
        let nudgenik = NudgeNik::new(
            Arc::clone(&store),
            Arc::clone(&mux),
            llm,
            Arc::clone(&broadcaster),
            SystemClock,
        );
        tokio::spawn(nudgenik.run(shutdown.clone()));
    }

    let port = crate::env::http_port().unwrap_or(config.http_port);
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| LifecycleError::Bind { addr, source })?;

    info!(port, version = crate::env::VERSION, "schmuxd started");
    Ok(Daemon { ctx, listener, trackers, _pid_lock: pid_lock })
}

/// Re-attach trackers and watchers to sessions whose windows survived a
/// daemon restart; mark the rest done.
async fn recover_sessions(ctx: &Arc<Ctx>, trackers: &Arc<TrackerSet>, signals: &Arc<SignalEngine>) {
    for session in ctx.store.sessions() {
        if !session.is_running() {
            continue;
        }
        if ctx.mux.window_exists(&session.window_id).await {
            info!(session = %session.id, "re-attaching to surviving window");
            if let Some(workspace) = ctx.store.workspace(&session.workspace_id) {
                let signal_file = WorkspacePaths::signal_file(&workspace.path, &session.id);
                signals.watch_session(&session.id, &signal_file);
            }
            trackers.attach(&session).await;
        } else {
            info!(session = %session.id, "window gone during downtime; marking done");
            ctx.store.mark_session_done(&session.id);
        }
    }
    ctx.broadcaster.schedule();
}

impl Daemon {
    /// Serve until shutdown is requested, then drain. Returns true when the
    /// shutdown was a restart request (exit code 42).
    pub async fn run(self) -> bool {
        let server = tokio::spawn(crate::server::run_server(
            self.listener,
            Arc::clone(&self.ctx),
        ));

        self.ctx.shutdown.cancelled().await;
        info!("shutdown requested; draining");

        self.trackers.drain_all(crate::env::drain_timeout()).await;
        self.ctx.store.save_now();
        if let Err(e) = server.await {
            error!(error = %e, "server task join failed");
        }

        let restart = self.ctx.restart_requested.load(Ordering::SeqCst);
        info!(restart, "schmuxd stopped");
        restart
    }
}
