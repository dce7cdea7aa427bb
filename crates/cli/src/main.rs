// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `schmux` — CLI for the schmux daemon.
//!
//! Thin argument parsing over daemon RPC. Exit codes: 0 success, 42 means
//! the daemon requested a restart (dev mode re-exec), anything else is an
//! error.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod exit_error;

use clap::{Parser, Subcommand};

use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "schmux", version, about = "Run coding agents in parallel tmux sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
    /// Run the daemon in the foreground (dev mode)
    DaemonRun,
    /// Spawn one or more sessions
    Spawn {
        /// Target to run (from config.json's target table)
        #[arg(short = 'a', long = "target")]
        target: String,
        /// Repo name (required unless --workspace is given)
        #[arg(short = 'r', long = "repo")]
        repo: Option<String>,
        /// Branch (required unless --workspace is given)
        #[arg(short = 'b', long = "branch")]
        branch: Option<String>,
        /// Reuse an existing workspace id
        #[arg(short = 'w', long = "workspace")]
        workspace: Option<String>,
        /// Nickname for the session
        #[arg(short = 'n', long = "nickname")]
        nickname: Option<String>,
        /// Prompt passed to the target
        #[arg(short = 'p', long = "prompt")]
        prompt: Option<String>,
        /// Number of sessions to spawn
        #[arg(short = 'c', long = "count", default_value = "1")]
        count: u32,
        /// Resume the target's previous conversation
        #[arg(long)]
        resume: bool,
    },
    /// List workspaces and sessions
    List {
        /// Raw JSON output
        #[arg(long)]
        json: bool,
    },
    /// Attach the terminal to a session's tmux window
    Attach {
        /// Session id (or unique prefix)
        session_id: String,
    },
    /// Dispose a session
    Dispose {
        /// Session id (or unique prefix)
        session_id: String,
    },
    /// Re-apply the central overlay into a workspace
    RefreshOverlay {
        workspace_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Start => commands::daemon::start().await,
        Command::Stop => commands::daemon::stop().await,
        Command::Status => commands::daemon::status().await,
        Command::DaemonRun => commands::daemon::daemon_run(),
        Command::Spawn { target, repo, branch, workspace, nickname, prompt, count, resume } => {
            commands::session::spawn(target, repo, branch, workspace, nickname, prompt, count, resume)
                .await
        }
        Command::List { json } => commands::session::list(json).await,
        Command::Attach { session_id } => commands::session::attach(&session_id).await,
        Command::Dispose { session_id } => commands::session::dispose(&session_id).await,
        Command::RefreshOverlay { workspace_id } => {
            commands::workspace::refresh_overlay(&workspace_id).await
        }
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            match e.downcast_ref::<ExitError>() {
                Some(exit) => {
                    if !exit.message.is_empty() {
                        eprintln!("{}", exit.message);
                    }
                    std::process::exit(exit.code);
                }
                None => {
                    eprintln!("schmux: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
