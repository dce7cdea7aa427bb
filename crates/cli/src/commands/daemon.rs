// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `schmux start|stop|status|daemon-run` — daemon management.

use anyhow::{anyhow, Result};
use std::process::Command;
use std::time::Duration;

use sx_daemon::lifecycle::Paths;

use crate::client::DaemonClient;
use crate::exit_error::ExitError;

pub async fn start() -> Result<()> {
    let client = DaemonClient::from_env()?;
    if client.get("/api/health").await.is_ok() {
        println!("Daemon already running");
        return Ok(());
    }

    let schmuxd = find_daemon_binary()?;
    Command::new(&schmuxd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {}: {}", schmuxd.display(), e))?;

    // Poll health until the daemon is responsive.
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if client.get("/api/health").await.is_ok() {
            println!("Daemon started");
            return Ok(());
        }
    }
    Err(anyhow!("daemon did not become ready within 10s"))
}

pub async fn stop() -> Result<()> {
    let client = DaemonClient::from_env()?;
    match client.post("/api/shutdown", &serde_json::json!({})).await {
        Ok(_) => {
            println!("Daemon stopped");
            Ok(())
        }
        Err(e) if e.is_not_running() => {
            // Fall back to the pid file in case the API is wedged.
            if kill_from_pid_file()? {
                println!("Daemon stopped (via pid file)");
            } else {
                println!("Daemon not running");
            }
            Ok(())
        }
        Err(e) => Err(anyhow!("failed to stop daemon: {}", e)),
    }
}

pub async fn status() -> Result<()> {
    let client = DaemonClient::from_env()?;
    match client.get("/api/health").await {
        Ok(health) => {
            println!(
                "schmuxd {} up {}s — {} session(s), {} workspace(s), {} save failure(s)",
                health["version"].as_str().unwrap_or("?"),
                health["uptime_s"].as_u64().unwrap_or(0),
                health["sessions"].as_u64().unwrap_or(0),
                health["workspaces"].as_u64().unwrap_or(0),
                health["save_failures"].as_u64().unwrap_or(0),
            );
            Ok(())
        }
        Err(e) if e.is_not_running() => {
            println!("Daemon not running");
            Ok(())
        }
        Err(e) => Err(anyhow!("{}", e)),
    }
}

/// Run schmuxd in the foreground, propagating its exit code — including 42,
/// the restart-requested code dev tooling watches for.
pub fn daemon_run() -> Result<()> {
    let schmuxd = find_daemon_binary()?;
    let status = Command::new(&schmuxd)
        .status()
        .map_err(|e| anyhow!("failed to run {}: {}", schmuxd.display(), e))?;
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(ExitError::new(code, String::new()).into()),
        None => Err(anyhow!("daemon terminated by signal")),
    }
}

/// `schmuxd` next to the current executable, falling back to PATH.
fn find_daemon_binary() -> Result<std::path::PathBuf> {
    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join("schmuxd");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(std::path::PathBuf::from("schmuxd"))
}

fn kill_from_pid_file() -> Result<bool> {
    let paths = Paths::resolve()?;
    let Ok(contents) = std::fs::read_to_string(paths.pid_file()) else {
        return Ok(false);
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return Ok(false);
    };
    let status = Command::new("kill")
        .arg(pid.to_string())
        .status()
        .map_err(|e| anyhow!("failed to run kill: {}", e))?;
    Ok(status.success())
}
