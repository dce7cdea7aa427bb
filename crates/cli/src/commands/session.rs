// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `schmux spawn|list|attach|dispose` — session commands.

use anyhow::{anyhow, Result};

use sx_daemon::SessionsMessage;

use crate::client::DaemonClient;

#[allow(clippy::too_many_arguments)]
pub async fn spawn(
    target: String,
    repo: Option<String>,
    branch: Option<String>,
    workspace: Option<String>,
    nickname: Option<String>,
    prompt: Option<String>,
    count: u32,
    resume: bool,
) -> Result<()> {
    let client = DaemonClient::from_env()?;
    let body = serde_json::json!({
        "repo": repo,
        "branch": branch,
        "workspace_id": workspace,
        "nickname": nickname,
        "prompt": prompt,
        "targets": { target: count },
        "resume": resume,
    });
    let response = client.post("/api/spawn", &body).await?;

    let results = response["results"].as_array().cloned().unwrap_or_default();
    for result in &results {
        println!(
            "{}  {}  {}",
            result["session_id"].as_str().unwrap_or("?"),
            result["workspace_id"].as_str().unwrap_or("?"),
            result["target"].as_str().unwrap_or("?"),
        );
    }
    if results.is_empty() {
        println!("No sessions spawned");
    }
    Ok(())
}

pub async fn list(json: bool) -> Result<()> {
    let client = DaemonClient::from_env()?;
    let response = client.get("/api/sessions").await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let message: SessionsMessage = serde_json::from_value(response)?;
    if message.workspaces.is_empty() {
        println!("No workspaces");
        return Ok(());
    }
    for workspace in &message.workspaces {
        let fp = &workspace.fingerprint;
        println!(
            "{}  {}@{}  {} file(s) changed, +{} -{}, ahead {} behind {}",
            workspace.id,
            workspace.repo,
            workspace.branch,
            fp.files_changed,
            fp.lines_added,
            fp.lines_removed,
            fp.ahead,
            fp.behind,
        );
        for session in &workspace.sessions {
            let state = if session.running { "running" } else { "done" };
            let nudge = session
                .nudge
                .as_ref()
                .map(|n| format!("  [{}]", n.state))
                .unwrap_or_default();
            let name = session.nickname.as_deref().unwrap_or(&session.target);
            println!("  {}  {}  {}{}", session.id, name, state, nudge);
        }
    }
    Ok(())
}

pub async fn attach(session_id: &str) -> Result<()> {
    let client = DaemonClient::from_env()?;
    let response = client.get("/api/sessions").await?;
    let message: SessionsMessage = serde_json::from_value(response)?;

    let matches: Vec<&str> = message
        .workspaces
        .iter()
        .flat_map(|w| w.sessions.iter())
        .filter(|s| s.id.starts_with(session_id))
        .map(|s| s.window_id.as_str())
        .collect();

    let window_id = match matches.as_slice() {
        [] => return Err(anyhow!("no session matches {}", session_id)),
        [one] => one.to_string(),
        _ => return Err(anyhow!("{} matches multiple sessions", session_id)),
    };

    let select = std::process::Command::new("tmux")
        .args(["select-window", "-t", &window_id])
        .status()
        .map_err(|e| anyhow!("failed to run tmux: {}", e))?;
    if !select.success() {
        return Err(anyhow!("tmux could not select window {}", window_id));
    }
    let status = std::process::Command::new("tmux")
        .args(["attach-session", "-t", "schmux"])
        .status()
        .map_err(|e| anyhow!("failed to run tmux: {}", e))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("tmux attach failed"))
    }
}

pub async fn dispose(session_id: &str) -> Result<()> {
    let client = DaemonClient::from_env()?;
    client
        .post(&format!("/api/sessions/{}/dispose", session_id), &serde_json::json!({}))
        .await?;
    println!("Disposed {}", session_id);
    Ok(())
}
