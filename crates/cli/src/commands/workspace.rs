// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `schmux refresh-overlay` — workspace commands.

use anyhow::Result;

use crate::client::DaemonClient;

pub async fn refresh_overlay(workspace_id: &str) -> Result<()> {
    let client = DaemonClient::from_env()?;
    let response = client
        .post(
            &format!("/api/workspaces/{}/refresh-overlay", workspace_id),
            &serde_json::json!({}),
        )
        .await?;

    let applied = response["applied"].as_array().map(Vec::len).unwrap_or(0);
    println!("Applied {} overlay file(s) into {}", applied, workspace_id);
    if let Some(warnings) = response["warnings"].as_array() {
        for warning in warnings {
            eprintln!("warning: {}", warning.as_str().unwrap_or("?"));
        }
    }
    Ok(())
}
