// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST routing. Components return typed errors; this is the only place
//! they are formatted into HTTP statuses and `{error}` bodies.

use std::sync::Arc;

use serde_json::json;

use sx_core::{SessionId, WorkspaceId};

use crate::lore::{LoreError, Proposal};
use crate::protocol::{
    build_sessions_message, ApiError, BranchConflictResponse, GitActionRequest, HealthResponse,
    ProposalSummary, PushBranchRequest, RenameRequest, SpawnRequest, SpawnResponse,
};
use crate::session::SpawnError;
use crate::workspace::GraphOptions;

use super::http::HttpRequest;
use super::Ctx;

type Reply = (u16, serde_json::Value);

fn ok(body: serde_json::Value) -> Reply {
    (200, body)
}

fn err(e: ApiError) -> Reply {
    (e.status, e.body())
}

pub(super) async fn dispatch(ctx: &Arc<Ctx>, req: &HttpRequest) -> Reply {
    let segments: Vec<&str> = req.path.trim_matches('/').split('/').collect();

    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["api", "health"]) => health(ctx),
        ("GET", ["api", "sessions"]) => ok(
            serde_json::to_value(build_sessions_message(&ctx.store.snapshot()))
                .unwrap_or_default(),
        ),
        ("POST", ["api", "spawn"]) => spawn(ctx, req).await,
        ("POST", ["api", "sessions", id, "dispose"]) => dispose_session(ctx, id).await,
        ("POST", ["api", "sessions", id, "rename"]) => rename_session(ctx, id, req),
        ("POST", ["api", "sessions", id, "clear-nudge"]) => clear_nudge(ctx, id),
        ("POST", ["api", "workspaces", id, "dispose"]) => dispose_workspace(ctx, id, req).await,
        ("POST", ["api", "workspaces", id, "refresh-overlay"]) => refresh_overlay(ctx, id).await,
        ("GET", ["api", "workspaces", id, "diff"]) => diff(ctx, id).await,
        ("GET", ["api", "workspaces", id, "git-graph"]) => git_graph(ctx, id, req).await,
        ("POST", ["api", "workspaces", id, "git"]) => git_action(ctx, id, req).await,
        ("POST", ["api", "workspaces", id, "linear-sync-from-main"]) => {
            linear_sync_from_main(ctx, id).await
        }
        ("POST", ["api", "workspaces", id, "linear-sync-to-main"]) => {
            linear_sync_to_main(ctx, id).await
        }
        ("POST", ["api", "workspaces", id, "push-branch"]) => push_branch(ctx, id, req).await,
        ("POST", ["api", "check-branch-conflict"]) => check_branch_conflict(ctx, req),
        ("GET", ["api", "lore", "proposals"]) => list_proposals(ctx, req),
        ("POST", ["api", "lore", "curate"]) => curate(ctx, req).await,
        ("POST", ["api", "lore", "proposals", repo, id, "apply"]) => {
            apply_proposal(ctx, repo, id).await
        }
        ("POST", ["api", "lore", "proposals", repo, id, "dismiss"]) => {
            dismiss_proposal(ctx, repo, id).await
        }
        ("POST", ["api", "shutdown"]) => shutdown(ctx, false),
        ("POST", ["api", "restart"]) => shutdown(ctx, true),
        ("GET", _) | ("POST", _) => err(ApiError::not_found(format!("no route: {}", req.path))),
        _ => (405, json!({"error": "method not allowed"})),
    }
}

fn health(ctx: &Arc<Ctx>) -> Reply {
    let state = ctx.store.snapshot();
    let body = HealthResponse {
        status: "ok".to_string(),
        version: crate::env::VERSION.to_string(),
        uptime_s: ctx.uptime_s(),
        sessions: state.sessions.len(),
        workspaces: state.workspaces.len(),
        save_failures: ctx.store.save_failures(),
    };
    ok(serde_json::to_value(body).unwrap_or_default())
}

async fn spawn(ctx: &Arc<Ctx>, req: &HttpRequest) -> Reply {
    let request: SpawnRequest = match req.json() {
        Ok(r) => r,
        Err(e) => return err(ApiError::bad_request(format!("invalid spawn request: {}", e))),
    };
    match ctx.sessions.spawn(&request).await {
        Ok(results) => {
            ok(serde_json::to_value(SpawnResponse { results }).unwrap_or_default())
        }
        Err(e) => err(spawn_error(e)),
    }
}

fn spawn_error(e: SpawnError) -> ApiError {
    match e {
        SpawnError::Validation(_) | SpawnError::UnknownTarget(_) => {
            ApiError::bad_request(e.to_string())
        }
        SpawnError::NicknameTaken(_) => ApiError::conflict(e.to_string()),
        SpawnError::Workspace(inner) => inner.into(),
        SpawnError::Mux(_) | SpawnError::Io(..) | SpawnError::SignalEngineDown => {
            ApiError::internal(e.to_string())
        }
    }
}

async fn dispose_session(ctx: &Arc<Ctx>, id: &str) -> Reply {
    match ctx.sessions.dispose(&SessionId::new(id)).await {
        Ok(()) => ok(json!({"disposed": id})),
        Err(SpawnError::Validation(message)) => err(ApiError::not_found(message)),
        Err(e) => err(spawn_error(e)),
    }
}

fn rename_session(ctx: &Arc<Ctx>, id: &str, req: &HttpRequest) -> Reply {
    let body: RenameRequest = match req.json() {
        Ok(r) => r,
        Err(e) => return err(ApiError::bad_request(format!("invalid rename request: {}", e))),
    };
    match ctx.sessions.rename(&SessionId::new(id), &body.nickname) {
        Ok(()) => ok(json!({"renamed": id})),
        Err(SpawnError::Validation(message)) => err(ApiError::not_found(message)),
        Err(e) => err(spawn_error(e)),
    }
}

fn clear_nudge(ctx: &Arc<Ctx>, id: &str) -> Reply {
    let session_id = SessionId::new(id);
    if ctx.store.session(&session_id).is_none() {
        return err(ApiError::not_found(format!("session not found: {}", id)));
    }
    let cleared = ctx.store.clear_session_nudge(&session_id);
    if cleared {
        ctx.broadcaster.schedule();
    }
    ok(json!({"cleared": cleared}))
}

async fn dispose_workspace(ctx: &Arc<Ctx>, id: &str, req: &HttpRequest) -> Reply {
    #[derive(serde::Deserialize, Default)]
    struct Body {
        #[serde(default)]
        dispose_sessions: bool,
        #[serde(default)]
        force: bool,
    }
    let body: Body = if req.body.is_empty() {
        Body::default()
    } else {
        match req.json() {
            Ok(b) => b,
            Err(e) => return err(ApiError::bad_request(format!("invalid body: {}", e))),
        }
    };

    let workspace_id = WorkspaceId::new(id);
    if body.dispose_sessions {
        if let Err(e) = ctx.sessions.dispose_all_in(&workspace_id).await {
            return err(spawn_error(e));
        }
    }
    match ctx.workspaces.dispose(&workspace_id, body.force).await {
        Ok(()) => {
            ctx.broadcaster.broadcast_now();
            ok(json!({"disposed": id}))
        }
        Err(e) => err(e.into()),
    }
}

async fn refresh_overlay(ctx: &Arc<Ctx>, id: &str) -> Reply {
    match ctx.workspaces.refresh_overlay(&WorkspaceId::new(id)).await {
        Ok(report) => ok(json!({
            "applied": report.applied,
            "warnings": report.warnings,
        })),
        Err(e) => err(e.into()),
    }
}

async fn diff(ctx: &Arc<Ctx>, id: &str) -> Reply {
    match ctx.workspaces.diff(&WorkspaceId::new(id)).await {
        Ok(diff) => ok(json!({"diff": diff})),
        Err(e) => err(e.into()),
    }
}

async fn git_graph(ctx: &Arc<Ctx>, id: &str, req: &HttpRequest) -> Reply {
    let defaults = GraphOptions::default();
    let opts = GraphOptions {
        max_total: req
            .query_param("max_total")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_total),
        main_context: req
            .query_param("main_context")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.main_context),
    };
    match ctx.workspaces.git_graph(&WorkspaceId::new(id), opts).await {
        Ok(graph) => ok(serde_json::to_value(graph).unwrap_or_default()),
        Err(e) => err(e.into()),
    }
}

async fn git_action(ctx: &Arc<Ctx>, id: &str, req: &HttpRequest) -> Reply {
    let body: GitActionRequest = match req.json() {
        Ok(b) => b,
        Err(e) => return err(ApiError::bad_request(format!("invalid git action: {}", e))),
    };
    let workspace_id = WorkspaceId::new(id);
    let result = match body.op.as_str() {
        "stage" => ctx.workspaces.stage(&workspace_id, &body.files).await,
        "amend" => ctx.workspaces.amend(&workspace_id, &body.files, body.message.as_deref()).await,
        "discard" => ctx.workspaces.discard(&workspace_id, &body.files).await,
        "uncommit" => ctx.workspaces.uncommit(&workspace_id).await,
        other => return err(ApiError::bad_request(format!("unknown git op: {}", other))),
    };
    match result {
        Ok(()) => {
            ctx.broadcaster.schedule();
            ok(json!({"op": body.op, "workspace_id": id}))
        }
        Err(e) => err(e.into()),
    }
}

async fn linear_sync_from_main(ctx: &Arc<Ctx>, id: &str) -> Reply {
    let workspace_id = WorkspaceId::new(id);
    let broadcaster = Arc::clone(&ctx.broadcaster);
    let ws_for_frames = id.to_string();
    let progress = move |step: usize, total: usize, subject: &str| {
        broadcaster.send_frame(&json!({
            "type": "linear_sync_progress",
            "workspace_id": ws_for_frames,
            "step": step,
            "total": total,
            "subject": subject,
        }));
    };

    match ctx.workspaces.linear_sync_from_main(&workspace_id, &progress).await {
        Ok(outcome) => {
            if let Some(conflict) = &outcome.conflict {
                ctx.broadcaster.send_frame(&json!({
                    "type": "linear_sync_resolve_conflict",
                    "workspace_id": id,
                    "commit": conflict.commit,
                    "subject": conflict.subject,
                    "files": conflict.files,
                }));
            }
            ctx.broadcaster.schedule();
            ok(serde_json::to_value(outcome).unwrap_or_default())
        }
        Err(e) => err(e.into()),
    }
}

async fn linear_sync_to_main(ctx: &Arc<Ctx>, id: &str) -> Reply {
    match ctx.workspaces.linear_sync_to_main(&WorkspaceId::new(id)).await {
        Ok(outcome) => {
            ctx.broadcaster.schedule();
            ok(serde_json::to_value(outcome).unwrap_or_default())
        }
        Err(e) => err(e.into()),
    }
}

async fn push_branch(ctx: &Arc<Ctx>, id: &str, req: &HttpRequest) -> Reply {
    let body: PushBranchRequest = match req.json() {
        Ok(b) => b,
        Err(e) => return err(ApiError::bad_request(format!("invalid push request: {}", e))),
    };
    match ctx.workspaces.push_to_branch(&WorkspaceId::new(id), &body.branch).await {
        Ok(()) => ok(json!({"pushed": body.branch})),
        Err(e) => err(e.into()),
    }
}

fn check_branch_conflict(ctx: &Arc<Ctx>, req: &HttpRequest) -> Reply {
    #[derive(serde::Deserialize)]
    struct Body {
        repo: String,
        branch: String,
    }
    let body: Body = match req.json() {
        Ok(b) => b,
        Err(e) => return err(ApiError::bad_request(format!("invalid body: {}", e))),
    };
    let occupant = ctx.workspaces.check_branch_conflict(&body.repo, &body.branch);
    let response = BranchConflictResponse {
        conflict: occupant.is_some(),
        workspace_id: occupant.map(|id| id.to_string()),
    };
    ok(serde_json::to_value(response).unwrap_or_default())
}

fn list_proposals(ctx: &Arc<Ctx>, req: &HttpRequest) -> Reply {
    let Some(repo) = req.query_param("repo") else {
        return err(ApiError::bad_request("repo query parameter is required"));
    };
    let proposals: Vec<ProposalSummary> = Proposal::list(&ctx.paths, repo)
        .into_iter()
        .map(|p| ProposalSummary {
            id: p.id.to_string(),
            repo: p.repo.clone(),
            status: p.status.to_string(),
            created_at: p.created_at,
            diff_summary: p.diff_summary.clone(),
            files: p.proposed_files.keys().cloned().collect(),
        })
        .collect();
    ok(json!({"proposals": proposals}))
}

async fn curate(ctx: &Arc<Ctx>, req: &HttpRequest) -> Reply {
    #[derive(serde::Deserialize)]
    struct Body {
        repo: String,
    }
    let body: Body = match req.json() {
        Ok(b) => b,
        Err(e) => return err(ApiError::bad_request(format!("invalid body: {}", e))),
    };
    match ctx.curator.curate(&body.repo).await {
        Ok(Some(proposal)) => ok(json!({"proposal_id": proposal.id.to_string()})),
        Ok(None) => ok(json!({"proposal_id": null})),
        Err(e) => err(lore_error(e)),
    }
}

async fn apply_proposal(ctx: &Arc<Ctx>, repo: &str, id: &str) -> Reply {
    match ctx.curator.apply(repo, id).await {
        Ok(proposal) => ok(json!({"applied": proposal.id.to_string()})),
        Err(e) => err(lore_error(e)),
    }
}

async fn dismiss_proposal(ctx: &Arc<Ctx>, repo: &str, id: &str) -> Reply {
    match ctx.curator.dismiss(repo, id).await {
        Ok(proposal) => ok(json!({"dismissed": proposal.id.to_string()})),
        Err(e) => err(lore_error(e)),
    }
}

fn lore_error(e: LoreError) -> ApiError {
    match &e {
        LoreError::Stale => ApiError { status: 409, message: "stale".to_string() },
        LoreError::NotFound(_) => ApiError::not_found(e.to_string()),
        LoreError::NotPending(_) => ApiError::conflict(e.to_string()),
        LoreError::NoLlm | LoreError::BadReply(_) => ApiError::bad_request(e.to_string()),
        LoreError::Llm(_) | LoreError::Git { .. } | LoreError::Io(..) => {
            ApiError::internal(e.to_string())
        }
    }
}

fn shutdown(ctx: &Arc<Ctx>, restart: bool) -> Reply {
    if restart {
        ctx.restart_requested.store(true, std::sync::atomic::Ordering::SeqCst);
    }
    // Respond first; the accept loop and main task notice on the next poll.
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        ctx.shutdown.cancel();
    });
    ok(json!({"stopping": true, "restart": restart}))
}
