// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

async fn parse(raw: &str) -> Result<HttpRequest, HttpError> {
    let mut reader = BufReader::new(raw.as_bytes());
    read_request(&mut reader).await
}

#[tokio::test]
async fn parses_get_with_query() {
    let req = parse("GET /api/workspaces/demo-001/git-graph?max_total=10&main_context=3 HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/api/workspaces/demo-001/git-graph");
    assert_eq!(req.query_param("max_total"), Some("10"));
    assert_eq!(req.query_param("main_context"), Some("3"));
    assert_eq!(req.query_param("missing"), None);
}

#[tokio::test]
async fn parses_post_body() {
    let body = r#"{"repo":"demo","branch":"main"}"#;
    let raw = format!(
        "POST /api/spawn HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let req = parse(&raw).await.unwrap();
    assert_eq!(req.method, "POST");
    let parsed: serde_json::Value = req.json().unwrap();
    assert_eq!(parsed["repo"], "demo");
}

#[tokio::test]
async fn headers_are_case_insensitive() {
    let req = parse("GET /ws/dashboard HTTP/1.1\r\nUPGRADE: WebSocket\r\nSec-WebSocket-Key: abc\r\n\r\n")
        .await
        .unwrap();
    assert!(req.is_ws_upgrade());
    assert_eq!(req.header("sec-websocket-key"), Some("abc"));
}

#[tokio::test]
async fn rejects_empty_request() {
    assert!(matches!(parse("").await, Err(HttpError::Malformed(_))));
}

#[tokio::test]
async fn rejects_oversized_body() {
    let raw = format!("POST /api/spawn HTTP/1.1\r\nContent-Length: {}\r\n\r\n", 10 * 1024 * 1024);
    assert!(matches!(parse(&raw).await, Err(HttpError::BodyTooLarge)));
}

#[tokio::test]
async fn write_json_frames_content_length() {
    let mut out = Vec::new();
    write_json(&mut out, 200, &serde_json::json!({"status": "ok"})).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    let body = text.split("\r\n\r\n").nth(1).unwrap();
    assert_eq!(body, r#"{"status":"ok"}"#);
    assert!(text.contains(&format!("Content-Length: {}", body.len())));
}

#[tokio::test]
async fn write_error_status_line() {
    let mut out = Vec::new();
    write_json(&mut out, 409, &serde_json::json!({"error": "conflict"})).await.unwrap();
    assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 409 Conflict\r\n"));
}
