// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extract_bare_json() {
    let value = extract_json(r#"{"state": "completed"}"#).unwrap();
    assert_eq!(value["state"], "completed");
}

#[test]
fn extract_fenced_json() {
    let reply = "Here is my classification:\n```json\n{\"state\": \"error\", \"confidence\": 0.9}\n```\nDone.";
    let value = extract_json(reply).unwrap();
    assert_eq!(value["state"], "error");
    assert_eq!(value["confidence"], 0.9);
}

#[test]
fn extract_json_with_leading_prose() {
    let value = extract_json("Sure! {\"summary\": \"waiting\"} hope that helps").unwrap();
    assert_eq!(value["summary"], "waiting");
}

#[test]
fn extract_rejects_no_json() {
    assert!(matches!(extract_json("no json here at all"), Err(LlmError::BadReply(_))));
}

#[test]
fn extract_rejects_unbalanced() {
    assert!(matches!(extract_json("} {"), Err(LlmError::BadReply(_))));
}

#[tokio::test]
async fn fake_client_scripts_replies() {
    let fake = FakeLlmClient::new();
    fake.push_reply("{\"ok\": true}");
    fake.push_error("boom");

    assert_eq!(fake.complete("first").await.unwrap(), "{\"ok\": true}");
    assert!(fake.complete("second").await.is_err());
    assert_eq!(*fake.prompts.lock(), vec!["first".to_string(), "second".to_string()]);
}

#[tokio::test]
async fn command_client_captures_stdout() {
    let client = CommandLlmClient::new("printf '%s'");
    let reply = client.complete("{\"echo\":1}").await.unwrap();
    assert_eq!(reply, "{\"echo\":1}");
}
