// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::llm::FakeLlmClient;
use crate::mux::FakeMux;
use chrono::Utc;
use sx_core::{FakeClock, Nudge, NudgeSource, Session, SessionId, SessionStatus, WorkspaceId};

fn session(id: &str) -> Session {
    Session {
        id: SessionId::new(id),
        target: "claude".to_string(),
        nickname: None,
        workspace_id: WorkspaceId::new("demo-001"),
        window_id: "@1".to_string(),
        pane_id: "%1".to_string(),
        created_at: Utc::now(),
        last_output_at: Utc::now(),
        last_signal_at: None,
        nudge: None,
        nudge_seq: 0,
        status: SessionStatus::Running,
        remote_host_id: None,
    }
}

mod eligibility {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn stalled_silent_running_session_is_eligible() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(60);
        assert!(eligible(&s, now));
    }

    #[test]
    fn fresh_output_is_not_eligible() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(5);
        assert!(!eligible(&s, now));
    }

    #[test]
    fn ancient_output_is_not_eligible() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::hours(2);
        assert!(!eligible(&s, now));
    }

    #[test]
    fn existing_nudge_suppresses() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(60);
        s.nudge = Some(Nudge::from_agent("Completed", "done"));
        assert!(!eligible(&s, now));
    }

    #[test]
    fn recent_signal_suppresses() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(60);
        s.last_signal_at = Some(now - ChronoDuration::seconds(60));
        assert!(!eligible(&s, now));
    }

    #[test]
    fn old_signal_does_not_suppress() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(60);
        s.last_signal_at = Some(now - ChronoDuration::minutes(10));
        assert!(eligible(&s, now));
    }

    #[test]
    fn done_session_is_not_eligible() {
        let now = Utc::now();
        let mut s = session("s1");
        s.last_output_at = now - ChronoDuration::seconds(60);
        s.status = SessionStatus::Done;
        assert!(!eligible(&s, now));
    }
}

mod turns {
    use super::*;

    #[test]
    fn latest_turn_takes_last_paragraph() {
        let capture = "old output\nmore old\n\nrecent question?\n> _\n";
        assert_eq!(latest_turn(capture), "recent question?\n> _");
    }

    #[test]
    fn latest_turn_whole_text_without_boundary() {
        assert_eq!(latest_turn("single block\nof text\n"), "single block\nof text");
    }

    #[test]
    fn latest_turn_ignores_trailing_blanks() {
        assert_eq!(latest_turn("a\n\nb\n\n\n\n"), "b");
    }
}

mod classification {
    use super::*;

    #[test]
    fn valid_reply_parses() {
        let nudge = parse_classification(
            r#"{"state": "needs_input", "confidence": 0.8, "evidence": ["Allow? (y/n)"], "summary": "permission prompt"}"#,
        )
        .unwrap();
        assert_eq!(nudge.state, "Needs Authorization");
        assert_eq!(nudge.source, NudgeSource::Llm);
        assert_eq!(nudge.confidence, Some(0.8));
        assert_eq!(nudge.evidence, vec!["Allow? (y/n)"]);
    }

    #[test]
    fn working_reply_discarded() {
        assert!(parse_classification(r#"{"state": "working", "confidence": 0.9}"#).is_none());
    }

    #[test]
    fn unknown_state_discarded() {
        assert!(parse_classification(r#"{"state": "confused"}"#).is_none());
    }

    #[test]
    fn non_json_discarded() {
        assert!(parse_classification("I think it finished").is_none());
    }

    #[test]
    fn fenced_reply_parses() {
        let nudge = parse_classification(
            "```json\n{\"state\": \"error\", \"confidence\": 0.7, \"summary\": \"stack trace\"}\n```",
        )
        .unwrap();
        assert_eq!(nudge.state, "Error");
    }
}

mod sweeping {
    use super::*;
    use crate::server::ws::Broadcaster;
    use crate::storage::StateStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    fn fixture(
        clock: FakeClock,
    ) -> (tempfile::TempDir, Arc<StateStore>, Arc<FakeMux>, Arc<FakeLlmClient>, Arc<NudgeNik<FakeClock>>)
    {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json"));
        let broadcaster = Broadcaster::new(Arc::clone(&store));
        let mux = FakeMux::new();
        let llm = FakeLlmClient::new();
        let nik = NudgeNik::new(Arc::clone(&store), mux.clone(), llm.clone(), broadcaster, clock);
        (dir, store, mux, llm, nik)
    }

    fn stalled_session(id: &str, clock: &FakeClock) -> Session {
        let mut s = session(id);
        s.last_output_at = clock.now_utc() - ChronoDuration::seconds(60);
        s
    }

    #[tokio::test]
    async fn sweep_classifies_and_stores_llm_nudge() {
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_700_000_000_000);
        let (_dir, store, mux, llm, nik) = fixture(clock.clone());

        store.insert_session(stalled_session("s1", &clock));
        mux.set_capture("scrollback\n\nDo you want to proceed? (y/n)\n");
        llm.push_reply(
            r#"{"state": "needs_input", "confidence": 0.9, "evidence": ["(y/n)"], "summary": "waiting on confirmation"}"#,
        );

        nik.sweep().await;

        let read = store.session(&SessionId::new("s1")).unwrap();
        let nudge = read.nudge.unwrap();
        assert_eq!(nudge.source, NudgeSource::Llm);
        assert_eq!(nudge.state, "Needs Authorization");
        // The fallback path never advances the notification counter.
        assert_eq!(read.nudge_seq, 0);
        // The classifier saw the latest turn, not the scrollback.
        let prompt = llm.prompts.lock()[0].clone();
        assert!(prompt.contains("Do you want to proceed?"));
        assert!(!prompt.contains("scrollback"));
    }

    #[tokio::test]
    async fn sweep_rate_limits_per_session() {
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_700_000_000_000);
        let (_dir, store, mux, llm, nik) = fixture(clock.clone());

        store.insert_session(stalled_session("s1", &clock));
        mux.set_capture("prompt?\n");
        llm.push_reply(r#"{"state": "completed", "summary": "done"}"#);

        nik.sweep().await;
        // Clear the stored nudge so eligibility would otherwise pass again.
        store.clear_session_nudge(&SessionId::new("s1"));
        nik.sweep().await;
        assert_eq!(llm.prompts.lock().len(), 1, "second sweep must be rate-limited");

        // After the rate-limit window the session is classified again.
        clock.advance(std::time::Duration::from_secs(6 * 60));
        store.update_session_last_output(
            &SessionId::new("s1"),
            clock.now_utc() - ChronoDuration::seconds(60),
        );
        llm.push_reply(r#"{"state": "completed", "summary": "done"}"#);
        nik.sweep().await;
        assert_eq!(llm.prompts.lock().len(), 2);
    }

    #[tokio::test]
    async fn bad_reply_stores_nothing() {
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_700_000_000_000);
        let (_dir, store, mux, llm, nik) = fixture(clock.clone());

        store.insert_session(stalled_session("s1", &clock));
        mux.set_capture("???\n");
        llm.push_reply("total nonsense");

        nik.sweep().await;
        assert!(store.session(&SessionId::new("s1")).unwrap().nudge.is_none());
    }
}
