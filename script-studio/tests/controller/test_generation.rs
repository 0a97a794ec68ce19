//! Generation jobs end to end against a scripted stream

use super::common::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

use script_studio::store::LocalSessionStore;
use script_studio::{ControllerError, Failure, JobOutcome, Phase};
use studio_client::{GenerationRequest, ScriptMode};

fn full_job() -> Vec<u8> {
    ndjson(&[
        status("Agent starting (informational)..."),
        json!({"type": "research", "data": "- Fact one\n- Fact two\nshort\n1. 2. 3."}),
        json!({"type": "sources", "data": ["https://example.com/a", "https://example.com/b"]}),
        json!({"type": "research", "data": "- Fact two\n- Fact three"}),
        json!({"type": "analysis", "data": "Two strong angles"}),
        json!({"type": "hook_ranking", "data": {"ranking": [2, 1], "best": 2}}),
        json!({"type": "angles", "data": [{"name": "Money", "focus": "costs"}, {"name": "Drama", "hook_style": "shock"}]}),
        json!({"type": "script_complete", "index": 1, "angle_name": "Money"}),
        json!({"type": "script_complete", "index": 2, "angle_name": "Drama"}),
        json!({"type": "result", "data": {"scripts": ["S1", "S2"], "combined": "S1\n\nS2"}}),
    ])
}

#[tokio::test]
async fn test_full_job_completes_and_saves() {
    let h = harness(vec![Response::body(full_job())]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("ChatGPT 5 launch").with_mode(ScriptMode::Listical))
        .await
        .unwrap();

    let JobOutcome::Completed { variants, session } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(variants, 2);
    let session = session.unwrap();
    assert!(session.is_local());

    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.status, "Complete!");
    assert_eq!(state.facts.as_slice(), ["Fact one", "Fact two", "Fact three"]);
    assert_eq!(state.sources.len(), 2);
    assert_eq!(state.analysis.as_deref(), Some("Two strong angles"));
    assert_eq!(state.hook_ranking.as_ref().map(|r| r.best), Some(2));
    assert_eq!(state.scripts, vec!["S1".to_string(), "S2".to_string()]);
    assert_eq!(state.final_script, "S1\n\nS2");
    assert_eq!(state.active_variant, 0);
    assert_eq!(state.current_session, Some(session.clone()));
    assert_eq!(state.chat_history().len(), 2);

    let stored = h.local.get(&session).unwrap().unwrap();
    assert_eq!(stored.mode, ScriptMode::Listical);
    assert_eq!(stored.research, "Fact one\nFact two\nFact three");
    assert_eq!(stored.variants[1].angle.hook_style.as_deref(), Some("shock"));
}

#[tokio::test]
async fn test_chunk_boundaries_do_not_matter() {
    for size in [1, 3, 7, 64] {
        let h = harness(vec![Response::split(full_job(), size)]);
        h.controller
            .submit(GenerationRequest::new("ChatGPT 5 launch"))
            .await
            .unwrap();

        let state = h.controller.snapshot().await;
        assert_eq!(state.facts.len(), 3, "chunk size {size}");
        assert_eq!(state.scripts.len(), 2, "chunk size {size}");
    }
}

#[tokio::test]
async fn test_malformed_and_unknown_records_are_skipped() {
    let mut body = ndjson(&[status("one")]);
    body.extend_from_slice(b"{\"type\":\"status\"\n");
    body.extend_from_slice(b"{\"type\":\"heartbeat\",\"n\":1}\n");
    body.extend(ndjson(&[result(&["S1"])]));
    let h = harness(vec![Response::body(body)]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::Completed { variants: 1, .. }));
    let state = h.controller.snapshot().await;
    assert_eq!(state.dropped_records, 1);
    assert_eq!(state.scripts, vec!["S1".to_string()]);
}

#[tokio::test]
async fn test_unterminated_tail_is_flushed() {
    let mut body = ndjson(&[status("writing")]);
    body.extend_from_slice(json!({"type": "result", "data": "Only script"}).to_string().as_bytes());
    let h = harness(vec![Response::body(body)]);

    h.controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    let state = h.controller.snapshot().await;
    assert_eq!(state.scripts, vec!["Only script".to_string()]);
    assert_eq!(state.final_script, "Only script");
}

#[tokio::test]
async fn test_stream_end_without_terminal_completes() {
    let h = harness(vec![Response::body(ndjson(&[
        status("Agent starting (informational)..."),
        json!({"type": "research", "data": "- A fact worth keeping"}),
    ]))]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Completed {
            variants: 0,
            session: None
        }
    );
    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.facts.len(), 1);
    assert!(h.local.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_error_event_fails_job() {
    let h = harness(vec![Response::body(ndjson(&[
        status("Researching..."),
        json!({"type": "error", "message": "quota exceeded"}),
        result(&["never applied"]),
    ]))]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Failed("quota exceeded".into()));
    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.status, "Error: quota exceeded");
    assert_eq!(state.failure, Some(Failure::Backend("quota exceeded".into())));
    assert!(state.scripts.is_empty());
}

#[tokio::test]
async fn test_refused_connection() {
    let h = harness(vec![Response::refused()]);

    let result = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await;

    assert!(matches!(result, Err(ControllerError::Transport(_))));
    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.status, "Connection Failed");
    assert!(matches!(state.failure, Some(Failure::Transport(_))));
}

#[tokio::test]
async fn test_stream_broken_midway() {
    let h = harness(vec![Response::broken(
        ndjson(&[json!({"type": "research", "data": "- Fact one\n- Fact two"})]),
        "connection reset by peer",
    )]);

    let result = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await;

    assert!(matches!(result, Err(ControllerError::Transport(_))));
    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.status, "Connection Failed");
    assert_eq!(state.facts.len(), 2);
}

#[tokio::test]
async fn test_empty_topic_is_rejected_before_sending() {
    let h = harness(vec![]);

    let result = h.controller.submit(GenerationRequest::new("  ")).await;

    assert!(matches!(result, Err(ControllerError::InvalidRequest(_))));
    assert!(h.generator.requests().is_empty());
    assert_eq!(h.controller.phase().await, Phase::Idle);
}

#[tokio::test]
async fn test_new_submission_supersedes_running_job() {
    let gate = Arc::new(Notify::new());
    let h = harness(vec![
        Response::stalled(
            ndjson(&[status("job A running")]),
            gate.clone(),
            ndjson(&[
                json!({"type": "research", "data": "- Stale fact from A"}),
                result(&["A1"]),
            ]),
        ),
        Response::body(ndjson(&[status("job B running"), result(&["B1", "B2"])])),
    ]);

    let mut updates = h.controller.subscribe();
    let controller = h.controller.clone();
    let job_a =
        tokio::spawn(async move { controller.submit(GenerationRequest::new("Topic A")).await });
    wait_for_status(&mut updates, "job A running").await;

    let outcome_b = h
        .controller
        .submit(GenerationRequest::new("Topic B"))
        .await
        .unwrap();
    assert!(matches!(outcome_b, JobOutcome::Completed { variants: 2, .. }));

    gate.notify_one();
    let outcome_a = job_a.await.unwrap().unwrap();
    assert_eq!(outcome_a, JobOutcome::Superseded);

    let state = h.controller.snapshot().await;
    assert_eq!(state.topic, "Topic B");
    assert_eq!(state.scripts, vec!["B1".to_string(), "B2".to_string()]);
    assert!(state.facts.is_empty());
    assert_eq!(h.local.list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_abandon_ignores_remaining_output() {
    let gate = Arc::new(Notify::new());
    let h = harness(vec![Response::stalled(
        ndjson(&[status("working")]),
        gate.clone(),
        ndjson(&[result(&["late"])]),
    )]);

    let mut updates = h.controller.subscribe();
    let controller = h.controller.clone();
    let job =
        tokio::spawn(async move { controller.submit(GenerationRequest::new("Topic")).await });
    wait_for_status(&mut updates, "working").await;

    h.controller.abandon().await;
    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.status, "Cancelled");

    gate.notify_one();
    assert_eq!(job.await.unwrap().unwrap(), JobOutcome::Superseded);
    assert!(h.controller.snapshot().await.scripts.is_empty());
}

#[tokio::test]
async fn test_progress_updates_follow_phases() {
    let h = harness(vec![Response::body(full_job())]);
    let mut updates = h.controller.subscribe();

    h.controller
        .submit(GenerationRequest::new("ChatGPT 5 launch"))
        .await
        .unwrap();

    let mut phases = Vec::new();
    while let Ok(update) = updates.try_recv() {
        if phases.last() != Some(&update.phase) {
            phases.push(update.phase);
        }
    }
    assert_eq!(
        phases,
        [
            Phase::Initializing,
            Phase::Researching,
            Phase::Drafting,
            Phase::Complete
        ]
    );
}

#[tokio::test]
async fn test_variant_selector_is_bounded() {
    let h = harness(vec![Response::body(ndjson(&[result(&["S1", "S2"])]))]);
    h.controller
        .submit(GenerationRequest::new("Topic"))
        .await
        .unwrap();

    h.controller.set_active_variant(1).await.unwrap();
    assert!(matches!(
        h.controller.set_active_variant(2).await,
        Err(ControllerError::NoSuchVariant(2))
    ));
    assert_eq!(h.controller.snapshot().await.active_variant, 1);
}
