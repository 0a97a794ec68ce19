//! Clarification round trips

use super::common::*;
use serde_json::json;

use script_studio::{ControllerError, JobOutcome, Phase};
use studio_client::{Attachment, GenerationRequest, NeedsInputKind, ScriptMode};

fn apple_question() -> Vec<u8> {
    ndjson(&[
        status("Checking topic..."),
        json!({"type": "research", "data": "- Apple sells phones and computers"}),
        json!({
            "type": "needs_input",
            "kind": "clarification",
            "message": "Which Apple do you mean?",
            "options": ["Apple Inc. (company)", "Apple (fruit)"]
        }),
    ])
}

fn apple_request() -> GenerationRequest {
    GenerationRequest::new("Apple")
        .with_notes("keep it under a minute")
        .with_mode(ScriptMode::Listical)
        .with_skip_research(true)
        .with_attachment(Attachment::new("brief.md", b"# Brief".to_vec()))
}

#[tokio::test]
async fn test_select_option_resubmits_with_new_topic() {
    let h = harness(vec![
        Response::body(apple_question()),
        Response::body(ndjson(&[result(&["Apple script"])])),
    ]);

    let outcome = h.controller.submit(apple_request()).await.unwrap();
    let JobOutcome::NeedsInput(clarification) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(clarification.kind, NeedsInputKind::Clarification);
    assert_eq!(clarification.options.len(), 2);

    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::AwaitingClarification);
    assert_eq!(state.facts.len(), 1);
    assert_eq!(state.status, "Which Apple do you mean?");
    assert_eq!(h.controller.pending_clarification().await, Some(clarification));

    let outcome = h
        .controller
        .select_option("Apple Inc. (company)")
        .await
        .unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { variants: 1, .. }));

    let requests = h.generator.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].topic, "Apple Inc. (company)");
    assert_eq!(requests[1].notes, requests[0].notes);
    assert_eq!(requests[1].mode, ScriptMode::Listical);
    assert!(requests[1].skip_research);
    assert_eq!(requests[1].attachments, requests[0].attachments);

    let state = h.controller.snapshot().await;
    assert_eq!(state.topic, "Apple Inc. (company)");
    assert!(state.facts.is_empty());
    assert_eq!(state.phase, Phase::Complete);
    assert!(state.clarification.is_none());
}

#[tokio::test]
async fn test_selection_clears_earlier_output() {
    let h = harness(vec![
        Response::body(ndjson(&[
            json!({"type": "research", "data": "- Rates fell by 25 bps"}),
            result(&["Old S1", "Old S2"]),
        ])),
        Response::body(ndjson(&[
            json!({"type": "research", "data": "- Inflation is cooling"}),
            json!({
                "type": "needs_input",
                "kind": "clarification",
                "message": "Which one?",
                "options": ["A", "B"]
            }),
        ])),
        Response::body(ndjson(&[status("Researching B...")])),
    ]);

    h.controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();
    assert_eq!(h.controller.snapshot().await.scripts.len(), 2);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed"))
        .await
        .unwrap();
    assert!(matches!(outcome, JobOutcome::NeedsInput(_)));
    let state = h.controller.snapshot().await;
    assert!(state.scripts.is_empty());
    assert_eq!(state.facts.as_slice(), ["Inflation is cooling"]);

    let outcome = h.controller.select_option("B").await.unwrap();
    assert!(matches!(
        outcome,
        JobOutcome::Completed {
            variants: 0,
            session: None
        }
    ));
    assert_eq!(h.generator.requests()[2].topic, "B");

    let state = h.controller.snapshot().await;
    assert!(state.facts.is_empty());
    assert!(state.scripts.is_empty());
    assert_eq!(state.status, "Complete!");
}

#[tokio::test]
async fn test_angle_selection_kind() {
    let h = harness(vec![Response::body(ndjson(&[json!({
        "type": "needs_input",
        "kind": "angle-selection",
        "message": "Pick an angle",
        "options": ["Money", "Drama"]
    })]))]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    match outcome {
        JobOutcome::NeedsInput(clarification) => {
            assert_eq!(clarification.kind, NeedsInputKind::AngleSelection)
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_unfamiliar_kind_still_suspends() {
    let h = harness(vec![Response::body(ndjson(&[json!({
        "type": "needs_input",
        "kind": "topic_choice",
        "message": "Narrow it down?",
        "options": ["Rates", "Jobs"]
    })]))]);

    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed"))
        .await
        .unwrap();

    let JobOutcome::NeedsInput(clarification) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(clarification.kind, NeedsInputKind::Other);
    assert_eq!(h.controller.phase().await, Phase::AwaitingClarification);
    assert_eq!(h.controller.snapshot().await.dropped_records, 0);
}

#[tokio::test]
async fn test_cancel_returns_to_idle() {
    let h = harness(vec![Response::body(apple_question())]);
    h.controller.submit(apple_request()).await.unwrap();

    h.controller.cancel_clarification().await.unwrap();

    let state = h.controller.snapshot().await;
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.clarification.is_none());
    assert_eq!(h.generator.requests().len(), 1);
    assert!(matches!(
        h.controller.select_option("Apple (fruit)").await,
        Err(ControllerError::NotAwaitingClarification(Phase::Idle))
    ));
}

#[tokio::test]
async fn test_select_requires_pending_question() {
    let h = harness(vec![Response::body(ndjson(&[result(&["S1"])]))]);
    h.controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();

    assert!(matches!(
        h.controller.select_option("anything").await,
        Err(ControllerError::NotAwaitingClarification(Phase::Complete))
    ));
    assert!(matches!(
        h.controller.cancel_clarification().await,
        Err(ControllerError::NotAwaitingClarification(Phase::Complete))
    ));
}

#[tokio::test]
async fn test_empty_option_is_rejected() {
    let h = harness(vec![Response::body(apple_question())]);
    h.controller.submit(apple_request()).await.unwrap();

    assert!(matches!(
        h.controller.select_option("   ").await,
        Err(ControllerError::EmptyOption)
    ));
    assert_eq!(h.controller.phase().await, Phase::AwaitingClarification);
}
