//! Per-variant chat edits

use super::common::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

use script_studio::chat::CHAT_FAILURE_NOTICE;
use script_studio::store::LocalSessionStore;
use script_studio::{ChatOutcome, ChatRejected, JobOutcome};
use studio_client::{ChatRole, GenerationRequest, StudioError};

fn angled_scripts() -> Response {
    Response::body(ndjson(&[json!({"type": "result", "data": {
        "scripts": ["First script", "Second script"],
        "angles": [{"name": "Money", "focus": "costs"}, {"name": "Drama", "focus": "conflict"}]
    }})]))
}

async fn generated(h: &Harness) {
    let outcome = h
        .controller
        .submit(GenerationRequest::new("Fed rate cut"))
        .await
        .unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_reply_updates_variant_and_thread() {
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![reply("Tightened the hook.", Some("Sharper second script"))]),
        None,
    );
    generated(&h).await;

    let outcome = h.controller.send_chat(2, "  make the hook sharper ").await.unwrap();
    let ChatOutcome::Replied {
        reply,
        script_updated,
    } = outcome
    else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(script_updated);
    assert_eq!(reply.content, "Tightened the hook.");

    let request = &h.chat.requests()[0];
    assert_eq!(request.script, "Second script");
    assert_eq!(request.message, "make the hook sharper");
    assert_eq!(request.script_number, 2);
    assert_eq!(request.angle_name, "Drama");
    assert_eq!(request.angle_focus, "conflict");

    let state = h.controller.snapshot().await;
    assert_eq!(state.scripts[1], "Sharper second script");
    assert_eq!(state.scripts[0], "First script");

    let thread = h.controller.chat_thread(2).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].role, ChatRole::User);
    assert_eq!(thread[1].role, ChatRole::Assistant);
    assert!(h.controller.chat_thread(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edits_are_mirrored_to_the_session() {
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![reply("Done.", Some("Shorter first script"))]),
        None,
    );
    generated(&h).await;
    let session = h.controller.snapshot().await.current_session.unwrap();

    h.controller.send_chat(1, "shorter").await.unwrap();

    let stored = h.local.get(&session).unwrap().unwrap();
    assert_eq!(stored.variants[0].content, "Shorter first script");
    let thread = &stored.chat_history[&1];
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].content, "shorter");
    assert_eq!(thread[1].content, "Done.");
}

#[tokio::test]
async fn test_edits_are_mirrored_to_the_primary_store() {
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![reply("Done.", Some("Shorter first script"))]),
        Some(FakeSessionApi::default()),
    );
    generated(&h).await;

    h.controller.send_chat(1, "shorter").await.unwrap();

    let stored = &h.remote.as_ref().unwrap().stored()[0];
    assert_eq!(stored.scripts[0].script_content, "Shorter first script");
    let numbers: Vec<usize> = stored.chat.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, [1, 1]);
}

#[tokio::test]
async fn test_reply_without_update_keeps_script() {
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![reply("It already reads well.", None)]),
        None,
    );
    generated(&h).await;

    let outcome = h.controller.send_chat(1, "thoughts?").await.unwrap();

    assert!(matches!(
        outcome,
        ChatOutcome::Replied {
            script_updated: false,
            ..
        }
    ));
    assert_eq!(h.controller.snapshot().await.scripts[0], "First script");
}

#[tokio::test]
async fn test_single_variant_edit_updates_final_script() {
    let h = harness_with(
        vec![Response::body(ndjson(&[json!({"type": "result", "data": "Only script"})]))],
        FakeChat::new(vec![reply("Done.", Some("Edited script"))]),
        None,
    );
    generated(&h).await;

    h.controller.send_chat(1, "edit it").await.unwrap();

    let state = h.controller.snapshot().await;
    assert_eq!(state.scripts, vec!["Edited script".to_string()]);
    assert_eq!(state.final_script, "Edited script");
}

#[tokio::test]
async fn test_backend_failure_appends_notice() {
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![Err(StudioError::Http {
            status: 500,
            body: "boom".into(),
        })]),
        None,
    );
    generated(&h).await;

    let outcome = h.controller.send_chat(1, "shorter").await.unwrap();

    let ChatOutcome::Failed { notice } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(notice.content, CHAT_FAILURE_NOTICE);
    assert_eq!(h.controller.snapshot().await.scripts[0], "First script");
    let thread = h.controller.chat_thread(1).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[1].content, CHAT_FAILURE_NOTICE);
}

#[tokio::test]
async fn test_invalid_messages_are_rejected() {
    let h = harness(vec![angled_scripts()]);

    assert_eq!(
        h.controller.send_chat(1, "shorter").await,
        Err(ChatRejected::NoSuchVariant(1))
    );

    generated(&h).await;
    assert_eq!(
        h.controller.send_chat(1, "   ").await,
        Err(ChatRejected::EmptyMessage)
    );
    assert_eq!(
        h.controller.send_chat(0, "shorter").await,
        Err(ChatRejected::NoSuchVariant(0))
    );
    assert_eq!(
        h.controller.send_chat(3, "shorter").await,
        Err(ChatRejected::NoSuchVariant(3))
    );
    assert!(h.chat.requests().is_empty());
}

#[tokio::test]
async fn test_empty_script_cannot_be_edited() {
    let h = harness(vec![Response::body(ndjson(&[json!({"type": "result", "data": {"scripts": ["Real script", "  "]}})]))]);
    generated(&h).await;

    assert_eq!(
        h.controller.send_chat(2, "fill it in").await,
        Err(ChatRejected::EmptyScript(2))
    );
}

#[tokio::test]
async fn test_one_request_per_variant_at_a_time() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(
        vec![angled_scripts()],
        FakeChat::new(vec![reply("First reply", None), reply("Other variant", None)])
            .gated(gate.clone()),
        None,
    );
    generated(&h).await;

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.send_chat(1, "shorter").await });
    h.chat.arrived.notified().await;

    assert_eq!(
        h.controller.send_chat(1, "and punchier").await,
        Err(ChatRejected::Busy(1))
    );

    gate.notify_one();
    assert!(matches!(
        first.await.unwrap(),
        Ok(ChatOutcome::Replied { .. })
    ));

    gate.notify_one();
    assert!(h.controller.send_chat(1, "one more").await.is_ok());
}

#[tokio::test]
async fn test_reply_after_new_generation_is_discarded() {
    let gate = Arc::new(Notify::new());
    let h = harness_with(
        vec![
            angled_scripts(),
            Response::body(ndjson(&[result(&["Fresh script"])])),
        ],
        FakeChat::new(vec![reply("Late reply", Some("Late edit"))]).gated(gate.clone()),
        None,
    );
    generated(&h).await;

    let controller = h.controller.clone();
    let chat = tokio::spawn(async move { controller.send_chat(1, "shorter").await });
    h.chat.arrived.notified().await;

    h.controller
        .submit(GenerationRequest::new("New topic"))
        .await
        .unwrap();
    gate.notify_one();

    assert_eq!(chat.await.unwrap(), Ok(ChatOutcome::Discarded));
    let state = h.controller.snapshot().await;
    assert_eq!(state.scripts, vec!["Fresh script".to_string()]);
    assert!(state.chat_thread(1).unwrap().is_empty());
}
