//! Integration tests for automated replies during ingestion.

#![allow(clippy::unwrap_used)]

mod support;

use std::time::Duration;

use mailsift_core::reply::GenerationError;
use mailsift_core::{Category, Error, ReplyOrchestrator};
use mailsift_mime::encoding::decode_base64url;

use support::{Harness, ScriptedGenerator, TIMEOUT, notification};

fn rules() -> Vec<(&'static str, Category, f64)> {
    vec![
        ("invoice", Category::Business, 0.85),
        ("sale", Category::Promotions, 0.95),
        ("lottery", Category::Spam, 0.99),
        ("maybe", Category::Business, 0.69),
    ]
}

#[tokio::test]
async fn test_business_message_gets_threaded_reply() {
    let h = Harness::new(rules(), ScriptedGenerator::replying("**Confirmed**, thank you.")).await;
    let last = h
        .mailbox
        .deliver("A", "Invoice due", "Could you confirm the invoice by Friday?");

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(report.ingest.processed[0].predicted_label, Category::Business);
    assert_eq!(report.ingest.replies_sent, 1);
    assert_eq!(h.generator.call_count(), 1);

    let sent = h.mailbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].thread_id.as_deref(), Some("thread-A"));
    let raw = String::from_utf8(decode_base64url(&sent[0].raw).unwrap()).unwrap();
    assert!(raw.contains("To: Dana <dana@example.com>\r\n"));
    assert!(raw.contains("Subject: Re: Invoice due\r\n"));
    assert!(raw.contains("In-Reply-To: <A@mail.example.com>\r\n"));
    assert!(raw.contains("Confirmed, thank you."));
    assert!(!raw.contains("**"));
}

#[tokio::test]
async fn test_promotions_never_invoke_generator() {
    let h = Harness::new(rules(), ScriptedGenerator::replying("x")).await;
    let last = h.mailbox.deliver("P", "Big sale today", "Everything half price.");

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(report.ingest.processed[0].predicted_label, Category::Promotions);
    assert_eq!(h.generator.call_count(), 0);
    assert_eq!(h.mailbox.sent_count(), 0);
}

#[tokio::test]
async fn test_spam_and_low_confidence_never_reply() {
    let h = Harness::new(rules(), ScriptedGenerator::replying("x")).await;
    h.mailbox.deliver("S", "You won the lottery", "Claim your prize now.");
    let last = h.mailbox.deliver("L", "Maybe lunch", "Are you free on Thursday?");

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(report.ingest.processed.len(), 2);
    assert!((report.ingest.processed[1].confidence - 0.69).abs() < f64::EPSILON);
    assert_eq!(report.ingest.replies_sent, 0);
    assert_eq!(h.generator.call_count(), 0);
    assert_eq!(h.mailbox.sent_count(), 0);
}

#[tokio::test]
async fn test_opt_out_footer_blocks_reply() {
    let h = Harness::new(rules(), ScriptedGenerator::replying("x")).await;
    let last = h.mailbox.deliver(
        "N",
        "Invoice 7",
        "Your invoice is attached. To stop these emails, unsubscribe here.",
    );

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(report.ingest.processed[0].predicted_label, Category::Business);
    assert_eq!(h.generator.call_count(), 0);
    assert_eq!(h.mailbox.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_generation_retries_then_sends() {
    let generator = ScriptedGenerator::scripted(
        vec![
            Err(GenerationError::RateLimited),
            Err(GenerationError::RateLimited),
        ],
        Some("Will do."),
    );
    let h = Harness::new(rules(), generator).await;
    let last = h.mailbox.deliver("A", "Invoice", "Please pay the invoice.");

    let started = tokio::time::Instant::now();
    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(h.generator.call_count(), 3);
    assert_eq!(report.ingest.replies_sent, 1);
    assert_eq!(h.mailbox.sent_count(), 1);
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_always_rate_limited_gives_up_after_three_calls() {
    let h = Harness::new(rules(), ScriptedGenerator::always_rate_limited()).await;
    let last = h.mailbox.deliver("A", "Invoice", "Please pay the invoice.");

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(h.generator.call_count(), 3);
    assert_eq!(report.ingest.replies_sent, 0);
    assert_eq!(h.mailbox.sent_count(), 0);
    assert_eq!(report.ingest.processed.len(), 1);
    assert!(report.ingest.failed.is_empty());
    assert_eq!(h.store.record_count(), 1);
}

#[tokio::test]
async fn test_generation_failure_is_not_retried() {
    let generator =
        ScriptedGenerator::scripted(vec![Err(GenerationError::Failed("500".into()))], Some("x"));
    let h = Harness::new(rules(), generator).await;
    let last = h.mailbox.deliver("A", "Invoice", "Please pay the invoice.");

    let report = h.engine.handle_notification(&notification(last)).await.unwrap();

    assert_eq!(h.generator.call_count(), 1);
    assert_eq!(report.ingest.replies_sent, 0);
    assert_eq!(report.ingest.processed.len(), 1);
}

#[tokio::test]
async fn test_manual_draft_and_send() {
    let h = Harness::new(rules(), ScriptedGenerator::replying("## Sure\n\nSee you then.")).await;
    h.mailbox.deliver("A", "Meeting", "Can we meet at noon?");
    let orchestrator = ReplyOrchestrator::new(h.mailbox.clone(), TIMEOUT)
        .with_generator(h.generator.clone());

    let draft = orchestrator
        .draft("Meeting\n\nCan we meet at noon?", Category::Personal, 0.9)
        .await
        .unwrap();
    assert_eq!(draft.text, "Sure\n\nSee you then.");

    let err = orchestrator
        .draft("Flash sale", Category::Promotions, 0.99)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRepliable(_)));

    let sent = orchestrator.send_draft("A", &draft.text, None).await.unwrap();
    assert_eq!(sent.id, "reply-1");
    assert_eq!(h.generator.call_count(), 1);
}
