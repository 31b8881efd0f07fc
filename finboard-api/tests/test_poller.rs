mod common;

use common::{ScriptedTransport, client, statement};
use finboard_api::{
    Method, NotificationKind, PollEvent, PollerConfig, QueryCache, QueryKey, StatementPoller,
};
use finboard_core::{ProcessingAction, StatementBadge};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn poller(transport: Arc<ScriptedTransport>) -> (StatementPoller, UnboundedReceiver<PollEvent>, Arc<QueryCache>) {
    let cache = Arc::new(QueryCache::default());
    let (p, rx) = StatementPoller::new(
        Arc::new(client(transport)),
        cache.clone(),
        PollerConfig::default(),
    );
    (p, rx, cache)
}

/// Drain events for `id` until its `Finished` event.
async fn run_to_finish(rx: &mut UnboundedReceiver<PollEvent>, id: &str) -> Vec<PollEvent> {
    let mut seen = Vec::new();
    while let Some(ev) = rx.recv().await {
        if ev.statement_id() != id {
            continue;
        }
        let done = matches!(ev, PollEvent::Finished { .. });
        seen.push(ev);
        if done {
            break;
        }
    }
    seen
}

fn badges(events: &[PollEvent]) -> Vec<StatementBadge> {
    events
        .iter()
        .filter_map(|e| match e {
            PollEvent::Progress { badge, .. } => Some(*badge),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_process_all_chains_categorize_exactly_once() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/extract", 200, json!({}));
    transport.respond(Method::Post, "/statements/st-1/categorize", 200, json!({}));
    for body in [
        statement("processing", "pending", "processing"),
        statement("completed", "pending", "processing"),
        statement("completed", "pending", "processing"),
        statement("completed", "processing", "processing"),
        statement("completed", "completed", "completed"),
    ] {
        transport.respond(Method::Get, "/statements/st-1/status", 200, body);
    }
    let (poller, mut rx, cache) = poller(transport.clone());
    cache
        .put(QueryKey::new(["transactions", "list", "all"]), &json!([]))
        .unwrap();

    assert!(poller.trigger("st-1", ProcessingAction::ProcessAll).await.unwrap());
    let events = run_to_finish(&mut rx, "st-1").await;

    assert_eq!(
        badges(&events),
        vec![
            StatementBadge::Extracting,
            StatementBadge::Extracted,
            StatementBadge::Categorizing,
            StatementBadge::Completed,
        ]
    );
    assert_eq!(transport.count(Method::Post, "/statements/st-1/extract"), 1);
    assert_eq!(transport.count(Method::Post, "/statements/st-1/categorize"), 1);

    let Some(PollEvent::Finished {
        badge, notification, ..
    }) = events.last()
    else {
        panic!("missing finish event");
    };
    assert_eq!(*badge, Some(StatementBadge::Completed));
    assert_eq!(notification.kind, NotificationKind::Success);
    assert_eq!(notification.message, "estado-mayo.pdf");
    assert!(cache.is_stale(&QueryKey::new(["transactions", "list", "all"])));
    assert!(!poller.is_polling("st-1"));
}

#[tokio::test(start_paused = true)]
async fn test_categorizing_keeps_polling() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/categorize", 200, json!({}));
    for _ in 0..4 {
        transport.respond(
            Method::Get,
            "/statements/st-1/status",
            200,
            statement("completed", "processing", "processing"),
        );
    }
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("completed", "completed", "processing"),
    );
    let (poller, mut rx, _cache) = poller(transport.clone());

    poller.trigger("st-1", ProcessingAction::Categorize).await.unwrap();
    let events = run_to_finish(&mut rx, "st-1").await;

    assert_eq!(transport.count(Method::Get, "/statements/st-1/status"), 5);
    assert_eq!(
        badges(&events),
        vec![StatementBadge::Categorizing, StatementBadge::Completed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_extract_only_stops_after_extraction() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/extract", 200, json!({}));
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("processing", "pending", "processing"),
    );
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("completed", "pending", "processing"),
    );
    let (poller, mut rx, _cache) = poller(transport.clone());

    poller.trigger("st-1", ProcessingAction::Extract).await.unwrap();
    let events = run_to_finish(&mut rx, "st-1").await;

    let Some(PollEvent::Finished { badge, .. }) = events.last() else {
        panic!("missing finish event");
    };
    assert_eq!(*badge, Some(StatementBadge::Extracted));
    assert_eq!(transport.count(Method::Post, "/statements/st-1/categorize"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_finishes_with_error_notification() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/retry", 200, json!({}));
    let mut failed = statement("failed", "pending", "failed");
    failed["error_message"] = json!("Unsupported statement layout");
    transport.respond(Method::Get, "/statements/st-1/status", 200, failed);
    let (poller, mut rx, _cache) = poller(transport);

    poller.trigger("st-1", ProcessingAction::Retry).await.unwrap();
    let events = run_to_finish(&mut rx, "st-1").await;

    let Some(PollEvent::Finished {
        badge, notification, ..
    }) = events.last()
    else {
        panic!("missing finish event");
    };
    assert_eq!(*badge, Some(StatementBadge::Failed));
    assert!(notification.is_error());
    assert_eq!(notification.message, "Unsupported statement layout");
}

#[tokio::test(start_paused = true)]
async fn test_polls_several_statements_independently() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "/statements/a/status",
        200,
        json!({"id": "a", "status": "completed", "extraction_status": "completed",
               "categorization_status": "completed"}),
    );
    transport.respond(
        Method::Get,
        "/statements/b/status",
        200,
        json!({"id": "b", "status": "processing", "extraction_status": "processing",
               "categorization_status": "pending"}),
    );
    let (poller, mut rx, _cache) = poller(transport.clone());

    assert!(poller.watch("a"));
    assert!(poller.watch("b"));
    assert!(!poller.watch("b"));
    assert_eq!(poller.active_ids(), vec!["a".to_string(), "b".to_string()]);

    run_to_finish(&mut rx, "a").await;
    assert!(!poller.is_polling("a"));
    assert!(poller.is_polling("b"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(poller.is_polling("b"));
    assert!(poller.cancel("b"));
    assert!(!poller.is_polling("b"));
    assert!(poller.active_ids().is_empty());

    // Statement b was never finished, so nothing chained.
    assert_eq!(transport.count(Method::Post, "/statements/b/categorize"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_consecutive_errors() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        500,
        json!({"detail": "boom"}),
    );
    let (poller, mut rx, _cache) = poller(transport.clone());

    poller.watch("st-1");
    let events = run_to_finish(&mut rx, "st-1").await;

    let failures = events
        .iter()
        .filter(|e| matches!(e, PollEvent::PollFailed { .. }))
        .count();
    assert_eq!(failures, 5);
    assert_eq!(transport.count(Method::Get, "/statements/st-1/status"), 5);
    let Some(PollEvent::Finished {
        badge, notification, ..
    }) = events.last()
    else {
        panic!("missing finish event");
    };
    assert!(badge.is_none());
    assert!(notification.is_error());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_is_noop_while_polling() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/extract", 200, json!({}));
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("processing", "pending", "processing"),
    );
    let (poller, _rx, _cache) = poller(transport.clone());

    assert!(poller.trigger("st-1", ProcessingAction::ProcessAll).await.unwrap());
    assert!(!poller.trigger("st-1", ProcessingAction::ProcessAll).await.unwrap());
    assert_eq!(transport.count(Method::Post, "/statements/st-1/extract"), 1);

    drop(poller);
}

#[tokio::test(start_paused = true)]
async fn test_watch_never_starts_categorization() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/statements/st-1/categorize", 200, json!({}));
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("completed", "pending", "processing"),
    );
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("completed", "completed", "completed"),
    );
    let (poller, mut rx, _cache) = poller(transport.clone());

    assert!(poller.watch("st-1"));
    let events = run_to_finish(&mut rx, "st-1").await;

    assert!(matches!(
        events.first(),
        Some(PollEvent::Started { action: None, .. })
    ));
    let Some(PollEvent::Finished {
        badge, notification, ..
    }) = events.last()
    else {
        panic!("missing finish event");
    };
    assert_eq!(*badge, Some(StatementBadge::Extracted));
    assert_eq!(notification.kind, NotificationKind::Info);
    assert_eq!(transport.count(Method::Post, "/statements/st-1/categorize"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_watch_follows_busy_statement_to_the_end() {
    let transport = ScriptedTransport::new();
    for body in [
        statement("completed", "processing", "processing"),
        statement("completed", "processing", "processing"),
        statement("completed", "completed", "completed"),
    ] {
        transport.respond(Method::Get, "/statements/st-1/status", 200, body);
    }
    let (poller, mut rx, _cache) = poller(transport.clone());

    poller.watch("st-1");
    let events = run_to_finish(&mut rx, "st-1").await;

    assert_eq!(
        badges(&events),
        vec![StatementBadge::Categorizing, StatementBadge::Completed]
    );
    assert_eq!(transport.count(Method::Get, "/statements/st-1/status"), 3);
    assert_eq!(transport.requests().iter().filter(|r| r.method == Method::Post).count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_start_the_backend_once() {
    let transport = ScriptedTransport::new();
    transport.set_latency(Duration::from_millis(300));
    transport.respond(Method::Post, "/statements/st-1/extract", 200, json!({}));
    transport.respond(
        Method::Get,
        "/statements/st-1/status",
        200,
        statement("processing", "pending", "processing"),
    );
    let (poller, _rx, _cache) = poller(transport.clone());

    let (first, second) = tokio::join!(
        poller.trigger("st-1", ProcessingAction::Extract),
        poller.trigger("st-1", ProcessingAction::Extract),
    );

    assert!(first.unwrap());
    assert!(!second.unwrap());
    assert_eq!(transport.count(Method::Post, "/statements/st-1/extract"), 1);
    assert!(poller.is_polling("st-1"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_trigger_releases_the_id() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Post,
        "/statements/st-1/extract",
        500,
        json!({"detail": "queue full"}),
    );
    transport.respond(Method::Post, "/statements/st-1/extract", 200, json!({}));
    let (poller, _rx, _cache) = poller(transport.clone());

    assert!(poller.trigger("st-1", ProcessingAction::Extract).await.is_err());
    assert!(!poller.is_polling("st-1"));

    assert!(poller.trigger("st-1", ProcessingAction::Extract).await.unwrap());
    assert_eq!(transport.count(Method::Post, "/statements/st-1/extract"), 2);
}
