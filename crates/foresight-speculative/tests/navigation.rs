//! End-to-end navigation flows against a scripted transport.
//!
//! Run with: cargo test --test navigation

use foresight_speculative::testing::{EventRecorder, ScriptedTransport};
use foresight_speculative::{
    Event, EventKind, ExitReason, ManualClock, Navigator, NavigatorConfig, NavigatorState,
    NetworkError, PageRequest, ReceiveOverride,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PAGE: &str = "https://example.com/";
const A: &str = "https://example.com/a";
const B: &str = "https://example.com/b";

fn setup(config: NavigatorConfig) -> (Navigator, Arc<ScriptedTransport>, EventRecorder) {
    let transport = ScriptedTransport::new();
    let mut navigator = Navigator::new(config, transport.clone(), PAGE).unwrap();
    let recorder = EventRecorder::attach(&mut navigator);
    (navigator, transport, recorder)
}

fn change_body(event: &Event) -> serde_json::Value {
    match event {
        Event::Change { entry, .. } => entry.body.clone(),
        other => panic!("expected change, got {:?}", other),
    }
}

// =============================================================================
// Commit decisions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_warm_commit_changes_without_waiting() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;
    recorder.take();

    nav.request_display("/a");

    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(change_body(&events[0]), json!("a"));
    assert_eq!(transport.call_count(A), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cold_commit_waits_then_changes_once() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));

    nav.request_display("/a");
    assert!(nav.is_awaiting_display());
    assert_eq!(nav.state(), NavigatorState::AwaitingCompletion);

    nav.settle().await;

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::Preload,
            EventKind::Wait,
            EventKind::Receive,
            EventKind::Change
        ]
    );
    assert!(!nav.is_awaiting_display());
    assert_eq!(nav.state(), NavigatorState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_commit_joins_in_flight_prefetch() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let gate = transport.gate(A);

    nav.request_prefetch(Some("/a"));
    nav.request_display("/a");
    assert_eq!(recorder.count(EventKind::Wait), 1);

    gate.succeed(json!("a"));
    nav.settle().await;

    assert_eq!(recorder.count(EventKind::Change), 1);
    assert_eq!(transport.call_count(A), 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_commit_loses_and_abandons_first() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let gate = transport.gate(A);

    nav.request_display("/a");
    nav.request_display("/b");

    let exits: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Exit { url, reason } => Some((url, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(exits, vec![(B.to_string(), ExitReason::WaitingForAnotherPage)]);
    assert!(!nav.is_awaiting_display());

    gate.succeed(json!("a"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    nav.drain();

    assert_eq!(recorder.count(EventKind::Change), 0);
    assert_eq!(transport.call_count(B), 0);
}

#[tokio::test(start_paused = true)]
async fn test_commit_while_other_page_prefetching_exits() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let _gate = transport.gate(A);

    nav.request_prefetch(Some("/a"));
    nav.request_display("/b");

    assert_eq!(
        recorder.events().last(),
        Some(&Event::Exit {
            url: B.to_string(),
            reason: ExitReason::PreloadingPlanned,
        })
    );
    assert_eq!(nav.in_flight().unwrap().as_str(), A);
}

#[tokio::test(start_paused = true)]
async fn test_commit_to_scheduled_target_starts_now() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));

    nav.request_intent("/a", Duration::from_secs(10));
    nav.request_display("/a");

    assert_eq!(nav.scheduled(), None);
    assert_eq!(recorder.kinds(), vec![EventKind::Preload, EventKind::Wait]);

    nav.settle().await;
    assert_eq!(recorder.count(EventKind::Change), 1);
}

#[tokio::test(start_paused = true)]
async fn test_commit_to_scheduled_target_behind_other_prefetch_exits() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let _gate = transport.gate(A);

    nav.request_prefetch(Some("/a"));
    nav.request_intent("/b", Duration::from_secs(10));
    nav.request_display("/b");

    assert_eq!(
        recorder.events().last(),
        Some(&Event::Exit {
            url: B.to_string(),
            reason: ExitReason::PreloadingPlanned,
        })
    );
    assert_eq!(recorder.count(EventKind::Wait), 0);
    assert_eq!(recorder.count(EventKind::Preload), 1);
    assert_eq!(nav.in_flight().unwrap().as_str(), A);
    assert!(!nav.is_awaiting_display());
}

#[tokio::test(start_paused = true)]
async fn test_commit_after_other_page_completed_fetches() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));
    transport.reply(B, json!("b"));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;
    nav.request_display("/b");
    nav.settle().await;

    let events = recorder.events();
    assert_eq!(change_body(events.last().unwrap()), json!("b"));
}

#[tokio::test(start_paused = true)]
async fn test_awaited_failure_exits_with_network_error() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.fail(
        A,
        NetworkError::Http {
            status: 500,
            message: "boom".into(),
        },
    );

    nav.request_display("/a");
    nav.settle().await;

    assert_eq!(
        recorder.events().last(),
        Some(&Event::Exit {
            url: A.to_string(),
            reason: ExitReason::NetworkError,
        })
    );
    assert!(!nav.is_awaiting_display());
    assert!(nav.peek("/a").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unawaited_failure_is_silent() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.fail(A, NetworkError::Connection("refused".into()));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;

    assert_eq!(recorder.kinds(), vec![EventKind::Preload]);
    assert_eq!(nav.state(), NavigatorState::Idle);
}

#[tokio::test]
async fn test_unparsable_commit_exits() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());

    nav.request_display("http://[::1");

    assert_eq!(
        recorder.events(),
        vec![Event::Exit {
            url: "http://[::1".to_string(),
            reason: ExitReason::InvalidUrl,
        }]
    );
    assert!(transport.calls().is_empty());
}

// =============================================================================
// Receive listeners
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_receive_override_reaches_change_and_cache() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!({"html": "<p>raw</p>"}));
    nav.on_receive(|_| {
        Some(ReceiveOverride::body(json!({"html": "<p>rewritten</p>"})).with_title("Rewritten"))
    });

    nav.request_display("/a");
    nav.settle().await;

    let events = recorder.events();
    let expected = json!({"html": "<p>rewritten</p>"});
    assert_eq!(change_body(events.last().unwrap()), expected);

    let entry = nav.peek("/a").unwrap();
    assert_eq!(entry.body, expected);
    assert_eq!(entry.title.as_deref(), Some("Rewritten"));
}

// =============================================================================
// Scheduling and sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduled_intent_fires_after_delay() {
    let (mut nav, transport, _recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));

    nav.request_intent("/a", Duration::from_millis(50));
    assert!(transport.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(60)).await;
    nav.tick().await;

    assert_eq!(nav.state(), NavigatorState::Prefetching);
    nav.settle().await;
    assert!(nav.is_fresh("/a"));
}

#[tokio::test(start_paused = true)]
async fn test_last_scheduled_intent_wins() {
    let (mut nav, transport, _recorder) = setup(NavigatorConfig::default());
    transport.reply(B, json!("b"));

    nav.request_intent("/a", Duration::from_millis(50));
    nav.request_intent("/b", Duration::from_millis(50));
    nav.settle().await;

    assert_eq!(transport.calls(), vec![B.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_request_prefetch_without_url_uses_scheduled_target() {
    let (mut nav, transport, _recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));

    nav.request_intent("/a", Duration::from_secs(60));
    nav.request_prefetch(None);

    assert_eq!(nav.scheduled(), None);
    assert_eq!(nav.in_flight().unwrap().as_str(), A);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_session_result_is_dropped() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let gate = transport.gate(A);
    transport.reply(B, json!("b"));

    nav.request_prefetch(Some("/a"));
    let first = nav.session_id().unwrap();
    nav.request_prefetch(Some("/b"));
    assert_ne!(nav.session_id(), Some(first));

    gate.succeed(json!("a"));
    nav.settle().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    nav.drain();

    assert!(nav.peek("/a").is_none());
    assert!(nav.is_fresh("/b"));
    assert_eq!(recorder.count(EventKind::Receive), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_url_prefetch_not_restarted() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let _gate = transport.gate(A);

    nav.request_prefetch(Some("/a"));
    let session = nav.session_id();
    nav.request_prefetch(Some("/a"));

    assert_eq!(nav.session_id(), session);
    assert_eq!(recorder.count(EventKind::Preload), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_intent_aborts_unawaited_prefetch() {
    let (mut nav, transport, _recorder) = setup(NavigatorConfig::default());
    let _gate = transport.gate(A);

    nav.request_prefetch(Some("/a"));
    nav.cancel_intent();

    assert_eq!(nav.state(), NavigatorState::Idle);
    assert!(!nav.has_pending_work());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_intent_ignored_while_awaiting() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    let gate = transport.gate(A);

    nav.request_display("/a");
    nav.cancel_intent();
    assert_eq!(nav.state(), NavigatorState::AwaitingCompletion);

    gate.succeed(json!("a"));
    nav.settle().await;
    assert_eq!(recorder.count(EventKind::Change), 1);
}

// =============================================================================
// Cache lifetime
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stale_entry_refetched_after_ttl() {
    let clock = ManualClock::new();
    let config = NavigatorConfig::default().with_cache_ttl(Duration::from_millis(1000));
    let transport = ScriptedTransport::new();
    let mut nav = Navigator::new(config, transport.clone(), PAGE)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    let recorder = EventRecorder::attach(&mut nav);
    transport.reply(A, json!("hello"));
    transport.reply(A, json!("hello again"));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;
    recorder.take();

    nav.request_display("/a");
    let events = recorder.take();
    assert_eq!(events.len(), 1);
    assert_eq!(change_body(&events[0]), json!("hello"));

    clock.advance(Duration::from_millis(1500));
    assert!(!nav.is_fresh("/a"));

    nav.request_display("/a");
    assert_eq!(recorder.kinds(), vec![EventKind::Preload, EventKind::Wait]);

    nav.settle().await;
    let events = recorder.take();
    assert_eq!(change_body(events.last().unwrap()), json!("hello again"));
    assert_eq!(transport.call_count(A), 2);
}

#[tokio::test(start_paused = true)]
async fn test_purge_forces_refetch() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default());
    transport.reply(A, json!("a"));
    transport.reply(A, json!("a2"));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;
    nav.purge("/a");
    nav.purge("/a");
    assert!(nav.peek("/a").is_none());
    recorder.take();

    nav.request_display("/a");
    assert_eq!(recorder.count(EventKind::Wait), 1);
    nav.settle().await;
    assert_eq!(transport.call_count(A), 2);
}

// =============================================================================
// Host integration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_transform_shapes_fetch() {
    let transport = ScriptedTransport::new();
    let mut nav = Navigator::new(NavigatorConfig::default(), transport.clone(), PAGE)
        .unwrap()
        .with_request_transform(|url| {
            let mut api = url.clone();
            api.set_path(&format!("/api{}", url.path()));
            PageRequest::get(api).with_header("X-Prefetch", "1")
        });
    transport.reply("https://example.com/api/a", json!("a"));

    nav.request_prefetch(Some("/a"));
    nav.settle().await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.as_str(), "https://example.com/api/a");
    assert_eq!(
        requests[0].headers,
        vec![("X-Prefetch".to_string(), "1".to_string())]
    );
    // Cached under the page URL, not the request URL
    assert!(nav.is_fresh("/a"));
}

#[tokio::test]
async fn test_restore_is_reported() {
    let (mut nav, _transport, recorder) = setup(NavigatorConfig::default());

    nav.restore("/a");

    assert_eq!(recorder.kinds(), vec![EventKind::Restore]);
}

#[tokio::test]
async fn test_unsupported_platform_is_inert() {
    let (mut nav, transport, recorder) = setup(NavigatorConfig::default().unsupported());

    nav.request_intent("/a", Duration::ZERO);
    nav.request_prefetch(Some("/a"));
    nav.request_display("/a");
    nav.restore("/a");

    assert!(recorder.events().is_empty());
    assert!(transport.calls().is_empty());
    assert_eq!(nav.state(), NavigatorState::Idle);
}

#[tokio::test]
async fn test_location_change_affects_resolution() {
    let (mut nav, _transport, _recorder) = setup(NavigatorConfig::default());

    nav.set_location("https://example.com/docs/").unwrap();
    assert_eq!(nav.location().as_str(), "https://example.com/docs/");
    assert!(nav.set_location("not a url").is_err());
}
