//! Cross-process integration: binds a real Executive router to a loopback
//! port (same `MockModelClient` harness as the other e2e tests) and drives
//! the Orchestrator's `/text` proxy against it over real HTTP (spec §4.3:
//! "thin proxies to Executive `/respond`"), then exercises the frame router
//! and alert debouncer together the way `ws_eye`/`detector_client` compose
//! them in production.

mod common;

use eva_common::OrchestratorConfig;
use eva_model::types::{CompletionOutcome, ToolCall};
use eva_model::MockModelClient;
use eva_orchestrator::alert_debouncer::AlertDebouncer;
use eva_orchestrator::frame_router::FrameRouter;
use eva_orchestrator::state::OrchestratorState;
use eva_orchestrator::tts::{MockSynthesizer, TtsCache};
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tower::ServiceExt;

async fn spawn_executive(model: MockModelClient) -> String {
    let harness = common::build(model).await;
    let router = eva_executive::router::build_router(harness.state.clone());
    // Keep the harness (and its tempdir) alive for the life of the spawned
    // server by leaking it — the test process exits and reclaims it regardless.
    std::mem::forget(harness);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn orchestrator_state(executive_base_url: String) -> OrchestratorState<MockSynthesizer> {
    let mut config = OrchestratorConfig::default();
    config.executive_base_url = executive_base_url;
    config.text.max_chars = 4_000;

    OrchestratorState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
        synthesizer: Arc::new(MockSynthesizer { bytes: vec![1, 2, 3] }),
        frame_router: Arc::new(FrameRouter::new(5_000)),
        debouncer: Arc::new(AlertDebouncer::new(60_000, 10_000)),
        ui: Arc::new(Mutex::new(None)),
        detector_tx: Arc::new(Mutex::new(None)),
        detector_connected: Arc::new(AtomicBool::new(false)),
        tts_cache: Arc::new(TtsCache::new(8)),
        start_time: Instant::now(),
    }
}

#[tokio::test]
async fn text_proxy_round_trips_through_a_real_executive_process() {
    let model = MockModelClient::always(CompletionOutcome::ToolCall(ToolCall {
        name: "commit_text_response".to_string(),
        arguments: json!({
            "text": "Good afternoon.",
            "meta": {"tone": "neutral", "concepts": ["chat"], "surprise": 0.0}
        }),
    }));
    let base_url = spawn_executive(model).await;

    let state = orchestrator_state(base_url);
    let router = eva_orchestrator::router::build_router(state);

    let req = common::json_request("POST", "/text", json!({ "text": "hello from the UI" }));
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["text"], "Good afternoon.");
}

#[tokio::test]
async fn text_proxy_rejects_over_long_input_before_calling_executive() {
    let model = MockModelClient::new(vec![]);
    let base_url = spawn_executive(model).await;

    let mut config = OrchestratorConfig::default();
    config.executive_base_url = base_url;
    config.text.max_chars = 8;
    let state = OrchestratorState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
        synthesizer: Arc::new(MockSynthesizer { bytes: vec![] }),
        frame_router: Arc::new(FrameRouter::new(5_000)),
        debouncer: Arc::new(AlertDebouncer::new(60_000, 10_000)),
        ui: Arc::new(Mutex::new(None)),
        detector_tx: Arc::new(Mutex::new(None)),
        detector_connected: Arc::new(AtomicBool::new(false)),
        tts_cache: Arc::new(TtsCache::new(8)),
        start_time: Instant::now(),
    };
    let router = eva_orchestrator::router::build_router(state);

    let req = common::json_request("POST", "/text", json!({ "text": "this is definitely too long" }));
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_detector_and_ui_connection_state() {
    let model = MockModelClient::new(vec![]);
    let base_url = spawn_executive(model).await;
    let state = orchestrator_state(base_url);
    let router = eva_orchestrator::router::build_router(state);

    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["detectorConnected"], false);
    assert_eq!(body["uiConnected"], false);
}

/// The frame router and alert debouncer are independent singletons
/// (spec §4.4, §4.5); this exercises them together the way
/// `detector_client::handle_detector_message` composes them: a route is
/// consumed exactly once, and a high-severity fire respects both the
/// per-key window and the global cooldown.
#[test]
fn frame_router_and_alert_debouncer_compose_independently() {
    let router = FrameRouter::new(5_000);
    let debouncer = AlertDebouncer::new(60_000, 10_000);

    router.insert("f1".to_string(), 1_000);
    assert!(router.take("f1", 1_100));
    assert!(!router.take("f1", 1_200));

    let key = AlertDebouncer::event_key("near_collision", Some(7));
    assert!(debouncer.should_fire(&key, 1_000));
    assert!(!debouncer.should_fire(&key, 5_000));
    assert!(debouncer.should_fire(&key, 62_000));
}
