//! Drives `POST /events` then `POST /jobs/run {job:"compaction"}` (spec
//! §4.9, §8 scenario 2 & 5): the appended `wm_event` summary shape, and
//! compaction's idempotence — running twice at the same `now_ms` is a no-op
//! the second time.

mod common;

use eva_model::types::{CompletionOutcome, ToolCall};
use eva_model::MockModelClient;
use serde_json::json;
use tower::ServiceExt;

const DAY_AGO_EVENT_TS: i64 = 1_700_000_000_000 - 2 * 60 * 60 * 1000;
const NOW_MS: i64 = 1_700_000_000_000;

#[tokio::test]
async fn events_endpoint_materializes_a_capped_derived_summary() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;
    let working_log = harness.state.working_log.clone();
    let router = eva_executive::router::build_router(harness.state.clone());

    let req = common::json_request(
        "POST",
        "/events",
        json!({
            "v": 1,
            "source": "vision",
            "events": [{
                "name": "roi_dwell",
                "ts_ms": NOW_MS,
                "severity": "medium",
                "track_id": 3,
                "data": {"roi": "front_door", "dwell_ms": 1200, "conf": 0.92}
            }]
        }),
    );
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["accepted"], 1);

    let entries = working_log.read().unwrap();
    assert_eq!(entries.len(), 1);
    let summary = match &entries[0] {
        eva_memory::WorkingMemoryEntry::WmEvent { summary, .. } => summary.clone(),
        other => panic!("expected a wm_event entry, got {other:?}"),
    };
    assert!(summary.starts_with("roi_dwell"));
    assert!(summary.contains("roi=front_door"));
    assert!(summary.contains("dwell_ms=1200"));
    assert!(summary.contains("conf=0.92"));
    assert!(summary.len() <= 180);
}

/// Scripts the compaction model call so the happy-path bullet set survives
/// validation (3-7 bullets, each a distinct non-telemetry sentence).
fn compaction_tool_call() -> CompletionOutcome {
    CompletionOutcome::ToolCall(ToolCall {
        name: "commit_working_memory_compaction".to_string(),
        arguments: json!({
            "bullets": [
                "User asked about the front door camera feed.",
                "A person lingered near the front door for over a second.",
                "EVA confirmed the dwell event was logged.",
            ]
        }),
    })
}

#[tokio::test]
async fn compaction_run_is_idempotent_at_the_same_now_ms() {
    let model = MockModelClient::always(compaction_tool_call());
    let harness = common::build(model).await;
    harness
        .state
        .working_log
        .append(&[eva_memory::WorkingMemoryEntry::WmEvent {
            source: "vision".to_string(),
            name: "roi_dwell".to_string(),
            severity: eva_memory::Severity::Medium,
            track_id: Some(3),
            summary: "roi_dwell roi=front_door".to_string(),
            data: json!({}),
            ts_ms: DAY_AGO_EVENT_TS,
        }])
        .unwrap();

    let router = eva_executive::router::build_router(harness.state.clone());

    let first = router
        .clone()
        .oneshot(common::json_request("POST", "/jobs/run", json!({"job": "compaction", "now_ms": NOW_MS})))
        .await
        .unwrap();
    assert_eq!(first.status(), axum::http::StatusCode::OK);
    let first_body = common::body_json(first).await;
    assert_eq!(first_body["sourceEntryCount"], 1);
    assert!(first_body["summaryCount"].as_i64().unwrap() >= 3);
    assert_eq!(first_body["keptEntryCount"], 0);

    // Second run at the identical `now_ms`: the old window is now empty.
    let second = router
        .clone()
        .oneshot(common::json_request("POST", "/jobs/run", json!({"job": "compaction", "now_ms": NOW_MS})))
        .await
        .unwrap();
    assert_eq!(second.status(), axum::http::StatusCode::OK);
    let second_body = common::body_json(second).await;
    assert_eq!(second_body["sourceEntryCount"], 0);
    assert_eq!(second_body["summaryCount"], 0);

    let recent = harness.state.short_term.recent(10).unwrap();
    assert_eq!(recent.len(), 3);
}

#[tokio::test]
async fn compaction_falls_back_to_deterministic_summary_on_model_failure() {
    let model = MockModelClient::new(vec![Err(eva_model::client::ModelError::RequestFailed("down".to_string()))]);
    let harness = common::build(model).await;
    harness
        .state
        .working_log
        .append(&[
            eva_memory::WorkingMemoryEntry::TextOutput {
                request_id: "r1".to_string(),
                session_id: None,
                text: "A surprising discovery happened.".to_string(),
                meta: eva_memory::TextOutputMeta {
                    tone: "warm".to_string(),
                    concepts: vec!["chat".to_string()],
                    surprise: 0.9,
                    note: None,
                },
                ts_ms: DAY_AGO_EVENT_TS,
            },
            eva_memory::WorkingMemoryEntry::TextOutput {
                request_id: "r2".to_string(),
                session_id: None,
                text: "A second notable reply.".to_string(),
                meta: eva_memory::TextOutputMeta {
                    tone: "neutral".to_string(),
                    concepts: vec!["chat".to_string()],
                    surprise: 0.1,
                    note: None,
                },
                ts_ms: DAY_AGO_EVENT_TS + 1,
            },
        ])
        .unwrap();

    let router = eva_executive::router::build_router(harness.state.clone());
    let response = router
        .oneshot(common::json_request("POST", "/jobs/run", json!({"job": "compaction", "now_ms": NOW_MS})))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["sourceEntryCount"], 2);
    assert!(body["summaryCount"].as_i64().unwrap() >= 3);

    let recent = harness.state.short_term.recent(10).unwrap();
    assert!(recent.len() >= 3);
}
