//! Drives `POST /insight` (spec §4.8, §8 scenario 3): a real asset on disk,
//! a scripted `submit_insight` tool call, and the cooldown window rejecting
//! a second request with `retryAfterMs > 0`.

mod common;

use eva_model::types::{CompletionOutcome, ToolCall};
use eva_model::MockModelClient;
use serde_json::json;
use tower::ServiceExt;

fn insight_tool_call() -> CompletionOutcome {
    CompletionOutcome::ToolCall(ToolCall {
        name: "submit_insight".to_string(),
        arguments: json!({
            "one_liner": "A cat walked across the porch.",
            "what_changed": ["a cat entered the frame"],
            "tts_response": "I saw a cat on the porch.",
            "severity": "low",
            "tags": ["awareness", "not_a_real_tag"],
        }),
    })
}

async fn write_test_asset(assets_dir: &std::path::Path) {
    std::fs::create_dir_all(assets_dir).unwrap();
    std::fs::write(assets_dir.join("frame1.jpg"), b"not a real jpeg but bytes suffice").unwrap();
}

#[tokio::test]
async fn insight_then_second_call_within_cooldown_returns_429() {
    let model = MockModelClient::always(insight_tool_call());
    let harness = common::build(model).await;
    write_test_asset(&harness.state.assets_dir).await;
    let working_log = harness.state.working_log.clone();
    let router = eva_executive::router::build_router(harness.state.clone());

    let body = json!({
        "clip_id": "clip-1",
        "trigger_frame_id": "f1",
        "frames": [{"frame_id": "f1", "mime": "image/jpeg", "asset_rel_path": "frame1.jpg"}],
    });

    let first = router.clone().oneshot(common::json_request("POST", "/insight", body.clone())).await.unwrap();
    assert_eq!(first.status(), axum::http::StatusCode::OK);
    let first_body = common::body_json(first).await;
    assert_eq!(first_body["summary"]["tags"], json!(["awareness"]));

    let entries = working_log.read().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].type_name(), "wm_insight");

    let second = router.oneshot(common::json_request("POST", "/insight", body)).await.unwrap();
    assert_eq!(second.status(), axum::http::StatusCode::TOO_MANY_REQUESTS);
    let second_body = common::body_json(second).await;
    assert_eq!(second_body["error"]["code"], "COOLDOWN_ACTIVE");
    assert!(second_body["error"]["extra"]["retryAfterMs"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn insight_asset_path_escape_is_rejected() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;
    write_test_asset(&harness.state.assets_dir).await;
    let router = eva_executive::router::build_router(harness.state.clone());

    let body = json!({
        "frames": [{"mime": "image/jpeg", "asset_rel_path": "../outside.jpg"}],
    });
    let response = router.oneshot(common::json_request("POST", "/insight", body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let parsed = common::body_json(response).await;
    assert_eq!(parsed["error"]["code"], "INSIGHT_ASSET_INVALID_PATH");
}

#[tokio::test]
async fn insight_missing_asset_is_rejected() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;
    let router = eva_executive::router::build_router(harness.state.clone());

    let body = json!({
        "frames": [{"mime": "image/jpeg", "asset_rel_path": "does_not_exist.jpg"}],
    });
    let response = router.oneshot(common::json_request("POST", "/insight", body)).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let parsed = common::body_json(response).await;
    assert_eq!(parsed["error"]["code"], "INSIGHT_ASSET_MISSING");
}
