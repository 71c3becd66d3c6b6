//! Drives `POST /respond` against the real axum router (spec §4.7, §8
//! scenario 1): an empty working log, a scripted mock model, and the
//! assertion that the log grows by exactly one `text_input`/`text_output`
//! pair in that order with whitelist-sanitized concepts and a clamped
//! surprise value.

mod common;

use eva_model::types::{CompletionOutcome, ToolCall};
use eva_model::MockModelClient;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn empty_log_respond_appends_input_then_output() {
    let model = MockModelClient::always(CompletionOutcome::ToolCall(ToolCall {
        name: "commit_text_response".to_string(),
        arguments: json!({
            "text": "Hello there.",
            "meta": {
                "tone": "warm",
                "concepts": ["chat", "not_a_real_tag"],
                "surprise": 1.7,
            }
        }),
    }));

    let harness = common::build(model).await;
    let working_log = harness.state.working_log.clone();
    let router = eva_executive::router::build_router(harness.state.clone());

    let req = common::json_request("POST", "/respond", json!({ "text": "hi" }));
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["text"], "Hello there.");
    assert_eq!(body["meta"]["tone"], "warm");
    assert!(body["meta"]["surprise"].as_f64().unwrap() <= 1.0);
    // "not_a_real_tag" is not in the whitelist and must be dropped.
    assert_eq!(body["meta"]["concepts"], json!(["chat"]));

    let entries = working_log.read().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].type_name(), "text_input");
    assert_eq!(entries[1].type_name(), "text_output");
    assert!(entries[0].ts_ms() <= entries[1].ts_ms());
}

#[tokio::test]
async fn model_plain_text_without_tool_call_still_persists_a_reply() {
    let model = MockModelClient::always(CompletionOutcome::Text("a plain-text reply".to_string()));
    let harness = common::build(model).await;
    let router = eva_executive::router::build_router(harness.state.clone());

    let req = common::json_request("POST", "/respond", json!({ "text": "hi again" }));
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = common::body_json(response).await;
    assert_eq!(body["text"], "a plain-text reply");
    assert_eq!(body["meta"]["note"], "fallback");
    assert_eq!(body["meta"]["surprise"], 0.0);
}

#[tokio::test]
async fn empty_text_is_rejected_before_any_model_call() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;
    let router = eva_executive::router::build_router(harness.state.clone());

    let req = common::json_request("POST", "/respond", json!({ "text": "   " }));
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_json_content_type_is_rejected_with_415() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;
    let router = eva_executive::router::build_router(harness.state.clone());

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/respond")
        .header(axum::http::header::CONTENT_TYPE, "text/plain")
        .body(axum::body::Body::from("text=hi"))
        .unwrap();
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
