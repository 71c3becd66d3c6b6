//! Drives `POST /jobs/run {job:"promotion"}` against short-term rows seeded
//! directly (spec §4.10, §8 scenario 6): tag derivation, vector + semantic
//! upsert, and cache refresh, plus the determinism property that merging the
//! same `(kind, text)` twice converges support/confidence/first/last-seen.

mod common;

use eva_model::MockModelClient;
use serde_json::json;
use tower::ServiceExt;

const WINDOW_START_MS: i64 = 1_700_000_000_000;
const WINDOW_END_MS: i64 = WINDOW_START_MS + 24 * 60 * 60 * 1000;

#[tokio::test]
async fn promotion_upserts_vector_and_semantic_stores_and_refreshes_caches() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;

    harness
        .state
        .short_term
        .insert_bullets(
            &[
                "A person lingered near the front door, a near-collision was logged by vision.".to_string(),
                "The user said they prefer a quieter evening briefing.".to_string(),
            ],
            WINDOW_START_MS + 1000,
            WINDOW_START_MS,
            WINDOW_START_MS + 60_000,
            5,
        )
        .unwrap();

    let router = eva_executive::router::build_router(harness.state.clone());
    let response = router
        .oneshot(common::json_request(
            "POST",
            "/jobs/run",
            json!({"job": "promotion", "now_ms": WINDOW_END_MS}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["sourceRowCount"], 2);
    assert_eq!(body["experienceUpsertCount"], 2);
    assert!(body["totalExperienceCount"].as_i64().unwrap() >= 2);

    let experiences = harness
        .state
        .vector
        .recent(eva_memory::VectorTable::Experiences.table_name(), 10)
        .await
        .unwrap();
    assert_eq!(experiences.len(), 2);
    assert!(experiences.iter().any(|e| e.tags.iter().any(|t| t == "near_collision")));

    let cache_dir = harness.state.cache_dir.clone();
    assert!(cache_dir.join("core_experiences.json").exists());
    assert!(cache_dir.join("core_personality.json").exists());
}

#[tokio::test]
async fn merging_the_same_semantic_item_twice_converges_support_and_confidence() {
    let model = MockModelClient::new(vec![]);
    let harness = common::build(model).await;

    harness
        .state
        .short_term
        .insert_bullets(
            &["The user prefers a quieter evening briefing.".to_string()],
            WINDOW_START_MS + 1000,
            WINDOW_START_MS,
            WINDOW_START_MS + 60_000,
            1,
        )
        .unwrap();
    harness
        .state
        .short_term
        .insert_bullets(
            &["The user prefers a quieter evening briefing.".to_string()],
            WINDOW_START_MS + 2000,
            WINDOW_START_MS,
            WINDOW_START_MS + 60_000,
            1,
        )
        .unwrap();

    eva_memory::run_promotion(
        WINDOW_END_MS,
        WINDOW_START_MS,
        WINDOW_END_MS,
        &harness.state.short_term,
        &harness.state.semantic,
        &harness.state.vector,
        &harness.state.whitelist,
        &harness.state.cache_dir,
    )
    .await
    .unwrap();

    let items = harness.state.semantic.top_by_support(10).unwrap();
    let preference = items
        .iter()
        .find(|i| i.text.to_lowercase().contains("quieter evening briefing"))
        .expect("the duplicated preference should have merged into one semantic item");
    assert_eq!(preference.support_count, 2);
}
