//! Shared test harness for the Executive's cross-module flows, in the
//! teacher's own style of a `TestDatabaseManager`-equivalent that wires real
//! stores against a tempdir and hands back an `AppState` ready for handlers
//! or `run_compaction`/`run_promotion` to operate on directly.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eva_common::{Config, TagWhitelist, TraceLogger, TraceLoggerConfig};
use eva_executive::jobs::JobsState;
use eva_executive::state::AppState;
use eva_memory::{SemanticStore, SerialWriteQueue, ShortTermStore, ToneCache, VectorStore, WorkingLog};
use eva_model::MockModelClient;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Owns the tempdir so it isn't dropped (and deleted) while the harness is
/// still in scope, the same ownership shape as the teacher's
/// `TestDatabaseManager::_temp_dir`.
pub struct Harness {
    pub state: AppState<MockModelClient>,
    _dir: TempDir,
}

pub async fn build(model: MockModelClient) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let memory_dir = dir.path().to_path_buf();

    let working_log = Arc::new(WorkingLog::new(memory_dir.join("working_memory.log")));
    let short_term = Arc::new(ShortTermStore::open_in_memory().expect("short-term store"));
    let semantic = Arc::new(SemanticStore::open_in_memory().expect("semantic store"));
    let vector = Arc::new(
        VectorStore::open(&memory_dir.join("long_term_memory_db").join("lancedb"))
            .await
            .expect("vector store"),
    );

    let cache_dir: PathBuf = memory_dir.join("cache");
    std::fs::create_dir_all(&cache_dir).expect("cache dir");
    let tone_cache = Arc::new(Mutex::new(ToneCache::load(cache_dir.join("personality_tone.json"))));

    let trace = Arc::new(TraceLogger::new(TraceLoggerConfig {
        path: memory_dir.join("trace.jsonl"),
        ..TraceLoggerConfig::default()
    }));

    let state = AppState {
        config: Arc::new(Config::default()),
        model: Arc::new(model),
        queue: Arc::new(SerialWriteQueue::new()),
        working_log,
        short_term,
        semantic,
        vector,
        tone_cache,
        whitelist: Arc::new(TagWhitelist::default_experience()),
        persona: Arc::new("You are EVA, a calm household companion.".to_string()),
        trace,
        jobs: Arc::new(JobsState::new()),
        last_insight_request_at_ms: Arc::new(Mutex::new(None)),
        assets_dir: Arc::new(memory_dir.join("working_memory_assets")),
        cache_dir: Arc::new(cache_dir),
        start_time: Instant::now(),
    };

    Harness { state, _dir: dir }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
