//! `GET /health` (spec §4.3): "model, guardrails, job state (last_requested/
//! started/completed/failed + last_error), memory paths."

use axum::extract::State;
use axum::Json;
use eva_model::ModelClient;
use serde_json::json;

use crate::state::AppState;

pub async fn health<M: ModelClient>(State(state): State<AppState<M>>) -> Json<serde_json::Value> {
    let model_id = state.model.model_id();
    let jobs = state.jobs.snapshot();

    Json(json!({
        "status": "ok",
        "uptimeMs": state.start_time.elapsed().as_millis() as i64,
        "model": {
            "provider": model_id.provider,
            "id": model_id.id,
        },
        "guardrails": {
            "insight": {
                "cooldownMs": state.config.insight.cooldown_ms,
                "maxFrames": state.config.insight.max_frames,
                "maxBodyBytes": state.config.insight.max_body_bytes,
                "ttsStyle": state.config.insight.tts_style,
            },
            "allowedTones": eva_memory::ALLOWED_TONES,
        },
        "jobs": jobs,
        "memory": {
            "dir": state.config.memory.dir,
            "workingLog": state.working_log.path(),
            "assetsDir": *state.assets_dir,
            "cacheDir": *state.cache_dir,
        },
    }))
}
