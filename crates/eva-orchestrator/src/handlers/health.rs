//! `GET /health` (spec §6): Orchestrator process liveness plus the Detector
//! connection state, mirroring the shape of the Executive's `/health`.

use axum::extract::State;
use axum::Json;
use serde_json::json;
use std::sync::atomic::Ordering;

use crate::state::OrchestratorState;
use crate::tts::Synthesizer;

pub async fn health<S: Synthesizer>(State(state): State<OrchestratorState<S>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptimeMs": state.start_time.elapsed().as_millis() as i64,
        "detectorConnected": state.detector_connected.load(Ordering::SeqCst),
        "uiConnected": state.ui.lock().await.is_some(),
        "executiveBaseUrl": state.config.executive_base_url,
    }))
}
