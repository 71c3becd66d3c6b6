//! `POST /text` (spec §4.3, §6): a thin proxy to the Executive's `/respond`,
//! with its own character cap applied before the request ever leaves this
//! process.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use eva_common::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::body::parse_json_body;
use crate::error_response::HttpError;
use crate::state::OrchestratorState;
use crate::tts::Synthesizer;

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
    pub meta: Value,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub async fn post_text<S: Synthesizer>(
    State(state): State<OrchestratorState<S>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<TextResponse>, HttpError> {
    let req: TextRequest = parse_json_body(&headers, &body, 64 * 1024)?;

    if req.text.trim().is_empty() {
        return Err(AppError::new(ErrorCode::InvalidRequest, "text must be non-empty").into());
    }
    if req.text.chars().count() > state.config.text.max_chars {
        return Err(AppError::new(
            ErrorCode::InvalidRequest,
            format!("text exceeds the {}-character limit", state.config.text.max_chars),
        )
        .into());
    }

    let url = format!("{}/respond", state.config.executive_base_url.trim_end_matches('/'));
    let resp = state
        .http
        .post(&url)
        .json(&serde_json::json!({ "text": req.text, "session_id": req.session_id }))
        .send()
        .await
        .map_err(|e| AppError::new(ErrorCode::ModelCallFailed, format!("executive request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::new(ErrorCode::ModelCallFailed, format!("executive returned {status}: {body}")).into());
    }

    let parsed: TextResponse = resp
        .json()
        .await
        .map_err(|e| AppError::new(ErrorCode::ModelCallFailed, format!("invalid executive response: {e}")))?;

    Ok(Json(parsed))
}
