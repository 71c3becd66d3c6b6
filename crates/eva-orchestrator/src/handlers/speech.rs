//! `POST /speech` (spec §4.3, §6): proxies to the Executive's `/respond` for
//! the text, then synthesizes speech for the returned text through the
//! configured [`Synthesizer`], caching by `(text, voice, rate)` and reporting
//! the outcome via `X-Eva-TTS-Cache: HIT|MISS`.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use eva_common::{AppError, ErrorCode};
use serde::Deserialize;

use crate::body::parse_json_body;
use crate::error_response::HttpError;
use crate::state::OrchestratorState;
use crate::tts::Synthesizer;

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn post_speech<S: Synthesizer>(
    State(state): State<OrchestratorState<S>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, HttpError> {
    let req: SpeechRequest = parse_json_body(&headers, &body, 64 * 1024)?;

    if req.text.trim().is_empty() {
        return Err(AppError::new(ErrorCode::InvalidRequest, "text must be non-empty").into());
    }
    if req.text.chars().count() > state.config.speech.max_chars {
        return Err(AppError::new(
            ErrorCode::InvalidRequest,
            format!("text exceeds the {}-character limit", state.config.speech.max_chars),
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

    #[derive(Deserialize)]
    struct RespondBody {
        text: String,
    }
    let parsed: RespondBody = resp
        .json()
        .await
        .map_err(|e| AppError::new(ErrorCode::ModelCallFailed, format!("invalid executive response: {e}")))?;

    let voice = state.config.speech.voice.clone();
    let rate = state.config.speech.rate.clone();

    let (bytes, cache_header) = match state.tts_cache.get(&parsed.text, &voice, &rate) {
        Some(bytes) => (bytes, "HIT"),
        None => {
            let bytes = state
                .synthesizer
                .synthesize(&parsed.text, &voice, &rate)
                .await
                .map_err(|e| AppError::new(ErrorCode::ModelCallFailed, format!("speech synthesis failed: {e}")))?;
            state.tts_cache.put(parsed.text.clone(), voice, rate, bytes.clone());
            (bytes, "MISS")
        }
    };

    let mut response = (axum::http::StatusCode::OK, bytes).into_response();
    response.headers_mut().insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    response
        .headers_mut()
        .insert("X-Eva-TTS-Cache", HeaderValue::from_static(cache_header));
    Ok(response)
}
