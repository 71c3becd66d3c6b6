//! `POST /insight` (spec §4.8): cooldown-gated scene insight generation from a
//! bounded set of image assets, via the mandatory `submit_insight` tool.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine;
use eva_common::{estimate_tokens, AppError, ErrorCode};
use eva_memory::{InsightUsage, Severity, WorkingMemoryEntry};
use eva_model::tools::{self, InsightArgs, SeverityArg};
use eva_model::types::{CompletionOutcome, CompletionRequest, ContentBlock, Message, Role};
use eva_model::ModelClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::body::parse_json_body;
use crate::error_response::{unhandled, HttpError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct FrameRef {
    #[serde(default)]
    frame_id: Option<String>,
    #[serde(default)]
    ts_ms: Option<i64>,
    mime: String,
    asset_rel_path: String,
}

#[derive(Debug, Deserialize)]
struct InsightRequest {
    #[serde(default)]
    clip_id: Option<String>,
    #[serde(default)]
    trigger_frame_id: Option<String>,
    frames: Vec<FrameRef>,
}

#[derive(Debug, Serialize)]
struct InsightResponse {
    summary: InsightSummary,
    usage: InsightUsage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsightSummary {
    clip_id: String,
    trigger_frame_id: String,
    one_liner: String,
    what_changed: Vec<String>,
    severity: Severity,
    tags: Vec<String>,
    tts_response: String,
}

/// Join `rel` onto `assets_dir`, rejecting any path that escapes it (spec §4.8
/// step 3). Rejects absolute paths and `..` components without requiring the
/// file to exist yet, since escape must be caught before a missing-file check.
fn resolve_asset_path(assets_dir: &Path, rel: &str) -> Result<PathBuf, AppError> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() || rel_path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return Err(AppError::new(ErrorCode::InsightAssetInvalidPath, format!("asset path '{rel}' escapes the assets directory")));
    }
    Ok(assets_dir.join(rel_path))
}

fn severity_arg_to_model(s: SeverityArg) -> Severity {
    match s {
        SeverityArg::Low => Severity::Low,
        SeverityArg::Medium => Severity::Medium,
        SeverityArg::High => Severity::High,
    }
}

pub async fn insight<M: ModelClient>(
    State(state): State<AppState<M>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<InsightResponse>, HttpError> {
    let req: InsightRequest = parse_json_body(&headers, &body, state.config.insight.max_body_bytes)?;

    let max_frames = state.config.insight.max_frames.min(6);
    if req.frames.is_empty() || req.frames.len() > max_frames {
        return Err(AppError::new(
            ErrorCode::TooManyFrames,
            format!("frames must contain between 1 and {max_frames} entries, got {}", req.frames.len()),
        )
        .into());
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    {
        let mut last = state.last_insight_request_at_ms.lock().await;
        if let Some(last_at) = *last {
            let elapsed = now_ms - last_at;
            if elapsed < state.config.insight.cooldown_ms {
                let retry_after_ms = state.config.insight.cooldown_ms - elapsed;
                return Err(AppError::new(ErrorCode::CooldownActive, "insight cooldown active")
                    .with_extra(json!({ "retryAfterMs": retry_after_ms }))
                    .into());
            }
        }
        *last = Some(now_ms);
    }

    let mut image_blocks = Vec::with_capacity(req.frames.len());
    let mut asset_rel_paths = Vec::with_capacity(req.frames.len());
    for frame in &req.frames {
        let path = resolve_asset_path(&state.assets_dir, &frame.asset_rel_path)?;
        let bytes = std::fs::read(&path)
            .map_err(|_| AppError::new(ErrorCode::InsightAssetMissing, format!("asset '{}' not found", frame.asset_rel_path)))?;
        image_blocks.push(ContentBlock::Image {
            mime: frame.mime.clone(),
            data_b64: base64::engine::general_purpose::STANDARD.encode(bytes),
        });
        asset_rel_paths.push(frame.asset_rel_path.clone());
    }

    let style_rules = match state.config.insight.tts_style {
        eva_common::config::TtsStyle::Clean => {
            "TTS_STYLE: clean. Keep tts_response plain, factual, and free of slang or profanity."
        }
        eva_common::config::TtsStyle::Spicy => {
            "TTS_STYLE: spicy. tts_response may be witty and informal, but must stay safe for a household speaker."
        }
    };
    let system = format!(
        "{persona}\n\nDescribe what changed across the supplied frames as a scene insight.\n{style_rules}",
        persona = state.persona,
    );

    let mut content = image_blocks.clone();
    content.push(ContentBlock::Text {
        text: format!(
            "clip_id={}\ntrigger_frame_id={}\nframe_count={}",
            req.clip_id.as_deref().unwrap_or("unknown"),
            req.trigger_frame_id.as_deref().unwrap_or("unknown"),
            req.frames.len()
        ),
    });
    let user_message = Message { role: Role::User, content };

    let request = CompletionRequest {
        system: system.clone(),
        messages: vec![user_message],
        tools: vec![tools::submit_insight_tool_spec()],
        force_tool: Some(tools::SUBMIT_INSIGHT.to_string()),
    };

    let outcome = state.model.complete(request).await.map_err(|e| AppError::new(ErrorCode::ModelCallFailed, e.to_string()))?;

    let call = match outcome {
        CompletionOutcome::ToolCall(call) if call.name == tools::SUBMIT_INSIGHT => call,
        _ => return Err(AppError::new(ErrorCode::ModelNoToolCall, "model did not call submit_insight").into()),
    };
    let args: InsightArgs = tools::parse_insight(&call.arguments).map_err(|e| AppError::new(ErrorCode::ModelInvalidToolArgs, e.to_string()))?;

    let sanitized_tags = state.whitelist.sanitize(&args.tags);

    let clip_id = req.clip_id.clone().unwrap_or_else(|| request_clip_id(now_ms));
    let trigger_frame_id = req
        .trigger_frame_id
        .clone()
        .or_else(|| req.frames.first().and_then(|f| f.frame_id.clone()))
        .unwrap_or_else(|| "unknown".to_string());

    let usage = InsightUsage {
        input_tokens: estimate_tokens(&system) as i64,
        output_tokens: estimate_tokens(&args.one_liner) as i64,
        cost_usd: 0.0,
    };

    let entry = WorkingMemoryEntry::WmInsight {
        source: "vision".to_string(),
        clip_id: clip_id.clone(),
        trigger_frame_id: trigger_frame_id.clone(),
        severity: severity_arg_to_model(args.severity),
        one_liner: args.one_liner.clone(),
        what_changed: args.what_changed.clone(),
        tags: sanitized_tags.tags.clone(),
        assets: asset_rel_paths,
        narration: Some(args.tts_response.clone()),
        usage: usage.clone(),
        ts_ms: now_ms,
    };

    let working_log = state.working_log.clone();
    state
        .queue
        .enqueue(move || Box::pin(async move { working_log.append(&[entry]) }))
        .await
        .map_err(unhandled)?;

    Ok(Json(InsightResponse {
        summary: InsightSummary {
            clip_id,
            trigger_frame_id,
            one_liner: args.one_liner,
            what_changed: args.what_changed,
            severity: severity_arg_to_model(args.severity),
            tags: sanitized_tags.tags,
            tts_response: args.tts_response,
        },
        usage,
    }))
}

fn request_clip_id(now_ms: i64) -> String {
    format!("clip-{now_ms}")
}
