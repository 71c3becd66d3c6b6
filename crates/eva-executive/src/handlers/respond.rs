//! `POST /respond` (spec §4.7): the full respond path — replay the working log,
//! assemble a token-budgeted memory context, call the model through the single
//! mandatory `commit_text_response` tool (falling back to plain text if the
//! model declines the tool), persist the turn, and update tone.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use eva_common::{AppError, ErrorCode};
use eva_memory::{
    build_long_term_context, build_short_term_context, embed_query, ToneCache, VectorTable, WorkingMemoryEntry, ALLOWED_TONES, DEFAULT_TONE,
};
use eva_model::tools::{self, TextResponseArgs};
use eva_model::types::{CompletionOutcome, CompletionRequest, Message};
use eva_model::ModelClient;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::body::parse_json_body;
use crate::error_response::{unhandled, HttpError};
use crate::state::AppState;

const MAX_CONCEPTS: usize = 6;
const RECENT_EXPERIENCE_CANDIDATES: usize = 64;
const FALLBACK_NOTE: &str = "fallback";

#[derive(Debug, Deserialize)]
struct RespondRequest {
    text: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RespondResponse {
    text: String,
    meta: eva_memory::TextOutputMeta,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

static EXPLICIT_TONE_RE: OnceLock<regex::Regex> = OnceLock::new();

/// Detects phrases like "be more playful", "switch to a serious tone", "stay
/// neutral" that name one of `ALLOWED_TONES` directly — an explicit request the
/// respond path honors over whatever tone the model's tool call reports (spec
/// §4.7 step 8, "applying explicit tone change semantics").
fn detect_explicit_tone(text: &str) -> Option<&'static str> {
    let re = EXPLICIT_TONE_RE.get_or_init(|| {
        regex::Regex::new(r"(?i)\b(?:be|stay|sound|go|switch to a?)\s+(?:more\s+)?(?:a\s+)?(neutral|warm|playful|serious|concerned)\b").unwrap()
    });
    let caught = re.captures(text)?.get(1)?.as_str().to_lowercase();
    ALLOWED_TONES.iter().find(|t| **t == caught).copied()
}

fn render_entry_message(entry: &WorkingMemoryEntry) -> Message {
    let line = serde_json::to_string(entry).unwrap_or_default();
    let text = format!("WM_KIND={}\nts_ms: {}\nWM_JSON: {line}", entry.type_name(), entry.ts_ms());
    match entry {
        WorkingMemoryEntry::TextOutput { .. } => Message::assistant_text(text),
        _ => Message::user_text(text),
    }
}

pub async fn respond<M: ModelClient>(
    State(state): State<AppState<M>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<RespondResponse>, HttpError> {
    let req: RespondRequest = parse_json_body(&headers, &body, state.config.insight.max_body_bytes)?;
    if req.text.trim().is_empty() {
        return Err(AppError::new(ErrorCode::InvalidRequest, "text must be non-empty").into());
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let now_ms = chrono::Utc::now().timestamp_millis();
    let session_key = ToneCache::session_key(req.session_id.as_deref());
    let current_tone = {
        let cache = state.tone_cache.lock().await;
        cache.get(&session_key)
    };
    let explicit_tone = detect_explicit_tone(&req.text);

    let working_log_entries = state.working_log.read().map_err(unhandled)?;
    let mut messages: Vec<Message> = working_log_entries.iter().map(render_entry_message).collect();

    let query_embedding = embed_query(&req.text);
    let semantic_items = state
        .semantic
        .top_by_support(eva_memory::retrieval::MAX_TRAIT_ITEMS as i64)
        .map_err(unhandled)?;
    let experiences = state
        .vector
        .recent(VectorTable::Experiences.table_name(), RECENT_EXPERIENCE_CANDIDATES)
        .await
        .map_err(unhandled)?;
    let long_term = build_long_term_context(&semantic_items, &query_embedding, &experiences);

    let recent_summaries = state
        .short_term
        .recent(eva_memory::retrieval::MAX_SHORT_TERM_ROWS as i64)
        .map_err(unhandled)?;
    let (short_term, _mode) = build_short_term_context(&req.text, now_ms, &working_log_entries, &recent_summaries, &state.whitelist);

    let allowed_concepts = state.whitelist.allowed_sorted();
    let system = format!(
        "{persona}\n\n{short_term}\n\n{long_term}\n\nALLOWED_CONCEPTS: {concepts}\nMAX_CONCEPTS: {max_concepts}\nCURRENT_TONE: {tone}\nALLOWED_TONES: {tones}",
        persona = state.persona,
        short_term = short_term.text,
        long_term = long_term.text,
        concepts = allowed_concepts.join(","),
        max_concepts = MAX_CONCEPTS,
        tone = current_tone,
        tones = ALLOWED_TONES.join(","),
    );

    messages.push(Message::user_text(format!("CURRENT_USER_REQUEST:\n{}", req.text)));

    let completion_request = CompletionRequest {
        system,
        messages,
        tools: vec![tools::text_response_tool_spec()],
        force_tool: Some(tools::COMMIT_TEXT_RESPONSE.to_string()),
    };

    let outcome = state.model.complete(completion_request).await;

    let (reply_text, meta) = match outcome {
        Ok(CompletionOutcome::ToolCall(call)) if call.name == tools::COMMIT_TEXT_RESPONSE => {
            let args: TextResponseArgs = tools::parse_text_response(&call.arguments)
                .map_err(|e| AppError::new(ErrorCode::ModelInvalidToolArgs, e.to_string()))?;
            let sanitized = state.whitelist.sanitize(&args.meta.concepts);
            let surprise = args.meta.surprise.clamp(0.0, 1.0);
            let tone = resolve_tone(&args.meta.tone, explicit_tone, &current_tone)?;
            (
                args.text,
                eva_memory::TextOutputMeta {
                    tone,
                    concepts: sanitized.tags,
                    surprise,
                    note: args.meta.note,
                },
            )
        }
        Ok(CompletionOutcome::ToolCall(_)) => {
            return Err(AppError::new(ErrorCode::ModelNoToolCall, "model called an unexpected tool").into());
        }
        Ok(CompletionOutcome::Text(text)) => (
            text,
            fallback_meta(&state.whitelist, explicit_tone.unwrap_or(current_tone.as_str())),
        ),
        Err(e) => return Err(AppError::new(ErrorCode::ModelCallFailed, e.to_string()).into()),
    };

    let tone_for_cache = meta.tone.clone();
    let tone_reason = explicit_tone.map(|_| "explicit request".to_string());

    let input_entry = WorkingMemoryEntry::TextInput {
        request_id: request_id.clone(),
        session_id: req.session_id.clone(),
        text: req.text.clone(),
        ts_ms: now_ms,
    };
    let output_entry = WorkingMemoryEntry::TextOutput {
        request_id: request_id.clone(),
        session_id: req.session_id.clone(),
        text: reply_text.clone(),
        meta: meta.clone(),
        ts_ms: now_ms,
    };

    let working_log = state.working_log.clone();
    let tone_cache = state.tone_cache.clone();
    state
        .queue
        .enqueue(move || {
            Box::pin(async move {
                working_log.append(&[input_entry, output_entry]).map_err(|e| e.to_string())?;
                let mut cache = tone_cache.lock().await;
                cache
                    .set(&session_key, &tone_for_cache, tone_reason, now_ms)
                    .map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e: String| AppError::new(ErrorCode::MemoryWriteFailed, e))?;

    Ok(Json(RespondResponse {
        text: reply_text,
        meta,
        request_id,
        session_id: req.session_id,
    }))
}

/// Validate the model-reported tone against [`ALLOWED_TONES`], with the
/// explicit-tone-change regex taking priority when it matched (spec §4.7 step
/// 8). An unrecognized tone surfaces as `MODEL_INVALID_TOOL_ARGS`, per the
/// resolved Open Question in `spec.md` §9.
fn resolve_tone(model_tone: &str, explicit_tone: Option<&'static str>, current_tone: &str) -> Result<String, AppError> {
    if let Some(tone) = explicit_tone {
        return Ok(tone.to_string());
    }
    let normalized = model_tone.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(current_tone.to_string());
    }
    if ALLOWED_TONES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(AppError::new(ErrorCode::ModelInvalidToolArgs, format!("tone '{model_tone}' is not in the allowed tone set")))
    }
}

fn fallback_meta(whitelist: &eva_common::TagWhitelist, tone: &str) -> eva_memory::TextOutputMeta {
    let fallback_concept = whitelist.sanitize(Vec::<String>::new()).tags;
    eva_memory::TextOutputMeta {
        tone: if ALLOWED_TONES.contains(&tone) { tone.to_string() } else { DEFAULT_TONE.to_string() },
        concepts: fallback_concept,
        surprise: 0.0,
        note: Some(FALLBACK_NOTE.to_string()),
    }
}
