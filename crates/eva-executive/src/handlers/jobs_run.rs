//! `POST /jobs/run` (spec §4.3, §6): `{job:'compaction'|'promotion', now_ms?}`
//! → job-specific payload. Shared by both the HTTP surface and the internal
//! cron scheduler (`crate::scheduler`), which is why the actual run logic lives
//! in [`run_job`] rather than inline in the handler.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use eva_common::{AppError, ErrorCode};
use eva_memory::{run_compaction, run_promotion, window_for_local_midnight};
use eva_model::ModelClient;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::body::parse_json_body;
use crate::error_response::HttpError;
use crate::jobs::JobName;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct JobsRunRequest {
    job: String,
    #[serde(default)]
    now_ms: Option<i64>,
}

pub async fn jobs_run<M: ModelClient>(
    State(state): State<AppState<M>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<Value>, HttpError> {
    let req: JobsRunRequest = parse_json_body(&headers, &body, state.config.insight.max_body_bytes)?;
    let job = JobName::parse(&req.job)
        .ok_or_else(|| AppError::new(ErrorCode::InvalidRequest, format!("unknown job '{}'", req.job)))?;
    let now_ms = req.now_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let (payload, error_code) = run_job(&state, job, now_ms).await;
    if let Some(code) = error_code {
        return Err(AppError::new(code, "job failed; see job runtime state for details").into());
    }
    Ok(Json(payload))
}

/// Run `job` now if no prior run is in flight (the resolved Open Question on
/// concurrent scheduler firings: skip, don't queue). Returns the response
/// payload and, on failure, the error code the HTTP handler should surface.
pub async fn run_job<M: ModelClient>(state: &AppState<M>, job: JobName, now_ms: i64) -> (Value, Option<ErrorCode>) {
    state.jobs.record_requested(job, now_ms);
    if !state.jobs.try_start(job, now_ms) {
        return (json!({ "job": job.as_str(), "skipped": true, "reason": "already running" }), None);
    }

    match job {
        JobName::Compaction => {
            let working_log = state.working_log.clone();
            let short_term = state.short_term.clone();
            let model = state.model.clone();
            let window_ms = state.config.jobs.compaction.window_ms;
            let result = state
                .queue
                .enqueue(move || Box::pin(async move { run_compaction(now_ms, window_ms, &working_log, &short_term, &*model).await }))
                .await;

            match result {
                Ok(result) => {
                    state.jobs.mark_completed(job, now_ms);
                    (serde_json::to_value(result).unwrap_or(Value::Null), None)
                }
                Err(e) => {
                    state.jobs.mark_failed(job, now_ms, e.to_string());
                    (Value::Null, Some(ErrorCode::CompactionJobFailed))
                }
            }
        }
        JobName::Promotion => {
            let short_term = state.short_term.clone();
            let semantic = state.semantic.clone();
            let vector = state.vector.clone();
            let whitelist = state.whitelist.clone();
            let cache_dir = state.cache_dir.clone();
            let (window_start_ms, window_end_ms) = window_for_local_midnight(local_midnight_ms(now_ms));

            let result = state
                .queue
                .enqueue(move || {
                    Box::pin(async move {
                        run_promotion(now_ms, window_start_ms, window_end_ms, &short_term, &semantic, &vector, &whitelist, &cache_dir).await
                    })
                })
                .await;

            match result {
                Ok(result) => {
                    state.jobs.mark_completed(job, now_ms);
                    (serde_json::to_value(result).unwrap_or(Value::Null), None)
                }
                Err(e) => {
                    state.jobs.mark_failed(job, now_ms, e.to_string());
                    (Value::Null, Some(ErrorCode::PromotionJobFailed))
                }
            }
        }
    }
}

/// UTC midnight on or before `now_ms`. Timezone conversion beyond UTC is left
/// to an external collaborator per spec §1 ("config file loading from disk" and
/// scheduling primitives are out of scope) — `config.jobs.timezone` is carried
/// through `/health` for observability but only UTC is computed here, recorded
/// as an Open Question resolution in `DESIGN.md`.
fn local_midnight_ms(now_ms: i64) -> i64 {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    now_ms.div_euclid(DAY_MS) * DAY_MS
}
