//! `POST /events` (spec §4.3, §6): ingests the vision Detector's high-level
//! event batch, materializing one `wm_event` working-memory entry per event with
//! a derived short summary, then enqueuing the append under the serial write
//! queue.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use eva_memory::{Severity, WorkingMemoryEntry};
use eva_model::ModelClient;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::body::parse_json_body;
use crate::error_response::{unhandled, HttpError};
use crate::state::AppState;

const SUMMARY_MAX_CHARS: usize = 180;
const SUMMARY_MAX_FIELDS: usize = 4;

#[derive(Debug, Deserialize)]
struct EventItem {
    name: String,
    ts_ms: i64,
    severity: Severity,
    #[serde(default)]
    track_id: Option<i64>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct EventsRequest {
    v: u8,
    source: String,
    events: Vec<EventItem>,
    #[serde(default)]
    #[allow(dead_code)]
    meta: Option<Value>,
}

/// `name` followed by up to [`SUMMARY_MAX_FIELDS`] scalar `k=v` pairs from
/// `data`, in the object's own key order, capped at [`SUMMARY_MAX_CHARS`] total.
fn derive_summary(name: &str, data: &Value) -> String {
    let mut summary = name.to_string();
    if let Value::Object(map) = data {
        for (k, v) in map.iter().take(SUMMARY_MAX_FIELDS) {
            let scalar = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            summary.push(' ');
            summary.push_str(&format!("{k}={scalar}"));
        }
    }
    summary.chars().take(SUMMARY_MAX_CHARS).collect()
}

pub async fn post_events<M: ModelClient>(
    State(state): State<AppState<M>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<serde_json::Value>, HttpError> {
    let req: EventsRequest = parse_json_body(&headers, &body, state.config.insight.max_body_bytes)?;

    if req.v != 1 {
        return Err(eva_common::AppError::new(eva_common::ErrorCode::InvalidRequest, "unsupported events payload version").into());
    }
    if req.events.is_empty() {
        return Err(eva_common::AppError::new(eva_common::ErrorCode::InvalidRequest, "events must be non-empty").into());
    }

    let entries: Vec<WorkingMemoryEntry> = req
        .events
        .iter()
        .map(|e| WorkingMemoryEntry::WmEvent {
            source: req.source.clone(),
            name: e.name.clone(),
            severity: e.severity,
            track_id: e.track_id,
            summary: derive_summary(&e.name, &e.data),
            data: e.data.clone(),
            ts_ms: e.ts_ms,
        })
        .collect();

    let accepted = entries.len() as i64;
    let working_log = state.working_log.clone();
    state
        .queue
        .enqueue(move || Box::pin(async move { working_log.append(&entries) }))
        .await
        .map_err(unhandled)?;

    let ts_ms = chrono::Utc::now().timestamp_millis();
    Ok(Json(json!({ "accepted": accepted, "ts_ms": ts_ms })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_key_order_and_caps_length() {
        let data = json!({"roi": "front_door", "dwell_ms": 1200, "conf": 0.92});
        let summary = derive_summary("roi_dwell", &data);
        assert!(summary.starts_with("roi_dwell"));
        assert!(summary.contains("roi=front_door"));
        assert!(summary.contains("dwell_ms=1200"));
        assert!(summary.contains("conf=0.92"));
        assert!(summary.len() <= SUMMARY_MAX_CHARS);
    }
}
