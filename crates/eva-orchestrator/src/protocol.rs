//! Wire types for the two WebSocket surfaces (spec §6): the UI-facing `/eye`
//! socket (text JSON `hello`/`command`/`text_output`/`speech_output`, binary
//! `frame_binary` + raw bytes) and the Detector peer socket `/infer`
//! (`detections`/`frame_events`/`insight`/`error`). Tagged on `type`, the same
//! discriminated-union convention `eva_memory::WorkingMemoryEntry` uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binary frame header, sent as one binary WebSocket message immediately
/// followed by a second binary message of exactly `image_len` raw bytes
/// (spec §6: "`frame_binary{...}` + `image_len` bytes").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameBinaryHeader {
    pub frame_id: String,
    pub ts_ms: i64,
    pub width: u32,
    pub height: u32,
    pub mime: String,
    pub image_len: usize,
}

/// Text JSON messages the Orchestrator sends to the UI over `/eye`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToUi {
    Hello { version: String },
    TextOutput { text: String, meta: Value, request_id: String, session_id: Option<String> },
    SpeechOutput { bytes_b64: String, mime: String },
    Error { frame_id: Option<String>, code: String, message: String },
}

/// Text JSON messages the UI sends to the Orchestrator over `/eye`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromUi {
    Command { #[serde(flatten)] body: Value },
}

/// Frame-scoped envelopes the Detector peer emits over `/infer`, forwarded to
/// the UI by `frame_id` and otherwise consumed by the alert debouncer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromDetector {
    Detections { frame_id: String, items: Vec<Value> },
    FrameEvents { frame_id: String, events: Vec<DetectorEvent> },
    Insight { clip_id: String, trigger_frame_id: String, summary: InsightSummaryPayload, usage: Value },
    Error { frame_id: Option<String>, code: String, message: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorEvent {
    pub name: String,
    #[serde(default)]
    pub track_id: Option<i64>,
    pub severity: String,
    #[serde(flatten)]
    pub rest: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsightSummaryPayload {
    pub severity: String,
    #[serde(flatten)]
    pub rest: Value,
}

impl FromDetector {
    /// The `frame_id` a reply is scoped to, if any — `insight` is clip-scoped,
    /// not frame-scoped, so it has none.
    pub fn frame_id(&self) -> Option<&str> {
        match self {
            FromDetector::Detections { frame_id, .. } => Some(frame_id),
            FromDetector::FrameEvents { frame_id, .. } => Some(frame_id),
            FromDetector::Insight { trigger_frame_id, .. } => Some(trigger_frame_id),
            FromDetector::Error { frame_id, .. } => frame_id.as_deref(),
        }
    }
}
