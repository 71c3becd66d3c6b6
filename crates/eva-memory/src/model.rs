//! Data model for the memory pipeline: the working-memory log's entry variants, the
//! short-term and semantic store rows, and the vector store's entry shape.
//!
//! `WorkingMemoryEntry` is a `#[serde(tag = "type")]` discriminated union, the same
//! style the teacher uses for its own tagged node/match-type enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputMeta {
    pub tone: String,
    pub concepts: Vec<String>,
    pub surprise: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsightUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
}

/// One line of the working-memory log. Tagged by `type` at the wire boundary so
/// readers can discriminate without a separate envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WorkingMemoryEntry {
    #[serde(rename = "text_input")]
    TextInput {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        text: String,
        ts_ms: i64,
    },
    #[serde(rename = "text_output")]
    TextOutput {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        text: String,
        meta: TextOutputMeta,
        ts_ms: i64,
    },
    #[serde(rename = "wm_event")]
    WmEvent {
        source: String,
        name: String,
        severity: Severity,
        #[serde(skip_serializing_if = "Option::is_none")]
        track_id: Option<i64>,
        summary: String,
        data: serde_json::Value,
        ts_ms: i64,
    },
    #[serde(rename = "wm_insight")]
    WmInsight {
        #[serde(default = "default_vision_source")]
        source: String,
        clip_id: String,
        trigger_frame_id: String,
        severity: Severity,
        one_liner: String,
        what_changed: Vec<String>,
        tags: Vec<String>,
        assets: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        narration: Option<String>,
        usage: InsightUsage,
        ts_ms: i64,
    },
}

fn default_vision_source() -> String {
    "vision".to_string()
}

impl WorkingMemoryEntry {
    pub fn ts_ms(&self) -> i64 {
        match self {
            Self::TextInput { ts_ms, .. }
            | Self::TextOutput { ts_ms, .. }
            | Self::WmEvent { ts_ms, .. }
            | Self::WmInsight { ts_ms, .. } => *ts_ms,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TextInput { .. } => "text_input",
            Self::TextOutput { .. } => "text_output",
            Self::WmEvent { .. } => "wm_event",
            Self::WmInsight { .. } => "wm_insight",
        }
    }
}

/// A row in the short-term store, created by compaction, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShortTermSummary {
    pub id: i64,
    pub created_at_ms: i64,
    pub bucket_start_ms: i64,
    pub bucket_end_ms: i64,
    pub summary_text: String,
    pub source_entry_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SemanticKind {
    Trait,
    Preference,
    Fact,
    Project,
    Rule,
}

impl SemanticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trait => "trait",
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Project => "project",
            Self::Rule => "rule",
        }
    }
}

/// A row in the semantic store: a distilled trait/preference/fact/project/rule,
/// merge-upserted daily and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SemanticItem {
    pub id: String,
    pub kind: SemanticKind,
    pub text: String,
    pub confidence: f64,
    pub support_count: i64,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub source_summary_ids: Vec<String>,
    pub updated_at_ms: i64,
}

/// Which logical vector table an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorTable {
    Experiences,
    Personality,
}

impl VectorTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Experiences => "long_term_experiences",
            Self::Personality => "long_term_personality",
        }
    }
}

/// A row in a vector table: `long_term_experiences` or `long_term_personality`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorEntry {
    pub id: String,
    pub source_summary_id: String,
    pub source_created_at_ms: i64,
    pub updated_at_ms: i64,
    pub text: String,
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
}

/// Per-session tone, whitelisted, atomically persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToneEntry {
    pub tone: String,
    pub updated_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_memory_entry_round_trips_tagged_json() {
        let entry = WorkingMemoryEntry::TextInput {
            request_id: "r1".into(),
            session_id: Some("s1".into()),
            text: "hi".into(),
            ts_ms: 10,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"text_input\""));
        let back: WorkingMemoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn ts_ms_accessor_covers_all_variants() {
        let e = WorkingMemoryEntry::WmEvent {
            source: "vision".into(),
            name: "roi_dwell".into(),
            severity: Severity::Medium,
            track_id: Some(3),
            summary: "roi_dwell roi=front_door".into(),
            data: serde_json::json!({}),
            ts_ms: 42,
        };
        assert_eq!(e.ts_ms(), 42);
        assert_eq!(e.type_name(), "wm_event");
    }
}
