//! Tool contracts: declarative shapes and schema validation for the three
//! mandatory tool calls (spec §2 "Tool contracts & schema guards", §4.7 step 7,
//! §4.8 step 4, §4.9). Each tool has a JSON Schema for the request offered to the
//! model and a typed, bounds-checked parser for the arguments it returns.

use serde::Deserialize;
use serde_json::json;

use crate::types::ToolSpec;

#[derive(Debug, thiserror::Error)]
pub enum ToolValidationError {
    #[error("failed to parse tool arguments: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field `{field}` has length {len}, expected between {min} and {max}")]
    LengthOutOfBounds { field: &'static str, len: usize, min: usize, max: usize },
    #[error("field `{field}` must be one of {allowed:?}, got `{got}`")]
    NotInSet { field: &'static str, allowed: &'static [&'static str], got: String },
}

pub type Result<T> = std::result::Result<T, ToolValidationError>;

pub const COMMIT_TEXT_RESPONSE: &str = "commit_text_response";
pub const SUBMIT_INSIGHT: &str = "submit_insight";
pub const COMMIT_WORKING_MEMORY_COMPACTION: &str = "commit_working_memory_compaction";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputMetaArgs {
    pub tone: String,
    #[serde(default)]
    pub concepts: Vec<String>,
    pub surprise: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextResponseArgs {
    pub text: String,
    pub meta: TextOutputMetaArgs,
}

pub fn text_response_tool_spec() -> ToolSpec {
    ToolSpec {
        name: COMMIT_TEXT_RESPONSE.to_string(),
        description: "Commit the assistant's reply to the user along with tone, concept, and surprise metadata.".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["text", "meta"],
            "properties": {
                "text": {"type": "string"},
                "meta": {
                    "type": "object",
                    "required": ["tone", "concepts", "surprise"],
                    "properties": {
                        "tone": {"type": "string"},
                        "concepts": {"type": "array", "items": {"type": "string"}},
                        "surprise": {"type": "number", "minimum": 0, "maximum": 1},
                        "note": {"type": "string"}
                    }
                }
            }
        }),
    }
}

/// Parse `commit_text_response` arguments. Concept-whitelist sanitization and
/// surprise clamping are the respond path's job (spec §4.7 step 7); this only
/// enforces shape.
pub fn parse_text_response(args: &serde_json::Value) -> Result<TextResponseArgs> {
    Ok(serde_json::from_value(args.clone())?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityArg {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InsightArgs {
    pub one_liner: String,
    pub what_changed: Vec<String>,
    pub tts_response: String,
    pub severity: SeverityArg,
    pub tags: Vec<String>,
}

pub fn submit_insight_tool_spec() -> ToolSpec {
    ToolSpec {
        name: SUBMIT_INSIGHT.to_string(),
        description: "Submit a scene insight derived from the supplied frames.".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["one_liner", "what_changed", "tts_response", "severity", "tags"],
            "properties": {
                "one_liner": {"type": "string"},
                "what_changed": {"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 5},
                "tts_response": {"type": "string"},
                "severity": {"type": "string", "enum": ["low", "medium", "high"]},
                "tags": {"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 6}
            }
        }),
    }
}

/// Parse `submit_insight` arguments, enforcing `what_changed` ∈ [1,5] and
/// `tags` ∈ [1,6] (spec §4.8 step 4).
pub fn parse_insight(args: &serde_json::Value) -> Result<InsightArgs> {
    let parsed: InsightArgs = serde_json::from_value(args.clone())?;
    if !(1..=5).contains(&parsed.what_changed.len()) {
        return Err(ToolValidationError::LengthOutOfBounds {
            field: "what_changed",
            len: parsed.what_changed.len(),
            min: 1,
            max: 5,
        });
    }
    if !(1..=6).contains(&parsed.tags.len()) {
        return Err(ToolValidationError::LengthOutOfBounds {
            field: "tags",
            len: parsed.tags.len(),
            min: 1,
            max: 6,
        });
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompactionArgs {
    pub bullets: Vec<String>,
}

pub fn compaction_tool_spec() -> ToolSpec {
    ToolSpec {
        name: COMMIT_WORKING_MEMORY_COMPACTION.to_string(),
        description: "Commit a set of bullet-point summaries for the working-memory entries being compacted.".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["bullets"],
            "properties": {
                "bullets": {"type": "array", "items": {"type": "string"}, "minItems": 3, "maxItems": 7}
            }
        }),
    }
}

/// Parse `commit_working_memory_compaction` arguments, enforcing `bullets` ∈ [3,7]
/// (spec §4.9) at the schema layer; bullet *content* normalization (strip list
/// markers, length cap, telemetry rejection, dedupe) happens in the compaction
/// job itself since it operates over already-parsed strings.
pub fn parse_compaction(args: &serde_json::Value) -> Result<CompactionArgs> {
    let parsed: CompactionArgs = serde_json::from_value(args.clone())?;
    if !(3..=7).contains(&parsed.bullets.len()) {
        return Err(ToolValidationError::LengthOutOfBounds {
            field: "bullets",
            len: parsed.bullets.len(),
            min: 3,
            max: 7,
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_valid_text_response_args() {
        let args = json!({"text": "hi there", "meta": {"tone": "warm", "concepts": ["chat"], "surprise": 0.1}});
        let parsed = parse_text_response(&args).unwrap();
        assert_eq!(parsed.text, "hi there");
        assert_eq!(parsed.meta.tone, "warm");
    }

    #[test]
    fn rejects_insight_with_too_many_what_changed() {
        let args = json!({
            "one_liner": "x",
            "what_changed": ["a", "b", "c", "d", "e", "f"],
            "tts_response": "x",
            "severity": "low",
            "tags": ["awareness"]
        });
        assert!(matches!(parse_insight(&args), Err(ToolValidationError::LengthOutOfBounds { field: "what_changed", .. })));
    }

    #[test]
    fn rejects_compaction_with_too_few_bullets() {
        let args = json!({"bullets": ["only one", "only two"]});
        assert!(matches!(parse_compaction(&args), Err(ToolValidationError::LengthOutOfBounds { field: "bullets", .. })));
    }

    #[test]
    fn accepts_compaction_at_boundary_counts() {
        let args = json!({"bullets": ["a", "b", "c"]});
        assert_eq!(parse_compaction(&args).unwrap().bullets.len(), 3);
    }
}
