//! Wire types for the model boundary: messages, content blocks, tool specs, and a
//! completion request/outcome pair. Shaped after the pack's `neuron-types::types`
//! (`Role`, `ContentBlock`, `Message`) but trimmed to what EVA's tool-gated calls
//! actually need — no thinking blocks, no document blocks, no provider-specific
//! cache-control metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One piece of a message's content. `text_input`/`text_output`/`wm_event` replay
/// as `Text`; `/insight`'s multi-modal user message adds `Image` blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { mime: String, data_b64: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }
}

/// A tool the model may (or, with `force_tool`, must) call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A completion request: a system prompt, the replayed conversation, and the
/// tool(s) offered. `force_tool`, when set, names the single mandatory tool for
/// `/respond` (spec §4.7 step 7) and `/insight` (§4.8 step 4) and
/// `commit_working_memory_compaction` (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub force_tool: Option<String>,
}

/// A tool invocation the model chose to make.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// What a completion produced: a tool call, or plain text (the `/respond`
/// fallback path in spec §4.7 triggers on this variant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CompletionOutcome {
    ToolCall(ToolCall),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
}
