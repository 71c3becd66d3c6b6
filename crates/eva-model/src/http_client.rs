//! An `HttpModelClient`, the production `ModelClient` that talks to the real
//! (opaque, external) model endpoint over HTTP — grounded on the pack's
//! `sven-model::AnthropicProvider`: a `reqwest::Client`, an API-key header, a
//! JSON request body, and a JSON response parsed into the same
//! tool-call-or-text shape `AnthropicProvider::complete` produces from SSE.
//! EVA never streams (every call is tool-gated and single-shot), so this is
//! the plain request/response half of that pattern without the event stream.
//!
//! The model endpoint is an external collaborator (spec §1), not a field of
//! `Config` — `Config`'s fields are fixed to `server`/`memory`/`insight`/
//! `jobs`/`secretsFile`. Endpoint, provider, model id, and API key come from
//! environment variables instead, the same way the pack's `vestige-mcp`
//! reads secondary knobs (`VESTIGE_DASHBOARD_PORT`,
//! `VESTIGE_CONSOLIDATION_INTERVAL_HOURS`) outside its primary config struct.

use crate::client::{ModelClient, ModelError, ModelId};
use crate::types::{CompletionOutcome, CompletionRequest, ContentBlock, Message, Role, ToolCall};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct HttpModelClient {
    provider: String,
    model: String,
    endpoint: String,
    api_key: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(provider: String, model: String, endpoint: String, api_key: String) -> Self {
        Self::with_max_tokens(provider, model, endpoint, api_key, DEFAULT_MAX_TOKENS)
    }

    pub fn with_max_tokens(
        provider: String,
        model: String,
        endpoint: String,
        api_key: String,
        max_tokens: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { provider, model, endpoint, api_key, max_tokens, client }
    }

    /// Build from `EVA_MODEL_ENDPOINT`/`EVA_MODEL_PROVIDER`/`EVA_MODEL_ID`/
    /// `EVA_MODEL_API_KEY`. Returns `None` when the endpoint is unset, the
    /// signal the caller (the Executive's `main`) uses to decide whether a
    /// real model is configured at all.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("EVA_MODEL_ENDPOINT").ok()?;
        let provider = std::env::var("EVA_MODEL_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());
        let model = std::env::var("EVA_MODEL_ID").unwrap_or_else(|_| "claude-sonnet-4-5".to_string());
        let api_key = std::env::var("EVA_MODEL_API_KEY").unwrap_or_default();
        let max_tokens = std::env::var("EVA_MODEL_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);
        Some(Self::with_max_tokens(provider, model, endpoint, api_key, max_tokens))
    }
}

impl ModelClient for HttpModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError> {
        let (system_text, messages) = build_wire_messages(&request.messages);

        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.input_schema }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        if !system_text.is_empty() {
            body["system"] = json!(system_text);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        if let Some(name) = &request.force_tool {
            body["tool_choice"] = json!({ "type": "tool", "name": name });
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ModelError::RequestFailed(e.to_string())
                } else {
                    ModelError::RequestFailed(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::AuthFailed(text));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::RequestFailed(format!("http {status}: {text}")));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        parse_completion_outcome(&value)
    }

    fn model_id(&self) -> ModelId {
        ModelId { provider: self.provider.clone(), id: self.model.clone() }
    }
}

/// First `tool_use` block wins as a `ToolCall`; otherwise the first `text`
/// block's text. Matches the shape the replayed conversation already
/// expects from `CompletionOutcome`.
fn parse_completion_outcome(value: &Value) -> Result<CompletionOutcome, ModelError> {
    let content = value
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ModelError::InvalidResponse("missing content array".to_string()))?;

    for block in content {
        if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
            let name = block
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| ModelError::InvalidResponse("tool_use block missing name".to_string()))?
                .to_string();
            let arguments = block.get("input").cloned().unwrap_or(json!({}));
            return Ok(CompletionOutcome::ToolCall(ToolCall { name, arguments }));
        }
    }

    for block in content {
        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
            let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string();
            return Ok(CompletionOutcome::Text(text));
        }
    }

    Err(ModelError::InvalidResponse("no tool_use or text block in response".to_string()))
}

/// Convert replayed messages into the wire format, pulling the system message
/// out to a top-level field the same way `build_anthropic_messages` does.
fn build_wire_messages(messages: &[Message]) -> (String, Vec<Value>) {
    let mut system_text = String::new();
    let mut out = Vec::with_capacity(messages.len());

    for m in messages {
        if m.role == Role::System {
            system_text = content_to_plain_text(&m.content);
            continue;
        }
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => unreachable!(),
        };
        let content: Vec<Value> = m
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
                ContentBlock::Image { mime, data_b64 } => json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": mime, "data": data_b64 },
                }),
            })
            .collect();
        out.push(json!({ "role": role, "content": content }));
    }

    (system_text, out)
}

fn content_to_plain_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_use_block() {
        let v = json!({
            "content": [
                { "type": "tool_use", "name": "commit_text_response", "input": { "text": "hi" } }
            ]
        });
        let outcome = parse_completion_outcome(&v).unwrap();
        match outcome {
            CompletionOutcome::ToolCall(call) => {
                assert_eq!(call.name, "commit_text_response");
                assert_eq!(call.arguments["text"], "hi");
            }
            CompletionOutcome::Text(_) => panic!("expected tool call"),
        }
    }

    #[test]
    fn falls_back_to_text_block() {
        let v = json!({ "content": [ { "type": "text", "text": "plain reply" } ] });
        let outcome = parse_completion_outcome(&v).unwrap();
        assert_eq!(outcome, CompletionOutcome::Text("plain reply".to_string()));
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let v = json!({});
        assert!(parse_completion_outcome(&v).is_err());
    }

    #[test]
    fn from_env_returns_none_without_endpoint() {
        std::env::remove_var("EVA_MODEL_ENDPOINT");
        assert!(HttpModelClient::from_env().is_none());
    }

    #[test]
    fn build_wire_messages_splits_system_text() {
        let messages = vec![
            Message { role: Role::System, content: vec![ContentBlock::Text { text: "be helpful".into() }] },
            Message::user_text("hi"),
        ];
        let (system, wire) = build_wire_messages(&messages);
        assert_eq!(system, "be helpful");
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }
}
