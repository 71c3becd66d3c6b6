//! A scriptable, deterministic [`ModelClient`] for tests — ships in the same
//! spirit as the teacher's own test-only fixtures (in-memory stores, fixed seeds).
//! Every caller in the Executive is generic over `ModelClient`, so tests wire this
//! in place of a real provider without any conditional compilation.

use crate::client::{ModelClient, ModelError, ModelId};
use crate::types::{CompletionOutcome, CompletionRequest};
use std::collections::VecDeque;
use std::sync::Mutex;

enum Mode {
    /// Pop one scripted outcome per call; once exhausted, every further call
    /// errors — an over-long test run is a test bug, not something to paper over.
    Script(Mutex<VecDeque<Result<CompletionOutcome, ModelError>>>),
    /// Return a clone of the same outcome on every call.
    Repeat(CompletionOutcome),
}

pub struct MockModelClient {
    mode: Mode,
    requests_seen: Mutex<Vec<CompletionRequest>>,
}

impl MockModelClient {
    pub fn new(script: Vec<Result<CompletionOutcome, ModelError>>) -> Self {
        Self {
            mode: Mode::Script(Mutex::new(script.into_iter().collect())),
            requests_seen: Mutex::new(Vec::new()),
        }
    }

    /// A client that always returns the same outcome, for tests that don't care
    /// about call count.
    pub fn always(outcome: CompletionOutcome) -> Self {
        Self {
            mode: Mode::Repeat(outcome),
            requests_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests_seen.lock().expect("mock poisoned").clone()
    }
}

impl ModelClient for MockModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionOutcome, ModelError> {
        self.requests_seen.lock().expect("mock poisoned").push(request);
        match &self.mode {
            Mode::Repeat(outcome) => Ok(outcome.clone()),
            Mode::Script(script) => {
                let mut script = script.lock().expect("mock poisoned");
                script
                    .pop_front()
                    .unwrap_or_else(|| Err(ModelError::InvalidResponse("mock model script exhausted".to_string())))
            }
        }
    }

    fn model_id(&self) -> ModelId {
        ModelId {
            provider: "mock".to_string(),
            id: "mock-1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionRequest, ToolCall};
    use serde_json::json;

    fn req() -> CompletionRequest {
        CompletionRequest {
            system: "sys".to_string(),
            messages: vec![],
            tools: vec![],
            force_tool: None,
        }
    }

    #[tokio::test]
    async fn repeat_mode_answers_every_call_the_same() {
        let client = MockModelClient::always(CompletionOutcome::ToolCall(ToolCall {
            name: "commit_text_response".to_string(),
            arguments: json!({"text": "hi"}),
        }));
        client.complete(req()).await.unwrap();
        client.complete(req()).await.unwrap();
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn script_mode_exhausts_and_then_errors() {
        let client = MockModelClient::new(vec![Ok(CompletionOutcome::Text("only one".to_string()))]);
        assert!(client.complete(req()).await.is_ok());
        assert!(client.complete(req()).await.is_err());
    }
}
