//! The tool-gated model boundary (spec §9: `{complete(ctx)→msg, getModel(provider,id),
//! validateToolCall(tools,call)}`). Shaped as an async trait using return-position
//! `impl Trait` in traits (RPITIT), directly grounded on the pack's
//! `neuron-turn::Provider` — deliberately *not* object-safe, since every caller
//! (`/respond`, `/insight`, compaction, promotion) is generic over a concrete
//! `ModelClient` rather than holding a trait object. A dynamically-dispatched
//! tool registry is a different concern (and a different shape, `ToolDyn` in the
//! pack's `neuron-tool`) than this single-capability model boundary.

use crate::types::CompletionRequest;
use crate::types::CompletionOutcome;
use std::future::Future;

/// Mirrors `neuron-turn::ProviderError`'s taxonomy and retryability split.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ModelError {
    #[error("model request failed: {0}")]
    RequestFailed(String),
    #[error("model rate limited")]
    RateLimited,
    #[error("model auth failed: {0}")]
    AuthFailed(String),
    #[error("model returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::RateLimited | ModelError::RequestFailed(_))
    }
}

/// Identifies which concrete model a `ModelClient` talks to, for `/health` and
/// trace logging (spec §9's `getModel(provider,id)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    pub provider: String,
    pub id: String,
}

/// The model capability every caller in the Executive depends on generically.
/// `complete` is the sole request/response boundary; `model_id` reports identity
/// for `/health`.
pub trait ModelClient: Send + Sync {
    fn complete(&self, request: CompletionRequest) -> impl Future<Output = Result<CompletionOutcome, ModelError>> + Send;

    fn model_id(&self) -> ModelId;
}
