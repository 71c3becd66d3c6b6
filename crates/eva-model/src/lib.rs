//! The tool-gated model boundary (spec §1, §9): message/content types, the
//! `ModelClient` capability trait, tool contracts with schema validation, and a
//! scriptable mock client for tests.

pub mod client;
pub mod http_client;
pub mod mock;
pub mod tools;
pub mod types;

pub use client::{ModelClient, ModelError, ModelId};
pub use http_client::HttpModelClient;
pub use mock::MockModelClient;
pub use types::{CompletionOutcome, CompletionRequest, ContentBlock, Message, Role, ToolCall, ToolSpec, Usage};
