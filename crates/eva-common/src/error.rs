//! Typed error taxonomy shared by both daemons, mapped to the wire envelope
//! `{error:{code,message,extra?}}` at the HTTP boundary in each binary crate.

use serde::Serialize;
use serde_json::Value;

/// One of the literal error codes named in the interface surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    UnsupportedContentType,
    PayloadTooLarge,
    EmptyBody,
    InvalidJson,
    InvalidRequest,
    InsightAssetMissing,
    InsightAssetInvalidPath,
    CooldownActive,
    TooManyFrames,
    QvUnavailable,
    SingleClientOnly,
    ModelCallFailed,
    ModelNoToolCall,
    ModelInvalidToolArgs,
    MemoryWriteFailed,
    CompactionJobFailed,
    PromotionJobFailed,
    UnhandledError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::EmptyBody => "EMPTY_BODY",
            Self::InvalidJson => "INVALID_JSON",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InsightAssetMissing => "INSIGHT_ASSET_MISSING",
            Self::InsightAssetInvalidPath => "INSIGHT_ASSET_INVALID_PATH",
            Self::CooldownActive => "COOLDOWN_ACTIVE",
            Self::TooManyFrames => "TOO_MANY_FRAMES",
            Self::QvUnavailable => "QV_UNAVAILABLE",
            Self::SingleClientOnly => "SINGLE_CLIENT_ONLY",
            Self::ModelCallFailed => "MODEL_CALL_FAILED",
            Self::ModelNoToolCall => "MODEL_NO_TOOL_CALL",
            Self::ModelInvalidToolArgs => "MODEL_INVALID_TOOL_ARGS",
            Self::MemoryWriteFailed => "MEMORY_WRITE_FAILED",
            Self::CompactionJobFailed => "COMPACTION_JOB_FAILED",
            Self::PromotionJobFailed => "PROMOTION_JOB_FAILED",
            Self::UnhandledError => "UNHANDLED_ERROR",
        }
    }

    /// The taxonomy class per spec §7: user/policy/routing/model/storage/job.
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidRequest | Self::InvalidJson | Self::EmptyBody | Self::TooManyFrames => {
                400
            }
            Self::PayloadTooLarge => 413,
            Self::UnsupportedContentType => 415,
            Self::CooldownActive => 429,
            Self::QvUnavailable => 503,
            Self::SingleClientOnly => 409,
            Self::ModelCallFailed | Self::ModelNoToolCall | Self::ModelInvalidToolArgs => 502,
            Self::MemoryWriteFailed
            | Self::CompactionJobFailed
            | Self::PromotionJobFailed
            | Self::InsightAssetMissing
            | Self::InsightAssetInvalidPath
            | Self::UnhandledError => 500,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.as_str(),
                message: message.into(),
                extra: None,
            },
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.error.extra = Some(extra);
        self
    }
}

/// A typed application error. Handlers convert domain errors into this, then into
/// an HTTP response, in the binary crates (which own the HTTP framework dependency).
#[derive(Debug, thiserror::Error)]
#[error("{code_str}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub code_str: &'static str,
    pub message: String,
    pub extra: Option<Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            code_str: code.as_str(),
            message: message.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let mut env = ErrorEnvelope::new(self.code, self.message.clone());
        env.error.extra = self.extra.clone();
        env
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}
