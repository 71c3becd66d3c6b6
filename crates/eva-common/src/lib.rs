//! Ambient plumbing shared by the Orchestrator and Executive binaries: configuration,
//! the typed error taxonomy and its wire envelope, the tag whitelist and tagging
//! rules, the atomic-file-replace primitive, and the trace logger.

pub mod atomic;
pub mod config;
pub mod error;
pub mod tags;
pub mod trace;

pub use atomic::{write_atomic, AtomicWriteError};
pub use config::{Config, OrchestratorConfig};
pub use error::{AppError, ErrorBody, ErrorCode, ErrorEnvelope};
pub use tags::{SanitizeResult, TagWhitelist};
pub use trace::{TraceLogger, TraceLoggerConfig, TracePhase};

/// Token estimator used by the retrieval budget: `⌈len(text)/4⌉`, minimum 1.
pub fn estimate_tokens(text: &str) -> usize {
    let len = text.chars().count();
    if len == 0 {
        1
    } else {
        len.div_ceil(4).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up_and_floors_at_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
