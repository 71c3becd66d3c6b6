//! Process configuration. Reading the raw string off disk is an external concern
//! (per spec, "config file loading from disk" is out of scope); this module only
//! parses and supplies defaults for an already-read document, with environment
//! variable overrides layered the way the teacher's CLI layers `--data-dir` over
//! a platform default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    pub dir: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./eva_memory"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsStyle {
    Clean,
    Spicy,
}

impl Default for TtsStyle {
    fn default() -> Self {
        TtsStyle::Clean
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightConfig {
    pub cooldown_ms: i64,
    pub max_frames: usize,
    pub max_body_bytes: usize,
    pub tts_style: TtsStyle,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 5_000,
            max_frames: 6,
            max_body_bytes: 8 * 1024 * 1024,
            tts_style: TtsStyle::Clean,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionJobConfig {
    pub cron: String,
    pub window_ms: i64,
}

impl Default for CompactionJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 * * * *".to_string(),
            window_ms: 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionJobConfig {
    pub cron: String,
}

impl Default for PromotionJobConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsConfig {
    pub enabled: bool,
    pub compaction: CompactionJobConfig,
    pub promotion: PromotionJobConfig,
    pub timezone: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compaction: CompactionJobConfig::default(),
            promotion: PromotionJobConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub insight: InsightConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub secrets_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorServerConfig {
    pub port: u16,
}

impl Default for OrchestratorServerConfig {
    fn default() -> Self {
        Self { port: 8788 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProxyConfig {
    pub max_chars: usize,
}

impl Default for TextProxyConfig {
    fn default() -> Self {
        Self { max_chars: 4_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechProxyConfig {
    pub max_chars: usize,
    pub voice: String,
    pub rate: String,
    pub cache_capacity: usize,
}

impl Default for SpeechProxyConfig {
    fn default() -> Self {
        Self {
            max_chars: 1_000,
            voice: "en-US-AriaNeural".to_string(),
            rate: "+0%".to_string(),
            cache_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    pub ws_url: String,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8789/infer".to_string(),
            reconnect_min_ms: 250,
            reconnect_max_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisedChildConfig {
    pub enabled: bool,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    pub health_url: String,
    pub ready_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl SupervisedChildConfig {
    fn disabled(health_url: &str) -> Self {
        Self {
            enabled: false,
            command: String::new(),
            args: Vec::new(),
            cwd: None,
            health_url: health_url.to_string(),
            ready_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorConfig {
    pub executive: SupervisedChildConfig,
    pub detector: SupervisedChildConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            executive: SupervisedChildConfig::disabled("http://127.0.0.1:8787/health"),
            detector: SupervisedChildConfig::disabled("http://127.0.0.1:8789/health"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDebounceConfig {
    pub dedupe_window_ms: i64,
    pub cooldown_ms: i64,
}

impl Default for AlertDebounceConfig {
    fn default() -> Self {
        Self {
            dedupe_window_ms: 60_000,
            cooldown_ms: 10_000,
        }
    }
}

/// Configuration for the Orchestrator daemon — separate from [`Config`] since
/// the two processes are started, and therefore configured, independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub server: OrchestratorServerConfig,
    #[serde(default = "default_executive_base_url")]
    pub executive_base_url: String,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub text: TextProxyConfig,
    #[serde(default)]
    pub speech: SpeechProxyConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub alerts: AlertDebounceConfig,
    #[serde(default = "default_frame_route_ttl_ms")]
    pub frame_route_ttl_ms: i64,
}

fn default_executive_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_frame_route_ttl_ms() -> i64 {
    5_000
}

impl OrchestratorConfig {
    pub fn from_str(doc: &str) -> Result<Self, ConfigError> {
        if doc.trim().is_empty() {
            return Ok(OrchestratorConfig::default());
        }
        Ok(serde_json::from_str(doc)?)
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("EVA_ORCH_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("EVA_EXECUTIVE_BASE_URL") {
            self.executive_base_url = url;
        }
        if let Ok(url) = std::env::var("EVA_DETECTOR_WS_URL") {
            self.detector.ws_url = url;
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    /// Parse an already-read config document (JSON; a TOML-to-JSON bridge is the
    /// operator's concern, not this crate's). Missing sections fall back to defaults.
    pub fn from_str(doc: &str) -> Result<Self, ConfigError> {
        if doc.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_json::from_str(doc)?)
    }

    /// Apply `EVA_*` environment overrides on top of a parsed config, mirroring the
    /// teacher's `--data-dir` / env-var layering convention.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("EVA_SERVER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(dir) = std::env::var("EVA_MEMORY_DIR") {
            self.memory.dir = PathBuf::from(dir);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_doc_uses_defaults() {
        let cfg = Config::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8787);
    }

    #[test]
    fn partial_doc_merges_with_defaults() {
        let cfg = Config::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.insight.max_frames, 6);
    }

    #[test]
    fn env_override_wins() {
        // SAFETY: test-only, single-threaded within this test function's scope.
        unsafe {
            std::env::set_var("EVA_SERVER_PORT", "1234");
        }
        let cfg = Config::default().apply_env_overrides();
        assert_eq!(cfg.server.port, 1234);
        unsafe {
            std::env::remove_var("EVA_SERVER_PORT");
        }
    }
}
