//! Trace logger (spec §4.12): a purely observational, redacting, truncating, rotating
//! JSONL sink. Distinct from the `tracing` operational logs initialized in each
//! binary's `main` — this sink exists only to record request/response/error phases
//! for offline inspection, and a failure here must never surface to the caller.

use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePhase {
    Request,
    Response,
    Error,
}

impl TracePhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraceLoggerConfig {
    pub path: PathBuf,
    pub enabled_phases: Vec<TracePhase>,
    pub truncate_chars: usize,
    pub max_bytes: u64,
    pub max_rotations: u32,
}

impl Default for TraceLoggerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("trace.jsonl"),
            enabled_phases: vec![TracePhase::Request, TracePhase::Response, TracePhase::Error],
            truncate_chars: 2000,
            max_bytes: 10 * 1024 * 1024,
            max_rotations: 5,
        }
    }
}

struct Inner {
    config: TraceLoggerConfig,
    config_mtime: Option<SystemTime>,
}

/// Hot-reloads its config by comparing the config file's mtime on every write, so an
/// operator can flip phases or truncation length without restarting a daemon.
pub struct TraceLogger {
    config_path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl TraceLogger {
    pub fn new(config: TraceLoggerConfig) -> Self {
        Self {
            config_path: None,
            inner: Mutex::new(Inner {
                config,
                config_mtime: None,
            }),
        }
    }

    /// A logger whose config is hot-reloaded from a JSON file at `config_path` on
    /// every write, falling back to `initial` if the file is absent or unreadable.
    pub fn with_hot_reload(config_path: PathBuf, initial: TraceLoggerConfig) -> Self {
        Self {
            config_path: Some(config_path),
            inner: Mutex::new(Inner {
                config: initial,
                config_mtime: None,
            }),
        }
    }

    fn reload_if_stale(&self, inner: &mut Inner) {
        let Some(config_path) = &self.config_path else {
            return;
        };
        let Ok(meta) = std::fs::metadata(config_path) else {
            return;
        };
        let Ok(mtime) = meta.modified() else {
            return;
        };
        if inner.config_mtime == Some(mtime) {
            return;
        }
        if let Ok(doc) = std::fs::read_to_string(config_path) {
            if let Ok(parsed) = serde_json::from_str::<RawTraceConfig>(&doc) {
                inner.config = parsed.into_config(inner.config.path.clone());
            }
        }
        inner.config_mtime = Some(mtime);
    }

    /// Record one trace event for `phase`. Never returns an error to the caller —
    /// failures are swallowed (best-effort) after a single `tracing::warn!`.
    pub fn record(&self, phase: TracePhase, mut payload: Value) {
        let mut inner = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.reload_if_stale(&mut inner);

        if !inner.config.enabled_phases.contains(&phase) {
            return;
        }

        redact(&mut payload);
        truncate_strings(&mut payload, inner.config.truncate_chars);

        let envelope = serde_json::json!({
            "phase": phase.as_str(),
            "ts_ms": chrono::Utc::now().timestamp_millis(),
            "payload": payload,
        });

        if let Err(e) = append_with_rotation(&inner.config, &envelope) {
            tracing::warn!(error = %e, "trace logger append failed (non-fatal)");
        }
    }
}

fn append_with_rotation(
    config: &TraceLoggerConfig,
    envelope: &Value,
) -> std::io::Result<()> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let needs_rotation = std::fs::metadata(&config.path)
        .map(|m| m.len() >= config.max_bytes)
        .unwrap_or(false);
    if needs_rotation {
        rotate(&config.path, config.max_rotations);
    }

    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)?;
    let mut line = serde_json::to_string(envelope).unwrap_or_default();
    line.push('\n');
    f.write_all(line.as_bytes())
}

fn rotate(path: &Path, max_rotations: u32) {
    let drop_path = format!("{}.{}", path.display(), max_rotations);
    let _ = std::fs::remove_file(&drop_path);
    for n in (1..max_rotations).rev() {
        let from = format!("{}.{}", path.display(), n);
        let to = format!("{}.{}", path.display(), n + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let to = format!("{}.1", path.display());
    let _ = std::fs::rename(path, &to);
}

const REDACT_KEYS: &[&str] = &["apiKey", "api_key", "secrets"];
const IMAGE_KEYS: &[&str] = &["image_b64", "data", "b64", "base64"];

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if REDACT_KEYS.contains(&k.as_str()) {
                    *v = Value::String("[redacted]".to_string());
                    continue;
                }
                if IMAGE_KEYS.contains(&k.as_str()) {
                    if let Value::String(s) = v {
                        *v = Value::String(format!("[omitted base64 image: {} chars]", s.len()));
                        continue;
                    }
                }
                redact(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                redact(v);
            }
        }
        _ => {}
    }
}

fn truncate_strings(value: &mut Value, max_chars: usize) {
    match value {
        Value::String(s) => {
            if s.chars().count() > max_chars {
                let prefix: String = s.chars().take(max_chars).collect();
                let omitted = s.chars().count() - max_chars;
                *s = format!("{prefix}… [truncated {omitted} chars]");
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                truncate_strings(v, max_chars);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                truncate_strings(v, max_chars);
            }
        }
        _ => {}
    }
}

#[derive(serde::Deserialize)]
struct RawTraceConfig {
    #[serde(default)]
    enabled_phases: Option<Vec<String>>,
    #[serde(default)]
    truncate_chars: Option<usize>,
    #[serde(default)]
    max_bytes: Option<u64>,
    #[serde(default)]
    max_rotations: Option<u32>,
}

impl RawTraceConfig {
    fn into_config(self, path: PathBuf) -> TraceLoggerConfig {
        let mut base = TraceLoggerConfig {
            path,
            ..TraceLoggerConfig::default()
        };
        if let Some(phases) = self.enabled_phases {
            base.enabled_phases = phases
                .into_iter()
                .filter_map(|p| match p.as_str() {
                    "request" => Some(TracePhase::Request),
                    "response" => Some(TracePhase::Response),
                    "error" => Some(TracePhase::Error),
                    _ => None,
                })
                .collect();
        }
        if let Some(t) = self.truncate_chars {
            base.truncate_chars = t;
        }
        if let Some(b) = self.max_bytes {
            base.max_bytes = b;
        }
        if let Some(r) = self.max_rotations {
            base.max_rotations = r;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key_and_images() {
        let mut v = serde_json::json!({"apiKey": "sk-123", "image_b64": "abcd", "nested": {"secrets": "x"}});
        redact(&mut v);
        assert_eq!(v["apiKey"], "[redacted]");
        assert_eq!(v["image_b64"], "[omitted base64 image: 4 chars]");
        assert_eq!(v["nested"]["secrets"], "[redacted]");
    }

    #[test]
    fn truncates_long_strings() {
        let mut v = serde_json::json!({"text": "a".repeat(10)});
        truncate_strings(&mut v, 4);
        assert_eq!(v["text"], "aaaa… [truncated 6 chars]");
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let config = TraceLoggerConfig {
            path: path.clone(),
            max_bytes: 1,
            max_rotations: 2,
            ..TraceLoggerConfig::default()
        };
        let logger = TraceLogger::new(config);
        logger.record(TracePhase::Request, serde_json::json!({"a": 1}));
        logger.record(TracePhase::Request, serde_json::json!({"a": 2}));
        logger.record(TracePhase::Request, serde_json::json!({"a": 3}));
        assert!(path.with_extension("jsonl.1").exists() || std::fs::metadata(format!("{}.1", path.display())).is_ok());
    }

    #[test]
    fn disabled_phase_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let config = TraceLoggerConfig {
            path: path.clone(),
            enabled_phases: vec![TracePhase::Error],
            ..TraceLoggerConfig::default()
        };
        let logger = TraceLogger::new(config);
        logger.record(TracePhase::Request, serde_json::json!({"a": 1}));
        assert!(!path.exists());
    }
}
