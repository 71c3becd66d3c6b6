//! Tone state cache (spec §3 `ToneState`, §4.7 step 2/8): per-session tone,
//! whitelisted against `ALLOWED_TONES`, atomically persisted to
//! `cache/personality_tone.json` the same way the working log's `rewriteAtomic`
//! replaces its file — temp file then rename, via [`eva_common::write_atomic`].

use crate::model::ToneEntry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The authoritative tone set. `spec.md` §9 names `ALLOWED_TONES` without
/// specifying its members; resolved in `DESIGN.md` as this fixed list.
pub const ALLOWED_TONES: &[&str] = &["neutral", "warm", "playful", "serious", "concerned"];

pub const DEFAULT_TONE: &str = "neutral";

pub fn is_allowed_tone(tone: &str) -> bool {
    ALLOWED_TONES.contains(&tone)
}

#[derive(Debug, thiserror::Error)]
pub enum ToneCacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tone cache json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("atomic write failed: {0}")]
    Atomic(#[from] eva_common::AtomicWriteError),
}

pub type Result<T> = std::result::Result<T, ToneCacheError>;

/// In-memory tone map, mirrored to disk. Loaded once at startup and kept current
/// through the serial write queue; every mutation is followed by an atomic rewrite
/// so a crash never leaves a half-written cache file.
pub struct ToneCache {
    path: PathBuf,
    entries: HashMap<String, ToneEntry>,
}

const DEFAULT_SESSION_KEY: &str = "__default__";

impl ToneCache {
    /// Load from `path`, tolerating a missing or malformed file (starts empty).
    pub fn load(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<HashMap<String, ToneEntry>>(&s).ok())
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn session_key(session_id: Option<&str>) -> String {
        session_id.unwrap_or(DEFAULT_SESSION_KEY).to_string()
    }

    /// Current tone for a session, defaulting to [`DEFAULT_TONE`] when unset.
    pub fn get(&self, session_key: &str) -> String {
        self.entries
            .get(session_key)
            .map(|e| e.tone.clone())
            .unwrap_or_else(|| DEFAULT_TONE.to_string())
    }

    /// Set the tone for a session and atomically persist the whole cache. Rejects
    /// a tone outside [`ALLOWED_TONES`] — callers validate before calling this
    /// (spec §9: unrecognized tone is a model-invalid-args error, not a silent
    /// clamp), so an invalid tone reaching here is a caller bug.
    pub fn set(&mut self, session_key: &str, tone: &str, reason: Option<String>, now_ms: i64) -> Result<()> {
        debug_assert!(is_allowed_tone(tone), "tone must be pre-validated by the caller");
        self.entries.insert(
            session_key.to_string(),
            ToneEntry {
                tone: tone.to_string(),
                updated_at_ms: now_ms,
                last_reason: reason,
            },
        );
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        eva_common::write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
