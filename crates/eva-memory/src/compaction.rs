//! Compaction job (spec §4.9): split the working log at a cutoff, summarize the
//! aged half through the model (or a deterministic fallback), insert bullets into
//! the short-term store, and atomically truncate the working log to the kept
//! half. The caller runs this whole function through the serial write queue
//! (spec §4.1) — it does not enqueue itself, since the queue is a cross-cutting
//! concern owned by the binary wiring these pieces together.

use crate::model::{Severity, WorkingMemoryEntry};
use crate::short_term_store::ShortTermStore;
use crate::working_log::WorkingLog;
use eva_model::client::ModelError;
use eva_model::tools;
use eva_model::types::{CompletionOutcome, CompletionRequest, Message, ToolCall};
use eva_model::ModelClient;
use std::sync::OnceLock;

/// Most-recent old records rendered into the compaction prompt (spec §4.9).
pub const MAX_PROMPT_RECORDS: usize = 240;
pub const BULLET_MAX_CHARS: usize = 220;
pub const COMPACTION_SUMMARY_MIN_BULLETS: usize = 3;
pub const COMPACTION_SUMMARY_MAX_BULLETS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CompactionError {
    #[error("working log error: {0}")]
    WorkingLog(#[from] crate::working_log::WorkingLogError),
    #[error("short-term store error: {0}")]
    ShortTermStore(#[from] crate::short_term_store::ShortTermStoreError),
}

pub type Result<T> = std::result::Result<T, CompactionError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionResult {
    pub run_at_ms: i64,
    pub cutoff_ms: i64,
    pub source_entry_count: i64,
    pub kept_entry_count: i64,
    pub summary_count: i64,
}

/// Run the compaction job. `now_ms`/`window_ms` determine the cutoff; `model` is
/// called once with the mandatory `commit_working_memory_compaction` tool, and
/// its failure (or too few surviving bullets) falls back to a deterministic
/// summary rather than ever failing the job outright.
pub async fn run_compaction<M: ModelClient>(
    now_ms: i64,
    window_ms: i64,
    working_log: &WorkingLog,
    short_term: &ShortTermStore,
    model: &M,
) -> Result<CompactionResult> {
    let all = working_log.read()?;
    let cutoff = now_ms - window_ms;
    let (old, kept): (Vec<WorkingMemoryEntry>, Vec<WorkingMemoryEntry>) =
        all.into_iter().partition(|e| e.ts_ms() < cutoff);

    if old.is_empty() {
        return Ok(CompactionResult {
            run_at_ms: now_ms,
            cutoff_ms: cutoff,
            source_entry_count: 0,
            kept_entry_count: kept.len() as i64,
            summary_count: 0,
        });
    }

    let bullets = match try_model_compaction(&old, model).await {
        Some(bullets) if bullets.len() >= COMPACTION_SUMMARY_MIN_BULLETS => bullets,
        _ => deterministic_fallback(&old),
    };

    let bucket_start_ms = old.iter().map(|e| e.ts_ms()).min().unwrap_or(cutoff);
    short_term.insert_bullets(&bullets, now_ms, bucket_start_ms, cutoff, old.len() as i64)?;
    working_log.rewrite_atomic(&kept)?;

    Ok(CompactionResult {
        run_at_ms: now_ms,
        cutoff_ms: cutoff,
        source_entry_count: old.len() as i64,
        kept_entry_count: kept.len() as i64,
        summary_count: bullets.len() as i64,
    })
}

async fn try_model_compaction<M: ModelClient>(old: &[WorkingMemoryEntry], model: &M) -> Option<Vec<String>> {
    let prompt = render_prompt(old);
    let request = CompletionRequest {
        system: "Summarize the following working-memory records into 3-7 short bullet points.".to_string(),
        messages: vec![Message::user_text(prompt)],
        tools: vec![tools::compaction_tool_spec()],
        force_tool: Some(tools::COMMIT_WORKING_MEMORY_COMPACTION.to_string()),
    };

    let outcome = match model.complete(request).await {
        Ok(outcome) => outcome,
        Err(_) => return None,
    };

    let call: ToolCall = match outcome {
        CompletionOutcome::ToolCall(call) if call.name == tools::COMMIT_WORKING_MEMORY_COMPACTION => call,
        _ => return None,
    };

    let args = tools::parse_compaction(&call.arguments).ok()?;
    Some(normalize_bullets(args.bullets))
}

fn render_prompt(old: &[WorkingMemoryEntry]) -> String {
    let start = old.len().saturating_sub(MAX_PROMPT_RECORDS);
    let mut lines = Vec::new();
    for entry in &old[start..] {
        let line = match entry {
            WorkingMemoryEntry::TextInput { text, .. } => format!("user_input: {}", truncate_line(text)),
            WorkingMemoryEntry::TextOutput { text, meta, .. } => {
                format!("assistant_output: {} (tone={}, surprise={:.2})", truncate_line(text), meta.tone, meta.surprise)
            }
            WorkingMemoryEntry::WmInsight { one_liner, severity, tags, what_changed, .. } => format!(
                "insight: {} (severity={:?}, tags={}, what_changed={})",
                truncate_line(one_liner),
                severity,
                tags.join(","),
                what_changed.join("; ")
            ),
            WorkingMemoryEntry::WmEvent { name, source, severity, summary, .. } => {
                format!("event: {name} from {source} (severity={severity:?}) — {}", truncate_line(summary))
            }
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn truncate_line(s: &str) -> String {
    if s.chars().count() > 200 {
        s.chars().take(200).collect()
    } else {
        s.to_string()
    }
}

static LIST_MARKER: OnceLock<regex::Regex> = OnceLock::new();
static WHITESPACE: OnceLock<regex::Regex> = OnceLock::new();
static KV_PAIR: OnceLock<regex::Regex> = OnceLock::new();

const TELEMETRY_KEYS: &[&str] = &["ts_ms", "track_id", "frame_id", "request_id", "session_id"];

/// Strip list markers, compact whitespace, cap length, reject telemetry-shaped
/// lines, and dedupe case-insensitively (spec §4.9).
fn normalize_bullets(raw: Vec<String>) -> Vec<String> {
    let list_marker = LIST_MARKER.get_or_init(|| regex::Regex::new(r"^\s*([-*•]|\d+[.)])\s*").unwrap());
    let whitespace = WHITESPACE.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    let kv_pair = KV_PAIR.get_or_init(|| regex::Regex::new(r"\b\w+=\S+").unwrap());

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for bullet in raw {
        let stripped = list_marker.replace(&bullet, "");
        let compact = whitespace.replace_all(stripped.trim(), " ").to_string();
        if compact.is_empty() {
            continue;
        }
        let capped: String = compact.chars().take(BULLET_MAX_CHARS).collect();

        let is_telemetry = capped.contains("{}")
            || capped.contains("\"k\":")
            || TELEMETRY_KEYS.iter().any(|k| capped.contains(k))
            || kv_pair.find_iter(&capped).count() >= 2;
        if is_telemetry {
            continue;
        }

        let key = capped.to_lowercase();
        if seen.insert(key) {
            out.push(capped);
        }
    }
    out
}

/// Deterministic fallback summary: prefer vision insight one-liners, then
/// high-surprise `text_output`, then the last two `text_output` entries, then a
/// rollup count; padded to the minimum and capped at the maximum (spec §4.9).
fn deterministic_fallback(old: &[WorkingMemoryEntry]) -> Vec<String> {
    let mut bullets = Vec::new();

    for entry in old {
        if let WorkingMemoryEntry::WmInsight { one_liner, .. } = entry {
            bullets.push(format!("Observed: {one_liner}"));
        }
    }

    for entry in old {
        if let WorkingMemoryEntry::TextOutput { text, meta, .. } = entry {
            if meta.surprise >= 0.7 {
                bullets.push(format!("Notable reply: {}", truncate_line(text)));
            }
        }
    }

    let last_two: Vec<&str> = old
        .iter()
        .rev()
        .filter_map(|e| match e {
            WorkingMemoryEntry::TextOutput { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .take(2)
        .collect();
    for text in last_two.into_iter().rev() {
        bullets.push(format!("Recent reply: {}", truncate_line(text)));
    }

    if bullets.is_empty() {
        let (events, high) = old.iter().fold((0usize, 0usize), |(events, high), e| match e {
            WorkingMemoryEntry::WmEvent { severity, .. } => (events + 1, high + (*severity == Severity::High) as usize),
            _ => (events, high),
        });
        bullets.push(format!("Summarized {} working-memory records ({} events, {} high severity).", old.len(), events, high));
    }

    let mut bullets = normalize_bullets(bullets);
    bullets.truncate(COMPACTION_SUMMARY_MAX_BULLETS);
    while bullets.len() < COMPACTION_SUMMARY_MIN_BULLETS {
        bullets.push(format!("Working memory compacted ({} source records).", old.len()));
    }
    bullets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InsightUsage, TextOutputMeta};
    use eva_model::MockModelClient;

    fn text_input(ts_ms: i64, text: &str) -> WorkingMemoryEntry {
        WorkingMemoryEntry::TextInput { request_id: "r".into(), session_id: None, text: text.into(), ts_ms }
    }

    fn text_output(ts_ms: i64, text: &str, surprise: f64) -> WorkingMemoryEntry {
        WorkingMemoryEntry::TextOutput {
            request_id: "r".into(),
            session_id: None,
            text: text.into(),
            meta: TextOutputMeta { tone: "neutral".into(), concepts: vec![], surprise, note: None },
            ts_ms,
        }
    }

    #[tokio::test]
    async fn empty_old_window_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        log.append(&[text_input(1000, "hi")]).unwrap();
        let store = ShortTermStore::open_in_memory().unwrap();
        let model = MockModelClient::always(CompletionOutcome::Text("unused".into()));

        let result = run_compaction(500, 100, &log, &store, &model).await.unwrap();
        assert_eq!(result.source_entry_count, 0);
        assert_eq!(result.summary_count, 0);
    }

    #[tokio::test]
    async fn model_path_persists_bullets_and_truncates_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        log.append(&[text_input(100, "hello"), text_output(110, "hi back", 0.1), text_input(5000, "kept entry")]).unwrap();
        let store = ShortTermStore::open_in_memory().unwrap();

        let model = MockModelClient::always(CompletionOutcome::ToolCall(ToolCall {
            name: tools::COMMIT_WORKING_MEMORY_COMPACTION.to_string(),
            arguments: serde_json::json!({"bullets": ["User said hello", "Assistant replied warmly", "Short exchange"]}),
        }));

        let result = run_compaction(1000, 500, &log, &store, &model).await.unwrap();
        assert_eq!(result.source_entry_count, 2);
        assert_eq!(result.kept_entry_count, 1);
        assert_eq!(result.summary_count, 3);

        let remaining = log.read().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(store.recent(10).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn falls_back_on_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        log.append(&[text_output(100, "a surprising thing happened", 0.9), text_input(200, "chat")]).unwrap();
        let store = ShortTermStore::open_in_memory().unwrap();
        let model = MockModelClient::new(vec![Err(ModelError::RequestFailed("boom".into()))]);

        let result = run_compaction(1000, 500, &log, &store, &model).await.unwrap();
        assert!(result.summary_count >= COMPACTION_SUMMARY_MIN_BULLETS as i64);
    }

    #[test]
    fn normalize_bullets_rejects_telemetry_and_dedupes() {
        let bullets = normalize_bullets(vec![
            "- User said hello".to_string(),
            "user said hello".to_string(),
            "track_id=3 severity=high".to_string(),
        ]);
        assert_eq!(bullets, vec!["User said hello".to_string()]);
    }
}
