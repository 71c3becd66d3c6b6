//! Promotion job (spec §4.10): daily distillation of yesterday's short-term
//! bullets into the long-term vector store (`long_term_experiences`) and the
//! semantic store (traits/preferences/facts), plus a refresh of the two
//! `cache/*.json` summary files. Like compaction, this runs as a whole through
//! the serial write queue owned by the caller.

use crate::embedding::embed;
use crate::model::{SemanticItem, SemanticKind, ShortTermSummary, VectorEntry, VectorTable};
use crate::semantic_store::SemanticStore;
use crate::short_term_store::ShortTermStore;
use crate::vector_store::VectorStore;
use eva_common::TagWhitelist;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;

pub const CORE_EXPERIENCES_TOP_N: usize = 16;
pub const CORE_PERSONALITY_TOP_N: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("short-term store error: {0}")]
    ShortTermStore(#[from] crate::short_term_store::ShortTermStoreError),
    #[error("semantic store error: {0}")]
    SemanticStore(#[from] crate::semantic_store::SemanticStoreError),
    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("atomic write failed: {0}")]
    Atomic(#[from] eva_common::AtomicWriteError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PromotionError>;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    pub run_at_ms: i64,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub source_row_count: i64,
    pub experience_upsert_count: i64,
    pub personality_upsert_count: i64,
    pub total_experience_count: i64,
    pub total_personality_count: i64,
}

/// `[local_midnight - 24h, local_midnight)` in milliseconds, per the configured
/// timezone (spec §4.10). Timezone conversion itself is the caller's concern
/// (an external collaborator per `spec.md` §1); this takes the already-computed
/// boundary.
pub fn window_for_local_midnight(local_midnight_ms: i64) -> (i64, i64) {
    (local_midnight_ms - 24 * 60 * 60 * 1000, local_midnight_ms)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_promotion(
    now_ms: i64,
    window_start_ms: i64,
    window_end_ms: i64,
    short_term: &ShortTermStore,
    semantic: &SemanticStore,
    vector: &VectorStore,
    whitelist: &TagWhitelist,
    cache_dir: &Path,
) -> Result<PromotionResult> {
    let rows = short_term.rows_in_window(window_start_ms, window_end_ms)?;

    let mut experience_upserts = 0i64;
    let mut personality_upserts = 0i64;

    for row in &rows {
        let experience_tags = whitelist
            .sanitize(eva_common::tags::derive_experience_tags(&row.summary_text))
            .tags;
        let experience_embedding = embed(&row.summary_text, &experience_tags);

        let experience_entry = VectorEntry {
            id: format!("short-term-experience-{}", row.id),
            source_summary_id: row.id.to_string(),
            source_created_at_ms: row.created_at_ms,
            updated_at_ms: now_ms,
            text: row.summary_text.clone(),
            tags: experience_tags,
            embedding: experience_embedding,
        };
        vector.upsert(VectorTable::Experiences.table_name(), &experience_entry).await?;
        experience_upserts += 1;

        let personality_tags = sanitize_personality_tags(whitelist, eva_common::tags::derive_personality_tags(&row.summary_text));
        let personality_embedding = embed(&row.summary_text, &personality_tags);

        let personality_entry = VectorEntry {
            id: format!("short-term-personality-{}", row.id),
            source_summary_id: row.id.to_string(),
            source_created_at_ms: row.created_at_ms,
            updated_at_ms: now_ms,
            text: row.summary_text.clone(),
            tags: personality_tags,
            embedding: personality_embedding,
        };
        vector.upsert(VectorTable::Personality.table_name(), &personality_entry).await?;
        personality_upserts += 1;

        if let Some(item) = build_semantic_item(row, now_ms) {
            semantic.upsert(&item)?;
        }
    }

    refresh_experience_cache(vector, cache_dir).await?;
    refresh_personality_cache(semantic, cache_dir)?;

    let total_experience_count = vector.count(VectorTable::Experiences.table_name()).await?;
    let total_personality_count = vector.count(VectorTable::Personality.table_name()).await?;

    Ok(PromotionResult {
        run_at_ms: now_ms,
        window_start_ms,
        window_end_ms,
        source_row_count: rows.len() as i64,
        experience_upsert_count: experience_upserts,
        personality_upsert_count: personality_upserts,
        total_experience_count,
        total_personality_count,
    })
}

static PREFER_RE: OnceLock<regex::Regex> = OnceLock::new();
static PROMOTE_SIGNAL_RE: OnceLock<regex::Regex> = OnceLock::new();
static PRESCRIPTIVE_RE: OnceLock<regex::Regex> = OnceLock::new();

/// Whitelist-filter and dedupe derived personality tags, falling back to
/// `preference` (rather than the whitelist's own general-purpose fallback) when
/// filtering empties the set, per spec §4.10 ("fallback to `preference`").
fn sanitize_personality_tags(whitelist: &TagWhitelist, raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut kept = Vec::new();
    for tag in raw {
        let norm = tag.trim().to_lowercase();
        if whitelist.contains(&norm) && seen.insert(norm.clone()) {
            kept.push(norm);
        }
    }
    if kept.is_empty() {
        if whitelist.contains("preference") {
            kept.push("preference".to_string());
        } else {
            kept = whitelist.sanitize(Vec::<String>::new()).tags;
        }
    }
    kept
}

/// Build a structured semantic item from a short-term row, if it matches a
/// promotable signal (preference/tone/decision/follow-up/planning/safety, or
/// prescriptive chat narrative). Returns `None` for rows that are not promoted.
fn build_semantic_item(row: &ShortTermSummary, now_ms: i64) -> Option<SemanticItem> {
    let prefer_re = PREFER_RE.get_or_init(|| regex::Regex::new(r"(?i)prefer").unwrap());
    let signal_re = PROMOTE_SIGNAL_RE.get_or_init(|| {
        regex::Regex::new(r"(?i)tone|decision|follow[-_\s]?up|planning|safety").unwrap()
    });
    let prescriptive_re = PRESCRIPTIVE_RE.get_or_init(|| regex::Regex::new(r"(?i)\b(should|always|never|remember to|make sure)\b").unwrap());

    let text = &row.summary_text;
    let is_preference = prefer_re.is_match(text);
    let is_signal = signal_re.is_match(text);
    let is_prescriptive_chat = prescriptive_re.is_match(text);

    if !is_preference && !is_signal && !is_prescriptive_chat {
        return None;
    }

    let kind = if is_preference { SemanticKind::Preference } else { SemanticKind::Trait };
    let confidence = if is_preference { 0.82 } else { 0.70 };
    let text_lc = text.trim().to_lowercase();
    let id = {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}", kind.as_str(), text_lc));
        format!("{:x}", hasher.finalize())
    };

    Some(SemanticItem {
        id,
        kind,
        text: text.clone(),
        confidence,
        support_count: 1,
        first_seen_ms: row.created_at_ms,
        last_seen_ms: row.created_at_ms,
        source_summary_ids: vec![row.id.to_string()],
        updated_at_ms: now_ms,
    })
}

async fn refresh_experience_cache(vector: &VectorStore, cache_dir: &Path) -> Result<()> {
    let recent = vector.recent(VectorTable::Experiences.table_name(), CORE_EXPERIENCES_TOP_N).await?;
    let mut tag_counts: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    for entry in &recent {
        for tag in &entry.tags {
            *tag_counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    let payload = serde_json::json!({
        "items": recent,
        "tag_counts": tag_counts,
    });
    eva_common::write_atomic(&cache_dir.join("core_experiences.json"), serde_json::to_string_pretty(&payload)?.as_bytes())?;
    Ok(())
}

fn refresh_personality_cache(semantic: &SemanticStore, cache_dir: &Path) -> Result<()> {
    let recent = semantic.recent_by_last_seen(CORE_PERSONALITY_TOP_N as i64)?;
    eva_common::write_atomic(&cache_dir.join("core_personality.json"), serde_json::to_string_pretty(&recent)?.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, created_at_ms: i64, text: &str) -> ShortTermSummary {
        ShortTermSummary { id, created_at_ms, bucket_start_ms: 0, bucket_end_ms: created_at_ms, summary_text: text.to_string(), source_entry_count: 1 }
    }

    #[test]
    fn window_for_local_midnight_spans_24_hours() {
        let midnight = 1_700_000_000_000;
        let (start, end) = window_for_local_midnight(midnight);
        assert_eq!(end - start, 24 * 60 * 60 * 1000);
        assert_eq!(end, midnight);
    }

    #[test]
    fn preference_text_promotes_to_preference_kind() {
        let row = summary(1, 100, "User prefers quiet mornings without music");
        let item = build_semantic_item(&row, 200).unwrap();
        assert_eq!(item.kind, SemanticKind::Preference);
        assert_eq!(item.confidence, 0.82);
    }

    #[test]
    fn unrelated_chat_is_not_promoted() {
        let row = summary(1, 100, "Talked about the weather today");
        assert!(build_semantic_item(&row, 200).is_none());
    }

    #[test]
    fn personality_tags_fall_back_to_preference() {
        let whitelist = TagWhitelist::default_experience();
        let tags = sanitize_personality_tags(&whitelist, eva_common::tags::derive_personality_tags("Talked about the weather today"));
        assert_eq!(tags, vec!["preference".to_string()]);
    }

    #[tokio::test]
    async fn promotion_is_deterministic_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let short_term = ShortTermStore::open_in_memory().unwrap();
        short_term.insert_bullets(&["User prefers quiet mornings".to_string()], 500, 0, 500, 1).unwrap();

        let semantic = SemanticStore::open_in_memory().unwrap();
        let vector = VectorStore::open(dir.path()).await.unwrap();
        let whitelist = TagWhitelist::default_experience();

        let first = run_promotion(1000, 0, 1000, &short_term, &semantic, &vector, &whitelist, dir.path()).await.unwrap();
        assert_eq!(first.source_row_count, 1);
        assert_eq!(first.experience_upsert_count, 1);
        assert_eq!(first.personality_upsert_count, 1);

        let second = run_promotion(1000, 0, 1000, &short_term, &semantic, &vector, &whitelist, dir.path()).await.unwrap();
        assert_eq!(second.total_experience_count, first.total_experience_count);
        assert_eq!(second.total_personality_count, first.total_personality_count);
    }

    #[tokio::test]
    async fn promotion_populates_long_term_personality_table() {
        let dir = tempfile::tempdir().unwrap();
        let short_term = ShortTermStore::open_in_memory().unwrap();
        short_term.insert_bullets(&["User prefers quiet mornings".to_string()], 500, 0, 500, 1).unwrap();

        let semantic = SemanticStore::open_in_memory().unwrap();
        let vector = VectorStore::open(dir.path()).await.unwrap();
        let whitelist = TagWhitelist::default_experience();

        let result = run_promotion(1000, 0, 1000, &short_term, &semantic, &vector, &whitelist, dir.path()).await.unwrap();
        assert_eq!(result.personality_upsert_count, 1);
        assert_eq!(result.total_personality_count, 1);
        assert_eq!(vector.count(VectorTable::Personality.table_name()).await.unwrap(), 1);
    }
}
