//! Retrieval assembler (spec §4.7 steps 3-6): builds the token-budgeted long-term
//! and short-term context blocks fed into the respond path's system prompt.
//!
//! Budget enforcement follows the spec literally: append lines while
//! `used + line_tokens <= max`; reject (skip) an individual line that would
//! overflow; never truncate mid-message.

use crate::embedding::{cosine_similarity, embed};
use crate::model::{SemanticItem, ShortTermSummary, VectorEntry, WorkingMemoryEntry};
use eva_common::{estimate_tokens, TagWhitelist};

/// `MAX_TRAIT_ITEMS` (spec §4.7 step 4).
pub const MAX_TRAIT_ITEMS: usize = 12;
/// `MAX_EXPERIENCE_ITEMS` (spec §4.7 step 4).
pub const MAX_EXPERIENCE_ITEMS: usize = 8;
/// Independent knob from `maxShortTermRows` per the resolved Open Question in
/// `spec.md` §9 — both are exposed, not collapsed into one constant.
pub const RECENT_SHORT_TERM_FALLBACK_ROWS: usize = 3;
pub const MAX_SHORT_TERM_ROWS: usize = 8;
/// Observation window for `wm_insight` entries feeding the short-term block.
pub const SHORT_TERM_OBSERVATION_WINDOW_MS: i64 = 2 * 60 * 1000;

const LONG_TERM_TOKEN_BUDGET: usize = 320;
const SHORT_TERM_TOKEN_BUDGET: usize = 320;

/// A budget-assembled block of text plus how it was derived, for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub text: String,
    pub line_count: usize,
}

/// Append `line` to `lines`/`used` iff it fits the remaining budget; otherwise
/// drop it silently (the budget protocol never truncates mid-message).
fn try_append(lines: &mut Vec<String>, used: &mut usize, max: usize, line: String) {
    let cost = estimate_tokens(&line) + 1; // +1 for the joining newline, per GLOSSARY
    if *used + cost <= max {
        *used += cost;
        lines.push(line);
    }
}

/// Long-term context: top semantic items by `(support DESC, confidence DESC,
/// last_seen DESC)` (already the `top_by_support` ordering) then top experiences
/// by cosine similarity against the query embedding.
pub fn build_long_term_context(semantic_items: &[SemanticItem], query_embedding: &[f32], experiences: &[VectorEntry]) -> ContextBlock {
    let mut lines = Vec::new();
    let mut used = 0usize;

    for item in semantic_items.iter().take(MAX_TRAIT_ITEMS) {
        let line = format!(
            "{} ({:.2}): {}",
            item.kind.as_str(),
            item.confidence,
            item.text
        );
        try_append(&mut lines, &mut used, LONG_TERM_TOKEN_BUDGET, line);
    }

    let mut scored: Vec<(f32, &VectorEntry)> = experiences
        .iter()
        .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    for (_, entry) in scored.into_iter().take(MAX_EXPERIENCE_ITEMS) {
        let line = format!("experience: {} [{}]", entry.text, entry.tags.join(","));
        try_append(&mut lines, &mut used, LONG_TERM_TOKEN_BUDGET, line);
    }

    ContextBlock {
        line_count: lines.len(),
        text: lines.join("\n"),
    }
}

/// How the short-term summaries that went into the block were selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortTermSelectionMode {
    TagFilter,
    Fallback,
    None,
}

/// Short-term context: a deterministic header, recent `wm_insight` observations
/// within [`SHORT_TERM_OBSERVATION_WINDOW_MS`], and a set of short-term summaries
/// selected by tag-overlap against query-derived tags, falling back to the most
/// recent rows, or none.
pub fn build_short_term_context(
    query_text: &str,
    now_ms: i64,
    working_log: &[WorkingMemoryEntry],
    recent_summaries: &[ShortTermSummary],
    whitelist: &TagWhitelist,
) -> (ContextBlock, ShortTermSelectionMode) {
    let mut lines = Vec::new();
    let mut used = 0usize;

    try_append(
        &mut lines,
        &mut used,
        SHORT_TERM_TOKEN_BUDGET,
        "SHORT_TERM_CONTEXT:".to_string(),
    );

    let window_start = now_ms - SHORT_TERM_OBSERVATION_WINDOW_MS;
    for entry in working_log {
        if let WorkingMemoryEntry::WmInsight { ts_ms, one_liner, .. } = entry {
            if *ts_ms >= window_start && *ts_ms <= now_ms {
                try_append(&mut lines, &mut used, SHORT_TERM_TOKEN_BUDGET, format!("observed: {one_liner}"));
            }
        }
    }

    let query_tags = whitelist
        .sanitize(eva_common::tags::derive_experience_tags(query_text))
        .tags;

    let tag_filtered: Vec<&ShortTermSummary> = if query_tags.is_empty() {
        Vec::new()
    } else {
        recent_summaries
            .iter()
            .filter(|s| {
                let derived = whitelist.sanitize(eva_common::tags::derive_experience_tags(&s.summary_text)).tags;
                derived.iter().any(|t| query_tags.contains(t))
            })
            .take(MAX_SHORT_TERM_ROWS)
            .collect()
    };

    let (selected, mode): (Vec<&ShortTermSummary>, ShortTermSelectionMode) = if !tag_filtered.is_empty() {
        (tag_filtered, ShortTermSelectionMode::TagFilter)
    } else if !recent_summaries.is_empty() {
        (
            recent_summaries.iter().take(RECENT_SHORT_TERM_FALLBACK_ROWS).collect(),
            ShortTermSelectionMode::Fallback,
        )
    } else {
        (Vec::new(), ShortTermSelectionMode::None)
    };

    for summary in selected {
        try_append(&mut lines, &mut used, SHORT_TERM_TOKEN_BUDGET, format!("summary: {}", summary.summary_text));
    }

    (
        ContextBlock {
            line_count: lines.len(),
            text: lines.join("\n"),
        },
        mode,
    )
}

/// Convenience: embed the `/respond` query text for long-term experience search,
/// matching spec §4.7 step 4's "hashed embedding of text".
pub fn embed_query(text: &str) -> Vec<f32> {
    embed(text, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SemanticKind, Severity};

    fn semantic(text: &str, support: i64, confidence: f64) -> SemanticItem {
        SemanticItem {
            id: text.to_string(),
            kind: SemanticKind::Trait,
            text: text.to_string(),
            confidence,
            support_count: support,
            first_seen_ms: 0,
            last_seen_ms: 0,
            source_summary_ids: vec![],
            updated_at_ms: 0,
        }
    }

    #[test]
    fn long_term_context_caps_at_max_trait_items() {
        let items: Vec<SemanticItem> = (0..20).map(|i| semantic(&format!("trait {i}"), i, 0.5)).collect();
        let block = build_long_term_context(&items, &[0.0; 64], &[]);
        assert!(block.line_count <= MAX_TRAIT_ITEMS);
    }

    #[test]
    fn short_term_context_falls_back_to_recent_rows_when_no_tag_overlap() {
        let summaries = vec![ShortTermSummary {
            id: 1,
            created_at_ms: 100,
            bucket_start_ms: 0,
            bucket_end_ms: 100,
            summary_text: "unrelated chatter".to_string(),
            source_entry_count: 1,
        }];
        let whitelist = TagWhitelist::default_experience();
        let (block, mode) = build_short_term_context("xyz completely unrelated query", 1000, &[], &summaries, &whitelist);
        assert_eq!(mode, ShortTermSelectionMode::Fallback);
        assert!(block.text.contains("unrelated chatter"));
    }

    #[test]
    fn short_term_context_is_none_when_no_summaries_exist() {
        let whitelist = TagWhitelist::default_experience();
        let (_, mode) = build_short_term_context("anything", 1000, &[], &[], &whitelist);
        assert_eq!(mode, ShortTermSelectionMode::None);
    }

    #[test]
    fn budget_skips_a_line_that_would_overflow_rather_than_truncating() {
        let huge_item = semantic(&"x".repeat(2000), 1, 0.9);
        let small_item = semantic("short", 1, 0.9);
        let block = build_long_term_context(&[huge_item, small_item], &[0.0; 64], &[]);
        assert!(block.text.contains("short"));
        assert!(!block.text.contains(&"x".repeat(2000)));
    }
}
