//! Tag whitelist & sanitization (spec §4.11) and the regex-based tagging rules used
//! by the promotion job (§4.10) to derive experience/personality tags from free text.
//!
//! Plugin/dynamic dispatch is deliberately not used here: the rule tables below are
//! static data, matched in order, exactly as the design notes call for.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// The authoritative set of concept/tag strings allowed in persisted records.
#[derive(Debug, Clone)]
pub struct TagWhitelist {
    allowed: HashSet<String>,
    fallback_priority: Vec<String>,
}

impl TagWhitelist {
    /// Build a whitelist from a committed list of lowercase tags (as loaded from
    /// `experience_tags.json`). `fallback_priority` is searched in order to pick the
    /// fallback tag inserted when filtering empties a set; entries not present in
    /// `tags` are ignored.
    pub fn new(tags: impl IntoIterator<Item = String>, fallback_priority: &[&str]) -> Self {
        let allowed: HashSet<String> = tags.into_iter().map(|t| t.trim().to_lowercase()).collect();
        let fallback_priority = fallback_priority
            .iter()
            .map(|s| s.to_string())
            .filter(|s| allowed.contains(s))
            .collect();
        Self {
            allowed,
            fallback_priority,
        }
    }

    /// Default whitelist used when no `experience_tags.json` has been committed yet.
    pub fn default_experience() -> Self {
        Self::new(
            [
                "awareness",
                "chat",
                "preference",
                "near_collision",
                "roi_dwell",
                "person_detected",
                "vehicle_detected",
                "safety",
                "follow_up",
                "planning",
                "decision",
                "tone",
                "trait",
                "fact",
                "project",
                "rule",
            ]
            .into_iter()
            .map(str::to_string),
            &["awareness", "chat", "preference"],
        )
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.allowed.contains(&tag.trim().to_lowercase())
    }

    /// All whitelisted tags, sorted, for embedding in a system prompt's
    /// allowed-concept listing.
    pub fn allowed_sorted(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Normalize, dedupe, and drop unknown tags; insert the fallback iff the filtered
    /// set is empty. Unknown tags encountered are returned for one-time logging by
    /// the caller.
    pub fn sanitize(&self, tags: impl IntoIterator<Item = impl AsRef<str>>) -> SanitizeResult {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut dropped = Vec::new();

        for raw in tags {
            let norm = raw.as_ref().trim().to_lowercase();
            if norm.is_empty() {
                continue;
            }
            if !self.allowed.contains(&norm) {
                dropped.push(norm);
                continue;
            }
            if seen.insert(norm.clone()) {
                kept.push(norm);
            }
        }

        let used_fallback = if kept.is_empty() {
            let fb = self.fallback_priority.first().cloned();
            if let Some(fb) = &fb {
                kept.push(fb.clone());
            }
            fb
        } else {
            None
        };

        SanitizeResult {
            tags: kept,
            dropped,
            used_fallback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SanitizeResult {
    pub tags: Vec<String>,
    pub dropped: Vec<String>,
    pub used_fallback: Option<String>,
}

/// One regex-based tagging rule: if `pattern` matches the lowercased input, `tag` is
/// a candidate (still subject to whitelist filtering downstream).
pub struct TagRule {
    pub pattern: &'static str,
    pub tag: &'static str,
}

/// Experience tag rules (spec §4.10: "vision|insight -> awareness", "near[-_ ]?collision
/// -> near_collision", ...).
pub const EXPERIENCE_TAG_RULES: &[TagRule] = &[
    TagRule {
        pattern: r"(?i)vision|insight",
        tag: "awareness",
    },
    TagRule {
        pattern: r"(?i)near[-_\s]?collision",
        tag: "near_collision",
    },
    TagRule {
        pattern: r"(?i)roi[-_\s]?dwell",
        tag: "roi_dwell",
    },
    TagRule {
        pattern: r"(?i)\bperson\b",
        tag: "person_detected",
    },
    TagRule {
        pattern: r"(?i)\bvehicle|car|truck\b",
        tag: "vehicle_detected",
    },
    TagRule {
        pattern: r"(?i)chat|conversation|talk",
        tag: "chat",
    },
];

/// Personality tag rules — a smaller rule set than experience tags, per spec §4.10.
pub const PERSONALITY_TAG_RULES: &[TagRule] = &[
    TagRule {
        pattern: r"(?i)prefer",
        tag: "preference",
    },
    TagRule {
        pattern: r"(?i)\btone\b",
        tag: "tone",
    },
];

struct CompiledRules {
    rules: Vec<(Regex, &'static str)>,
}

fn compile(rules: &[TagRule]) -> CompiledRules {
    CompiledRules {
        rules: rules
            .iter()
            .map(|r| (Regex::new(r.pattern).expect("static tag rule pattern is valid"), r.tag))
            .collect(),
    }
}

static EXPERIENCE_COMPILED: OnceLock<CompiledRules> = OnceLock::new();
static PERSONALITY_COMPILED: OnceLock<CompiledRules> = OnceLock::new();

/// Derive candidate experience tags for `text` by matching the static rule table in
/// order; every matching rule contributes its tag (duplicates are not yet filtered —
/// the caller runs the result through [`TagWhitelist::sanitize`]).
pub fn derive_experience_tags(text: &str) -> Vec<String> {
    let compiled = EXPERIENCE_COMPILED.get_or_init(|| compile(EXPERIENCE_TAG_RULES));
    compiled
        .rules
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, tag)| tag.to_string())
        .collect()
}

pub fn derive_personality_tags(text: &str) -> Vec<String> {
    let compiled = PERSONALITY_COMPILED.get_or_init(|| compile(PERSONALITY_TAG_RULES));
    compiled
        .rules
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, tag)| tag.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_unknown_and_dedupes() {
        let wl = TagWhitelist::default_experience();
        let r = wl.sanitize(["Awareness", "awareness", "bogus_tag"]);
        assert_eq!(r.tags, vec!["awareness"]);
        assert_eq!(r.dropped, vec!["bogus_tag"]);
        assert!(r.used_fallback.is_none());
    }

    #[test]
    fn sanitize_inserts_fallback_when_empty() {
        let wl = TagWhitelist::default_experience();
        let r = wl.sanitize(["totally_unknown"]);
        assert_eq!(r.tags, vec!["awareness"]);
        assert_eq!(r.used_fallback.as_deref(), Some("awareness"));
    }

    #[test]
    fn experience_rule_matches_near_collision_variants() {
        let tags = derive_experience_tags("detected a near-collision event");
        assert!(tags.contains(&"near_collision".to_string()));
    }

    #[test]
    fn personality_rule_matches_preference() {
        let tags = derive_personality_tags("I prefer quiet mornings");
        assert!(tags.contains(&"preference".to_string()));
    }
}
