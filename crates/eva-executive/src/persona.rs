//! Loads the two committed assets named in `spec.md` §6's filesystem layout:
//! `persona.md` and `experience_tags.json`. Both are read from `memory.dir` at
//! startup, falling back to the assets bundled in this crate (`assets/`) when
//! the operator hasn't committed their own copy into the memory directory yet —
//! the same "ship a sane default, let the operator override on disk" pattern
//! `eva_common::Config::from_str` uses for an empty config document.

use eva_common::TagWhitelist;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_PERSONA: &str = include_str!("../assets/persona.md");
const DEFAULT_EXPERIENCE_TAGS: &str = include_str!("../assets/experience_tags.json");

pub fn load_persona(memory_dir: &Path) -> String {
    std::fs::read_to_string(memory_dir.join("persona.md")).unwrap_or_else(|_| DEFAULT_PERSONA.to_string())
}

#[derive(Debug, Deserialize)]
struct TagWhitelistDoc {
    tags: Vec<String>,
    fallback_priority: Vec<String>,
}

pub fn load_tag_whitelist(memory_dir: &Path) -> TagWhitelist {
    let doc = std::fs::read_to_string(memory_dir.join("experience_tags.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<TagWhitelistDoc>(&s).ok());

    let doc = doc.unwrap_or_else(|| {
        serde_json::from_str(DEFAULT_EXPERIENCE_TAGS).expect("bundled experience_tags.json is valid")
    });

    let fallback_priority: Vec<&str> = doc.fallback_priority.iter().map(String::as_str).collect();
    TagWhitelist::new(doc.tags, &fallback_priority)
}
