//! Semantic store: a SQLite table of distilled traits/preferences/facts, merge-
//! upserted by id. Never deleted (spec §3). Same connection setup as the short-term
//! store, grounded on the teacher's `storage/sqlite.rs` PRAGMA block.

use crate::model::{SemanticItem, SemanticKind};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum SemanticStoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("unknown semantic kind: {0}")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, SemanticStoreError>;

pub struct SemanticStore {
    conn: Mutex<Connection>,
}

const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS semantic_items (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    text TEXT NOT NULL,
    confidence REAL NOT NULL,
    support_count INTEGER NOT NULL,
    first_seen_ms INTEGER NOT NULL,
    last_seen_ms INTEGER NOT NULL,
    source_summary_ids TEXT NOT NULL,
    updated_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_semantic_items_last_seen ON semantic_items(last_seen_ms DESC);
";

fn kind_from_str(s: &str) -> Result<SemanticKind> {
    Ok(match s {
        "trait" => SemanticKind::Trait,
        "preference" => SemanticKind::Preference,
        "fact" => SemanticKind::Fact,
        "project" => SemanticKind::Project,
        "rule" => SemanticKind::Rule,
        other => return Err(SemanticStoreError::UnknownKind(other.to_string())),
    })
}

impl SemanticStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                        Some(e.to_string()),
                    )
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.execute_batch(MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Merge-upsert one item: `confidence := max`, `support_count += new`,
    /// `first_seen := min`, `last_seen := max` (spec §3).
    pub fn upsert(&self, incoming: &SemanticItem) -> Result<()> {
        let conn = self.conn.lock().expect("semantic store mutex poisoned");
        let existing = conn
            .query_row(
                "SELECT confidence, support_count, first_seen_ms, last_seen_ms, source_summary_ids
                 FROM semantic_items WHERE id = ?1",
                params![incoming.id],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .ok();

        let merged = match existing {
            Some((conf, support, first_seen, last_seen, source_ids_json)) => {
                let mut source_ids: Vec<String> =
                    serde_json::from_str(&source_ids_json).unwrap_or_default();
                for id in &incoming.source_summary_ids {
                    if !source_ids.contains(id) {
                        source_ids.push(id.clone());
                    }
                }
                SemanticItem {
                    id: incoming.id.clone(),
                    kind: incoming.kind,
                    text: incoming.text.clone(),
                    confidence: conf.max(incoming.confidence),
                    support_count: support + incoming.support_count,
                    first_seen_ms: first_seen.min(incoming.first_seen_ms),
                    last_seen_ms: last_seen.max(incoming.last_seen_ms),
                    source_summary_ids: source_ids,
                    updated_at_ms: incoming.updated_at_ms,
                }
            }
            None => incoming.clone(),
        };

        conn.execute(
            "INSERT INTO semantic_items
               (id, kind, text, confidence, support_count, first_seen_ms, last_seen_ms, source_summary_ids, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
               text = excluded.text,
               confidence = excluded.confidence,
               support_count = excluded.support_count,
               first_seen_ms = excluded.first_seen_ms,
               last_seen_ms = excluded.last_seen_ms,
               source_summary_ids = excluded.source_summary_ids,
               updated_at_ms = excluded.updated_at_ms",
            params![
                merged.id,
                merged.kind.as_str(),
                merged.text,
                merged.confidence,
                merged.support_count,
                merged.first_seen_ms,
                merged.last_seen_ms,
                serde_json::to_string(&merged.source_summary_ids).unwrap_or_default(),
                merged.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    /// Top items ordered `(support DESC, confidence DESC, last_seen DESC)`, used by
    /// the retrieval assembler for long-term context (spec §4.7).
    pub fn top_by_support(&self, limit: i64) -> Result<Vec<SemanticItem>> {
        let conn = self.conn.lock().expect("semantic store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, kind, text, confidence, support_count, first_seen_ms, last_seen_ms, source_summary_ids, updated_at_ms
             FROM semantic_items
             ORDER BY support_count DESC, confidence DESC, last_seen_ms DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total row count.
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("semantic store mutex poisoned");
        conn.query_row("SELECT COUNT(*) FROM semantic_items", [], |row| row.get(0))
            .map_err(SemanticStoreError::from)
    }

    /// Most recently updated items, used to refresh `core_personality.json`.
    pub fn recent_by_last_seen(&self, limit: i64) -> Result<Vec<SemanticItem>> {
        let conn = self.conn.lock().expect("semantic store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, kind, text, confidence, support_count, first_seen_ms, last_seen_ms, source_summary_ids, updated_at_ms
             FROM semantic_items
             ORDER BY last_seen_ms DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<SemanticItem> {
    let kind_str: String = row.get(1)?;
    let source_ids_json: String = row.get(7)?;
    Ok(SemanticItem {
        id: row.get(0)?,
        kind: kind_from_str(&kind_str).unwrap_or(SemanticKind::Fact),
        text: row.get(2)?,
        confidence: row.get(3)?,
        support_count: row.get(4)?,
        first_seen_ms: row.get(5)?,
        last_seen_ms: row.get(6)?,
        source_summary_ids: serde_json::from_str(&source_ids_json).unwrap_or_default(),
        updated_at_ms: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, support: i64, confidence: f64, first: i64, last: i64) -> SemanticItem {
        SemanticItem {
            id: id.to_string(),
            kind: SemanticKind::Trait,
            text: "likes quiet mornings".to_string(),
            confidence,
            support_count: support,
            first_seen_ms: first,
            last_seen_ms: last,
            source_summary_ids: vec!["s1".to_string()],
            updated_at_ms: last,
        }
    }

    #[test]
    fn upsert_merges_per_spec_formula() {
        let store = SemanticStore::open_in_memory().unwrap();
        store.upsert(&item("x", 1, 0.7, 100, 100)).unwrap();
        store.upsert(&item("x", 2, 0.9, 50, 200)).unwrap();

        let rows = store.top_by_support(10).unwrap();
        assert_eq!(rows.len(), 1);
        let merged = &rows[0];
        assert_eq!(merged.support_count, 3);
        assert_eq!(merged.confidence, 0.9);
        assert_eq!(merged.first_seen_ms, 50);
        assert_eq!(merged.last_seen_ms, 200);
    }

    #[test]
    fn top_by_support_orders_correctly() {
        let store = SemanticStore::open_in_memory().unwrap();
        store.upsert(&item("a", 1, 0.5, 0, 0)).unwrap();
        store.upsert(&item("b", 5, 0.5, 0, 0)).unwrap();
        let rows = store.top_by_support(10).unwrap();
        assert_eq!(rows[0].id, "b");
    }
}
