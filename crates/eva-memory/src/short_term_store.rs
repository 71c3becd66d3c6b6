//! Short-term store: a SQLite table of compaction bullets with bucket timestamps.
//! Connection setup follows the teacher's `storage/sqlite.rs` — WAL journal mode, a
//! generous cache, and `busy_timeout` so readers never block on the single writer.

use crate::model::ShortTermSummary;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ShortTermStoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ShortTermStoreError>;

pub struct ShortTermStore {
    conn: Mutex<Connection>,
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS short_term_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at_ms INTEGER NOT NULL,
    bucket_start_ms INTEGER NOT NULL,
    bucket_end_ms INTEGER NOT NULL,
    summary_text TEXT NOT NULL,
    source_entry_count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_short_term_summaries_created_at
    ON short_term_summaries(created_at_ms DESC, id DESC);
";

impl ShortTermStore {
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
        configure_connection(&conn)?;
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

    /// Insert `bullets` as one short-term summary row per bullet, in one transaction,
    /// per the compaction job's persistence contract (spec §4.9).
    pub fn insert_bullets(
        &self,
        bullets: &[String],
        created_at_ms: i64,
        bucket_start_ms: i64,
        bucket_end_ms: i64,
        source_entry_count: i64,
    ) -> Result<i64> {
        let mut conn = self.conn.lock().expect("short-term store mutex poisoned");
        let tx = conn.transaction()?;
        for bullet in bullets {
            tx.execute(
                "INSERT INTO short_term_summaries
                   (created_at_ms, bucket_start_ms, bucket_end_ms, summary_text, source_entry_count)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![created_at_ms, bucket_start_ms, bucket_end_ms, bullet, source_entry_count],
            )?;
        }
        tx.commit()?;
        Ok(bullets.len() as i64)
    }

    /// Rows ordered `created_at_ms DESC, id DESC`, for retrieval.
    pub fn recent(&self, limit: i64) -> Result<Vec<ShortTermSummary>> {
        let conn = self.conn.lock().expect("short-term store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at_ms, bucket_start_ms, bucket_end_ms, summary_text, source_entry_count
             FROM short_term_summaries
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Rows whose `created_at_ms` falls within `[window_start_ms, window_end_ms)`,
    /// for the promotion job.
    pub fn rows_in_window(&self, window_start_ms: i64, window_end_ms: i64) -> Result<Vec<ShortTermSummary>> {
        let conn = self.conn.lock().expect("short-term store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, created_at_ms, bucket_start_ms, bucket_end_ms, summary_text, source_entry_count
             FROM short_term_summaries
             WHERE created_at_ms >= ?1 AND created_at_ms < ?2
             ORDER BY created_at_ms ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![window_start_ms, window_end_ms], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<ShortTermSummary> {
    Ok(ShortTermSummary {
        id: row.get(0)?,
        created_at_ms: row.get(1)?,
        bucket_start_ms: row.get(2)?,
        bucket_end_ms: row.get(3)?,
        summary_text: row.get(4)?,
        source_entry_count: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_recent_orders_newest_first() {
        let store = ShortTermStore::open_in_memory().unwrap();
        store
            .insert_bullets(&["a".into(), "b".into()], 100, 0, 100, 5)
            .unwrap();
        store.insert_bullets(&["c".into()], 200, 100, 200, 2).unwrap();

        let recent = store.recent(10).unwrap();
        assert_eq!(recent[0].summary_text, "c");
        assert_eq!(recent.len(), 3);
    }

    #[test]
    fn rows_in_window_filters_by_created_at() {
        let store = ShortTermStore::open_in_memory().unwrap();
        store.insert_bullets(&["early".into()], 50, 0, 50, 1).unwrap();
        store.insert_bullets(&["in_window".into()], 150, 100, 150, 1).unwrap();
        store.insert_bullets(&["late".into()], 300, 200, 300, 1).unwrap();

        let rows = store.rows_in_window(100, 200).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].summary_text, "in_window");
    }
}
