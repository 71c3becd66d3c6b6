//! Working-memory log (spec §4.2): an append-only newline-delimited JSON file with
//! atomic full rewrite for compaction. Atomic rewrite follows [`eva_common::atomic`],
//! the same temp-file-then-rename idiom the teacher uses for its own JSON caches.

use crate::model::WorkingMemoryEntry;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WorkingLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("atomic write failed: {0}")]
    Atomic(#[from] eva_common::AtomicWriteError),
}

pub type Result<T> = std::result::Result<T, WorkingLogError>;

pub struct WorkingLog {
    path: PathBuf,
}

impl WorkingLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entries` as one line each, in one write. Creates the parent
    /// directory if missing.
    pub fn append(&self, entries: &[WorkingMemoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry).expect("WorkingMemoryEntry always serializes"));
            buf.push('\n');
        }
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Atomically replace the entire log with `entries` (used by compaction to
    /// drop aged entries).
    pub fn rewrite_atomic(&self, entries: &[WorkingMemoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry).expect("WorkingMemoryEntry always serializes"));
            buf.push('\n');
        }
        eva_common::write_atomic(&self.path, buf.as_bytes())?;
        Ok(())
    }

    /// Read all entries, tolerating a missing file (empty result). Malformed or
    /// empty lines are discarded with a warning; the result is sorted ascending by
    /// `ts_ms`.
    pub fn read(&self) -> Result<Vec<WorkingMemoryEntry>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (line_no, line) in contents.split('\n').enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WorkingMemoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(line_no, error = %e, "discarding malformed working-memory log line");
                }
            }
        }
        entries.sort_by_key(|e| e.ts_ms());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Severity, WorkingMemoryEntry};

    fn event(ts_ms: i64) -> WorkingMemoryEntry {
        WorkingMemoryEntry::WmEvent {
            source: "vision".into(),
            name: "roi_dwell".into(),
            severity: Severity::Low,
            track_id: None,
            summary: "roi_dwell".into(),
            data: serde_json::json!({}),
            ts_ms,
        }
    }

    #[test]
    fn read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        assert_eq!(log.read().unwrap(), vec![]);
    }

    #[test]
    fn append_then_read_round_trips_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        log.append(&[event(200), event(100)]).unwrap();
        let read = log.read().unwrap();
        assert_eq!(read.iter().map(|e| e.ts_ms()).collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn malformed_lines_are_discarded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("working_memory.log");
        std::fs::write(&path, "not json\n{\"type\":\"wm_event\"}\n").unwrap();
        let log = WorkingLog::new(path);
        let read = log.read().unwrap();
        assert_eq!(read.len(), 0);
    }

    #[test]
    fn rewrite_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let log = WorkingLog::new(dir.path().join("working_memory.log"));
        log.append(&[event(1), event(2), event(3)]).unwrap();
        log.rewrite_atomic(&[event(3)]).unwrap();
        let read = log.read().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].ts_ms(), 3);
    }
}
