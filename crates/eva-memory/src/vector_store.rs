//! Vector store adapter (spec §4, "Vector store adapter"): a LanceDB-backed table
//! per logical table name (`long_term_experiences`, `long_term_personality`) with
//! schema creation, id-keyed merge-upsert, and top-K cosine query.
//!
//! `spec.md` names `long_term_memory_db/lancedb/<table>/...` literally in its
//! filesystem layout (§6), so this adapter uses `lancedb` rather than the teacher's
//! own `usearch`-based HNSW index (`vestige-core/src/search/vector.rs`) — grounded
//! instead on the pack's `codex-rs/retrieval/src/storage/lancedb.rs`, which is
//! adapted here from pure-append chunk storage to id-keyed merge-upsert.

use crate::model::VectorEntry;
use arrow::array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use futures::StreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;
use std::path::Path;
use std::sync::Arc;

pub const EMBEDDING_DIM: i32 = 64;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("lancedb connection failed at {uri}: {cause}")]
    Connection { uri: String, cause: String },
    #[error("lancedb query failed on table {table}: {cause}")]
    Query { table: String, cause: String },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: i32, actual: usize },
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

/// Adapter over one LanceDB database directory holding both logical tables.
pub struct VectorStore {
    db: Connection,
}

impl VectorStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let uri = path.to_string_lossy().to_string();
        let db = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Connection {
                uri,
                cause: e.to_string(),
            })?;
        Ok(Self { db })
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source_summary_id", DataType::Utf8, false),
            Field::new("source_created_at_ms", DataType::Int64, false),
            Field::new("updated_at_ms", DataType::Int64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    EMBEDDING_DIM,
                ),
                false,
            ),
        ])
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;
        Ok(names.contains(&table_name.to_string()))
    }

    async fn get_or_create_table(&self, table_name: &str) -> Result<Table> {
        if self.table_exists(table_name).await? {
            self.db
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| VectorStoreError::Query {
                    table: table_name.to_string(),
                    cause: e.to_string(),
                })
        } else {
            let schema = Arc::new(Self::schema());
            let empty = RecordBatch::new_empty(schema.clone());
            let reader = arrow::record_batch::RecordBatchIterator::new(vec![Ok(empty)], schema);
            self.db
                .create_table(table_name, reader)
                .execute()
                .await
                .map_err(|e| VectorStoreError::Query {
                    table: table_name.to_string(),
                    cause: e.to_string(),
                })
        }
    }

    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let source_ids: Vec<&str> = entries.iter().map(|e| e.source_summary_id.as_str()).collect();
        let source_created: Vec<i64> = entries.iter().map(|e| e.source_created_at_ms).collect();
        let updated: Vec<i64> = entries.iter().map(|e| e.updated_at_ms).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let tags: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.tags).unwrap_or_else(|_| "[]".to_string()))
            .collect();

        let dim = EMBEDDING_DIM as usize;
        let mut values = Vec::with_capacity(entries.len() * dim);
        for e in entries {
            let mut v = e.embedding.clone();
            v.resize(dim, 0.0);
            values.extend(v);
        }
        let values_array = Float32Array::from(values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let embedding_array = FixedSizeListArray::try_new(field, EMBEDDING_DIM, Arc::new(values_array), None)
            .map_err(|e| VectorStoreError::Query {
                table: "embedding".to_string(),
                cause: e.to_string(),
            })?;

        RecordBatch::try_new(
            Arc::new(Self::schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(source_ids)),
                Arc::new(Int64Array::from(source_created)),
                Arc::new(Int64Array::from(updated)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(tags.iter().map(String::as_str).collect::<Vec<_>>())),
                Arc::new(embedding_array),
            ],
        )
        .map_err(|e| VectorStoreError::Query {
            table: "batch".to_string(),
            cause: e.to_string(),
        })
    }

    fn batch_to_entries(batch: &RecordBatch) -> Vec<VectorEntry> {
        let ids = batch.column(0).as_any().downcast_ref::<StringArray>();
        let source_ids = batch.column(1).as_any().downcast_ref::<StringArray>();
        let source_created = batch.column(2).as_any().downcast_ref::<Int64Array>();
        let updated = batch.column(3).as_any().downcast_ref::<Int64Array>();
        let texts = batch.column(4).as_any().downcast_ref::<StringArray>();
        let tags = batch.column(5).as_any().downcast_ref::<StringArray>();
        let embeddings = batch.column(6).as_any().downcast_ref::<FixedSizeListArray>();

        let (Some(ids), Some(source_ids), Some(source_created), Some(updated), Some(texts), Some(tags)) =
            (ids, source_ids, source_created, updated, texts, tags)
        else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let embedding = embeddings
                .and_then(|arr| {
                    if arr.is_valid(i) {
                        let list = arr.value(i);
                        list.as_any()
                            .downcast_ref::<Float32Array>()
                            .map(|f| f.values().to_vec())
                    } else {
                        None
                    }
                })
                .unwrap_or_default();

            out.push(VectorEntry {
                id: ids.value(i).to_string(),
                source_summary_id: source_ids.value(i).to_string(),
                source_created_at_ms: source_created.value(i),
                updated_at_ms: updated.value(i),
                text: texts.value(i).to_string(),
                tags: serde_json::from_str(tags.value(i)).unwrap_or_default(),
                embedding,
            });
        }
        out
    }

    /// Merge-upsert `entry` by id: delete any existing row with the same id, then
    /// insert the new row. LanceDB's own `add()` is append-only (grounding source),
    /// so upsert is expressed as delete-then-insert under the serial write queue,
    /// which already guarantees no concurrent writer interleaves the two steps.
    pub async fn upsert(&self, table_name: &str, entry: &VectorEntry) -> Result<()> {
        if entry.embedding.len() != EMBEDDING_DIM as usize {
            return Err(VectorStoreError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: entry.embedding.len(),
            });
        }
        let table = self.get_or_create_table(table_name).await?;
        let escaped_id = entry.id.replace('\'', "''");
        table
            .delete(&format!("id = '{escaped_id}'"))
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;

        let batch = Self::entries_to_batch(std::slice::from_ref(entry))?;
        let schema = batch.schema();
        let reader = arrow::record_batch::RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    /// Top-K rows by cosine similarity to `embedding`.
    pub async fn search(&self, table_name: &str, embedding: &[f32], limit: usize) -> Result<Vec<VectorEntry>> {
        if embedding.len() != EMBEDDING_DIM as usize {
            return Err(VectorStoreError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }
        if !self.table_exists(table_name).await? {
            return Ok(Vec::new());
        }
        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;

        let results = table
            .vector_search(embedding.to_vec())
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;

        let mut entries = Vec::new();
        let mut stream = results;
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;
            entries.extend(Self::batch_to_entries(&batch));
        }
        Ok(entries)
    }

    /// Most recently updated rows, for cache refresh (`core_experiences.json`).
    /// Unlike [`Self::search`], this has no query vector — it orders client-side
    /// by `updated_at_ms` since the underlying table has no built-in recency sort.
    pub async fn recent(&self, table_name: &str, limit: usize) -> Result<Vec<VectorEntry>> {
        if !self.table_exists(table_name).await? {
            return Ok(Vec::new());
        }
        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;

        let results = table.query().execute().await.map_err(|e| VectorStoreError::Query {
            table: table_name.to_string(),
            cause: e.to_string(),
        })?;

        let mut entries = Vec::new();
        let mut stream = results;
        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;
            entries.extend(Self::batch_to_entries(&batch));
        }
        entries.sort_by(|a, b| b.updated_at_ms.cmp(&a.updated_at_ms));
        entries.truncate(limit);
        Ok(entries)
    }

    pub async fn count(&self, table_name: &str) -> Result<i64> {
        if !self.table_exists(table_name).await? {
            return Ok(0);
        }
        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })?;
        table
            .count_rows(None)
            .await
            .map(|n| n as i64)
            .map_err(|e| VectorStoreError::Query {
                table: table_name.to_string(),
                cause: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VectorTable;

    fn entry(id: &str, text: &str, ts: i64) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            source_summary_id: "s1".to_string(),
            source_created_at_ms: ts,
            updated_at_ms: ts,
            text: text.to_string(),
            tags: vec!["awareness".to_string()],
            embedding: crate::embedding::embed(text, &["awareness".to_string()]),
        }
    }

    #[tokio::test]
    async fn upsert_then_search_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let table = VectorTable::Experiences.table_name();

        store.upsert(table, &entry("e1", "near collision at front door", 100)).await.unwrap();
        let count = store.count(table).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let table = VectorTable::Personality.table_name();

        store.upsert(table, &entry("p1", "likes quiet mornings", 100)).await.unwrap();
        store.upsert(table, &entry("p1", "likes quiet mornings, updated", 200)).await.unwrap();

        assert_eq!(store.count(table).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_wrong_embedding_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).await.unwrap();
        let mut bad = entry("e1", "x", 1);
        bad.embedding = vec![0.0; 8];
        let err = store.upsert("long_term_experiences", &bad).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }
}
