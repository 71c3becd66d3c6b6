//! The memory pipeline (spec §1 "Memory pipeline inside the Executive"): the
//! serial write queue, the working-memory log, the short-term and semantic
//! stores, the vector store adapter, the deterministic embedding, the tone
//! cache, the retrieval assembler, and the compaction/promotion jobs.

pub mod compaction;
pub mod embedding;
pub mod model;
pub mod promotion;
pub mod queue;
pub mod retrieval;
pub mod semantic_store;
pub mod short_term_store;
pub mod tone;
pub mod vector_store;
pub mod working_log;

pub use compaction::{run_compaction, CompactionError, CompactionResult};
pub use embedding::{cosine_similarity, embed, EMBEDDING_DIM};
pub use model::{
    InsightUsage, SemanticItem, SemanticKind, Severity, ShortTermSummary, TextOutputMeta, VectorEntry, VectorTable,
    WorkingMemoryEntry,
};
pub use promotion::{run_promotion, window_for_local_midnight, PromotionError, PromotionResult};
pub use queue::SerialWriteQueue;
pub use retrieval::{build_long_term_context, build_short_term_context, embed_query, ContextBlock, ShortTermSelectionMode};
pub use semantic_store::{SemanticStore, SemanticStoreError};
pub use short_term_store::{ShortTermStore, ShortTermStoreError};
pub use tone::{ToneCache, ToneCacheError, ALLOWED_TONES, DEFAULT_TONE};
pub use vector_store::{VectorStore, VectorStoreError};
pub use working_log::{WorkingLog, WorkingLogError};
