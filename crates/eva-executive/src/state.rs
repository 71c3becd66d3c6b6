//! Shared application state for the Executive's HTTP surface, generalizing the
//! teacher's `dashboard/state.rs` (`Arc<Storage>` + `Arc<Mutex<CognitiveEngine>>`
//! + `broadcast::Sender`) to the memory pipeline's stores, the serial write
//! queue, the tone cache, and the job runtime map.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eva_common::{Config, TagWhitelist, TraceLogger};
use eva_memory::{SemanticStore, SerialWriteQueue, ShortTermStore, ToneCache, VectorStore, WorkingLog};
use eva_model::ModelClient;
use tokio::sync::Mutex;

use crate::jobs::JobsState;

/// Shared state threaded through every handler via axum's `State` extractor.
/// Generic over the model client the same way `eva_memory::run_compaction` and
/// `run_promotion` are — `main` wires in `HttpModelClient`, tests wire in
/// `MockModelClient`.
pub struct AppState<M: ModelClient> {
    pub config: Arc<Config>,
    pub model: Arc<M>,
    pub queue: Arc<SerialWriteQueue>,
    pub working_log: Arc<WorkingLog>,
    pub short_term: Arc<ShortTermStore>,
    pub semantic: Arc<SemanticStore>,
    pub vector: Arc<VectorStore>,
    pub tone_cache: Arc<Mutex<ToneCache>>,
    pub whitelist: Arc<TagWhitelist>,
    pub persona: Arc<String>,
    pub trace: Arc<TraceLogger>,
    pub jobs: Arc<JobsState>,
    pub last_insight_request_at_ms: Arc<Mutex<Option<i64>>>,
    pub assets_dir: Arc<PathBuf>,
    pub cache_dir: Arc<PathBuf>,
    pub start_time: Instant,
}

// Manual `Clone` impl: `#[derive(Clone)]` would require `M: Clone`, but every
// field here is already an `Arc`/`Instant`, so cloning the state never clones
// the model client itself.
impl<M: ModelClient> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            model: self.model.clone(),
            queue: self.queue.clone(),
            working_log: self.working_log.clone(),
            short_term: self.short_term.clone(),
            semantic: self.semantic.clone(),
            vector: self.vector.clone(),
            tone_cache: self.tone_cache.clone(),
            whitelist: self.whitelist.clone(),
            persona: self.persona.clone(),
            trace: self.trace.clone(),
            jobs: self.jobs.clone(),
            last_insight_request_at_ms: self.last_insight_request_at_ms.clone(),
            assets_dir: self.assets_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            start_time: self.start_time,
        }
    }
}
