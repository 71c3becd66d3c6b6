//! Shared application state for the Orchestrator's HTTP + WebSocket surface.
//! Mirrors `eva_executive::state::AppState<M>`'s shape (config + stores +
//! process-wide singletons behind `Arc`, generic over the one capability that
//! talks to an external collaborator) but for the Orchestrator's own
//! singletons: the frame route table, the alert debouncer, the single UI
//! socket slot, and the Detector peer connection.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Message as WsMessage;
use eva_common::OrchestratorConfig;
use tokio::sync::{mpsc, Mutex};

use crate::alert_debouncer::AlertDebouncer;
use crate::frame_router::FrameRouter;
use crate::protocol::FrameBinaryHeader;
use crate::tts::{Synthesizer, TtsCache};

/// A message queued for the Detector peer connection.
pub enum DetectorOutbound {
    Frame { header: FrameBinaryHeader, bytes: Vec<u8> },
    Command(serde_json::Value),
}

/// Handle to the single connected UI socket's writer task.
#[derive(Clone)]
pub struct UiHandle {
    pub tx: mpsc::UnboundedSender<WsMessage>,
}

pub struct OrchestratorState<S: Synthesizer> {
    pub config: Arc<OrchestratorConfig>,
    pub http: reqwest::Client,
    pub synthesizer: Arc<S>,
    pub frame_router: Arc<FrameRouter>,
    pub debouncer: Arc<AlertDebouncer>,
    pub ui: Arc<Mutex<Option<UiHandle>>>,
    pub detector_tx: Arc<Mutex<Option<mpsc::UnboundedSender<DetectorOutbound>>>>,
    pub detector_connected: Arc<AtomicBool>,
    pub tts_cache: Arc<TtsCache>,
    pub start_time: Instant,
}

impl<S: Synthesizer> Clone for OrchestratorState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            http: self.http.clone(),
            synthesizer: self.synthesizer.clone(),
            frame_router: self.frame_router.clone(),
            debouncer: self.debouncer.clone(),
            ui: self.ui.clone(),
            detector_tx: self.detector_tx.clone(),
            detector_connected: self.detector_connected.clone(),
            tts_cache: self.tts_cache.clone(),
            start_time: self.start_time,
        }
    }
}

impl<S: Synthesizer> OrchestratorState<S> {
    /// Push a message to the single connected UI client, if any. Silently a
    /// no-op when no UI is connected — callers (alert fires, Detector
    /// replies) must tolerate an absent UI.
    pub async fn send_to_ui(&self, msg: WsMessage) {
        if let Some(ui) = self.ui.lock().await.as_ref() {
            let _ = ui.tx.send(msg);
        }
    }
}
