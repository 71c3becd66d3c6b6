//! The UI-facing `/eye` WebSocket (spec §4.4, §6): binary camera frames in,
//! detection/insight replies and alerts out, `command` passthrough to the
//! Detector. Enforces the single-UI invariant and evicts all frame routes on
//! disconnect. Grounded on the teacher's `dashboard::websocket::handle_socket`
//! (`ws.split()`, a background writer fed by an mpsc channel, a `select!`
//! loop multiplexing inbound client messages against outbound pushes).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{FrameBinaryHeader, ToUi};
use crate::state::{DetectorOutbound, OrchestratorState, UiHandle};
use crate::tts::Synthesizer;

/// Bytes above this are refused rather than forwarded — a defensive cap
/// distinct from `insight.maxBodyBytes`, since frames arrive over a socket
/// with no body-limit middleware.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

pub async fn eye_handler<S: Synthesizer + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<OrchestratorState<S>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<S: Synthesizer + 'static>(socket: WebSocket, state: OrchestratorState<S>) {
    let (mut sender, mut receiver) = socket.split();

    {
        let mut ui = state.ui.lock().await;
        if ui.is_some() {
            let err = ToUi::Error { frame_id: None, code: "SINGLE_CLIENT_ONLY".to_string(), message: "a UI client is already connected".to_string() };
            if let Ok(json) = serde_json::to_string(&err) {
                let _ = sender.send(Message::Text(json.into())).await;
            }
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *ui = Some(UiHandle { tx });

        // Writer task: everything pushed to `ui.tx` (hello, forwarded detector
        // replies, debounced alerts) is serialized onto this one socket.
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
        });
    }

    let hello = ToUi::Hello { version: env!("CARGO_PKG_VERSION").to_string() };
    if let Ok(json) = serde_json::to_string(&hello) {
        state.send_to_ui(Message::Text(json.into())).await;
    }

    debug!("UI client connected");

    let mut pending_header: Option<FrameBinaryHeader> = None;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_command(&state, &text).await;
            }
            Ok(Message::Binary(bytes)) => {
                handle_binary(&state, &mut pending_header, bytes.to_vec()).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
        }
    }

    state.frame_router.clear();
    *state.ui.lock().await = None;
    debug!("UI client disconnected");
}

/// `command` messages pass through unchanged to the Detector (spec §4.4).
async fn handle_command<S: Synthesizer>(state: &OrchestratorState<S>, text: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        warn!("malformed command message from UI; dropping");
        return;
    };
    if let Some(tx) = state.detector_tx.lock().await.as_ref() {
        let _ = tx.send(DetectorOutbound::Command(value));
    }
}

async fn handle_binary<S: Synthesizer>(state: &OrchestratorState<S>, pending_header: &mut Option<FrameBinaryHeader>, bytes: Vec<u8>) {
    match pending_header.take() {
        None => {
            // First binary frame of a pair: the JSON header.
            match serde_json::from_slice::<FrameBinaryHeader>(&bytes) {
                Ok(header) => {
                    if header.image_len > MAX_FRAME_BYTES {
                        send_error(state, Some(header.frame_id.clone()), "TOO_MANY_FRAMES", "frame exceeds the maximum accepted size").await;
                        return;
                    }
                    *pending_header = Some(header);
                }
                Err(e) => warn!(error = %e, "malformed frame_binary header; dropping"),
            }
        }
        Some(header) => {
            if bytes.len() != header.image_len {
                send_error(state, Some(header.frame_id.clone()), "INVALID_REQUEST", "frame payload length did not match the declared image_len").await;
                return;
            }

            if !state.detector_connected.load(std::sync::atomic::Ordering::SeqCst) {
                send_error(state, Some(header.frame_id.clone()), "QV_UNAVAILABLE", "the vision detector is not connected").await;
                return;
            }

            let now_ms = Utc::now().timestamp_millis();
            state.frame_router.insert(header.frame_id.clone(), now_ms);

            if let Some(tx) = state.detector_tx.lock().await.as_ref() {
                let _ = tx.send(DetectorOutbound::Frame { header, bytes });
            }
        }
    }
}

async fn send_error<S: Synthesizer>(state: &OrchestratorState<S>, frame_id: Option<String>, code: &str, message: &str) {
    let err = ToUi::Error { frame_id, code: code.to_string(), message: message.to_string() };
    if let Ok(json) = serde_json::to_string(&err) {
        state.send_to_ui(Message::Text(json.into())).await;
    }
}
