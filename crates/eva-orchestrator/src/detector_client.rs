//! Outbound WebSocket client to the Detector peer's `/infer` socket (spec
//! §4.4): a persistent connection with exponential-backoff reconnect
//! (250ms → 5s cap; new attempts do not cancel in-flight frames already
//! routed, since routing state lives in `FrameRouter`, not here). Forwards
//! queued `DetectorOutbound` frames/commands out, and dispatches inbound
//! frame-scoped envelopes back through the route table and alert debouncer.

use std::sync::atomic::Ordering;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{info, warn};

use crate::alert_debouncer::AlertDebouncer;
use crate::protocol::{FromDetector, ToUi};
use crate::state::{DetectorOutbound, OrchestratorState};
use crate::tts::Synthesizer;

/// Spawn the reconnect-forever task. Returns immediately; the connection
/// lifecycle runs in the background for the life of the process.
pub fn spawn<S: Synthesizer + 'static>(state: OrchestratorState<S>) {
    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::unbounded_channel::<DetectorOutbound>();
        *state.detector_tx.lock().await = Some(tx);

        let mut backoff_ms = state.config.detector.reconnect_min_ms;
        loop {
            match tokio_tungstenite::connect_async(&state.config.detector.ws_url).await {
                Ok((socket, _response)) => {
                    info!(url = %state.config.detector.ws_url, "connected to detector");
                    state.detector_connected.store(true, Ordering::SeqCst);
                    backoff_ms = state.config.detector.reconnect_min_ms;

                    run_connection(&state, socket, &mut rx).await;

                    state.detector_connected.store(false, Ordering::SeqCst);
                    warn!("detector connection closed; reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, "failed to connect to detector");
                }
            }

            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(state.config.detector.reconnect_max_ms);
        }
    });
}

async fn run_connection<S: Synthesizer>(
    state: &OrchestratorState<S>,
    socket: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    rx: &mut mpsc::UnboundedReceiver<DetectorOutbound>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(DetectorOutbound::Frame { header, bytes }) => {
                        let Ok(header_json) = serde_json::to_vec(&header) else { continue };
                        if sink.send(WsMessage::Binary(header_json.into())).await.is_err() {
                            break;
                        }
                        if sink.send(WsMessage::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(DetectorOutbound::Command(value)) => {
                        let Ok(text) = serde_json::to_string(&value) else { continue };
                        if sink.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_detector_message(state, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "detector socket read error");
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_detector_message<S: Synthesizer>(state: &OrchestratorState<S>, raw: &str) {
    let parsed: FromDetector = match serde_json::from_str(raw) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "malformed detector message; dropping");
            return;
        }
    };

    let now_ms = Utc::now().timestamp_millis();

    if let Some(frame_id) = parsed.frame_id() {
        if state.frame_router.take(frame_id, now_ms) {
            state.send_to_ui(axum::extract::ws::Message::Text(raw.to_string().into())).await;
        }
    }

    match &parsed {
        FromDetector::FrameEvents { events, .. } => {
            for event in events {
                if event.severity == "high" {
                    let key = AlertDebouncer::event_key(&event.name, event.track_id);
                    if state.debouncer.should_fire(&key, now_ms) {
                        fire_alert(state, format!("High-severity event: {}", event.name)).await;
                    }
                }
            }
        }
        FromDetector::Insight { clip_id, summary, .. } => {
            if summary.severity == "high" {
                let key = AlertDebouncer::insight_key(clip_id);
                if state.debouncer.should_fire(&key, now_ms) {
                    let narration = summary
                        .rest
                        .get("one_liner")
                        .and_then(|v| v.as_str())
                        .unwrap_or("A high-severity scene insight was detected.")
                        .to_string();
                    fire_alert(state, narration).await;
                }
            }
        }
        _ => {}
    }
}

/// On fire: push `text_output` then (if a synthesizer is configured) a
/// `speech_output` to the UI (spec §4.5).
async fn fire_alert<S: Synthesizer>(state: &OrchestratorState<S>, text: String) {
    let text_msg = ToUi::TextOutput {
        text: text.clone(),
        meta: serde_json::json!({ "tone": "concerned", "concepts": ["awareness"], "surprise": 1.0, "note": "alert" }),
        request_id: uuid::Uuid::new_v4().to_string(),
        session_id: None,
    };
    if let Ok(json) = serde_json::to_string(&text_msg) {
        state.send_to_ui(axum::extract::ws::Message::Text(json.into())).await;
    }

    match state.synthesizer.synthesize(&text, &state.config.speech.voice, &state.config.speech.rate).await {
        Ok(bytes) => {
            let speech_msg = ToUi::SpeechOutput {
                bytes_b64: base64::engine::general_purpose::STANDARD.encode(&bytes),
                mime: "audio/mpeg".to_string(),
            };
            if let Ok(json) = serde_json::to_string(&speech_msg) {
                state.send_to_ui(axum::extract::ws::Message::Text(json.into())).await;
            }
        }
        Err(e) => warn!(error = %e, "alert speech synthesis failed; text-only alert delivered"),
    }
}
