//! Axum router wiring the Orchestrator's HTTP + WebSocket surface (spec §4.3,
//! §6), mirroring `eva_executive::router::build_router`'s `ServiceBuilder` +
//! `CorsLayer` + `SetResponseHeaderLayer` shape with CORS preflight enabled
//! (spec §6: "`OPTIONS` with CORS preflight where enabled") since this is the
//! one surface a browser UI talks to directly.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::{health, speech, text};
use crate::state::OrchestratorState;
use crate::tts::Synthesizer;
use crate::ws_eye;

pub fn build_router<S: Synthesizer + 'static>(state: OrchestratorState<S>) -> Router {
    let csp = SetResponseHeaderLayer::overriding(
        axum::http::header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );

    Router::new()
        .route("/health", get(health::health::<S>))
        .route("/text", post(text::post_text::<S>))
        .route("/speech", post(speech::post_speech::<S>))
        .route("/eye", get(ws_eye::eye_handler::<S>))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()).layer(csp))
        .with_state(state)
}
