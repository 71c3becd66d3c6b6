//! Axum router wiring the five Executive endpoints (spec §4.3), generalizing
//! the teacher's `dashboard::build_router` (`ServiceBuilder` + `CorsLayer` +
//! `SetResponseHeaderLayer`, `with_state` last) from a single-process dashboard
//! to a model-client-generic HTTP surface, plus a request/response/error trace
//! middleware backed by [`eva_common::TraceLogger`].

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use eva_common::TracePhase;
use eva_model::ModelClient;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::{events, health, insight, jobs_run, respond};
use crate::state::AppState;

pub fn build_router<M: ModelClient + 'static>(state: AppState<M>) -> Router {
    let max_body_bytes = state.config.insight.max_body_bytes;

    let csp = SetResponseHeaderLayer::overriding(
        axum::http::header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );

    Router::new()
        .route("/health", get(health::health::<M>))
        .route("/events", post(events::post_events::<M>))
        .route("/respond", post(respond::respond::<M>))
        .route("/insight", post(insight::insight::<M>))
        .route("/jobs/run", post(jobs_run::jobs_run::<M>))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(csp)
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(middleware::from_fn_with_state(state.clone(), trace_middleware::<M>)),
        )
        .with_state(state)
}

/// Records one `request` trace event on entry and one `response`/`error` event
/// on exit, keyed by a per-call request id. Separate from the `tracing`
/// operational logs initialized in `main` — this is the offline-inspection
/// sink spec §4.12 describes.
async fn trace_middleware<M: ModelClient + 'static>(State(state): State<AppState<M>>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = uuid::Uuid::new_v4().to_string();

    state.trace.record(
        TracePhase::Request,
        json!({ "requestId": request_id, "method": method.as_str(), "path": path }),
    );

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let phase = if status >= 400 { TracePhase::Error } else { TracePhase::Response };
    state.trace.record(
        phase,
        json!({ "requestId": request_id, "method": method.as_str(), "path": path, "status": status }),
    );

    response
}
