//! Axum router construction and LFS route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::errors::ApiError;
use crate::handlers::object;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/:user/:repo/objects", post(handle_post_object))
        .route("/:user/:repo/objects/verify", post(handle_verify_object))
        .route("/:user/:repo/objects/:oid", get(handle_get_object));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .with_state(state)
        // metrics_middleware wraps the handlers; tracing is outermost.
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// `GET /health` -- Liveness probe.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn handle_get_object(
    State(state): State<Arc<AppState>>,
    Path((user, repo, oid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    object::get_object(state, &user, &repo, &oid, &headers).await
}

async fn handle_post_object(
    State(state): State<Arc<AppState>>,
    Path((user, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    object::post_object(state, &user, &repo, &headers, &body).await
}

async fn handle_verify_object(
    State(state): State<Arc<AppState>>,
    Path((user, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    object::verify_object(state, &user, &repo, &headers, &body).await
}
