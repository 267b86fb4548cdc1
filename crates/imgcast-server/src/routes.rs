//! Router construction.

use std::time::Instant;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// Log method, path, status and latency of every request.
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Build the full router, mounted under the configured base path.
pub fn build_router(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let rooms = Router::new()
        .route("/{room}/upload", post(handlers::upload))
        .route("/{room}/live", get(handlers::live))
        .route("/{room}/events", get(handlers::events))
        .fallback(handlers::static_asset)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state);

    let app = if base_path == "/" {
        rooms
    } else {
        Router::new().nest(base_path.trim_end_matches('/'), rooms)
    };

    app.layer(middleware::from_fn(log_request))
}
