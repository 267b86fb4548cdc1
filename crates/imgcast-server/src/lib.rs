//! imgcast HTTP server.
//!
//! Producers `POST` a replacement image to `/{room}/upload`; viewers load
//! `/{room}/` (the static viewer page), follow `/{room}/events` and re-fetch
//! `/{room}/live` on every `updated` event.
//!
//! # Components
//!
//! - [`Config`]: flags and environment
//! - [`build_router`]: axum routes over an [`AppState`]
//! - [`EventStream`]: response body of one event subscriber
//! - [`ApiError`]: the single mapping from failures to HTTP responses

#![forbid(unsafe_code)]

pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

use std::sync::Arc;

pub use config::Config;
pub use error::{ApiError, ServerError};
use imgcast_core::{CredentialStore, HtpasswdFile, ImageStore, RoomRegistry};
pub use routes::build_router;
pub use sse::EventStream;
pub use state::AppState;
use tokio::{net::TcpListener, runtime::Handle};

/// Prepare the rooms directory, bind the listener and serve until the
/// listener fails.
pub async fn run(config: &Config) -> Result<(), ServerError> {
    let addr = config.listen_addr()?;

    let images = ImageStore::new(&config.rooms_base_dir);
    images.ensure_base_dir()?;

    let admin = HtpasswdFile::new(images.admin_credentials_path());
    if !admin.exists() {
        tracing::warn!(
            path = %admin.path().display(),
            "admin credential file missing, new rooms cannot be created"
        );
    }

    let registry = Arc::new(RoomRegistry::new(images).with_runtime(Handle::current()));
    let state = AppState::new(registry, config);
    let assets = Arc::clone(&state.assets);
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        rooms = %config.rooms_base_dir.display(),
        assets = %assets,
        "listening"
    );
    tracing::info!("upload to {}", config.join_path("/{room}/upload"));
    tracing::info!("viewer at {}", config.join_path("/{room}/"));

    axum::serve(listener, app).await?;

    Ok(())
}
