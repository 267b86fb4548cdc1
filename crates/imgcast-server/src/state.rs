//! Shared application state handed to every handler.

use std::sync::Arc;

use imgcast_core::RoomRegistry;

use crate::{assets::AssetSource, config::Config};

/// State passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Rooms, credentials and image store
    pub registry: Arc<RoomRegistry>,
    /// Viewer page and other static assets
    pub assets: Arc<AssetSource>,
    /// Normalized base path the router is mounted under
    pub base_path: String,
    /// Upload body limit in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State for `registry` with the asset source, base path and upload limit
    /// taken from `config`.
    pub fn new(registry: Arc<RoomRegistry>, config: &Config) -> Self {
        Self {
            registry,
            assets: Arc::new(AssetSource::from_dir(config.static_dir.as_deref())),
            base_path: config.base_path.clone(),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}
