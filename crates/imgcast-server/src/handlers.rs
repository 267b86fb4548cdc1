//! Request handlers.
//!
//! Registry and image store calls touch the disk (and bcrypt is slow), so they
//! run on the blocking pool.
//!
//! # Upload order
//!
//! Name validation, then credentials, then room resolution or creation, then
//! the multipart body. A missing `image` field is only reported after the
//! credentials were accepted.

#![allow(clippy::needless_pass_by_value, reason = "axum extractors are taken by value")]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        Multipart, OriginalUri, Path, State,
        multipart::MultipartRejection,
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use imgcast_core::{RoomError, RoomName};

use crate::{
    assets::{self, FAVICON},
    auth::BasicCredentials,
    error::ApiError,
    sse::EventStream,
    state::AppState,
};

/// Multipart field holding the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Run a registry or store call on the blocking pool.
async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, RoomError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(task).await??)
}

/// `POST /{room}/upload`: replace the live image and notify viewers.
///
/// Creates the room if it does not exist and the credentials are an admin's.
pub async fn upload(
    State(state): State<AppState>,
    Path(room): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, ApiError> {
    let name = RoomName::parse(&room)?;
    let credentials = BasicCredentials::from_headers(&headers).ok_or(ApiError::Unauthorized)?;

    let registry = Arc::clone(&state.registry);
    let username = credentials.username.clone();
    let resolved = blocking(move || {
        registry.resolve_or_create(&room, &credentials.username, &credentials.password)
    })
    .await;

    let (room, created) = match resolved {
        Ok(resolved) => resolved,
        // Upload never reveals whether a room exists
        Err(ApiError::Room(RoomError::RoomNotFound(_))) => return Err(ApiError::Unauthorized),
        Err(e) => {
            tracing::warn!(
                room = %name,
                user = %username,
                operation = "resolve_or_create",
                error = %e,
                "upload rejected"
            );
            return Err(e);
        },
    };

    if created {
        tracing::info!(room = %room.name(), creator = %username, "new room created via upload");
    }

    let image = read_image_field(multipart).await?;
    let size = image.len();

    let registry = Arc::clone(&state.registry);
    let saved = blocking(move || Ok(registry.images().save_image(&name, &image[..])?)).await;
    if let Err(e) = saved {
        tracing::error!(room = %room.name(), operation = "save_image", error = %e, "failed to save image");
        return Err(e);
    }

    tracing::info!(room = %room.name(), user = %username, bytes = size, "image uploaded");
    room.broadcaster().notify();

    Ok(StatusCode::OK)
}

/// First `image` field of the upload body.
async fn read_image_field(multipart: Result<Multipart, MultipartRejection>) -> Result<Bytes, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "upload is not a multipart body");
        ApiError::MissingImage
    })?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            return Ok(field.bytes().await?);
        }
    }

    Err(ApiError::MissingImage)
}

/// `GET /{room}/live`: the current image, never cached.
pub async fn live(State(state): State<AppState>, Path(room): Path<String>) -> Result<Response, ApiError> {
    let name = RoomName::parse(&room)?;

    let registry = Arc::clone(&state.registry);
    let image = blocking(move || {
        let images = registry.images();
        if !images.room_exists(&name) {
            return Err(RoomError::RoomNotFound(name.to_string()));
        }
        Ok(images.read_image(&name)?)
    })
    .await?;

    let image = image.ok_or(ApiError::NotFound)?;
    let headers = [
        (header::CONTENT_TYPE, assets::sniff_image_type(&image)),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ];

    Ok((headers, image).into_response())
}

/// `GET /{room}/events`: server-sent events until the client disconnects.
pub async fn events(State(state): State<AppState>, Path(room): Path<String>) -> Result<Response, ApiError> {
    let registry = Arc::clone(&state.registry);
    let room = blocking(move || registry.resolve(&room)).await?;
    let name = room.name().clone();

    let stream = EventStream::subscribe(room).await.map_err(|e| {
        tracing::error!(room = %name, operation = "subscribe", error = %e, "failed to open event stream");
        ApiError::Stream(e)
    })?;
    tracing::debug!(room = %name, subscriber = %stream.subscriber_id(), "event stream opened");

    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ];

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// Everything else: the favicon, or a room's viewer assets.
///
/// `/{room}/{path}` serves `{path}` from the asset source once the room
/// exists. `/{room}` redirects to `/{room}/` so the viewer page's relative
/// URLs resolve inside the room.
pub async fn static_asset(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let path = uri.path();
    let path = path.strip_prefix(state.base_path.trim_end_matches('/')).unwrap_or(path);
    let path = path.trim_start_matches('/');

    if path == FAVICON {
        return state.assets.serve(FAVICON).await;
    }

    let (room, rest) = path.split_once('/').unwrap_or((path, ""));
    let name = RoomName::parse(room).map_err(|_| ApiError::NotFound)?;

    let registry = Arc::clone(&state.registry);
    let exists = blocking(move || Ok(registry.images().room_exists(&name))).await?;
    if !exists {
        return Err(RoomError::RoomNotFound(room.to_string()).into());
    }

    if rest.is_empty() && !path.ends_with('/') {
        return Ok(Redirect::permanent(&format!("{}/", uri.path())).into_response());
    }

    state.assets.serve(rest).await
}
