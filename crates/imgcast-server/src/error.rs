//! Server error types.
//!
//! - [`ApiError`]: per-request failures, turned into an HTTP response in one
//!   place
//! - [`ServerError`]: fatal start-up failures returned from `main`

use std::{fmt, io, path::PathBuf};

use axum::{
    extract::multipart::MultipartError,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use imgcast_core::{RoomError, StorageError};
use thiserror::Error;

/// Challenge sent with every 401 response.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Room Upload""#;

/// Errors a request handler can return.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Registry or store failure.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Missing or malformed Basic credentials, or credentials the upload path
    /// refuses without saying why.
    #[error("unauthorized")]
    Unauthorized,

    /// The multipart body had no `image` field.
    #[error("image not provided")]
    MissingImage,

    /// The upload body was not valid multipart or exceeded the size limit.
    #[error("invalid upload body: {0}")]
    Multipart(#[from] MultipartError),

    /// Room exists but nothing was uploaded yet, or static asset missing.
    #[error("not found")]
    NotFound,

    /// The `connected` frame could not be written to a new subscriber.
    #[error("event stream unavailable: {0}")]
    Stream(#[source] io::Error),

    /// Static asset exists but could not be read.
    #[error("failed to read asset {}: {source}", path.display())]
    Asset {
        /// Asset path on disk
        path: PathBuf,
        /// Original error
        #[source]
        source: io::Error,
    },

    /// A blocking file-system task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Room(err) => match err {
                RoomError::InvalidName(_) => StatusCode::BAD_REQUEST,
                RoomError::Unauthorized | RoomError::AlreadyExists(_) => StatusCode::UNAUTHORIZED,
                RoomError::RoomNotFound(_) => StatusCode::NOT_FOUND,
                RoomError::Storage(_) | RoomError::Credentials(_) | RoomError::NoRuntime => {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingImage => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Stream(_) | Self::Asset { .. } | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text. Internal details stay in the log.
    fn public_message(&self) -> String {
        match self {
            Self::Room(RoomError::RoomNotFound(_)) => "Room not found".to_string(),
            Self::Room(RoomError::Unauthorized | RoomError::AlreadyExists(_)) | Self::Unauthorized => {
                "Unauthorized".to_string()
            },
            Self::Multipart(err) => err.body_text(),
            _ if self.status().is_server_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut response = (status, self.public_message()).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}

/// Errors that stop the server from starting or keep it from serving.
#[derive(Debug)]
pub enum ServerError {
    /// Invalid configuration (bad listen address).
    ///
    /// Fatal. Fix the flags or environment and restart.
    Config(String),

    /// Rooms base directory could not be prepared.
    ///
    /// Fatal. Usually a permission problem on `ROOMS_BASE_DIR`.
    Storage(StorageError),

    /// Binding the listener or serving connections failed.
    ///
    /// Fatal for the process. Typically the port is already in use.
    Transport(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::Config(_) => None,
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err)
    }
}
