//! Error types for room resolution, credentials and image storage.
//!
//! - `RoomError`: what registry callers see (name, auth, existence, I/O)
//! - `StorageError`: file-system failures inside the image store
//! - `CredentialError`: credential file or hashing failures

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors returned by the room registry.
#[derive(Error, Debug)]
pub enum RoomError {
    /// Room name contains characters outside `[A-Za-z0-9_-]` or is empty.
    ///
    /// Raised before any lookup or disk access.
    #[error("invalid room name {0:?}: must be alphanumeric with dash/underscore only")]
    InvalidName(String),

    /// Credentials did not match the store consulted for this operation.
    ///
    /// The admin store when creating a room, the room's own store otherwise.
    #[error("authentication failed")]
    Unauthorized,

    /// No room directory exists for this name.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Creation was attempted for a room that already exists on disk.
    #[error("room already exists: {0}")]
    AlreadyExists(String),

    /// Image store operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Credential store operation failed.
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// A room had to be loaded but the registry has no runtime to run its
    /// delivery task on.
    ///
    /// Build the registry inside a runtime or give it one with
    /// `RoomRegistry::with_runtime`.
    #[error("no async runtime available for room delivery")]
    NoRuntime,
}

impl RoomError {
    /// Whether the error comes from the file system or hashing rather than
    /// from the request itself.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Credentials(_) | Self::NoRuntime)
    }
}

/// Errors that can occur during image store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying file-system error, with the path it happened on.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Original error
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors that can occur while reading or writing a credential file.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Credential file could not be read or written.
    #[error("credential file {}: {source}", path.display())]
    Io {
        /// Credential file path
        path: PathBuf,
        /// Original error
        #[source]
        source: io::Error,
    },

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl CredentialError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_error_display() {
        let err = RoomError::RoomNotFound("demo".to_string());
        assert_eq!(err.to_string(), "room not found: demo");

        let err = RoomError::AlreadyExists("demo".to_string());
        assert_eq!(err.to_string(), "room already exists: demo");

        let err = RoomError::InvalidName("a/b".to_string());
        assert!(err.to_string().starts_with("invalid room name \"a/b\""));
    }

    #[test]
    fn internal_errors_are_flagged() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = RoomError::from(StorageError::io("/tmp/x", io));
        assert!(err.is_internal());
        assert!(err.to_string().contains("/tmp/x"));

        assert!(RoomError::NoRuntime.is_internal());
        assert!(!RoomError::Unauthorized.is_internal());
        assert!(!RoomError::RoomNotFound("x".to_string()).is_internal());
    }
}
