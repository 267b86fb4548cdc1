//! Credential stores gating room creation and uploads.
//!
//! The registry only talks to the [`CredentialStore`] trait. The shipped
//! implementation is [`HtpasswdFile`]: one `username:hash` entry per line,
//! blank lines and `#` comments ignored, bcrypt hashes.
//!
//! Two behaviors are load-bearing for callers and must be kept by any
//! alternative store:
//!
//! - the first entry whose username matches decides the outcome; later
//!   entries for the same user are never consulted
//! - `create_with_user` replaces the whole store with exactly one entry

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::error::CredentialError;

/// Username/password verification backed by some persistent table.
pub trait CredentialStore: Send + Sync {
    /// Whether the backing store is present.
    fn exists(&self) -> bool;

    /// Check `username`/`password` against the store.
    ///
    /// Returns `Ok(false)` when the store is missing or the user is unknown.
    /// Only unexpected read failures are errors.
    fn authenticate(&self, username: &str, password: &str) -> Result<bool, CredentialError>;

    /// Replace the store's contents with a single entry for `username`.
    fn create_with_user(&self, username: &str, password: &str) -> Result<(), CredentialError>;
}

/// Builds the credential store for a room from its credential file path.
pub type CredentialFactory = Arc<dyn Fn(PathBuf) -> Arc<dyn CredentialStore> + Send + Sync>;

/// Factory producing [`HtpasswdFile`] stores hashing at `cost`.
pub fn htpasswd_factory(cost: u32) -> CredentialFactory {
    Arc::new(move |path: PathBuf| -> Arc<dyn CredentialStore> {
        Arc::new(HtpasswdFile::with_cost(path, cost))
    })
}

/// Marker that starts a comment line.
const COMMENT_PREFIX: char = '#';

/// Flat-file credential store in htpasswd layout with bcrypt hashes.
#[derive(Debug, Clone)]
pub struct HtpasswdFile {
    path: PathBuf,
    cost: u32,
}

impl HtpasswdFile {
    /// Store at `path`, hashing new passwords with the bcrypt default cost.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cost(path, bcrypt::DEFAULT_COST)
    }

    /// Store at `path`, hashing new passwords with `cost`.
    ///
    /// Verification always uses the cost embedded in the stored hash.
    pub fn with_cost(path: impl Into<PathBuf>, cost: u32) -> Self {
        Self { path: path.into(), cost }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for HtpasswdFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(CredentialError::io(&self.path, e)),
        };

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| CredentialError::io(&self.path, e))?;
            if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
                continue;
            }

            let Some((entry_user, hash)) = line.split_once(':') else {
                continue;
            };

            if entry_user == username {
                // A malformed hash is a mismatch, not a failure
                return Ok(bcrypt::verify(password, hash).unwrap_or_else(|e| {
                    tracing::debug!(path = %self.path.display(), user = username, error = %e, "unreadable hash");
                    false
                }));
            }
        }

        Ok(false)
    }

    fn create_with_user(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let hash = bcrypt::hash(password, self.cost)?;
        std::fs::write(&self.path, format!("{username}:{hash}\n"))
            .map_err(|e| CredentialError::io(&self.path, e))
    }
}
