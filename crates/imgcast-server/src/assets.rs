//! Static assets and content types.
//!
//! Each room serves the same viewer page. The page is compiled into the
//! binary; a static directory, when configured, replaces the bundled assets
//! entirely. Request paths are confined to that directory: `..` segments are
//! refused.

use std::path::{Path, PathBuf};

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Served for a directory path.
pub const INDEX_FILE: &str = "index.html";

/// Served at the top level, outside any room.
pub const FAVICON: &str = "favicon.ico";

/// Assets compiled into the binary, by path relative to the asset root.
const BUNDLED: &[(&str, &[u8])] = &[(INDEX_FILE, include_bytes!("../static/index.html"))];

/// Where viewer assets come from.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// The viewer page compiled into the binary.
    Bundled,
    /// Files below a directory on disk.
    Directory(PathBuf),
}

impl AssetSource {
    /// `dir` when one is configured, the bundled assets otherwise.
    pub fn from_dir(dir: Option<&Path>) -> Self {
        dir.map_or(Self::Bundled, |dir| Self::Directory(dir.to_path_buf()))
    }

    /// Build a response for `relative` below the asset root.
    pub async fn serve(&self, relative: &str) -> Result<Response, ApiError> {
        match self {
            Self::Bundled => serve_bundled(relative),
            Self::Directory(dir) => serve(dir, relative).await,
        }
    }
}

impl std::fmt::Display for AssetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bundled => f.write_str("bundled"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

fn serve_bundled(relative: &str) -> Result<Response, ApiError> {
    let path = resolve(Path::new(""), relative).ok_or(ApiError::NotFound)?;
    let (_, bytes) = BUNDLED
        .iter()
        .find(|(name, _)| path == Path::new(name))
        .ok_or(ApiError::NotFound)?;

    Ok(([(header::CONTENT_TYPE, content_type_for_path(&path))], *bytes).into_response())
}

/// Read `relative` below `static_dir` and build a response for it.
pub async fn serve(static_dir: &Path, relative: &str) -> Result<Response, ApiError> {
    let path = resolve(static_dir, relative).ok_or(ApiError::NotFound)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
            return Err(ApiError::NotFound);
        },
        Err(source) => return Err(ApiError::Asset { path, source }),
    };

    Ok(([(header::CONTENT_TYPE, content_type_for_path(&path))], bytes).into_response())
}

/// Map a request path onto the static directory.
///
/// Empty and trailing-slash paths get the index file. Returns `None` for any
/// path that would leave the directory.
fn resolve(static_dir: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = static_dir.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }

    if relative.is_empty() || relative.ends_with('/') {
        path.push(INDEX_FILE);
    }
    Some(path)
}

/// Content type from a file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path.extension().and_then(std::ffi::OsStr::to_str).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Content type from the leading bytes of an uploaded image.
///
/// Uploads are stored without a name or type, so the live endpoint sniffs.
pub fn sniff_image_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', ..] => "image/bmp",
        [0, 0, 1, 0, ..] => "image/x-icon",
        _ => "application/octet-stream",
    }
}
