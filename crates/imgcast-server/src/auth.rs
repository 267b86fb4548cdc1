//! HTTP Basic credentials from the `Authorization` header.

use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::STANDARD};

const SCHEME: &str = "basic ";

/// Username and password sent with Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Username, everything before the first `:`
    pub username: String,
    /// Password, everything after the first `:`
    pub password: String,
}

impl BasicCredentials {
    /// Decode the `Authorization` header.
    ///
    /// Returns `None` if the header is missing, uses another scheme, or is not
    /// valid base64 of UTF-8 `user:password`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

        let scheme = value.get(..SCHEME.len())?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return None;
        }

        let decoded = STANDARD.decode(value[SCHEME.len()..].trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self { username: username.to_string(), password: password.to_string() })
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
