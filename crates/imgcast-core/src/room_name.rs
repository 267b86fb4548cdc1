//! Validated room names.
//!
//! A room name doubles as a directory name under `rooms/`, so it is limited
//! to ASCII letters, digits, `-` and `_`. Anything else (`/`, `.`, spaces,
//! the empty string) is rejected before the name reaches the file system.

use std::fmt;

use crate::error::RoomError;

/// A room name that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Validate `name` and wrap it.
    pub fn parse(name: &str) -> Result<Self, RoomError> {
        if is_valid(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(RoomError::InvalidName(name.to_string()))
        }
    }

    /// The validated name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RoomName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a room name without allocating.
pub fn is_valid(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
