//! imgcast core: rooms, credentials, live images and update fan-out.
//!
//! Producers push a replacement image into a named, authenticated room;
//! every viewer currently subscribed to that room is told to re-fetch it.
//!
//! # Components
//!
//! - [`RoomRegistry`]: lazily loads rooms, one instance per name, and applies
//!   the creation/authorization policy
//! - [`Broadcaster`]: per-room subscriber set and delivery task
//! - [`ImageStore`]: room directories and the live image file
//! - [`CredentialStore`]: username/password check, [`HtpasswdFile`] on disk
//!
//! The file-system API is synchronous; callers on an async runtime should
//! move registry and store calls onto a blocking thread. Broadcasters run
//! their delivery task on a Tokio runtime: the registry captures a handle to
//! the runtime it is built in (or is given one with
//! [`RoomRegistry::with_runtime`]) and spawns through that handle, so its
//! methods may be called from any thread.

#![forbid(unsafe_code)]

pub mod broadcaster;
pub mod credentials;
mod error;
mod registry;
pub mod room_name;
pub mod storage;

pub use broadcaster::{Broadcaster, SubscriberId};
pub use credentials::{CredentialFactory, CredentialStore, HtpasswdFile, htpasswd_factory};
pub use error::{CredentialError, RoomError, StorageError};
pub use registry::{Room, RoomRegistry};
pub use room_name::RoomName;
pub use storage::ImageStore;
