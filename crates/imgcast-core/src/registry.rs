//! Room registry: name → live [`Room`] for the whole process.
//!
//! Rooms are loaded lazily from disk on first access and never evicted, so
//! there is at most one `Room` (and one delivery task) per name.
//!
//! # Authorization
//!
//! Who may write to a room depends on whether it exists:
//!
//! - missing room: credentials are checked against the admin store, and on
//!   success they become the room's only credential
//! - existing room: credentials are checked against the room's own store;
//!   admin credentials are not consulted
//!
//! # Locking
//!
//! The map sits behind an `RwLock`. Lookups take the read lock; loading takes
//! the write lock and re-checks the map before inserting. The whole creation
//! path is serialized by a separate mutex, so of several concurrent creates
//! for one name exactly one succeeds and the rest see `AlreadyExists`.
//!
//! # Runtime
//!
//! Each room's delivery task runs on the Tokio runtime whose handle the
//! registry holds: captured at construction when built inside a runtime, or
//! set with [`RoomRegistry::with_runtime`]. Without one, loading a room fails
//! with `NoRuntime` and nothing is touched on disk.

#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, RwLock},
};

use tokio::runtime::Handle;

use crate::{
    broadcaster::{Broadcaster, DEFAULT_QUEUE_CAPACITY},
    credentials::{CredentialFactory, CredentialStore, HtpasswdFile, htpasswd_factory},
    error::RoomError,
    room_name::RoomName,
    storage::ImageStore,
};

/// A loaded room: its broadcaster and its credential store.
pub struct Room {
    name: RoomName,
    broadcaster: Broadcaster,
    credentials: Arc<dyn CredentialStore>,
}

impl Room {
    /// Room name.
    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Event fan-out for this room's viewers.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Check credentials against this room's own store.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, RoomError> {
        Ok(self.credentials.authenticate(username, password)?)
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

/// Owns every loaded room and enforces the creation policy.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomName, Arc<Room>>>,
    creation: Mutex<()>,
    images: ImageStore,
    admin: Arc<dyn CredentialStore>,
    room_credentials: CredentialFactory,
    runtime: Option<Handle>,
}

impl RoomRegistry {
    /// Registry using htpasswd files: `{base}/.htpasswd` for the admin and
    /// `rooms/{room}/.htpasswd` per room.
    pub fn new(images: ImageStore) -> Self {
        let admin = Arc::new(HtpasswdFile::new(images.admin_credentials_path()));
        Self::with_credentials(images, admin, htpasswd_factory(bcrypt::DEFAULT_COST))
    }

    /// Registry with explicit admin store and room store factory.
    ///
    /// Captures the current Tokio runtime, if any, for delivery tasks.
    pub fn with_credentials(
        images: ImageStore,
        admin: Arc<dyn CredentialStore>,
        room_credentials: CredentialFactory,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            creation: Mutex::new(()),
            images,
            admin,
            room_credentials,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Run delivery tasks on `runtime` instead of the captured one.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Image store the registry was built with.
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Number of rooms loaded in memory.
    pub fn room_count(&self) -> usize {
        self.rooms.read().expect("rooms lock poisoned").len()
    }

    /// Look up a room, loading it from disk if needed.
    ///
    /// Fails with `RoomNotFound` if neither memory nor disk knows the room.
    pub fn resolve(&self, name: &str) -> Result<Arc<Room>, RoomError> {
        let name = RoomName::parse(name)?;
        self.resolve_valid(&name)
    }

    /// Create a room, authorized by the admin store.
    ///
    /// On success the room's credential file holds exactly
    /// `username:hash(password)`.
    pub fn create(&self, name: &str, username: &str, password: &str) -> Result<Arc<Room>, RoomError> {
        let name = RoomName::parse(name)?;
        self.create_valid(&name, username, password)
    }

    /// Resolve an existing room authenticated by its own store, or create it
    /// authenticated by the admin store.
    ///
    /// The boolean is `true` when the room was created by this call.
    pub fn resolve_or_create(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<(Arc<Room>, bool), RoomError> {
        let name = RoomName::parse(name)?;

        if !self.images.room_exists(&name) {
            let room = self.create_valid(&name, username, password)?;
            return Ok((room, true));
        }

        let room = self.resolve_valid(&name)?;
        if !room.authenticate(username, password)? {
            tracing::debug!(room = %name, user = username, "room authentication failed");
            return Err(RoomError::Unauthorized);
        }

        Ok((room, false))
    }

    /// Check credentials against an existing room's store.
    pub fn authenticate(&self, name: &str, username: &str, password: &str) -> Result<bool, RoomError> {
        self.resolve(name)?.authenticate(username, password)
    }

    fn resolve_valid(&self, name: &RoomName) -> Result<Arc<Room>, RoomError> {
        if let Some(room) = self.rooms.read().expect("rooms lock poisoned").get(name) {
            return Ok(Arc::clone(room));
        }

        if !self.images.room_exists(name) {
            return Err(RoomError::RoomNotFound(name.to_string()));
        }

        let runtime = self.runtime()?;
        Ok(self.load_room(name, runtime))
    }

    fn create_valid(&self, name: &RoomName, username: &str, password: &str) -> Result<Arc<Room>, RoomError> {
        let runtime = self.runtime()?;
        let _creating = self.creation.lock().expect("creation lock poisoned");

        if self.images.room_exists(name) {
            return Err(RoomError::AlreadyExists(name.to_string()));
        }

        if !self.admin.authenticate(username, password)? {
            tracing::debug!(room = %name, user = username, "admin authentication failed");
            return Err(RoomError::Unauthorized);
        }

        self.images.create_room(name)?;

        let credentials = (self.room_credentials)(self.images.room_credentials_path(name));
        if let Err(e) = credentials.create_with_user(username, password) {
            // Without credentials the room could never be written to again
            if let Err(cleanup) = self.images.remove_room(name) {
                tracing::error!(room = %name, error = %cleanup, "failed to remove half-created room");
            }
            return Err(e.into());
        }

        tracing::info!(room = %name, creator = username, "room created");
        Ok(self.load_room(name, runtime))
    }

    fn runtime(&self) -> Result<&Handle, RoomError> {
        self.runtime.as_ref().ok_or(RoomError::NoRuntime)
    }

    /// Insert a `Room` for `name` unless another caller already did.
    fn load_room(&self, name: &RoomName, runtime: &Handle) -> Arc<Room> {
        let mut rooms = self.rooms.write().expect("rooms lock poisoned");

        if let Some(room) = rooms.get(name) {
            return Arc::clone(room);
        }

        let room = Arc::new(Room {
            name: name.clone(),
            broadcaster: Broadcaster::spawn_on(runtime, name.as_str(), DEFAULT_QUEUE_CAPACITY),
            credentials: (self.room_credentials)(self.images.room_credentials_path(name)),
        });
        rooms.insert(name.clone(), Arc::clone(&room));

        tracing::info!(room = %name, "room loaded");
        room
    }
}

impl fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("room_count", &self.room_count())
            .field("images", &self.images)
            .finish_non_exhaustive()
    }
}
