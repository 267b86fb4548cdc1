//! On-disk layout for rooms and their live images.
//!
//! ```text
//! {base}/.htpasswd                  admin credentials
//! {base}/rooms/{room}/              room directory (existence = room exists)
//! {base}/rooms/{room}/.htpasswd     room credentials
//! {base}/rooms/{room}/imgcast.data  live image
//! ```
//!
//! Every path is derived from the base directory and the room name on demand.
//! Image replacement is remove-then-write, not an atomic rename: a reader
//! racing an upload may see no file or a partial one. Last write wins.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use crate::{error::StorageError, room_name::RoomName};

/// File name of the live image inside a room directory.
pub const LIVE_DATA_FILENAME: &str = "imgcast.data";

/// File name of credential files (admin and per room).
pub const CREDENTIALS_FILENAME: &str = ".htpasswd";

/// Directory under the base that holds one directory per room.
const ROOMS_DIR: &str = "rooms";

/// File-system store for room directories and live images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_dir: PathBuf,
}

impl ImageStore {
    /// Store rooted at `base_dir`. Nothing is created until
    /// [`ensure_base_dir`](Self::ensure_base_dir) or
    /// [`create_room`](Self::create_room).
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Configured base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory of a room.
    pub fn room_dir(&self, name: &RoomName) -> PathBuf {
        self.base_dir.join(ROOMS_DIR).join(name.as_str())
    }

    /// Path of a room's live image.
    pub fn image_path(&self, name: &RoomName) -> PathBuf {
        self.room_dir(name).join(LIVE_DATA_FILENAME)
    }

    /// Path of a room's credential file.
    pub fn room_credentials_path(&self, name: &RoomName) -> PathBuf {
        self.room_dir(name).join(CREDENTIALS_FILENAME)
    }

    /// Path of the admin credential file.
    pub fn admin_credentials_path(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_FILENAME)
    }

    /// Create the base and `rooms/` directories if missing.
    pub fn ensure_base_dir(&self) -> Result<(), StorageError> {
        let rooms = self.base_dir.join(ROOMS_DIR);
        fs::create_dir_all(&rooms).map_err(|e| StorageError::io(rooms, e))
    }

    /// Whether the room directory is present.
    pub fn room_exists(&self, name: &RoomName) -> bool {
        self.room_dir(name).is_dir()
    }

    /// Create the room directory and any missing parents.
    pub fn create_room(&self, name: &RoomName) -> Result<(), StorageError> {
        let dir = self.room_dir(name);
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(dir, e))
    }

    /// Delete a room directory and everything in it.
    ///
    /// Only used to roll back a creation that failed half-way.
    pub fn remove_room(&self, name: &RoomName) -> Result<(), StorageError> {
        let dir = self.room_dir(name);
        fs::remove_dir_all(&dir).map_err(|e| StorageError::io(dir, e))
    }

    /// Replace the room's live image with the full contents of `reader`.
    ///
    /// Returns the number of bytes written.
    pub fn save_image(&self, name: &RoomName, mut reader: impl Read) -> Result<u64, StorageError> {
        let path = self.image_path(name);

        if let Err(e) = fs::remove_file(&path)
            && e.kind() != io::ErrorKind::NotFound
        {
            return Err(StorageError::io(path, e));
        }

        let mut file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;
        io::copy(&mut reader, &mut file).map_err(|e| StorageError::io(&path, e))
    }

    /// Current live image, or `None` if nothing was uploaded yet.
    pub fn read_image(&self, name: &RoomName) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.image_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}
