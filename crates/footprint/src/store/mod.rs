//! Tag-keyed snapshot store.
//!
//! A single JSON file holds one object mapping tags to arbitrary JSON
//! payloads. Every operation is a read-modify-write of the whole file:
//! - Reads that fail (missing file, corrupt JSON) degrade to an empty store
//! - Writes go to a sibling temporary file that is renamed into place
//! - Calls within one process are serialized; separate processes are not
//!   coordinated and the last write wins

pub mod seed;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

pub use seed::{DemoSeed, DEMO_TAG};

/// File-backed map from tag to snapshot payload.
#[derive(Debug)]
pub struct TagStore {
    /// Path to the store file.
    path: PathBuf,
    /// Demo snapshot, when running the demo variant.
    demo: Option<DemoSeed>,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl TagStore {
    /// Open the store at `path`, creating it as `{}` if it doesn't exist.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the initial file can't be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_inner(path.as_ref().to_path_buf(), None)
    }

    /// Open the store in demo mode.
    ///
    /// A new file is initialized as `{"DEMO": <seed>}`. The reserved tag is
    /// always listed and falls back to the seed when it isn't stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the initial file can't be created.
    pub fn open_with_demo(path: impl AsRef<Path>, seed: DemoSeed) -> Result<Self> {
        Self::open_inner(path.as_ref().to_path_buf(), Some(seed))
    }

    fn open_inner(path: PathBuf, demo: Option<DemoSeed>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self {
            path,
            demo,
            lock: Mutex::new(()),
        };

        if !store.path.exists() {
            let mut initial = Map::new();
            if let Some(seed) = &store.demo {
                initial.insert(DEMO_TAG.to_string(), seed.payload().clone());
            }
            store.write_map(&initial)?;
            info!("Initialized tag store at {}", store.path.display());
        } else {
            debug!("Opened tag store at {}", store.path.display());
        }

        Ok(store)
    }

    /// Get the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store runs the demo variant.
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.demo.is_some()
    }

    /// Insert or fully replace the payload stored under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `tag` is blank or `payload` is
    /// `null`, and [`Error::StorageIo`] if the file can't be written.
    pub fn save(&self, tag: &str, payload: Value) -> Result<()> {
        validate_tag(tag)?;
        if payload.is_null() {
            return Err(Error::invalid_input("missing data"));
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map();
        let replaced = map.insert(tag.to_string(), payload).is_some();
        self.write_map(&map)?;

        debug!(tag, replaced, "Saved snapshot");
        Ok(())
    }

    /// Payload stored under `tag`, or `None` if the tag is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `tag` is blank.
    pub fn load(&self, tag: &str) -> Result<Option<Value>> {
        validate_tag(tag)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map();
        let found = map.remove(tag).or_else(|| self.demo_payload(tag));

        debug!(tag, found = found.is_some(), "Loaded snapshot");
        Ok(found)
    }

    /// All known tags. Order is not significant.
    #[must_use]
    pub fn list_tags(&self) -> Vec<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tags: Vec<String> = self.read_map().into_iter().map(|(tag, _)| tag).collect();
        if self.demo.is_some() && !tags.iter().any(|t| t == DEMO_TAG) {
            tags.push(DEMO_TAG.to_string());
        }
        tags
    }

    /// Remove `tag` from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `tag` is blank, [`Error::NotFound`]
    /// if it isn't stored, and [`Error::StorageIo`] if the file can't be
    /// written.
    pub fn delete_tag(&self, tag: &str) -> Result<()> {
        validate_tag(tag)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map();
        if map.remove(tag).is_none() {
            return Err(Error::not_found(tag));
        }
        self.write_map(&map)?;

        debug!(tag, "Deleted snapshot");
        Ok(())
    }

    fn demo_payload(&self, tag: &str) -> Option<Value> {
        match &self.demo {
            Some(seed) if tag == DEMO_TAG => Some(seed.payload().clone()),
            _ => None,
        }
    }

    /// Read the whole store, substituting an empty map on any failure.
    fn read_map(&self) -> Map<String, Value> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read {}: {e}; using empty store", self.path.display());
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("{} is not a JSON object; using empty store", self.path.display());
                Map::new()
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}; using empty store", self.path.display());
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let body = serde_json::to_string_pretty(map)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, body)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|source| {
                error!("Failed to write {}: {source}", self.path.display());
                let _ = std::fs::remove_file(&tmp);
                Error::storage_io(&self.path, source)
            })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        Err(Error::invalid_input("missing tag"))
    } else {
        Ok(())
    }
}
