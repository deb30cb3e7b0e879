//! Session persistence
//!
//! A session survives a reload as two values: the notation text of the
//! whole tree and the [`PositionPath`] of the cursor. Node ids are not
//! stored; they mean nothing to a freshly parsed tree.
//!
//! # Stores
//!
//! - [`MemoryStore`] - in-process map, used by tests and short-lived tools
//! - [`JsonFileStore`] - one `<key>.json` per session in a directory
//!
//! Every call is a complete read or a complete write of one record.

use crate::core::error::StoreError;
use crate::tree::PositionPath;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot of one analysis session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Full tree, headers, comments and symbols included
    pub notation_text: String,
    /// Cursor, as child indices from the root
    pub position_path: PositionPath,
}

/// Key/value storage for [`SessionRecord`]s
pub trait SessionStore {
    /// `Ok(None)` when nothing was saved under `key`
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError>;

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError>;

    /// Drop the record, e.g. when its tab is closed. Missing keys are fine.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`SessionStore`]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: HashMap<String, SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), record.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}

/// Directory of JSON session files
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `sessions/` under the user's data directory, or `./sessions` when the
    /// platform has none
    pub fn default_dir() -> PathBuf {
        match ProjectDirs::from("com", "trilltino", "XFChess") {
            Some(dirs) => dirs.data_dir().join("sessions"),
            None => PathBuf::from("sessions"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Path separators in the key are replaced so every
    /// record stays inside the store directory.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("[STORE] No session file at {:?}", path);
                return Ok(None);
            }
            Err(e) => {
                warn!("[STORE] Failed to read session file at {:?}: {}", path, e);
                return Err(e.into());
            }
        };

        let record = serde_json::from_str(&contents)?;
        info!("[STORE] Loaded session '{}' from {:?}", key, path);
        Ok(Some(record))
    }

    fn save(&mut self, key: &str, record: &SessionRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;
        info!("[STORE] Saved session '{}' to {:?}", key, path);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("[STORE] Removed session '{}'", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
