//! Key/value persistence for the session token.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session manager only ever touches storage through [`TokenStore`], so
//! the CLI can persist to disk while tests use [`MemoryStore`]. The shape
//! mirrors browser `localStorage`: string keys, string values.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::ClientError;

/// Fixed key under which the session token is stored.
pub const TOKEN_KEY: &str = "auth_token";

/// Minimal string key/value store.
pub trait TokenStore: Send + Sync {
    /// Read `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when the backing medium fails.
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when the backing medium fails.
    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError>;

    /// Delete `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when the backing medium fails.
    fn remove_item(&self, key: &str) -> Result<(), ClientError>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_items<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T, ClientError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| ClientError::Storage("memory store lock poisoned".to_owned()))?;
        Ok(f(&mut items))
    }
}

impl TokenStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError> {
        self.with_items(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.with_items(|items| {
            items.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), ClientError> {
        self.with_items(|items| {
            items.remove(key);
        })
    }
}

/// JSON object on disk, rewritten whole on every change. A file that does
/// not parse reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_io_error("read", &self.path, &e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        // An unreadable store must not lock the user out of login/logout;
        // the next write replaces it.
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring corrupt store file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| storage_io_error("create", parent, &e))?;
            }
        }
        let rendered =
            serde_json::to_string_pretty(items).map_err(|e| ClientError::Storage(format!("encode store file: {e}")))?;
        std::fs::write(&self.path, rendered).map_err(|e| storage_io_error("write", &self.path, &e))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), ClientError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ClientError::Storage("file store lock poisoned".to_owned()))?;
        let mut items = self.load()?;
        f(&mut items);
        self.save(&items)
    }
}

impl TokenStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, ClientError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ClientError::Storage("file store lock poisoned".to_owned()))?;
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.update(|items| {
            items.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), ClientError> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

fn storage_io_error(action: &str, path: &Path, err: &std::io::Error) -> ClientError {
    ClientError::Storage(format!("{action} {}: {err}", path.display()))
}
