//! Key/value persistence and send-area shortcuts
//!
//! Values are strings holding JSON, stored together in one JSON object per
//! namespace (`~/.local/share/hidconsole/<namespace>.json`). Values that
//! fail to parse read as absent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Shortcut list key
pub const SHORTCUTS_KEY: &str = "hid_sendarea_shortcuts";

/// Batch interval key
pub const BATCH_INTERVAL_KEY: &str = "hid_batch_interval";

/// Default namespace
pub const DEFAULT_NAMESPACE: &str = "settings";

/// Longest accepted shortcut name, in characters
pub const MAX_SHORTCUT_NAME: usize = 20;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shortcut name is required")]
    EmptyName,

    #[error("Shortcut name is longer than {MAX_SHORTCUT_NAME} characters")]
    NameTooLong,

    #[error("Shortcut command is required")]
    EmptyCommand,

    #[error("No shortcut named '{0}'")]
    UnknownShortcut(String),
}

/// String values persisted as one JSON file
#[derive(Debug)]
pub struct KeyValueStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl KeyValueStore {
    /// Default data directory
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hidconsole")
    }

    /// Open `<dir>/<namespace>.json`; a missing or corrupt file starts empty
    pub fn open(dir: &Path, namespace: &str) -> Result<Self, StoreError> {
        let path = dir.join(format!("{namespace}.json"));
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable store {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Decode the JSON value under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring malformed value for {}: {}", key, e);
                None
            }
        }
    }

    /// Encode `value` as JSON under `key` and persist
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.values.insert(key.to_string(), raw);
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

/// A named send-area command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub name: String,
    pub command: String,
}

/// Shortcut list kept under [`SHORTCUTS_KEY`]
pub struct ShortcutBook<'a> {
    store: &'a mut KeyValueStore,
    shortcuts: Vec<Shortcut>,
}

impl<'a> ShortcutBook<'a> {
    pub fn load(store: &'a mut KeyValueStore) -> Self {
        let shortcuts = store.get(SHORTCUTS_KEY).unwrap_or_default();
        Self { store, shortcuts }
    }

    pub fn list(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn get(&self, name: &str) -> Option<&Shortcut> {
        self.shortcuts.iter().find(|s| s.name == name)
    }

    /// Add a shortcut, or replace the command of an existing one
    pub fn upsert(&mut self, name: &str, command: &str) -> Result<(), StoreError> {
        let name = name.trim();
        let command = command.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if name.chars().count() > MAX_SHORTCUT_NAME {
            return Err(StoreError::NameTooLong);
        }
        if command.is_empty() {
            return Err(StoreError::EmptyCommand);
        }

        match self.shortcuts.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.command = command.to_string(),
            None => self.shortcuts.push(Shortcut {
                name: name.to_string(),
                command: command.to_string(),
            }),
        }
        self.store.set(SHORTCUTS_KEY, &self.shortcuts)
    }

    pub fn remove(&mut self, name: &str) -> Result<Shortcut, StoreError> {
        let idx = self
            .shortcuts
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| StoreError::UnknownShortcut(name.to_string()))?;
        let removed = self.shortcuts.remove(idx);
        self.store.set(SHORTCUTS_KEY, &self.shortcuts)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = KeyValueStore::open(dir.path(), "t").unwrap();
        let mut book = ShortcutBook::load(&mut store);

        assert!(matches!(book.upsert("  ", "F5"), Err(StoreError::EmptyName)));
        assert!(matches!(book.upsert("ping", " "), Err(StoreError::EmptyCommand)));
        assert!(matches!(
            book.upsert(&"x".repeat(21), "F5"),
            Err(StoreError::NameTooLong)
        ));
        book.upsert(&"x".repeat(20), "F5").unwrap();
        assert_eq!(book.list().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = KeyValueStore::open(dir.path(), "t").unwrap();
        let mut book = ShortcutBook::load(&mut store);
        book.upsert("ping", "F5 05").unwrap();
        book.upsert("ping", "F5 06").unwrap();
        assert_eq!(book.list().len(), 1);
        assert_eq!(book.get("ping").unwrap().command, "F5 06");
    }

    #[test]
    fn test_malformed_value_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = KeyValueStore::open(dir.path(), "t").unwrap();
        store.set(BATCH_INTERVAL_KEY, &"not a number").unwrap();
        assert_eq!(store.get::<u64>(BATCH_INTERVAL_KEY), None);
        assert_eq!(store.get::<String>(BATCH_INTERVAL_KEY).as_deref(), Some("not a number"));
    }
}
