//! Key-value persistence for the watchlist id list, the holdings map and
//! per-holding display metadata.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StorageError;
use crate::models::portfolio::HoldingMeta;

/// Storage keys
pub mod keys {
    pub const WATCHLIST: &str = "crypto-portfolio-watchlist";
    pub const HOLDINGS: &str = "crypto-portfolio-holdings";
    pub const LAST_UPDATE: &str = "crypto-portfolio-last-update";
    pub const META: &str = "crypto-portfolio-meta";
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON object on disk; every write rewrites the file through a temp file + rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::info!("Opened key-value store at {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }
}

/// Typed view over a [`KeyValueStore`]. Failures are logged and treated as empty.
#[derive(Clone)]
pub struct PortfolioStorage {
    store: Arc<dyn KeyValueStore>,
}

impl PortfolioStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn save_watchlist(&self, ids: &[String]) {
        if let Err(e) = self.write_json(keys::WATCHLIST, &ids) {
            tracing::warn!("Failed to save watchlist: {}", e);
        }
    }

    pub fn watchlist(&self) -> Vec<String> {
        self.read_json(keys::WATCHLIST).unwrap_or_default()
    }

    pub fn save_holdings(&self, holdings: &BTreeMap<String, f64>) {
        if let Err(e) = self.write_json(keys::HOLDINGS, holdings) {
            tracing::warn!("Failed to save holdings: {}", e);
        }
    }

    pub fn holdings(&self) -> BTreeMap<String, f64> {
        self.read_json(keys::HOLDINGS).unwrap_or_default()
    }

    pub fn save_meta(&self, meta: &BTreeMap<String, HoldingMeta>) {
        if let Err(e) = self.write_json(keys::META, meta) {
            tracing::warn!("Failed to save holding metadata: {}", e);
        }
    }

    /// Colour and date added per held id; absent for data written before the key existed.
    pub fn meta(&self) -> BTreeMap<String, HoldingMeta> {
        self.read_json(keys::META).unwrap_or_default()
    }

    pub fn save_last_update(&self, at: DateTime<Utc>) {
        if let Err(e) = self.store.set(keys::LAST_UPDATE, at.to_rfc3339()) {
            tracing::warn!("Failed to save last update timestamp: {}", e);
        }
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        match self.store.get(keys::LAST_UPDATE) {
            Ok(Some(raw)) => DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load last update timestamp: {}", e);
                None
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.store.set(key, serde_json::to_string(value)?)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Discarding unreadable '{}': {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to load '{}': {}", key, e);
                None
            }
        }
    }
}
