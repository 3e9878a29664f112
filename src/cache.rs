use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::sync::Mutex;

/// Local key-value store for display caches.
///
/// Values are JSON, kept in memory and written through to a single file on
/// every change. A store created with [`LocalStore::ephemeral`] never touches
/// disk. Nothing here is authoritative: a missing or corrupt file just means
/// an empty cache.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<Utf8PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Open (or start) the store backed by `path`
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cache file: {}", path))?;
            match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache file {}: {}", path, e);
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!("Opened cache {} with {} key(s)", path, entries.len());
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn ephemeral() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Map::new()),
        }
    }

    /// Decode the value under `key`. Absent or mistyped values read as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        let value = entries.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize cache entry: {}", key))?;

        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory: {}", parent))?;
        }

        let json = serde_json::to_string_pretty(entries).context("Failed to serialize cache")?;
        fs::write(path, json).with_context(|| format!("Failed to write cache file: {}", path))?;
        Ok(())
    }
}
