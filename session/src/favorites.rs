//! Favorite positions, persisted as one JSON blob under a fixed key.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chess::Position;
use serde::{Deserialize, Serialize};

/// Storage key for the favorites blob.
pub const FAVORITES_KEY: &str = "chess-analyzer-favorites";

/// Errors from favorites storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage rejected write: {0}")]
    Rejected(String),
}

/// A saved position. Unique by `(position, source_label)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub position: Position,
    pub source_label: String,
    /// Unix milliseconds.
    pub saved_at: u64,
}

impl Favorite {
    fn matches(&self, position: &Position, source_label: &str) -> bool {
        &self.position == position && self.source_label == source_label
    }
}

/// Flat key-value storage for serialized blobs.
pub trait BlobStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&mut self, key: &str, blob: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory.
pub struct FileBlobStorage {
    dir: PathBuf,
}

impl FileBlobStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStorage for FileBlobStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.file_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    fn write(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.file_path(key), blob)?;
        Ok(())
    }
}

/// In-memory storage that can be told to refuse writes.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryBlobStorage {
    pub blobs: std::collections::HashMap<String, String>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl BlobStorage for MemoryBlobStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Rejected("quota exceeded".to_string()));
        }
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/// Ordered favorites backed by a [`BlobStorage`].
///
/// Every mutation writes the whole collection. The in-memory list only changes
/// after the write succeeds.
pub struct FavoritesStore {
    storage: Box<dyn BlobStorage + Send>,
    favorites: Vec<Favorite>,
}

impl FavoritesStore {
    /// Load favorites from `storage`. A missing blob is an empty store; a
    /// corrupt one is logged and treated as empty.
    pub fn open(storage: Box<dyn BlobStorage + Send>) -> Result<Self, StorageError> {
        let favorites = match storage.read(FAVORITES_KEY)? {
            Some(blob) => match serde_json::from_str::<Vec<Favorite>>(&blob) {
                Ok(favorites) => favorites,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable favorites blob: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        tracing::debug!("Loaded {} favorites", favorites.len());
        Ok(Self { storage, favorites })
    }

    /// Convenience for the file-backed store.
    pub fn open_dir(dir: PathBuf) -> Result<Self, StorageError> {
        Self::open(Box::new(FileBlobStorage::new(dir)))
    }

    pub fn get_all(&self) -> &[Favorite] {
        &self.favorites
    }

    /// Returns `false` when the `(position, label)` pair is already saved.
    pub fn add(&mut self, position: &Position, source_label: &str) -> Result<bool, StorageError> {
        if self.is_favorite(position, source_label) {
            return Ok(false);
        }
        let mut updated = self.favorites.clone();
        updated.push(Favorite {
            position: position.clone(),
            source_label: source_label.to_string(),
            saved_at: now_millis(),
        });
        self.commit(updated)?;
        tracing::info!("Saved favorite {} ({})", position, source_label);
        Ok(true)
    }

    /// Remove the matching favorite. Returns whether anything was removed.
    pub fn remove(&mut self, position: &Position, source_label: &str) -> Result<bool, StorageError> {
        let updated: Vec<Favorite> = self
            .favorites
            .iter()
            .filter(|f| !f.matches(position, source_label))
            .cloned()
            .collect();
        if updated.len() == self.favorites.len() {
            return Ok(false);
        }
        self.commit(updated)?;
        tracing::info!("Removed favorite {} ({})", position, source_label);
        Ok(true)
    }

    pub fn is_favorite(&self, position: &Position, source_label: &str) -> bool {
        self.favorites
            .iter()
            .any(|f| f.matches(position, source_label))
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    fn commit(&mut self, updated: Vec<Favorite>) -> Result<(), StorageError> {
        let blob = serde_json::to_string_pretty(&updated)?;
        self.storage.write(FAVORITES_KEY, &blob).map_err(|e| {
            tracing::error!("Failed to persist favorites: {}", e);
            e
        })?;
        self.favorites = updated;
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
