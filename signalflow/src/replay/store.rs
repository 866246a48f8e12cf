//! Read-only signal stores.
//!
//! The trait exposes lookups only. Seeding an in-memory store happens through
//! its inherent `insert`, which the replay comparator never sees.

use super::StoredSnapshot;
use crate::errors::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read contract of the persistence collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Finds one stored snapshot by signal id.
    ///
    /// Returns `Ok(None)` when the signal was never stored.
    async fn find_one(&self, signal_id: &str) -> Result<Option<StoredSnapshot>, StoreError>;
}

/// A concurrent in-memory store.
#[derive(Debug, Default)]
pub struct InMemorySignalStore {
    snapshots: DashMap<String, StoredSnapshot>,
}

impl InMemorySignalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a snapshot, replacing any with the same signal id.
    pub fn insert(&self, snapshot: StoredSnapshot) {
        self.snapshots.insert(snapshot.signal_id.clone(), snapshot);
    }

    /// Returns the number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl FromIterator<StoredSnapshot> for InMemorySignalStore {
    fn from_iter<I: IntoIterator<Item = StoredSnapshot>>(iter: I) -> Self {
        let store = Self::new();
        for snapshot in iter {
            store.insert(snapshot);
        }
        store
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn find_one(&self, signal_id: &str) -> Result<Option<StoredSnapshot>, StoreError> {
        Ok(self.snapshots.get(signal_id).map(|entry| entry.value().clone()))
    }
}

/// A store loaded from JSON on disk.
///
/// `path` may be a directory of `<signalId>.json` files or a single file
/// holding a JSON array of snapshots. Files are read once at open time and
/// never written.
#[derive(Debug)]
pub struct JsonFileSignalStore {
    path: PathBuf,
    snapshots: HashMap<String, StoredSnapshot>,
}

impl JsonFileSignalStore {
    /// Opens the store read-only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if `path` does not exist or cannot
    /// be read, and `StoreError::Malformed` if a file is not a valid
    /// snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let meta = fs::metadata(&path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;

        let snapshots: Vec<StoredSnapshot> = if meta.is_dir() {
            Self::load_dir(&path)?
        } else {
            let text = read(&path)?;
            serde_json::from_str(&text)
                .map_err(|e| StoreError::Malformed(format!("{}: {e}", path.display())))?
        };

        debug!(path = %path.display(), snapshots = snapshots.len(), "Opened signal store");
        Ok(Self {
            path,
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.signal_id.clone(), s))
                .collect(),
        })
    }

    fn load_dir(dir: &Path) -> Result<Vec<StoredSnapshot>, StoreError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", dir.display())))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut snapshots = Vec::with_capacity(files.len());
        for file in files {
            let text = read(&file)?;
            let snapshot: StoredSnapshot = serde_json::from_str(&text)
                .map_err(|e| StoreError::Malformed(format!("{}: {e}", file.display())))?;
            if file.file_stem().and_then(|s| s.to_str()) != Some(snapshot.signal_id.as_str()) {
                warn!(
                    file = %file.display(),
                    signal_id = %snapshot.signal_id,
                    "Snapshot file name does not match its signal id"
                );
            }
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    /// Returns the path the store was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of loaded snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns true if no snapshots were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

fn read(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))
}

#[async_trait]
impl SignalStore for JsonFileSignalStore {
    async fn find_one(&self, signal_id: &str) -> Result<Option<StoredSnapshot>, StoreError> {
        Ok(self.snapshots.get(signal_id).cloned())
    }
}
