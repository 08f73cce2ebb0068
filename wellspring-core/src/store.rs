//! Persistence surface for aquifer records.
//!
//! The subsystem only ever talks to [`AquiferStore`]. Engines attach records
//! to their chunk data however they like; [`MemoryStore`] keeps encoded blobs
//! in a map and is what tests and the demo world use.

use rustc_hash::FxHashMap;
use wellspring_utils::CellKey;
use wellspring_utils::locks::SyncRwLock;

use crate::rating::{AquiferRecord, RecordState};

/// Keyed storage for one [`AquiferRecord`] per cell.
///
/// Implementations must write each record as a whole: a concurrent `get`
/// never observes half of a `put`.
pub trait AquiferStore: Send + Sync {
    /// Returns the stored record, if any.
    fn get(&self, key: CellKey) -> Option<AquiferRecord>;
    /// Replaces the stored record.
    fn put(&self, key: CellKey, record: AquiferRecord);
    /// Deletes the stored record.
    fn remove(&self, key: CellKey);
    /// Deletes every stored record.
    fn clear(&self);
    /// Number of stored records.
    fn len(&self) -> usize;
    /// Whether nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory blob store.
///
/// Records are kept in their encoded form and pass through the schema gate on
/// every read, exactly like records loaded from a save file would.
#[derive(Default)]
pub struct MemoryStore {
    blobs: SyncRwLock<FxHashMap<CellKey, Box<[u8]>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an already encoded blob, e.g. one read back from disk.
    pub fn insert_blob(&self, key: CellKey, blob: impl Into<Box<[u8]>>) {
        self.blobs.write().insert(key, blob.into());
    }

    /// Returns a copy of the encoded blob for `key`.
    #[must_use]
    pub fn blob(&self, key: CellKey) -> Option<Box<[u8]>> {
        self.blobs.read().get(&key).cloned()
    }
}

impl AquiferStore for MemoryStore {
    fn get(&self, key: CellKey) -> Option<AquiferRecord> {
        let blobs = self.blobs.read();
        let blob = blobs.get(&key)?;
        match AquiferRecord::decode(blob) {
            Ok(RecordState::Current(record)) => Some(record),
            Ok(RecordState::Stale { version }) => {
                log::debug!("Discarding aquifer record for {key} with stale schema {version}");
                None
            }
            Err(err) => {
                log::warn!("Discarding unreadable aquifer record for {key}: {err}");
                None
            }
        }
    }

    fn put(&self, key: CellKey, record: AquiferRecord) {
        match record.encode() {
            Ok(blob) => {
                self.blobs.write().insert(key, blob.into_boxed_slice());
            }
            Err(err) => log::error!("Failed to encode aquifer record for {key}: {err}"),
        }
    }

    fn remove(&self, key: CellKey) {
        self.blobs.write().remove(&key);
    }

    fn clear(&self) {
        self.blobs.write().clear();
    }

    fn len(&self) -> usize {
        self.blobs.read().len()
    }
}
