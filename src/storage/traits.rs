//! Storage traits and error types
//!
//! This module defines the trait interfaces for the watermark store and the
//! item sink, and the error type for item storage.

use crate::crawler::ItemRecord;
use crate::state::Watermark;
use crate::WatermarkError;
use thiserror::Error;

/// Errors that can occur while storing harvested items
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the per-leaf watermark, one map per crawl name
///
/// The store is a single-writer resource: it is read once when a run starts
/// and written once when the run finishes.
pub trait WatermarkStore {
    /// Loads the watermark persisted for `name`
    ///
    /// A missing or unreadable file is the expected cold-start state and
    /// yields an empty map; the condition is logged, never returned.
    fn load(&self, name: &str) -> Watermark;

    /// Replaces the persisted watermark for `name`
    fn save(&self, name: &str, watermark: &Watermark) -> Result<(), WatermarkError>;

    /// Merges `accumulated` over `previous` and persists the result
    ///
    /// Accumulated entries win per leaf key; leaves only present in
    /// `previous` are retained. Returns the map that was written.
    fn merge_and_save(
        &self,
        name: &str,
        previous: &Watermark,
        accumulated: &Watermark,
    ) -> Result<Watermark, WatermarkError> {
        let merged = Watermark::merge(previous, accumulated);
        self.save(name, &merged)?;
        Ok(merged)
    }
}

/// Destination for harvested items that passed the dedup guard
pub trait ItemSink: Send {
    /// Stores one item, replacing any earlier record with the same id
    fn store(&mut self, item: &ItemRecord) -> StorageResult<()>;

    /// Counts the items currently stored
    fn count(&self) -> StorageResult<u64>;
}
