//! Storage module for persisting crawl data
//!
//! This module handles everything that outlives a run:
//! - The per-crawl watermark file (read at start, written once at finish)
//! - The SQLite database of harvested items

mod items;
mod schema;
mod traits;
mod watermark_file;

pub use items::SqliteItemSink;
pub use traits::{ItemSink, StorageError, StorageResult, WatermarkStore};
pub use watermark_file::JsonWatermarkStore;
