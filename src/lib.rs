//! Tidemark: an incremental classifieds harvester
//!
//! This crate walks a classifieds site's category/location tree down to leaf
//! listing indexes, paginates each leaf until it reaches listings captured by a
//! previous run, and harvests the item detail pages it has not seen before.
//! Per-leaf timestamp watermarks are persisted between runs.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tidemark operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Watermark error: {0}")]
    Watermark(#[from] WatermarkError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Traversal error: {0}")]
    Traversal(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Errors persisting the watermark file
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Failed to write watermark file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to serialize watermarks: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for Tidemark operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{RunState, Watermark};
pub use url::{canonicalize, without_query, CanonicalUrl};
