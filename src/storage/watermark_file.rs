//! JSON file watermark store
//!
//! Each crawl name maps to `<dir>/<name>.json`, a flat object from leaf key to
//! Unix timestamp. Writes go to a sibling temp file that is renamed over the
//! target, so a crash mid-write never corrupts the previous run's file.

use crate::state::Watermark;
use crate::storage::traits::WatermarkStore;
use crate::WatermarkError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Watermark store backed by one JSON file per crawl name
#[derive(Debug, Clone)]
pub struct JsonWatermarkStore {
    dir: PathBuf,
}

impl JsonWatermarkStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the watermark file for a crawl name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl WatermarkStore for JsonWatermarkStore {
    fn load(&self, name: &str) -> Watermark {
        let path = self.path_for(name);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "No watermark file at {}, starting cold",
                    path.display()
                );
                return Watermark::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read watermark file {}: {}; starting cold",
                    path.display(),
                    e
                );
                return Watermark::new();
            }
        };

        match serde_json::from_str::<Watermark>(&content) {
            Ok(watermark) => {
                tracing::debug!(
                    "Loaded {} leaf watermarks from {}",
                    watermark.len(),
                    path.display()
                );
                watermark
            }
            Err(e) => {
                tracing::warn!(
                    "Corrupt watermark file {}: {}; starting cold",
                    path.display(),
                    e
                );
                Watermark::new()
            }
        }
    }

    fn save(&self, name: &str, watermark: &Watermark) -> Result<(), WatermarkError> {
        let path = self.path_for(name);
        let io_err = |source| WatermarkError::Io {
            path: path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;

        let json = serde_json::to_string_pretty(watermark)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(io_err)?;
        std::fs::rename(&tmp_path, &path).map_err(io_err)?;

        tracing::debug!(
            "Saved {} leaf watermarks to {}",
            watermark.len(),
            path.display()
        );
        Ok(())
    }
}
