use crate::state::{DedupGuard, LeafState, Watermark, WatermarkAccumulator};
use crate::storage::WatermarkStore;
use crate::WatermarkError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Mutable state owned by one crawl run
///
/// Created by [`RunState::start`] from the persisted watermark and consumed by
/// [`RunState::finish`], which merges this run's progress back into storage.
/// Nothing here is written to disk before `finish`, so an interrupted run
/// leaves the previous watermark file untouched.
#[derive(Debug)]
pub struct RunState {
    /// Crawl identity the watermark is stored under
    pub name: String,

    /// Boundaries consulted for the pagination stop
    pub previous: Watermark,

    /// Map this run's progress is merged over at finish
    pub baseline: Watermark,

    /// Newest accepted listing per leaf in this run
    pub accumulator: WatermarkAccumulator,

    /// Items accepted so far in this run
    pub seen: DedupGuard,

    /// Pagination progress per leaf key
    pub leaves: HashMap<String, LeafState>,

    pub started_at: DateTime<Utc>,
}

impl RunState {
    /// Loads the persisted watermark for `name` and starts a new run
    pub fn start(store: &dyn WatermarkStore, name: &str) -> Self {
        let previous = store.load(name);
        tracing::info!(
            "Starting run '{}' with {} persisted leaf watermarks",
            name,
            previous.len()
        );
        Self::with_watermark(name, previous)
    }

    /// Starts a run that pages every leaf to its end
    ///
    /// The persisted watermark is not consulted for stop decisions but is
    /// still the baseline at finish, so leaves this run does not reach keep
    /// their boundaries.
    pub fn cold(store: &dyn WatermarkStore, name: &str) -> Self {
        let baseline = store.load(name);
        tracing::info!(
            "Starting run '{}' cold, ignoring {} persisted leaf watermarks",
            name,
            baseline.len()
        );
        let mut state = Self::with_watermark(name, Watermark::new());
        state.baseline = baseline;
        state
    }

    pub fn with_watermark(name: &str, previous: Watermark) -> Self {
        Self {
            name: name.to_string(),
            baseline: previous.clone(),
            previous,
            accumulator: WatermarkAccumulator::new(),
            seen: DedupGuard::new(),
            leaves: HashMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Registers a leaf for paging, returning false if it was already started
    pub fn begin_leaf(&mut self, leaf_key: &str) -> bool {
        if self.leaves.contains_key(leaf_key) {
            return false;
        }
        self.leaves.insert(leaf_key.to_string(), LeafState::new());
        true
    }

    pub fn leaf(&self, leaf_key: &str) -> Option<&LeafState> {
        self.leaves.get(leaf_key)
    }

    pub fn leaf_mut(&mut self, leaf_key: &str) -> Option<&mut LeafState> {
        self.leaves.get_mut(leaf_key)
    }

    /// Records that a detail request emitted for `leaf_key` was answered
    pub fn detail_answered(&mut self, leaf_key: &str) {
        if let Some(leaf) = self.leaves.get_mut(leaf_key) {
            leaf.detail_answered();
        }
    }

    /// Merges this run's accumulator into the persisted watermark
    ///
    /// Only settled leaves advance. A leaf still paging, abandoned after a
    /// failed page, or waiting on detail fetches keeps its previous boundary,
    /// since the listings below its new top were never all harvested.
    ///
    /// Returns the map that was written.
    pub fn finish(self, store: &dyn WatermarkStore) -> Result<Watermark, WatermarkError> {
        let accumulated = self.accumulator.to_watermark_where(|leaf| {
            self.leaves
                .get(leaf)
                .map(|state| state.is_settled())
                .unwrap_or(false)
        });
        let held_back = self.accumulator.len() - accumulated.len();
        if held_back > 0 {
            tracing::warn!(
                "{} leaves did not finish paging, keeping their previous watermarks",
                held_back
            );
        }

        let merged = store.merge_and_save(&self.name, &self.baseline, &accumulated)?;
        let elapsed = Utc::now() - self.started_at;
        tracing::info!(
            "Run '{}' finished after {}s: {} leaves advanced, {} watermarks persisted",
            self.name,
            elapsed.num_seconds(),
            accumulated.len(),
            merged.len()
        );
        Ok(merged)
    }
}
