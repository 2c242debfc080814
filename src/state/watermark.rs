use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-leaf timestamp boundaries persisted between runs
///
/// Maps a leaf key (canonical, query-stripped listing URL) to the Unix
/// timestamp of the newest listing captured for that leaf. Items at or below
/// the boundary (depending on the stop policy) were harvested by an earlier run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(BTreeMap<String, i64>);

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the boundary recorded for a leaf, if any
    pub fn get(&self, leaf_key: &str) -> Option<i64> {
        self.0.get(leaf_key).copied()
    }

    pub fn insert(&mut self, leaf_key: impl Into<String>, timestamp: i64) {
        self.0.insert(leaf_key.into(), timestamp);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Merges this run's progress into the previous map
    ///
    /// Entries in `accumulated` replace entries of `previous` with the same
    /// leaf key; leaves only present in `previous` are kept unchanged.
    pub fn merge(previous: &Watermark, accumulated: &Watermark) -> Watermark {
        let mut merged = previous.clone();
        for (leaf, timestamp) in accumulated.iter() {
            merged.insert(leaf, timestamp);
        }
        merged
    }
}

impl FromIterator<(String, i64)> for Watermark {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// In-run record of the newest listing accepted per leaf
///
/// Listings arrive newest-first, so the first accepted item of a leaf carries
/// its highest timestamp; later items never raise it. Timestamps of 0
/// (bumped listings without a recency signal) are never recorded.
#[derive(Debug, Clone, Default)]
pub struct WatermarkAccumulator {
    tops: HashMap<String, i64>,
}

impl WatermarkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the leaf's candidate boundary to `timestamp` if it is newer
    pub fn record(&mut self, leaf_key: &str, timestamp: i64) {
        if timestamp <= 0 {
            return;
        }
        self.tops
            .entry(leaf_key.to_string())
            .and_modify(|top| *top = (*top).max(timestamp))
            .or_insert(timestamp);
    }

    pub fn get(&self, leaf_key: &str) -> Option<i64> {
        self.tops.get(leaf_key).copied()
    }

    pub fn len(&self) -> usize {
        self.tops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tops.is_empty()
    }

    pub fn to_watermark(&self) -> Watermark {
        self.to_watermark_where(|_| true)
    }

    /// Entries for the leaves `keep` accepts
    pub fn to_watermark_where<F>(&self, keep: F) -> Watermark
    where
        F: Fn(&str) -> bool,
    {
        self.tops
            .iter()
            .filter(|(leaf, _)| keep(leaf.as_str()))
            .map(|(leaf, top)| (leaf.clone(), *top))
            .collect()
    }
}
