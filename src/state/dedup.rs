use std::collections::HashSet;

/// Suppresses items already accepted earlier in the same run
///
/// The same listing can be reachable from more than one leaf (for example a
/// listing tagged into two overlapping sub-locations). The guard only grows
/// and is never persisted; cross-run duplicates are the watermark's concern.
#[derive(Debug, Default)]
pub struct DedupGuard {
    seen: HashSet<String>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item_id`, returning true the first time it is seen this run
    pub fn observe(&mut self, item_id: &str) -> bool {
        if self.seen.contains(item_id) {
            return false;
        }
        self.seen.insert(item_id.to_string())
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.seen.contains(item_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
