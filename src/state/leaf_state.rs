//! Leaf pagination state definitions
//!
//! A leaf is paged strictly in order: the next page is requested only after
//! the current page's stop check has run, and pages that arrive for a leaf
//! that has already stopped are discarded.

use std::fmt;

/// Where a leaf's pagination currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafStatus {
    // ===== Active States =====
    /// Pages are still being requested for this leaf
    Paging,

    // ===== Terminal States =====
    /// A listing already covered by the previous run's watermark was reached
    StoppedByWatermark,

    /// The leaf ran out of pages (empty page or last page reached)
    Exhausted,

    /// A page of this leaf could not be fetched
    Failed,
}

impl LeafStatus {
    /// Returns true if no further pages will be requested
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Paging)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paging => "paging",
            Self::StoppedByWatermark => "stopped_by_watermark",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LeafStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pagination progress of a single leaf
#[derive(Debug, Clone)]
pub struct LeafState {
    pub status: LeafStatus,

    /// Page number whose document is expected next
    pub expected_page: u32,

    /// Number of listing pages processed so far
    pub pages_processed: u32,

    /// Number of detail requests emitted for this leaf
    pub items_emitted: u32,

    /// Detail requests emitted but not yet answered
    pub pending_details: u32,
}

impl LeafState {
    pub fn new() -> Self {
        Self {
            status: LeafStatus::Paging,
            expected_page: 1,
            pages_processed: 0,
            items_emitted: 0,
            pending_details: 0,
        }
    }

    /// Returns true if a document for `page` should be processed now
    ///
    /// Documents for a stopped leaf, or for any page other than the one the
    /// leaf is waiting on, are stale.
    pub fn accepts_page(&self, page: u32) -> bool {
        self.status == LeafStatus::Paging && page == self.expected_page
    }

    /// Marks the expected page as processed and waits for the next one
    pub fn advance(&mut self) {
        self.pages_processed += 1;
        self.expected_page += 1;
    }

    /// Counts `count` detail requests emitted for the current page
    pub fn details_emitted(&mut self, count: u32) {
        self.items_emitted += count;
        self.pending_details += count;
    }

    /// Records that one of the leaf's detail requests was answered
    pub fn detail_answered(&mut self) {
        self.pending_details = self.pending_details.saturating_sub(1);
    }

    /// Returns true if the leaf's boundary was actually reached
    ///
    /// Only a leaf that stopped or ran out of pages, with every detail
    /// request answered, may advance its persisted watermark.
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            LeafStatus::StoppedByWatermark | LeafStatus::Exhausted
        ) && self.pending_details == 0
    }

    /// Moves the leaf into a terminal status
    pub fn finish(&mut self, status: LeafStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
    }
}

impl Default for LeafState {
    fn default() -> Self {
        Self::new()
    }
}
