//! Run statistics
//!
//! Counters collected by the coordinator while a crawl runs, logged
//! periodically and printed as a summary when the run ends.

use std::time::Duration;

/// Counters for a single crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Category/location index pages walked
    pub index_pages: u64,

    /// Distinct leaves that started paging
    pub leaves_discovered: u64,

    /// Listing pages processed (stale pages excluded)
    pub listing_pages: u64,

    /// Leaves stopped by the persisted watermark
    pub leaves_stopped: u64,

    /// Leaves that ran out of pages
    pub leaves_exhausted: u64,

    /// Detail requests emitted by the pager
    pub detail_requests: u64,

    /// Items accepted and written to the item sink
    pub items_stored: u64,

    /// Items dropped as in-run duplicates
    pub duplicates_dropped: u64,

    /// Documents that failed structural or mandatory-field extraction
    pub extraction_failures: u64,

    /// Requests the fetch engine gave up on
    pub fetch_failures: u64,

    /// Listing pages discarded because their leaf had moved on
    pub stale_pages: u64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents handled so far, successful or not
    pub fn documents_handled(&self) -> u64 {
        self.index_pages
            + self.listing_pages
            + self.stale_pages
            + self.items_stored
            + self.duplicates_dropped
            + self.extraction_failures
            + self.fetch_failures
    }

    /// Logs a one-line progress report
    pub fn log_progress(&self, frontier: usize, in_flight: usize, elapsed: Duration) {
        let rate = self.documents_handled() as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "Progress: {} leaves, {} listing pages, {} items stored, {} queued, {} in flight, {:.2} docs/sec",
            self.leaves_discovered,
            self.listing_pages,
            self.items_stored,
            frontier,
            in_flight,
            rate
        );
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `elapsed` - Wall-clock duration of the run
pub fn print_statistics(stats: &RunStatistics, elapsed: Duration) {
    println!("=== Run Statistics ===\n");

    println!("Traversal:");
    println!("  Index pages walked: {}", stats.index_pages);
    println!("  Leaves discovered: {}", stats.leaves_discovered);
    println!("  Listing pages processed: {}", stats.listing_pages);
    println!("  Stale pages discarded: {}", stats.stale_pages);
    println!();

    println!("Leaves:");
    println!("  Stopped by watermark: {}", stats.leaves_stopped);
    println!("  Exhausted: {}", stats.leaves_exhausted);
    println!();

    println!("Items:");
    println!("  Detail requests: {}", stats.detail_requests);
    println!("  Stored: {}", stats.items_stored);
    println!("  Duplicates dropped: {}", stats.duplicates_dropped);
    println!();

    if stats.extraction_failures > 0 || stats.fetch_failures > 0 {
        println!("Errors:");
        println!("  Extraction failures: {}", stats.extraction_failures);
        println!("  Fetch failures: {}", stats.fetch_failures);
        println!();
    }

    let success_rate = if stats.detail_requests > 0 {
        (stats.items_stored as f64 / stats.detail_requests as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Harvest Rate: {:.1}% ({} / {} detail pages stored) in {}s",
        success_rate,
        stats.items_stored,
        stats.detail_requests,
        elapsed.as_secs()
    );
}
