//! Listing pager
//!
//! Processes one page of a leaf's listing index at a time: emits detail
//! requests for items newer than the leaf's persisted watermark, records the
//! leaf's newest item in the run accumulator, and decides whether the leaf
//! continues to its next page.

use crate::config::StopPolicy;
use crate::crawler::fetcher::FetchRequest;
use crate::crawler::parser::ListingPage;
use crate::state::WatermarkAccumulator;
use crate::url::with_page;
use crate::ConfigError;
use url::Url;

/// What happens to a leaf after one of its pages was processed
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Request for the next page of the same leaf
    Continue(FetchRequest),

    /// An item already covered by the persisted watermark was reached
    StoppedByWatermark,

    /// The page held no items
    Empty,

    /// The pagination descriptor says this was the last page
    LastPage,
}

/// Result of processing a single listing page
#[derive(Debug, Clone, PartialEq)]
pub struct PageDecision {
    /// Detail requests for accepted items, in document order
    pub detail_requests: Vec<FetchRequest>,

    pub outcome: PageOutcome,
}

/// Stateless per-page pagination logic
#[derive(Debug, Clone)]
pub struct ListingPager {
    policy: StopPolicy,
    item_url_base: Url,
}

impl ListingPager {
    /// Creates a pager resolving item slugs against `item_url_base`
    pub fn new(policy: StopPolicy, item_url_base: &str) -> Result<Self, ConfigError> {
        let item_url_base = Url::parse(item_url_base)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", item_url_base, e)))?;
        Ok(Self {
            policy,
            item_url_base,
        })
    }

    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Detail page URL of an item slug
    pub fn item_url(&self, slug: &str) -> Option<String> {
        self.item_url_base
            .join(slug.trim_start_matches('/'))
            .ok()
            .map(|url| url.to_string())
    }

    /// Processes one listing page of a leaf
    ///
    /// # Arguments
    ///
    /// * `page_url` - URL the page was requested with
    /// * `leaf_key` - The leaf the page belongs to
    /// * `page` - Page number of this page
    /// * `listing` - Extracted summaries and pagination descriptor
    /// * `watermark` - The leaf's boundary from the previous run, if any
    /// * `accumulator` - This run's accumulator, updated for accepted items
    ///
    /// # Stop Rule
    ///
    /// Items are taken in document order (newest first). The first item the
    /// persisted watermark covers stops the leaf: neither it nor any later
    /// item is emitted, and no further page is requested. Items emitted
    /// before it on the same page stand. Items with timestamp 0 are never
    /// covered.
    pub fn process(
        &self,
        page_url: &str,
        leaf_key: &str,
        page: u32,
        listing: &ListingPage,
        watermark: Option<i64>,
        accumulator: &mut WatermarkAccumulator,
    ) -> PageDecision {
        let mut detail_requests = Vec::with_capacity(listing.items.len());

        if listing.items.is_empty() {
            tracing::debug!("Empty listing page {} of leaf {}", page, leaf_key);
            return PageDecision {
                detail_requests,
                outcome: PageOutcome::Empty,
            };
        }

        for summary in &listing.items {
            let timestamp = summary.timestamp();

            if let Some(boundary) = watermark {
                if timestamp > 0 && self.policy.is_covered(boundary, timestamp) {
                    tracing::info!(
                        "Leaf {} reached watermark {} at item {} ({}) on page {}",
                        leaf_key,
                        boundary,
                        summary.item_id,
                        timestamp,
                        page
                    );
                    return PageDecision {
                        detail_requests,
                        outcome: PageOutcome::StoppedByWatermark,
                    };
                }
            }

            accumulator.record(leaf_key, timestamp);

            match self.item_url(&summary.slug) {
                Some(url) => {
                    detail_requests.push(FetchRequest::detail(url, Some(leaf_key.to_string())))
                }
                None => tracing::warn!("Unusable slug '{}' in leaf {}", summary.slug, leaf_key),
            }
        }

        let has_next = match listing.pagination {
            Some(pagination) => pagination.has_next(),
            None => true,
        };

        let outcome = if has_next {
            PageOutcome::Continue(FetchRequest::listing(
                with_page(page_url, page + 1),
                leaf_key,
                page + 1,
            ))
        } else {
            PageOutcome::LastPage
        };

        PageDecision {
            detail_requests,
            outcome,
        }
    }
}
