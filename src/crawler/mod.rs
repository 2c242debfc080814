//! Crawler module for incremental harvesting
//!
//! This module contains the core crawling logic, including:
//! - Fetch requests, fetched documents and the HTTP fetch engine
//! - Extraction of child links, listing summaries and item records
//! - The category tree walker and the listing pager
//! - Proxy rotation and request scheduling
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod pager;
mod parser;
mod proxy;
mod scheduler;
mod walker;

pub use coordinator::{run_crawl, Coordinator, RunEnd};
pub use fetcher::{
    build_http_client, FetchOutcome, FetchRequest, FetchedDocument, Fetcher, HttpFetcher,
    RequestKind, RequestMeta,
};
pub use pager::{ListingPager, PageDecision, PageOutcome};
pub use parser::{
    extract_child_links, extract_initial_data, extract_item, extract_listing, parse_price,
    parse_timestamp, resolve_link, ExtractError, ItemRecord, ItemSummary, ListingPage,
    Pagination,
};
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use scheduler::{ScheduledFetch, Scheduler};
pub use walker::{
    cleared_children, leaf_request, CategoryNode, CategoryWalker, Level, WalkStep, Zone,
};
