//! Crawl coordinator - incremental crawl orchestration
//!
//! This module contains the main crawl loop that ties the collaborators
//! together:
//! - Seeding the frontier from the configured start pages
//! - Dispatching fetches up to the concurrency ceiling, each with a proxy
//! - Walking index pages down to leaves
//! - Paging leaves until they are exhausted or reach their watermark
//! - Passing detail pages through the dedup guard into the item sink
//!
//! Fetches run concurrently, but every fetched document is handled on the
//! coordinator's own task, one at a time, so the accumulator, the dedup set
//! and the leaf states are never mutated by two documents at once.

use crate::config::Config;
use crate::crawler::fetcher::{
    FetchOutcome, FetchRequest, FetchedDocument, Fetcher, HttpFetcher, RequestKind,
};
use crate::crawler::pager::{ListingPager, PageOutcome};
use crate::crawler::parser::{extract_item, extract_listing, ListingPage};
use crate::crawler::proxy::ProxyRotator;
use crate::crawler::scheduler::{ScheduledFetch, Scheduler};
use crate::crawler::walker::{CategoryWalker, Level, WalkStep};
use crate::output::RunStatistics;
use crate::state::{LeafStatus, RunState};
use crate::storage::{ItemSink, JsonWatermarkStore, SqliteItemSink};
use crate::HarvestError;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// How often (in handled documents) progress is logged
const PROGRESS_INTERVAL: u64 = 100;

/// How a run's main loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The frontier drained and no fetch is in flight
    Completed,

    /// The shutdown signal fired; in-flight fetches were discarded
    Interrupted,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    rotator: ProxyRotator,
    scheduler: Scheduler,
    walker: CategoryWalker,
    pager: ListingPager,
    sink: Box<dyn ItemSink>,
    stats: RunStatistics,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP fetch engine and the SQLite sink
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawl configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The HTTP clients or the item database failed to open
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(&config.fetch, &config.proxies)?;
        let sink = SqliteItemSink::new(Path::new(&config.output.items_path))?;
        Self::with_parts(config, Arc::new(fetcher), Box::new(sink))
    }

    /// Creates a coordinator around an arbitrary fetch engine and item sink
    pub fn with_parts(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        sink: Box<dyn ItemSink>,
    ) -> Result<Self, HarvestError> {
        let walker = CategoryWalker::new(&config.site)?;
        let pager = ListingPager::new(config.crawler.stop_policy, &config.site.item_url_base)?;
        let rotator = ProxyRotator::from_config(&config.proxies);
        let scheduler = Scheduler::new(config.crawler.max_concurrent_fetches);

        tracing::debug!(
            "Coordinator ready: {} proxies, {} concurrent fetches, {:?} stop policy",
            rotator.len(),
            config.crawler.max_concurrent_fetches,
            pager.policy()
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            rotator,
            scheduler,
            walker,
            pager,
            sink,
            stats: RunStatistics::new(),
        })
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Runs the crawl until the frontier drains or Ctrl-C is pressed
    pub async fn run(&mut self, state: &mut RunState) -> Result<RunEnd, HarvestError> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(state, ctrl_c).await
    }

    /// Runs the crawl until the frontier drains or `shutdown` resolves
    ///
    /// # Returns
    ///
    /// * `Ok(RunEnd)` - How the loop ended; the caller finishes `state` either way
    /// * `Err(HarvestError)` - A fatal traversal or item sink failure
    pub async fn run_until<F>(
        &mut self,
        state: &mut RunState,
        shutdown: F,
    ) -> Result<RunEnd, HarvestError>
    where
        F: Future<Output = ()>,
    {
        let seeds = self.walker.seed(&self.config.crawler.start_urls);
        tracing::info!("Starting crawl '{}' from {} start pages", state.name, seeds.len());
        self.scheduler.extend(seeds);

        let start_time = Instant::now();
        let mut in_flight: JoinSet<FetchOutcome> = JoinSet::new();
        let mut handled: u64 = 0;
        tokio::pin!(shutdown);

        loop {
            while let Some(ScheduledFetch { mut request, _permit }) = self.scheduler.try_next() {
                self.rotator.assign(&mut request);
                let fetcher = Arc::clone(&self.fetcher);
                in_flight.spawn(async move {
                    let _permit = _permit;
                    fetcher.fetch(request).await
                });
            }

            if in_flight.is_empty() {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }

            tokio::select! {
                joined = in_flight.join_next() => {
                    let Some(joined) = joined else { continue };
                    let outcome = joined
                        .map_err(|e| HarvestError::Traversal(format!("Fetch task failed: {}", e)))?;
                    self.handle(state, outcome)?;

                    handled += 1;
                    if handled % PROGRESS_INTERVAL == 0 {
                        self.stats.log_progress(
                            self.scheduler.frontier_size(),
                            in_flight.len(),
                            start_time.elapsed(),
                        );
                    }
                }
                _ = &mut shutdown => {
                    tracing::warn!(
                        "Shutdown requested, discarding {} in-flight and {} queued fetches",
                        in_flight.len(),
                        self.scheduler.frontier_size()
                    );
                    in_flight.abort_all();
                    return Ok(RunEnd::Interrupted);
                }
            }
        }

        tracing::info!(
            "Crawl loop finished: {} documents handled in {:?}",
            handled,
            start_time.elapsed()
        );
        Ok(RunEnd::Completed)
    }

    /// Handles one terminal fetch outcome
    fn handle(&mut self, state: &mut RunState, outcome: FetchOutcome) -> Result<(), HarvestError> {
        match outcome {
            FetchOutcome::Fetched(document) => match document.meta.kind {
                RequestKind::Index(level) => {
                    self.handle_index(state, level, &document);
                    Ok(())
                }
                RequestKind::Listing => self.handle_listing(state, &document),
                RequestKind::Detail => self.handle_detail(state, document),
            },
            FetchOutcome::Failed { request, reason } => {
                self.handle_failure(state, &request, &reason);
                Ok(())
            }
        }
    }

    fn handle_index(&mut self, state: &mut RunState, level: Level, document: &FetchedDocument) {
        self.stats.index_pages += 1;

        // The final URL catches redirects onto one of the page's own children
        match self.walker.step(level, &document.url, &document.body) {
            WalkStep::Descend(requests) => self.scheduler.extend(requests),
            WalkStep::Leaves(requests) => {
                for request in requests {
                    self.begin_leaf(state, request);
                }
            }
            WalkStep::AtLeaf(request) => self.begin_leaf(state, request),
        }
    }

    /// Schedules a leaf's first page unless the leaf is already paging
    fn begin_leaf(&mut self, state: &mut RunState, request: FetchRequest) {
        let Some(leaf_key) = request.meta.leaf_key.as_deref() else {
            return;
        };

        if state.begin_leaf(leaf_key) {
            tracing::debug!(
                "Discovered leaf {} (watermark: {:?})",
                leaf_key,
                state.previous.get(leaf_key)
            );
            self.stats.leaves_discovered += 1;
            self.scheduler.add(request);
        } else {
            tracing::trace!("Leaf {} already discovered", leaf_key);
        }
    }

    fn handle_listing(
        &mut self,
        state: &mut RunState,
        document: &FetchedDocument,
    ) -> Result<(), HarvestError> {
        let (Some(leaf_key), Some(page)) = (document.meta.leaf_key.as_deref(), document.meta.page)
        else {
            return Err(HarvestError::Traversal(format!(
                "Listing document {} carries no leaf key or page",
                document.request_url
            )));
        };

        let accepts = state
            .leaf(leaf_key)
            .map(|leaf| leaf.accepts_page(page))
            .ok_or_else(|| {
                HarvestError::Traversal(format!("Listing page for unknown leaf {}", leaf_key))
            })?;
        if !accepts {
            tracing::debug!("Discarding stale page {} of leaf {}", page, leaf_key);
            self.stats.stale_pages += 1;
            return Ok(());
        }

        let listing = extract_listing(&document.body).unwrap_or_else(|e| {
            tracing::warn!("Unrecognised listing page {}: {}", document.request_url, e);
            self.stats.extraction_failures += 1;
            ListingPage::default()
        });

        let watermark = state.previous.get(leaf_key);
        let decision = self.pager.process(
            &document.request_url,
            leaf_key,
            page,
            &listing,
            watermark,
            &mut state.accumulator,
        );

        self.stats.listing_pages += 1;
        self.stats.detail_requests += decision.detail_requests.len() as u64;

        let leaf = state
            .leaf_mut(leaf_key)
            .ok_or_else(|| HarvestError::Traversal(format!("Leaf {} vanished mid-page", leaf_key)))?;
        leaf.advance();
        leaf.details_emitted(decision.detail_requests.len() as u32);

        self.scheduler.extend(decision.detail_requests);

        match decision.outcome {
            PageOutcome::Continue(next) => self.scheduler.add(next),
            PageOutcome::StoppedByWatermark => {
                leaf.finish(LeafStatus::StoppedByWatermark);
                self.stats.leaves_stopped += 1;
            }
            PageOutcome::Empty | PageOutcome::LastPage => {
                tracing::debug!(
                    "Leaf {} exhausted after {} pages, {} items",
                    leaf_key,
                    leaf.pages_processed,
                    leaf.items_emitted
                );
                leaf.finish(LeafStatus::Exhausted);
                self.stats.leaves_exhausted += 1;
            }
        }

        Ok(())
    }

    fn handle_detail(
        &mut self,
        state: &mut RunState,
        document: FetchedDocument,
    ) -> Result<(), HarvestError> {
        if let Some(leaf_key) = document.meta.leaf_key.as_deref() {
            state.detail_answered(leaf_key);
        }

        let mut item = match extract_item(&document.body, &document.url) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Dropping item at {}: {}", document.url, e);
                self.stats.extraction_failures += 1;
                return Ok(());
            }
        };
        item.leaf_key = document.meta.leaf_key;

        if !state.seen.observe(&item.item_id) {
            tracing::debug!("Dropping duplicate item {} ({})", item.item_id, item.url);
            self.stats.duplicates_dropped += 1;
            return Ok(());
        }

        self.sink.store(&item)?;
        self.stats.items_stored += 1;
        Ok(())
    }

    fn handle_failure(&mut self, state: &mut RunState, request: &FetchRequest, reason: &str) {
        tracing::warn!("Fetch failed for {}: {}", request.url, reason);
        self.stats.fetch_failures += 1;

        if request.meta.kind == RequestKind::Detail {
            // The engine gave up; waiting longer will not harvest the item
            if let Some(leaf_key) = request.meta.leaf_key.as_deref() {
                state.detail_answered(leaf_key);
            }
            return;
        }
        if request.meta.kind != RequestKind::Listing {
            return;
        }
        let (Some(leaf_key), Some(page)) = (request.meta.leaf_key.as_deref(), request.meta.page)
        else {
            return;
        };
        if let Some(leaf) = state.leaf_mut(leaf_key) {
            if leaf.accepts_page(page) {
                tracing::warn!("Leaf {} abandoned at page {}", leaf_key, page);
                leaf.finish(LeafStatus::Failed);
            }
        }
    }
}

/// Runs a complete crawl and persists the watermark
///
/// This is the run driver of the lifecycle:
/// 1. Load the persisted watermark (or start cold when `fresh`)
/// 2. Run the coordinator until the frontier drains or Ctrl-C
/// 3. Merge this run's accumulator into the watermark file
///
/// A fatal error skips step 3, leaving the previous file untouched.
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `fresh` - Ignore the persisted watermark for stop decisions
///
/// # Returns
///
/// * `Ok(RunStatistics)` - The run completed or was interrupted and persisted
/// * `Err(HarvestError)` - The run failed
pub async fn run_crawl(config: Config, fresh: bool) -> Result<RunStatistics, HarvestError> {
    let store = JsonWatermarkStore::new(&config.output.watermark_dir);
    let name = config.crawler.name.clone();

    let mut state = if fresh {
        RunState::cold(&store, &name)
    } else {
        RunState::start(&store, &name)
    };

    let mut coordinator = Coordinator::new(config)?;
    let end = coordinator.run(&mut state).await?;
    if end == RunEnd::Interrupted {
        tracing::warn!("Run interrupted, persisting leaves that finished paging");
    }

    state.finish(&store)?;
    Ok(coordinator.stats.clone())
}
