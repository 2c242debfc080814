//! End-to-end tests for the crawl coordinator
//!
//! These tests run the coordinator against an in-memory site and check the
//! items stored, the requests issued and the watermark file written.

use crate::common::{
    create_test_config, four_level_site, listing_page, proxy, redirecting_site, url, FakeSite, T,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tidemark::config::Config;
use tidemark::crawler::{Coordinator, RequestKind, RunEnd};
use tidemark::output::RunStatistics;
use tidemark::state::{LeafStatus, RunState, Watermark};
use tidemark::storage::{ItemSink, JsonWatermarkStore, SqliteItemSink, WatermarkStore};

/// Runs the coordinator to completion against `site`
async fn run_to_completion(
    site: Arc<FakeSite>,
    config: Config,
    state: &mut RunState,
) -> RunStatistics {
    let sink = SqliteItemSink::new(Path::new(&config.output.items_path)).unwrap();
    let mut coordinator = Coordinator::with_parts(config, site, Box::new(sink)).unwrap();

    let end = coordinator
        .run_until(state, std::future::pending())
        .await
        .unwrap();
    assert_eq!(end, RunEnd::Completed);

    coordinator.stats().clone()
}

struct Harness {
    _dir: tempfile::TempDir,
    state_dir: String,
    items_path: String,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state").display().to_string();
        let items_path = dir.path().join("items.db").display().to_string();
        Self {
            _dir: dir,
            state_dir,
            items_path,
        }
    }

    fn config(&self, start_path: &str) -> Config {
        create_test_config(&url(start_path), &self.state_dir, &self.items_path)
    }

    fn store(&self) -> JsonWatermarkStore {
        JsonWatermarkStore::new(&self.state_dir)
    }

    fn items(&self) -> SqliteItemSink {
        SqliteItemSink::new(Path::new(&self.items_path)).unwrap()
    }
}

#[tokio::test]
async fn test_cold_start_harvests_every_item_once() {
    let harness = Harness::new();
    let store = harness.store();
    let site = Arc::new(FakeSite::new(four_level_site()));

    let mut state = RunState::start(&store, "x.com");
    assert!(state.previous.is_empty());

    let stats = run_to_completion(site.clone(), harness.config("/en/ads"), &mut state).await;

    assert_eq!(stats.index_pages, 5);
    assert_eq!(stats.leaves_discovered, 3);
    assert_eq!(stats.items_stored, 5);
    assert_eq!(stats.duplicates_dropped, 1);
    assert_eq!(stats.leaves_stopped, 0);
    assert_eq!(stats.leaves_exhausted, 3);
    assert_eq!(stats.fetch_failures, 0);

    let items = harness.items();
    assert_eq!(items.count().unwrap(), 5);
    for id in ["a1", "a2", "a3", "g1", "c1"] {
        assert!(items.get(id).unwrap().is_some(), "missing item {}", id);
    }
    let a3 = items.get("a3").unwrap().unwrap();
    assert_eq!(a3.leaf_key.as_deref(), Some(url("/en/ads/mirpur/phones").as_str()));
    assert_eq!(a3.price, 1000.0);

    // One entry per leaf, each the leaf's first-item timestamp
    let written = state.finish(&store).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), Some(T + 30));
    assert_eq!(written.get(&url("/en/ads/gulshan/phones")), Some(T + 25));
    assert_eq!(written.get(&url("/en/ads/ctg/phones")), Some(T + 5));
    assert_eq!(store.load("x.com"), written);
}

#[tokio::test]
async fn test_warm_run_stops_at_watermark() {
    let harness = Harness::new();
    let store = harness.store();

    let mut persisted = Watermark::new();
    persisted.insert(url("/en/ads/mirpur/phones"), T + 25);
    persisted.insert(url("/en/ads/retired/phones"), T - 1000);
    store.save("x.com", &persisted).unwrap();

    let site = Arc::new(FakeSite::new(four_level_site()));
    let mut state = RunState::start(&store, "x.com");
    let stats = run_to_completion(site.clone(), harness.config("/en/ads"), &mut state).await;

    assert_eq!(stats.leaves_stopped, 1);
    assert_eq!(
        state.leaf(&url("/en/ads/mirpur/phones")).unwrap().status,
        LeafStatus::StoppedByWatermark
    );

    // Page 2 of the stopped leaf is never requested
    let requested = site.requested_urls();
    assert!(!requested.contains(&url("/en/ads/mirpur/phones?page=2")));
    assert!(!requested.contains(&url("/en/ad/a3")));

    let items = harness.items();
    assert!(items.get("a1").unwrap().is_some());
    assert!(items.get("a3").unwrap().is_none());
    // a2 still arrives through gulshan, which has no watermark
    assert!(items.get("a2").unwrap().is_some());

    let written = state.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), Some(T + 30));
    assert_eq!(written.get(&url("/en/ads/retired/phones")), Some(T - 1000));
    assert_eq!(written.len(), 4);
}

#[tokio::test]
async fn test_second_run_fetches_nothing_new() {
    let harness = Harness::new();
    let store = harness.store();

    let first_site = Arc::new(FakeSite::new(four_level_site()));
    let mut first = RunState::start(&store, "x.com");
    run_to_completion(first_site, harness.config("/en/ads"), &mut first).await;
    first.finish(&store).unwrap();

    let second_site = Arc::new(FakeSite::new(four_level_site()));
    let mut second = RunState::start(&store, "x.com");
    let stats = run_to_completion(second_site.clone(), harness.config("/en/ads"), &mut second).await;

    // Every leaf's first item sits exactly on its watermark, which the
    // exclusive policy does not treat as covered; the second item is covered.
    let details: Vec<String> = second_site
        .requests()
        .into_iter()
        .filter(|r| r.meta.kind == RequestKind::Detail)
        .map(|r| r.url)
        .collect();
    assert!(details.contains(&url("/en/ad/a1")));
    assert!(!details.contains(&url("/en/ad/a3")));
    assert!(!details.contains(&url("/en/ad/g1")));
    assert_eq!(stats.leaves_stopped, 2);

    let written = second.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), Some(T + 30));
}

#[tokio::test]
async fn test_empty_leaf_emits_nothing() {
    let harness = Harness::new();
    let store = harness.store();
    let site = Arc::new(FakeSite::new(vec![(
        url("/en/ads/empty"),
        listing_page(&[], &[], Some((1, 25, 0))),
    )]));

    let mut state = RunState::start(&store, "x.com");
    let stats = run_to_completion(site.clone(), harness.config("/en/ads/empty"), &mut state).await;

    let requests = site.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].meta.kind, RequestKind::Listing);
    assert!(requests.iter().all(|r| r.meta.kind != RequestKind::Detail));

    assert_eq!(stats.detail_requests, 0);
    assert_eq!(
        state.leaf(&url("/en/ads/empty")).unwrap().status,
        LeafStatus::Exhausted
    );
    assert!(state.accumulator.is_empty());

    let written = state.finish(&store).unwrap();
    assert!(written.is_empty());
}

#[tokio::test]
async fn test_failed_detail_does_not_stop_siblings() {
    let harness = Harness::new();
    let store = harness.store();
    let mut pages = four_level_site();
    pages.retain(|(page_url, _)| page_url != &url("/en/ad/a1"));
    let site = Arc::new(FakeSite::new(pages));

    let mut state = RunState::start(&store, "x.com");
    let stats = run_to_completion(site, harness.config("/en/ads"), &mut state).await;

    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.items_stored, 4);

    // The leaf's watermark still advances to its first listing
    let written = state.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), Some(T + 30));
}

#[tokio::test]
async fn test_every_request_gets_next_proxy() {
    let harness = Harness::new();
    let store = harness.store();
    let site = Arc::new(FakeSite::new(four_level_site()));

    let mut config = harness.config("/en/ads");
    config.crawler.max_concurrent_fetches = 1;
    config.proxies = vec![
        proxy("http://10.0.0.1:8080"),
        proxy("http://10.0.0.2:8080"),
        proxy("http://10.0.0.3:8080"),
    ];
    let addresses: Vec<String> = config.proxies.iter().map(|p| p.address.clone()).collect();

    let mut state = RunState::start(&store, "x.com");
    run_to_completion(site.clone(), config, &mut state).await;

    let requests = site.requests();
    assert!(requests.len() > addresses.len());
    for (i, request) in requests.iter().enumerate() {
        let assigned = request.meta.proxy.as_ref().map(|p| p.address.clone());
        assert_eq!(assigned.as_ref(), Some(&addresses[i % addresses.len()]));
    }
}

#[tokio::test]
async fn test_inclusive_policy_stops_on_equal_timestamp() {
    let harness = Harness::new();
    let store = harness.store();

    let mut persisted = Watermark::new();
    persisted.insert(url("/en/ads/mirpur/phones"), T + 30);
    store.save("x.com", &persisted).unwrap();

    let mut config = harness.config("/en/ads");
    config.crawler.stop_policy = tidemark::config::StopPolicy::Inclusive;

    let site = Arc::new(FakeSite::new(four_level_site()));
    let mut state = RunState::start(&store, "x.com");
    run_to_completion(site.clone(), config, &mut state).await;

    // a1 is only listed in mirpur, at exactly the persisted timestamp
    assert!(!site.requested_urls().contains(&url("/en/ad/a1")));
    assert_eq!(
        state.leaf(&url("/en/ads/mirpur/phones")).unwrap().items_emitted,
        0
    );
}

#[tokio::test]
async fn test_interrupted_leaf_keeps_previous_boundary() {
    let harness = Harness::new();
    let store = harness.store();
    let site = Arc::new(
        FakeSite::new(four_level_site()).hanging_on(url("/en/ads/mirpur/phones?page=2")),
    );

    let config = harness.config("/en/ads");
    let sink = SqliteItemSink::new(Path::new(&config.output.items_path)).unwrap();
    let mut coordinator = Coordinator::with_parts(config, site.clone(), Box::new(sink)).unwrap();

    let mut state = RunState::start(&store, "x.com");
    let end = coordinator
        .run_until(&mut state, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();
    assert_eq!(end, RunEnd::Interrupted);
    assert!(site
        .requested_urls()
        .contains(&url("/en/ads/mirpur/phones?page=2")));
    assert_eq!(
        state.leaf(&url("/en/ads/mirpur/phones")).unwrap().status,
        LeafStatus::Paging
    );

    // Leaves that finished paging advance; the interrupted one does not
    let written = state.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), None);
    assert_eq!(written.get(&url("/en/ads/gulshan/phones")), Some(T + 25));
    assert_eq!(written.get(&url("/en/ads/ctg/phones")), Some(T + 5));
    assert!(harness.items().get("a3").unwrap().is_none());

    // The next run pages the interrupted leaf again and reaches a3
    let site = Arc::new(FakeSite::new(four_level_site()));
    let mut resumed = RunState::start(&store, "x.com");
    run_to_completion(site, harness.config("/en/ads"), &mut resumed).await;

    assert!(harness.items().get("a3").unwrap().is_some());
    let written = resumed.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/mirpur/phones")), Some(T + 30));
}

#[tokio::test]
async fn test_index_redirect_prunes_against_final_url() {
    let harness = Harness::new();
    let store = harness.store();
    let site = Arc::new(redirecting_site());

    let mut state = RunState::start(&store, "x.com");
    let stats = run_to_completion(site.clone(), harness.config("/en/ads"), &mut state).await;

    // The redirect target lists itself among its children; it is not walked again
    let requested = site.requested_urls();
    assert!(!requested.contains(&url("/en/ads/mobiles/phones")));
    assert_eq!(
        requested,
        vec![
            url("/en/ads"),
            url("/en/ads/mobiles"),
            url("/en/ads/mobiles/tablets"),
            url("/en/ads/tablets"),
            url("/en/ad/t1"),
        ]
    );
    assert_eq!(stats.index_pages, 3);
    assert_eq!(stats.leaves_discovered, 1);

    // The leaf is keyed by where the redirect landed
    assert!(state.leaf(&url("/en/ads/tablets")).is_some());
    assert!(state.leaf(&url("/en/ads/mobiles/tablets")).is_none());

    let written = state.finish(&store).unwrap();
    assert_eq!(written.get(&url("/en/ads/tablets")), Some(T + 1));
    assert_eq!(written.len(), 1);
}
