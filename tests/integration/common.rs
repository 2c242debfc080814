//! Shared fixtures for the integration tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tidemark::config::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, ProxyEntry, SiteConfig, StopPolicy,
};
use tidemark::crawler::{FetchOutcome, FetchRequest, FetchedDocument, Fetcher};

pub const BASE: &str = "https://x.com";

/// Reference timestamp for listing fixtures
pub const T: i64 = 1_700_000_000;

/// Creates a test configuration rooted at `start_url`
pub fn create_test_config(start_url: &str, state_dir: &str, items_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            name: "x.com".to_string(),
            start_urls: vec![start_url.to_string()],
            max_concurrent_fetches: 4,
            stop_policy: StopPolicy::Exclusive,
        },
        fetch: FetchConfig::default(),
        site: SiteConfig {
            base_url: BASE.to_string(),
            item_url_base: format!("{}/en/ad/", BASE),
            category_zone: "ul.categories a".to_string(),
            location_zone: "ul.locations a".to_string(),
        },
        output: OutputConfig {
            watermark_dir: state_dir.to_string(),
            items_path: items_path.to_string(),
        },
        proxies: vec![],
    }
}

pub fn proxy(address: &str) -> ProxyEntry {
    ProxyEntry {
        address: address.to_string(),
        username: None,
        password: None,
    }
}

fn anchors(links: &[&str]) -> String {
    links
        .iter()
        .map(|href| format!("<li><a href=\"{}\">link</a></li>", href))
        .collect()
}

/// An index page with links in the category and location zones
pub fn index_page(categories: &[&str], locations: &[&str]) -> String {
    format!(
        "<html><body><ul class=\"categories\">{}</ul><ul class=\"locations\">{}</ul></body></html>",
        anchors(categories),
        anchors(locations)
    )
}

/// A listing page; `items` are `(id, timestamp)` and the slug equals the id
pub fn listing_page(
    locations: &[&str],
    items: &[(&str, i64)],
    pagination: Option<(u32, u32, u64)>,
) -> String {
    let ads: Vec<String> = items
        .iter()
        .map(|(id, ts)| format!(r#"{{"id":"{}","slug":"{}","timeStamp":{}}}"#, id, id, ts))
        .collect();
    let pagination = pagination
        .map(|(active, size, total)| {
            format!(
                r#","paginationData":{{"activePage":{},"pageSize":{},"total":{}}}"#,
                active, size, total
            )
        })
        .unwrap_or_default();

    format!(
        "<html><head><script>window.initialData = {{\"serp\":{{\"ads\":{{\"data\":{{\"ads\":[{}]{}}}}}}}}}</script></head>\
         <body><ul class=\"locations\">{}</ul></body></html>",
        ads.join(","),
        pagination,
        anchors(locations)
    )
}

/// An item detail page
pub fn detail_page(id: &str) -> String {
    format!(
        r#"<html><head><script>window.initialData = {{"adDetail":{{"data":{{"ad":{{"id":"{}","title":"Item {}","contactCard":{{"name":"Seller"}},"money":{{"amount":"Tk 1,000"}}}}}}}}}}</script></head></html>"#,
        id, id
    )
}

/// In-memory site standing in for the HTTP fetch engine
///
/// Unknown URLs fail the way a 404 would. Redirects are followed once and
/// reported through the document's final URL. Requests for hanging URLs never
/// complete. Every request is recorded in dispatch order.
pub struct FakeSite {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    hanging: HashSet<String>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeSite {
    pub fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            redirects: HashMap::new(),
            hanging: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serves `to` for requests to `from`
    pub fn with_redirect(mut self, from: String, to: String) -> Self {
        self.redirects.insert(from, to);
        self
    }

    /// Never answers requests to `url`
    pub fn hanging_on(mut self, url: String) -> Self {
        self.hanging.insert(url);
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        self.requests.lock().unwrap().push(request.clone());

        if self.hanging.contains(&request.url) {
            std::future::pending::<()>().await;
        }

        let final_url = self
            .redirects
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| request.url.clone());

        match self.pages.get(&final_url) {
            Some(body) => FetchOutcome::Fetched(FetchedDocument {
                request_url: request.url.clone(),
                url: final_url,
                status_code: 200,
                body: body.clone(),
                meta: request.meta,
            }),
            None => FetchOutcome::Failed {
                request,
                reason: "HTTP 404".to_string(),
            },
        }
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// A four-level site with three leaves
///
/// ```text
/// /en/ads                      category
///   /en/ads/mobiles            subcategory
///     /en/ads/mobiles/phones   location
///       /en/ads/dhaka/phones   sub-location -> mirpur, gulshan
///       /en/ads/ctg/phones     sub-location, no further split (leaf itself)
/// ```
///
/// Item `a2` is listed in both mirpur and gulshan.
pub fn four_level_site() -> Vec<(String, String)> {
    vec![
        (
            url("/en/ads"),
            index_page(&["/en/ads", "/en/ads/mobiles"], &[]),
        ),
        (
            url("/en/ads/mobiles"),
            index_page(&["/en/ads", "/en/ads/mobiles", "/en/ads/mobiles/phones"], &[]),
        ),
        (
            url("/en/ads/mobiles/phones"),
            index_page(
                &[],
                &["/en/ads/mobiles/phones", "/en/ads/dhaka/phones", "/en/ads/ctg/phones"],
            ),
        ),
        (
            url("/en/ads/dhaka/phones"),
            index_page(
                &[],
                &["/en/ads/dhaka/phones", "/en/ads/mirpur/phones", "/en/ads/gulshan/phones"],
            ),
        ),
        (
            url("/en/ads/mirpur/phones"),
            listing_page(&[], &[("a1", T + 30), ("a2", T + 20)], Some((1, 2, 3))),
        ),
        (
            url("/en/ads/mirpur/phones?page=2"),
            listing_page(&[], &[("a3", T + 10)], Some((2, 2, 3))),
        ),
        (
            url("/en/ads/gulshan/phones"),
            listing_page(&[], &[("a2", T + 25), ("g1", T + 15)], Some((1, 2, 2))),
        ),
        (
            url("/en/ads/ctg/phones"),
            listing_page(&["/en/ads/ctg/phones"], &[("c1", T + 5)], None),
        ),
        (url("/en/ads/ctg/phones?page=2"), listing_page(&[], &[], None)),
        (url("/en/ad/a1"), detail_page("a1")),
        (url("/en/ad/a2"), detail_page("a2")),
        (url("/en/ad/a3"), detail_page("a3")),
        (url("/en/ad/g1"), detail_page("g1")),
        (url("/en/ad/c1"), detail_page("c1")),
    ]
}

/// A site whose index pages redirect onto their own children
///
/// ```text
/// /en/ads                  category
///   /en/ads/mobiles        -> /en/ads/mobiles/phones, which lists itself
///                             among its siblings
///     /en/ads/mobiles/tablets -> /en/ads/tablets, no further split
/// ```
pub fn redirecting_site() -> FakeSite {
    FakeSite::new(vec![
        (
            url("/en/ads"),
            index_page(&["/en/ads", "/en/ads/mobiles"], &[]),
        ),
        (
            url("/en/ads/mobiles/phones"),
            index_page(
                &[
                    "/en/ads",
                    "/en/ads/mobiles",
                    "/en/ads/mobiles/phones",
                    "/en/ads/mobiles/tablets",
                ],
                &[],
            ),
        ),
        (
            url("/en/ads/tablets"),
            listing_page(&["/en/ads/tablets"], &[("t1", T + 1)], Some((1, 25, 1))),
        ),
        (url("/en/ad/t1"), detail_page("t1")),
    ])
    .with_redirect(url("/en/ads/mobiles"), url("/en/ads/mobiles/phones"))
    .with_redirect(url("/en/ads/mobiles/tablets"), url("/en/ads/tablets"))
}
