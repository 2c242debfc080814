use serde::Deserialize;

/// Main configuration structure for Tidemark
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "proxy")]
    pub proxies: Vec<ProxyEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Crawl identity; names the persisted watermark file
    pub name: String,

    /// Root index pages the category walk starts from
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_concurrency")]
    pub max_concurrent_fetches: u32,

    /// Boundary used when comparing item timestamps against the watermark
    #[serde(rename = "stop-policy", default)]
    pub stop_policy: StopPolicy,
}

/// When a listing counts as already captured by a previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopPolicy {
    /// Stop when the watermark is strictly greater than the item timestamp
    #[default]
    Exclusive,
    /// Stop when the watermark is greater than or equal to the item timestamp
    Inclusive,
}

impl StopPolicy {
    /// Returns true if an item stamped `timestamp` was already covered by `watermark`
    pub fn is_covered(&self, watermark: i64, timestamp: i64) -> bool {
        match self {
            Self::Exclusive => watermark > timestamp,
            Self::Inclusive => watermark >= timestamp,
        }
    }
}

/// HTTP fetch engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts made for transient failures
    #[serde(rename = "retry-times", default = "default_retry_times")]
    pub retry_times: u32,

    /// Delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_times: default_retry_times(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Site layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL relative anchors are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Base URL item slugs are joined onto
    #[serde(rename = "item-url-base")]
    pub item_url_base: String,

    /// CSS selector for anchors in the category/subcategory zone
    #[serde(rename = "category-zone")]
    pub category_zone: String,

    /// CSS selector for anchors in the location/sub-location zone
    #[serde(rename = "location-zone")]
    pub location_zone: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one watermark file per crawl name
    #[serde(rename = "watermark-dir")]
    pub watermark_dir: String,

    /// Path to the SQLite item database
    #[serde(rename = "items-path")]
    pub items_path: String,
}

/// Egress proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyEntry {
    /// Proxy URL, e.g. "http://10.0.0.1:8080"
    pub address: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_concurrency() -> u32 {
    12
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_times() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}
