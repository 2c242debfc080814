//! Fetch requests, fetched documents and the HTTP fetch engine
//!
//! The controller only ever talks to a [`Fetcher`]: it hands over abstract
//! fetch requests and gets back either a fetched document or a terminal
//! failure. Timeouts and retries of transient failures live in the engine.

use crate::config::{FetchConfig, ProxyEntry};
use crate::crawler::proxy::ProxyEndpoint;
use crate::crawler::walker::Level;
use async_trait::async_trait;
use reqwest::{Client, Method, Proxy, StatusCode};
use std::collections::HashMap;
use std::time::Duration;

/// What a fetched document is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A category/location index page processed at the given level
    Index(Level),

    /// A page of a leaf's listing index
    Listing,

    /// An item detail page
    Detail,
}

/// Metadata carried with a request and echoed back with its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub kind: RequestKind,

    /// Leaf the request belongs to (listing and detail requests)
    pub leaf_key: Option<String>,

    /// Listing page number (listing requests)
    pub page: Option<u32>,

    /// Egress proxy chosen right before dispatch
    pub proxy: Option<ProxyEndpoint>,
}

/// An outbound fetch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub meta: RequestMeta,
}

impl FetchRequest {
    fn get(url: impl Into<String>, meta: RequestMeta) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            meta,
        }
    }

    /// Request for an index page to be walked at `level`
    pub fn index(url: impl Into<String>, level: Level) -> Self {
        Self::get(
            url,
            RequestMeta {
                kind: RequestKind::Index(level),
                leaf_key: None,
                page: None,
                proxy: None,
            },
        )
    }

    /// Request for page `page` of the leaf identified by `leaf_key`
    pub fn listing(url: impl Into<String>, leaf_key: impl Into<String>, page: u32) -> Self {
        Self::get(
            url,
            RequestMeta {
                kind: RequestKind::Listing,
                leaf_key: Some(leaf_key.into()),
                page: Some(page),
                proxy: None,
            },
        )
    }

    /// Request for an item detail page discovered in `leaf_key`
    pub fn detail(url: impl Into<String>, leaf_key: Option<String>) -> Self {
        Self::get(
            url,
            RequestMeta {
                kind: RequestKind::Detail,
                leaf_key,
                page: None,
                proxy: None,
            },
        )
    }
}

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL the request was issued for
    pub request_url: String,

    /// Final URL after redirects
    pub url: String,

    pub status_code: u16,

    pub body: String,

    /// The originating request's metadata
    pub meta: RequestMeta,
}

/// Terminal result of a fetch request
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(FetchedDocument),

    /// The engine gave up on the request
    Failed {
        request: FetchRequest,
        reason: String,
    },
}

/// The external fetch engine the controller issues requests to
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a request to completion, including any retries
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome;
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// # Arguments
///
/// * `config` - The fetch configuration
/// * `proxy` - Proxy to route every request through, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Invalid proxy or TLS backend failure
pub fn build_http_client(
    config: &FetchConfig,
    proxy: Option<&ProxyEndpoint>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true);

    if let Some(endpoint) = proxy {
        let mut proxy = Proxy::all(endpoint.address.as_str())?;
        if let Some(username) = &endpoint.username {
            proxy = proxy.basic_auth(username, endpoint.password.as_deref().unwrap_or(""));
        }
        builder = builder.proxy(proxy);
    } else {
        builder = builder.no_proxy();
    }

    builder.build()
}

/// Result of a single attempt
enum Attempt {
    Done(FetchedDocument),
    Transient(String),
    Permanent(String),
}

/// reqwest-backed fetch engine
///
/// Clients are built once per proxy endpoint, so the proxy the rotator stamps
/// on a request selects the client it is sent with.
pub struct HttpFetcher {
    direct: Client,
    proxied: HashMap<ProxyEndpoint, Client>,
    retry_times: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetch engine with one client per configured proxy
    pub fn new(config: &FetchConfig, proxies: &[ProxyEntry]) -> Result<Self, reqwest::Error> {
        let direct = build_http_client(config, None)?;

        let mut proxied = HashMap::new();
        for entry in proxies {
            let endpoint = ProxyEndpoint::from(entry);
            let client = build_http_client(config, Some(&endpoint))?;
            proxied.insert(endpoint, client);
        }

        Ok(Self {
            direct,
            proxied,
            retry_times: config.retry_times,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    fn client_for(&self, request: &FetchRequest) -> &Client {
        request
            .meta
            .proxy
            .as_ref()
            .and_then(|proxy| self.proxied.get(proxy))
            .unwrap_or(&self.direct)
    }

    async fn attempt(&self, request: &FetchRequest) -> Attempt {
        let client = self.client_for(request);
        let response = match client
            .request(request.method.clone(), request.url.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Transient("Request timeout".to_string()),
            Err(e) if e.is_connect() => {
                return Attempt::Transient(format!("Connection failed: {}", e))
            }
            Err(e) if e.is_builder() => return Attempt::Permanent(e.to_string()),
            Err(e) => return Attempt::Transient(e.to_string()),
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }

        if !status.is_success() {
            return Attempt::Permanent(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => Attempt::Done(FetchedDocument {
                request_url: request.url.clone(),
                url: final_url,
                status_code: status.as_u16(),
                body,
                meta: request.meta.clone(),
            }),
            Err(e) => Attempt::Transient(format!("Failed to read body: {}", e)),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Done |
    /// | HTTP 429, 5xx | Retry |
    /// | Timeout, connect error, body read error | Retry |
    /// | Other HTTP status | Immediate failure |
    ///
    /// At most `retry-times` retries are made, `retry-delay-ms` apart.
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(&request).await {
                Attempt::Done(document) => return FetchOutcome::Fetched(document),
                Attempt::Permanent(reason) => {
                    return FetchOutcome::Failed { request, reason };
                }
                Attempt::Transient(reason) => {
                    if attempts > self.retry_times {
                        let reason = format!("{} (gave up after {} attempts)", reason, attempts);
                        return FetchOutcome::Failed { request, reason };
                    }
                    tracing::debug!(
                        "Retrying {} after transient failure ({}), attempt {}",
                        request.url,
                        reason,
                        attempts
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
