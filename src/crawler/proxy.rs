//! Egress proxy rotation
//!
//! Every outbound fetch request is assigned the next proxy of a fixed pool,
//! in cyclic order, right before it is handed to the fetch engine.

use crate::config::ProxyEntry;
use crate::crawler::fetcher::FetchRequest;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An egress proxy a request can be routed through
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint {
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
        }
    }
}

impl From<&ProxyEntry> for ProxyEndpoint {
    fn from(entry: &ProxyEntry) -> Self {
        Self {
            address: entry.address.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("address", &self.address)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Cyclic proxy assignment over an immutable pool
///
/// The cursor is shared state; it is advanced atomically so concurrent
/// callers still observe the pool in strict cyclic order.
#[derive(Debug, Default)]
pub struct ProxyRotator {
    pool: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    pub fn new(pool: Vec<ProxyEndpoint>) -> Self {
        Self {
            pool,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_config(entries: &[ProxyEntry]) -> Self {
        Self::new(entries.iter().map(ProxyEndpoint::from).collect())
    }

    /// Returns the next proxy in pool order, wrapping after the last
    ///
    /// An empty pool yields `None`: the request goes out without a proxy.
    pub fn next(&self) -> Option<ProxyEndpoint> {
        if self.pool.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        Some(self.pool[index].clone())
    }

    /// Stamps the next proxy onto a request's metadata
    pub fn assign(&self, request: &mut FetchRequest) {
        request.meta.proxy = self.next();
        if let Some(proxy) = &request.meta.proxy {
            tracing::trace!("Assigned proxy {} to {}", proxy, request.url);
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.pool
    }
}
