use std::fmt;
use url::Url;

/// A URL reduced to a stable identity string
///
/// Two URLs that differ only in the order of their query parameters or in a
/// `www.` host prefix share the same `CanonicalUrl`. It is used for set
/// membership and pruning; fetching it is equivalent to fetching the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalizes a URL for identity comparison
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; input that does not parse is returned unchanged
/// 2. Split the query string into `key=value` segments (no percent-decoding)
/// 3. Stable-sort the segments by key, so repeated keys keep their order
/// 4. Rebuild the query string, dropping it entirely when empty
/// 5. Strip the leading `www.` label(s) from the host
///
/// The path is preserved. The function never fails and is idempotent.
///
/// # Examples
///
/// ```
/// use tidemark::url::canonicalize;
///
/// let a = canonicalize("http://www.x.com/a?b=2&a=1");
/// let b = canonicalize("http://x.com/a?a=1&b=2");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "http://x.com/a?a=1&b=2");
/// ```
pub fn canonicalize(url_str: &str) -> CanonicalUrl {
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(_) => return CanonicalUrl(url_str.to_string()),
    };

    if let Some(query) = url.query() {
        let sorted = sort_query(query);
        if sorted.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&sorted));
        }
    }

    let stripped_host = url
        .host_str()
        .filter(|host| host.starts_with("www."))
        .map(|host| host.trim_start_matches("www.").to_string());
    if let Some(host) = stripped_host {
        // An empty or invalid remainder keeps the original host
        if !host.is_empty() {
            let _ = url.set_host(Some(&host));
        }
    }

    CanonicalUrl(url.into())
}

/// Returns the URL with its query string and fragment removed
///
/// This is the path-only identity used to compare the page being processed
/// against the children it links to.
///
/// ```
/// use tidemark::url::without_query;
///
/// assert_eq!(without_query("https://x.com/ads/dhaka?page=2#top"), "https://x.com/ads/dhaka");
/// ```
pub fn without_query(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => url_str
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or(url_str)
            .to_string(),
    }
}

/// Stable-sorts raw `key=value` query segments by key
fn sort_query(query: &str) -> String {
    let mut segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();
    segments.sort_by(|a, b| query_key(a).cmp(query_key(b)));
    segments.join("&")
}

fn query_key(segment: &str) -> &str {
    segment.split('=').next().unwrap_or(segment)
}
