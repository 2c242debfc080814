//! Document extraction
//!
//! This module turns fetched documents into the values the controller reasons
//! about:
//! - Child links of an index page, taken from one document zone
//! - Item summaries and the pagination descriptor of a listing index
//! - The full item record of a detail page
//!
//! Listing and detail pages embed their data as a JSON payload assigned to
//! `window.initialData`; index pages are walked through their anchors.

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

/// Errors extracting structured data from a document
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("No initialData payload in document")]
    MissingPayload,

    #[error("Malformed initialData payload: {0}")]
    MalformedPayload(String),

    #[error("Document is not an item detail page")]
    NotADetailPage,

    #[error("Missing mandatory field: {0}")]
    MissingField(&'static str),
}

/// One listing as it appears on a listing index page
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    pub item_id: String,

    /// Path segment of the item's detail page
    pub slug: String,

    /// Raw creation/update timestamp token, if present
    pub timestamp_token: Option<String>,
}

impl ItemSummary {
    /// Resolves the summary's timestamp, 0 when absent or unparsable
    pub fn timestamp(&self) -> i64 {
        self.timestamp_token
            .as_deref()
            .map(parse_timestamp)
            .unwrap_or(0)
    }
}

/// Pagination descriptor of a listing index page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl Pagination {
    /// Returns true if items remain beyond the current page
    pub fn has_next(&self) -> bool {
        self.total > u64::from(self.page_size) * u64::from(self.current_page)
    }
}

/// Extracted content of a listing index page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: Vec<ItemSummary>,
    pub pagination: Option<Pagination>,
}

/// A fully extracted listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub url: String,
    pub item_id: String,

    /// Leaf the item was discovered in
    pub leaf_key: Option<String>,

    pub title: String,
    pub description: Option<String>,
    pub creation_timestamp: i64,
    pub author_name: String,
    pub author_phone: Option<String>,
    pub price: f64,
    pub images: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub address: Option<String>,
}

/// Resolution requested from the image CDN
const IMAGE_SUFFIX: &str = "780/585/fitted.jpg";

fn initial_data_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"window\.initialData\s*=\s*").expect("initialData pattern is valid")
    })
}

/// Locates and parses the `window.initialData` JSON payload
///
/// Exactly one JSON value is read after the assignment, so the payload may
/// span lines and anything following it in the same script is ignored.
pub fn extract_initial_data(body: &str) -> Result<Value, ExtractError> {
    let assignment = initial_data_regex()
        .find(body)
        .ok_or(ExtractError::MissingPayload)?;
    let rest = &body[assignment.end()..];
    if !rest.starts_with('{') {
        return Err(ExtractError::MissingPayload);
    }

    serde_json::Deserializer::from_str(rest)
        .into_iter::<Value>()
        .next()
        .ok_or(ExtractError::MissingPayload)?
        .map_err(|e| ExtractError::MalformedPayload(e.to_string()))
}

/// Extracts anchors from one zone of an index page
///
/// Links are resolved against `base_url` and returned in document order.
/// Elements matched by `zone` without a usable `href` are skipped.
pub fn extract_child_links(body: &str, zone: &Selector, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(body);

    document
        .select(zone)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Extracts item summaries and pagination from a listing index page
///
/// A payload without the listing path is a recognised-but-empty index and
/// yields an empty page. Summaries lacking an id or slug are skipped.
pub fn extract_listing(body: &str) -> Result<ListingPage, ExtractError> {
    let data = extract_initial_data(body)?;
    let Some(listing) = data.pointer("/serp/ads/data") else {
        return Ok(ListingPage::default());
    };

    let items = listing
        .get("ads")
        .and_then(Value::as_array)
        .map(|ads| ads.iter().filter_map(summary_from_json).collect())
        .unwrap_or_default();

    let pagination = listing.get("paginationData").and_then(pagination_from_json);

    Ok(ListingPage { items, pagination })
}

fn summary_from_json(ad: &Value) -> Option<ItemSummary> {
    let item_id = json_string(ad.get("id")?)?;
    let slug = ad.get("slug").and_then(Value::as_str)?.to_string();
    let timestamp_token = ad
        .get("timeStamp")
        .or_else(|| ad.get("date"))
        .and_then(json_string);

    if item_id.is_empty() || slug.is_empty() {
        tracing::debug!("Skipping listing summary without id or slug");
        return None;
    }

    Some(ItemSummary {
        item_id,
        slug,
        timestamp_token,
    })
}

fn pagination_from_json(data: &Value) -> Option<Pagination> {
    let current_page = data.get("activePage").and_then(json_u64)?;
    let page_size = data.get("pageSize").and_then(json_u64)?;
    let total = data.get("total").and_then(json_u64)?;

    if page_size == 0 {
        return None;
    }

    Some(Pagination {
        current_page: u32::try_from(current_page).ok()?,
        page_size: u32::try_from(page_size).ok()?,
        total,
    })
}

/// Extracts the item record from a detail page
///
/// `id` and `title` are mandatory; every other field falls back to its own
/// default when absent.
pub fn extract_item(body: &str, url: &str) -> Result<ItemRecord, ExtractError> {
    let data = extract_initial_data(body)?;
    let ad = data
        .pointer("/adDetail/data/ad")
        .filter(|ad| ad.is_object())
        .ok_or(ExtractError::NotADetailPage)?;

    let item_id = ad
        .get("id")
        .and_then(json_string)
        .filter(|id| !id.is_empty())
        .ok_or(ExtractError::MissingField("id"))?;
    let title = ad
        .get("title")
        .and_then(Value::as_str)
        .ok_or(ExtractError::MissingField("title"))?
        .to_string();

    let description = ad
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    let author_name = ad
        .pointer("/contactCard/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let author_phone = ad
        .pointer("/contactCard/phoneNumbers/0/number")
        .and_then(json_string);
    let creation_timestamp = ad
        .get("adDate")
        .and_then(Value::as_str)
        .map(parse_timestamp)
        .unwrap_or(0);
    let price = ad
        .pointer("/money/amount")
        .and_then(json_string)
        .and_then(|amount| parse_price(&amount))
        .unwrap_or(0.0);
    let images = extract_images(ad);
    let metadata = extract_properties(ad);
    let address = metadata.get("Address").cloned();

    Ok(ItemRecord {
        url: url.to_string(),
        item_id,
        leaf_key: None,
        title,
        description,
        creation_timestamp,
        author_name,
        author_phone,
        price,
        images,
        metadata,
        address,
    })
}

fn extract_images(ad: &Value) -> Vec<String> {
    ad.pointer("/images/meta")
        .and_then(Value::as_array)
        .map(|meta| {
            meta.iter()
                .filter_map(|image| image.get("src").and_then(Value::as_str))
                .map(|src| format!("{}/{}", src.trim_end_matches('/'), IMAGE_SUFFIX))
                .collect()
        })
        .unwrap_or_default()
}

fn extract_properties(ad: &Value) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(properties) = ad.get("properties").and_then(Value::as_array) {
        for property in properties {
            let label = property.get("label").and_then(Value::as_str);
            let value = property.get("value").and_then(json_string);
            if let (Some(label), Some(value)) = (label, value) {
                metadata.insert(label.to_string(), value);
            }
        }
    }
    metadata
}

/// Parses a listing timestamp token into Unix seconds
///
/// Accepts RFC 3339, bare Unix seconds, and naive `YYYY-MM-DD HH:MM[:SS]`
/// forms (read as UTC). Anything else yields 0, the value used for bumped
/// listings without an independent recency signal.
pub fn parse_timestamp(token: &str) -> i64 {
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let token = token.trim();
    if token.is_empty() {
        return 0;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(token) {
        return parsed.timestamp();
    }

    if let Ok(seconds) = token.parse::<i64>() {
        return seconds.max(0);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
        .map(|naive| naive.and_utc().timestamp())
        .unwrap_or(0)
}

/// Parses the numeric part of a price string such as "Tk 12,500"
pub fn parse_price(amount: &str) -> Option<f64> {
    let numeric: String = amount
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse::<f64>().ok()
}

/// Resolves an anchor href against the site base
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

/// Reads a JSON string or number as a string
fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a JSON number or numeric string as u64
fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
