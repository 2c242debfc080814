//! URL handling module for Tidemark
//!
//! This module provides URL canonicalization for identity comparison, the
//! leaf key derivation used by the watermark store, and the `page` query
//! parameter helpers used by the listing pager.

mod canonical;
mod paging;

// Re-export main functions
pub use canonical::{canonicalize, without_query, CanonicalUrl};
pub use paging::{page_number, with_page, PAGE_PARAM};

/// Derives the leaf key for a listing-index URL
///
/// The leaf key is the canonical, query-stripped form of the URL: every page
/// of the same leaf shares it, and it is the key under which the leaf's
/// watermark is persisted.
///
/// # Examples
///
/// ```
/// use tidemark::url::leaf_key;
///
/// assert_eq!(
///     leaf_key("https://www.x.com/en/ads/dhaka/mobiles?page=3&sort=date"),
///     "https://x.com/en/ads/dhaka/mobiles"
/// );
/// ```
pub fn leaf_key(url_str: &str) -> String {
    without_query(canonicalize(url_str).as_str())
}
