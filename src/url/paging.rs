use url::Url;

/// Name of the query parameter the site paginates listing indexes with
pub const PAGE_PARAM: &str = "page";

/// Reads the current page number from a listing URL (1 when absent or invalid)
pub fn page_number(url_str: &str) -> u32 {
    Url::parse(url_str)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == PAGE_PARAM)
                .and_then(|(_, value)| value.parse::<u32>().ok())
        })
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

/// Returns `url_str` with its `page` parameter set to `page`
///
/// An existing `page` parameter is replaced in place; otherwise one is appended.
/// Other query segments are kept byte-for-byte.
pub fn with_page(url_str: &str, page: u32) -> String {
    let (head, fragment) = match url_str.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url_str, None),
    };
    let (base, query) = match head.split_once('?') {
        Some((base, query)) => (base, query),
        None => (head, ""),
    };

    let page_segment = format!("{}={}", PAGE_PARAM, page);
    let mut replaced = false;
    let mut segments = Vec::new();
    for segment in query.split('&').filter(|s| !s.is_empty()) {
        let key = segment.split('=').next().unwrap_or(segment);
        if key == PAGE_PARAM {
            if !replaced {
                segments.push(page_segment.clone());
                replaced = true;
            }
        } else {
            segments.push(segment.to_string());
        }
    }
    if !replaced {
        segments.push(page_segment);
    }

    let mut result = format!("{}?{}", base, segments.join("&"));
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}
