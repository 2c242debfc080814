//! Category tree walker
//!
//! Walks the site's fixed-depth hierarchy (category, subcategory, location,
//! sub-location) from the start pages down to leaf listing indexes. Every
//! level reuses the same child extraction and differs only in the document
//! zone it reads children from.

use crate::config::SiteConfig;
use crate::crawler::fetcher::FetchRequest;
use crate::crawler::parser::extract_child_links;
use crate::url::{canonicalize, leaf_key, without_query, CanonicalUrl};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// A traversal level of the category/location tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Category,
    Subcategory,
    Location,
    SubLocation,
}

/// Document zone child links are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Category,
    Location,
}

impl Level {
    /// Levels in traversal order
    pub const ALL: [Level; 4] = [
        Level::Category,
        Level::Subcategory,
        Level::Location,
        Level::SubLocation,
    ];

    /// Zone holding the children of a page at this level
    pub fn zone(&self) -> Zone {
        match self {
            Level::Category | Level::Subcategory => Zone::Category,
            Level::Location | Level::SubLocation => Zone::Location,
        }
    }

    /// The level children of this level's pages are walked at
    ///
    /// Children of a sub-location page are leaves.
    pub fn next(&self) -> Option<Level> {
        match self {
            Level::Category => Some(Level::Subcategory),
            Level::Subcategory => Some(Level::Location),
            Level::Location => Some(Level::SubLocation),
            Level::SubLocation => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Category => "category",
            Level::Subcategory => "subcategory",
            Level::Location => "location",
            Level::SubLocation => "sub-location",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A level together with the selector for its child zone
#[derive(Debug, Clone)]
pub struct LevelDescriptor {
    pub level: Level,
    pub zone: Selector,
}

/// A traversal position after its children have been extracted
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub level: Level,

    /// The page's own canonical URL
    pub url: CanonicalUrl,

    /// Cleared children in document order
    pub children: Vec<CanonicalUrl>,

    /// Cleared children already reached through another path
    pub already_visited: Vec<CanonicalUrl>,
}

impl CategoryNode {
    /// Cleared children not yet visited
    pub fn fresh_children(&self) -> impl Iterator<Item = &CanonicalUrl> {
        self.children
            .iter()
            .filter(|child| !self.already_visited.contains(child))
    }
}

/// Where the walk goes from a processed index page
#[derive(Debug, Clone, PartialEq)]
pub enum WalkStep {
    /// Index requests for the children, walked at the next level
    Descend(Vec<FetchRequest>),

    /// First-page listing requests for leaf children
    Leaves(Vec<FetchRequest>),

    /// The page itself is the most specific level available
    AtLeaf(FetchRequest),
}

impl WalkStep {
    pub fn into_requests(self) -> Vec<FetchRequest> {
        match self {
            WalkStep::Descend(requests) | WalkStep::Leaves(requests) => requests,
            WalkStep::AtLeaf(request) => vec![request],
        }
    }
}

/// Prunes discovered children against the page they were found on
///
/// Children are canonicalized. If the current page's query-stripped canonical
/// URL is among them, every child up to and including the first match is
/// dropped; otherwise all children are kept.
///
/// # Arguments
///
/// * `current_url` - URL of the page the children were extracted from
/// * `children` - Child URLs in document order
///
/// # Returns
///
/// The canonical children that lie after the current page
pub fn cleared_children(current_url: &str, children: &[String]) -> Vec<CanonicalUrl> {
    let current = without_query(canonicalize(current_url).as_str());
    let canonical: Vec<CanonicalUrl> = children.iter().map(|c| canonicalize(c)).collect();

    match canonical
        .iter()
        .position(|child| without_query(child.as_str()) == current)
    {
        Some(index) => canonical[index + 1..].to_vec(),
        None => canonical,
    }
}

/// Builds the first-page listing request for a leaf
pub fn leaf_request(url: &str) -> FetchRequest {
    FetchRequest::listing(url, leaf_key(url), 1)
}

/// Drives discovery of leaf listing indexes
pub struct CategoryWalker {
    descriptors: Vec<LevelDescriptor>,
    base_url: Url,
    visited: HashSet<CanonicalUrl>,
}

impl CategoryWalker {
    /// Creates a walker from the site configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CategoryWalker)` - Walker with one descriptor per level
    /// * `Err(ConfigError)` - The base URL or a zone selector is invalid
    pub fn new(site: &SiteConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", site.base_url, e)))?;
        let category_zone = parse_zone(&site.category_zone)?;
        let location_zone = parse_zone(&site.location_zone)?;

        let descriptors = Level::ALL
            .iter()
            .map(|&level| LevelDescriptor {
                level,
                zone: match level.zone() {
                    Zone::Category => category_zone.clone(),
                    Zone::Location => location_zone.clone(),
                },
            })
            .collect();

        Ok(Self {
            descriptors,
            base_url,
            visited: HashSet::new(),
        })
    }

    /// Index requests for the start pages, walked at the category level
    pub fn seed(&mut self, start_urls: &[String]) -> Vec<FetchRequest> {
        start_urls
            .iter()
            .filter(|url| self.visited.insert(canonicalize(url)))
            .map(|url| FetchRequest::index(url.as_str(), Level::Category))
            .collect()
    }

    fn descriptor(&self, level: Level) -> Option<&LevelDescriptor> {
        self.descriptors.iter().find(|d| d.level == level)
    }

    /// Extracts and prunes the children of an index page
    pub fn expand(&self, level: Level, page_url: &str, body: &str) -> CategoryNode {
        let links = self
            .descriptor(level)
            .map(|descriptor| extract_child_links(body, &descriptor.zone, &self.base_url))
            .unwrap_or_default();
        let children = cleared_children(page_url, &links);
        let already_visited = children
            .iter()
            .filter(|child| self.visited.contains(*child))
            .cloned()
            .collect();

        CategoryNode {
            level,
            url: canonicalize(page_url),
            children,
            already_visited,
        }
    }

    /// Processes a fetched index page at `level`
    ///
    /// An empty cleared child list turns the page itself into a leaf. Children
    /// already reached through another path are not walked again.
    pub fn step(&mut self, level: Level, page_url: &str, body: &str) -> WalkStep {
        let node = self.expand(level, page_url, body);

        if node.children.is_empty() {
            tracing::debug!("No children under {} page {}, treating as leaf", level, page_url);
            return WalkStep::AtLeaf(leaf_request(page_url));
        }

        let fresh: Vec<CanonicalUrl> = node.fresh_children().cloned().collect();
        tracing::debug!(
            "{} page {}: {} children, {} already visited",
            level,
            node.url,
            node.children.len(),
            node.already_visited.len()
        );

        for child in &fresh {
            self.visited.insert(child.clone());
        }

        match level.next() {
            Some(next) => WalkStep::Descend(
                fresh
                    .iter()
                    .map(|child| FetchRequest::index(child.as_str(), next))
                    .collect(),
            ),
            None => WalkStep::Leaves(fresh.iter().map(|child| leaf_request(child.as_str())).collect()),
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

fn parse_zone(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}
