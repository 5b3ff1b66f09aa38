//! One extraction strategy per site family, plus the discovery helpers they share.

pub mod marketplace;
pub mod paginated;
pub mod platform;

pub use marketplace::MarketplaceStrategy;
pub use paginated::PaginatedStrategy;
pub use platform::PlatformStrategy;

use crate::config::site::{SiteConfig, SiteFamily};
use crate::core::extract::ProductParser;
use crate::core::normalize::resolve_url;
use crate::domain::model::ProductRecord;
use crate::domain::ports::{ExtractionStrategy, PageSession};
use crate::utils::error::{CrawlerError, Result};
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

pub(crate) static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Builds the strategy for `site`'s family; `Ok(None)` for an unknown family.
pub fn for_site(site: &SiteConfig) -> Result<Option<Box<dyn ExtractionStrategy>>> {
    let strategy: Box<dyn ExtractionStrategy> = match site.family() {
        Some(SiteFamily::Paginated) => Box::new(PaginatedStrategy::new(site.clone())?),
        Some(SiteFamily::Platform) => Box::new(PlatformStrategy::new(site.clone())?),
        Some(SiteFamily::Marketplace) => Box::new(MarketplaceStrategy::new(site.clone())?),
        None => return Ok(None),
    };
    Ok(Some(strategy))
}

/// Recognizes item-page URLs for one site.
#[derive(Debug, Clone)]
pub struct ItemUrlFilter {
    base_url: String,
    pattern: Regex,
}

impl ItemUrlFilter {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let pattern = Regex::new(&site.item_url_pattern).map_err(|e| {
            CrawlerError::InvalidConfigValueError {
                field: format!("sites.{}.item_url_pattern", site.id),
                value: site.item_url_pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            base_url: site.base_url.clone(),
            pattern,
        })
    }

    /// Absolute, fragment-free URL when `href` points at an item page.
    pub fn accept(&self, href: &str) -> Option<String> {
        let resolved = resolve_url(&self.base_url, href)?;
        let url = match resolved.split_once('#') {
            Some((url, _)) => url.to_string(),
            None => resolved,
        };
        self.pattern.is_match(&url).then_some(url)
    }
}

/// Ordered, de-duplicated URL accumulator.
#[derive(Debug, Default)]
pub struct UrlCollector {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlCollector {
    /// Returns how many previously unseen URLs were added.
    pub fn extend<I: IntoIterator<Item = String>>(&mut self, urls: I) -> usize {
        let before = self.urls.len();
        for url in urls {
            if self.seen.insert(url.clone()) {
                self.urls.push(url);
            }
        }
        self.urls.len() - before
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

/// `listing` with `param` set to `page`, replacing any existing value.
pub fn paged_url(listing: &str, param: &str, page: usize) -> Result<String> {
    let mut url = Url::parse(listing)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &page.to_string());
    Ok(url.to_string())
}

/// Loads `url` and runs the parser over it.
pub(crate) async fn fetch_product(
    session: &mut dyn PageSession,
    parser: &ProductParser,
    url: &str,
) -> Result<Option<ProductRecord>> {
    let page = session.navigate(url).await?;
    Ok(parser.parse(url, &page))
}
