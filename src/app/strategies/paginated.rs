//! Server-rendered storefronts: harvest item links, follow "next page" links.

use super::{fetch_product, ItemUrlFilter, UrlCollector, LINKS};
use crate::config::site::SiteConfig;
use crate::core::extract::ProductParser;
use crate::core::normalize::resolve_url;
use crate::domain::model::ProductRecord;
use crate::domain::page::Page;
use crate::domain::ports::{ExtractionStrategy, PageSession};
use crate::utils::error::{CrawlerError, Result};
use async_trait::async_trait;
use scraper::Selector;
use std::collections::HashSet;
use tracing::{debug, warn};

const DEFAULT_NEXT_PAGE_SELECTORS: &[&str] = &["a[rel=next]", ".pagination .next a", "a.next"];

pub struct PaginatedStrategy {
    site: SiteConfig,
    items: ItemUrlFilter,
    next_page: Vec<Selector>,
    parser: ProductParser,
}

impl PaginatedStrategy {
    pub fn new(site: SiteConfig) -> Result<Self> {
        let configured: Vec<&str> = if site.next_page_selectors.is_empty() {
            DEFAULT_NEXT_PAGE_SELECTORS.to_vec()
        } else {
            site.next_page_selectors.iter().map(String::as_str).collect()
        };
        let next_page = configured
            .into_iter()
            .map(|selector| {
                Selector::parse(selector).map_err(|e| CrawlerError::SelectorError {
                    selector: selector.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            items: ItemUrlFilter::new(&site)?,
            parser: ProductParser::new(&site, &[])?,
            next_page,
            site,
        })
    }

    fn next_page_url(&self, page: &Page) -> Option<String> {
        self.next_page.iter().find_map(|selector| {
            page.query_attr(selector, "href")
                .iter()
                .find_map(|href| resolve_url(page.url(), href))
        })
    }
}

#[async_trait]
impl ExtractionStrategy for PaginatedStrategy {
    fn family(&self) -> &'static str {
        "paginated"
    }

    async fn enumerate_item_urls(&self, session: &mut dyn PageSession) -> Result<Vec<String>> {
        let mut collector = UrlCollector::default();
        let mut visited = HashSet::new();
        let mut next = Some(self.site.listing_url());

        while let Some(url) = next.take() {
            if visited.len() >= self.site.max_pages.max(1) || !visited.insert(url.clone()) {
                break;
            }
            if visited.len() > 1 {
                tokio::time::sleep(self.site.delay()).await;
            }

            let page = match session.navigate(&url).await {
                Ok(page) => page,
                Err(e) if visited.len() > 1 => {
                    warn!(site = %self.site.id, "Stopping pagination at {}: {}", url, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let added = collector.extend(
                page.query_attr(&LINKS, "href")
                    .iter()
                    .filter_map(|href| self.items.accept(href)),
            );
            debug!(site = %self.site.id, "Listing page {} added {} item URLs", visited.len(), added);

            next = self.next_page_url(&page);
        }

        Ok(collector.into_urls())
    }

    async fn extract_item(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<Option<ProductRecord>> {
        fetch_product(session, &self.parser, url).await
    }
}
