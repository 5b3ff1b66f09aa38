//! Marketplaces whose listings are rendered client-side.
//!
//! Item URLs are harvested from the raw page source, embedded JSON state
//! included, rather than from rendered anchors.

use super::{fetch_product, paged_url, ItemUrlFilter, UrlCollector};
use crate::config::site::SiteConfig;
use crate::core::extract::{json_ld_rules, meta_rules, ProductParser};
use crate::domain::model::ProductRecord;
use crate::domain::page::Page;
use crate::domain::ports::{ExtractionStrategy, PageSession};
use crate::utils::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static URL_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?://|/)[^\s"'<>\\]+"#).expect("valid url candidate pattern")
});

pub struct MarketplaceStrategy {
    site: SiteConfig,
    items: ItemUrlFilter,
    parser: ProductParser,
}

impl MarketplaceStrategy {
    pub fn new(site: SiteConfig) -> Result<Self> {
        Ok(Self {
            items: ItemUrlFilter::new(&site)?,
            parser: ProductParser::new(&site, &[meta_rules(), json_ld_rules()])?,
            site,
        })
    }

    fn harvest(&self, page: &Page) -> Vec<String> {
        let source = page.body().replace("\\/", "/");
        URL_CANDIDATE
            .find_iter(&source)
            .filter_map(|m| self.items.accept(m.as_str()))
            .collect()
    }
}

#[async_trait]
impl ExtractionStrategy for MarketplaceStrategy {
    fn family(&self) -> &'static str {
        "marketplace"
    }

    async fn enumerate_item_urls(&self, session: &mut dyn PageSession) -> Result<Vec<String>> {
        let listing = self.site.listing_url();
        let mut collector = UrlCollector::default();

        let page = session.navigate(&listing).await?;
        collector.extend(self.harvest(&page));

        for page_number in 2..=self.site.max_pages {
            tokio::time::sleep(self.site.delay()).await;
            let url = paged_url(&listing, &self.site.page_param, page_number)?;

            let page = match session.navigate(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(site = %self.site.id, "Listing page {} failed: {}", page_number, e);
                    break;
                }
            };

            let added = collector.extend(self.harvest(&page));
            debug!(site = %self.site.id, "Listing page {} added {} item URLs", page_number, added);
            if added == 0 {
                break;
            }
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
