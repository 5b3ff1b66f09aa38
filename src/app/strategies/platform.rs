//! Hosted e-commerce platforms with infinite scroll.
//!
//! Each scroll is issued as the listing with `page_param` advanced by one;
//! discovery stops once a scroll surfaces nothing new.

use super::{fetch_product, paged_url, ItemUrlFilter, UrlCollector, LINKS};
use crate::config::site::SiteConfig;
use crate::core::extract::{json_ld_rules, ProductParser};
use crate::domain::model::ProductRecord;
use crate::domain::ports::{ExtractionStrategy, PageSession};
use crate::utils::error::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

pub struct PlatformStrategy {
    site: SiteConfig,
    items: ItemUrlFilter,
    parser: ProductParser,
}

impl PlatformStrategy {
    pub fn new(site: SiteConfig) -> Result<Self> {
        Ok(Self {
            items: ItemUrlFilter::new(&site)?,
            parser: ProductParser::new(&site, &[json_ld_rules()])?,
            site,
        })
    }
}

#[async_trait]
impl ExtractionStrategy for PlatformStrategy {
    fn family(&self) -> &'static str {
        "platform"
    }

    async fn enumerate_item_urls(&self, session: &mut dyn PageSession) -> Result<Vec<String>> {
        let listing = self.site.listing_url();
        let mut collector = UrlCollector::default();

        let page = session.navigate(&listing).await?;
        collector.extend(
            page.query_attr(&LINKS, "href")
                .iter()
                .filter_map(|href| self.items.accept(href)),
        );

        for scroll in 1..=self.site.max_scroll_attempts {
            tokio::time::sleep(self.site.delay()).await;
            let url = paged_url(&listing, &self.site.page_param, scroll + 1)?;

            let page = match session.navigate(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(site = %self.site.id, "Scroll {} failed, keeping {} URLs: {}", scroll, collector.len(), e);
                    break;
                }
            };

            let added = collector.extend(
                page.query_attr(&LINKS, "href")
                    .iter()
                    .filter_map(|href| self.items.accept(href)),
            );
            debug!(site = %self.site.id, "Scroll {} added {} item URLs", scroll, added);
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
