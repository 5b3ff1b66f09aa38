use crate::app::strategies;
use crate::config::catalog::SiteCatalog;
use crate::config::site::SiteConfig;
use crate::core::reconciler::StorageReconciler;
use crate::core::session_runner::CrawlSessionRunner;
use crate::domain::model::{CrawlResult, ProductRecord, RunReport};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info, warn};

/// Runs catalog sites one after another and aggregates their results.
pub struct Orchestrator<S: Storage> {
    catalog: SiteCatalog,
    runner: CrawlSessionRunner<S>,
    reconciler: Option<StorageReconciler>,
    inter_site_delay: Duration,
}

impl<S: Storage> Orchestrator<S> {
    pub fn new(
        catalog: SiteCatalog,
        runner: CrawlSessionRunner<S>,
        reconciler: Option<StorageReconciler>,
    ) -> Self {
        let inter_site_delay = catalog.crawler.inter_site_delay();
        Self {
            catalog,
            runner,
            reconciler,
            inter_site_delay,
        }
    }

    pub fn with_inter_site_delay(mut self, delay: Duration) -> Self {
        self.inter_site_delay = delay;
        self
    }

    pub fn catalog(&self) -> &SiteCatalog {
        &self.catalog
    }

    pub fn reconciler(&self) -> Option<&StorageReconciler> {
        self.reconciler.as_ref()
    }

    pub fn list_sites(&self) -> Vec<SiteConfig> {
        self.catalog.active_sites()
    }

    pub async fn run_all(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let sites = self.list_sites();
        info!("Crawling {} active sites", sites.len());

        let mut results = Vec::with_capacity(sites.len());
        for (index, site) in sites.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inter_site_delay).await;
            }
            if let Some(result) = self.run_site(site).await {
                results.push(result);
            }
        }

        self.finalize(started_at, results).await
    }

    /// `Ok(None)` when no active site has `site_id` or its family is unknown.
    pub async fn run_one(&self, site_id: &str) -> Result<Option<CrawlResult>> {
        let Some(site) = self.catalog.find_active(site_id).cloned() else {
            warn!("No active site with id '{}'", site_id);
            return Ok(None);
        };

        let started_at = Utc::now();
        let Some(result) = self.run_site(&site).await else {
            return Ok(None);
        };

        let report = self.finalize(started_at, vec![result]).await?;
        Ok(report.results.into_iter().next())
    }

    async fn run_site(&self, site: &SiteConfig) -> Option<CrawlResult> {
        let strategy = match strategies::for_site(site) {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                warn!(site = %site.id, "Unknown site family '{}', skipping", site.site_type);
                return None;
            }
            Err(e) => {
                error!(site = %site.id, "Could not build strategy: {}", e);
                return Some(CrawlResult::failed(
                    &site.id,
                    &site.name,
                    &site.listing_url(),
                    e.to_string(),
                ));
            }
        };

        let crawl = AssertUnwindSafe(self.runner.crawl(site, strategy.as_ref())).catch_unwind();
        match crawl.await {
            Ok(result) => Some(result),
            Err(_) => {
                error!(site = %site.id, "Site run aborted unexpectedly");
                Some(CrawlResult::failed(
                    &site.id,
                    &site.name,
                    &site.listing_url(),
                    "site run aborted unexpectedly",
                ))
            }
        }
    }

    /// Writes the run's records, reconciles them, then writes the report.
    async fn finalize(
        &self,
        started_at: DateTime<Utc>,
        results: Vec<CrawlResult>,
    ) -> Result<RunReport> {
        let mut report = RunReport::from_results(started_at, results);
        let stamp = started_at.format("%Y%m%d_%H%M%S");
        let storage = self.runner.storage();

        let records: Vec<ProductRecord> = report.products().cloned().collect();
        let results_path = format!("crawl_results_{}.json", stamp);
        storage
            .write_file(&results_path, &serde_json::to_vec_pretty(&records)?)
            .await?;
        report.snapshot_path = Some(results_path);

        if let Some(reconciler) = &self.reconciler {
            if reconciler.prepare().await {
                report.reconciliation = Some(reconciler.upsert_all(&records).await);
            }
        }

        let report_path = format!("crawl_report_{}.json", stamp);
        storage
            .write_file(&report_path, &serde_json::to_vec_pretty(&report)?)
            .await?;

        info!(
            sites = report.total_sites,
            successful_sites = report.successful_sites,
            products = report.successful_products,
            failed = report.failed_products,
            errors = report.total_errors,
            "📊 Run report saved to {}",
            storage.locate(&report_path)
        );
        Ok(report)
    }
}
