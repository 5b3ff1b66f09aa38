//! The shared engine every extraction strategy runs inside.
//!
//! One call to [`CrawlSessionRunner::crawl`] produces exactly one
//! [`CrawlResult`]. Nothing raised by a strategy escapes it: session failures
//! become a zero-success result, item failures become [`CrawlError`]s, and the
//! session is closed on every path before the snapshot is written.

use crate::config::site::SiteConfig;
use crate::core::robots::{self, Permission};
use crate::core::validator::{QualityValidator, Verdict};
use crate::domain::model::{CrawlError, CrawlResult, ProductRecord};
use crate::domain::ports::{ExtractionStrategy, PageSession, SessionFactory, Storage};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SNAPSHOT_DIR: &str = "snapshots";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    SessionOpen,
    PermissionChecked,
    Enumerating,
    Items,
    SessionClosed,
    Reported,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SessionOpen => "session-open",
            Self::PermissionChecked => "permission-checked",
            Self::Enumerating => "enumerating",
            Self::Items => "items",
            Self::SessionClosed => "session-closed",
            Self::Reported => "reported",
        };
        f.write_str(name)
    }
}

fn enter(site: &SiteConfig, phase: RunPhase) {
    debug!(site = %site.id, %phase, "crawl phase");
}

pub struct CrawlSessionRunner<S: Storage> {
    sessions: Arc<dyn SessionFactory>,
    validator: QualityValidator,
    storage: S,
    user_agent: String,
}

impl<S: Storage> CrawlSessionRunner<S> {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        validator: QualityValidator,
        storage: S,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            validator,
            storage,
            user_agent: user_agent.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn crawl(&self, site: &SiteConfig, strategy: &dyn ExtractionStrategy) -> CrawlResult {
        info!(site = %site.id, family = strategy.family(), "🚀 Starting crawl of {}", site.name);
        let mut result = CrawlResult::new(&site.id, &site.name);

        enter(site, RunPhase::SessionOpen);
        match self.sessions.open(site).await {
            Ok(mut session) => {
                self.drive(site, strategy, session.as_mut(), &mut result).await;

                enter(site, RunPhase::SessionClosed);
                if let Err(e) = session.close().await {
                    warn!(site = %site.id, "Failed to close session cleanly: {}", e);
                }
            }
            Err(e) => {
                warn!(site = %site.id, "❌ Could not open a session: {}", e);
                result
                    .errors
                    .push(CrawlError::new(site.listing_url(), e.to_string(), 0));
            }
        }

        self.write_snapshot(site, &mut result).await;
        result.finish();

        enter(site, RunPhase::Reported);
        info!(
            site = %site.id,
            total = result.total_products,
            accepted = result.successful_products,
            rejected = result.rejected_products,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Finished crawl of {}",
            site.name
        );
        result
    }

    async fn drive(
        &self,
        site: &SiteConfig,
        strategy: &dyn ExtractionStrategy,
        session: &mut dyn PageSession,
        result: &mut CrawlResult,
    ) {
        enter(site, RunPhase::PermissionChecked);
        match robots::check_crawl_permission(&mut *session, site, &self.user_agent).await {
            Ok(Permission::Allowed) => debug!(site = %site.id, "robots.txt allows listing path"),
            Ok(Permission::Disallowed { rule }) => warn!(
                site = %site.id,
                "⚠️ robots.txt disallows {} ({}); continuing",
                site.listing_path,
                rule
            ),
            Err(e) => warn!(site = %site.id, "Could not check robots.txt: {}", e),
        }

        enter(site, RunPhase::Enumerating);
        let urls = match strategy.enumerate_item_urls(&mut *session).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(site = %site.id, "Item discovery failed: {}", e);
                result
                    .errors
                    .push(CrawlError::new(site.listing_url(), e.to_string(), 0));
                return;
            }
        };
        result.total_products = urls.len();
        info!(site = %site.id, "Found {} candidate item URLs", urls.len());

        enter(site, RunPhase::Items);
        for (index, url) in urls.iter().enumerate() {
            tokio::time::sleep(site.delay()).await;
            debug!(site = %site.id, "[{}/{}] {}", index + 1, urls.len(), url);

            match self.extract_with_retries(site, strategy, &mut *session, url).await {
                Ok(Some(mut record)) => match self.validator.validate(&mut record) {
                    Verdict::Accepted => {
                        debug!(url = %url, score = record.quality_score, "Accepted {}", record.name);
                        result.products.push(record);
                    }
                    Verdict::Rejected { reason } => {
                        info!(url = %url, score = record.quality_score, "Rejected: {}", reason);
                        result.rejected_products += 1;
                    }
                },
                Ok(None) => {
                    warn!(url = %url, "No product found on page");
                    result.failed_products += 1;
                    result
                        .errors
                        .push(CrawlError::new(url.as_str(), "no product found on page", 0));
                }
                Err(error) => {
                    warn!(url = %url, retries = error.retry_count, "Item failed: {}", error.message);
                    result.failed_products += 1;
                    result.errors.push(error);
                }
            }
        }
    }

    /// Attempts one item up to `1 + max_retries` times with linear backoff.
    /// A panic is recorded immediately and not retried.
    async fn extract_with_retries(
        &self,
        site: &SiteConfig,
        strategy: &dyn ExtractionStrategy,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<Option<ProductRecord>, CrawlError> {
        let mut retries = 0;
        loop {
            let attempt = AssertUnwindSafe(strategy.extract_item(&mut *session, url))
                .catch_unwind()
                .await;

            let message = match attempt {
                Ok(Ok(record)) => return Ok(record),
                Ok(Err(e)) => e.to_string(),
                Err(panic) => {
                    return Err(CrawlError::new(
                        url,
                        format!("extraction panicked: {}", panic_message(&panic)),
                        retries,
                    ))
                }
            };

            if retries >= site.max_retries {
                return Err(CrawlError::new(url, message, retries));
            }
            retries += 1;
            debug!(url = %url, "Retry {}/{} after: {}", retries, site.max_retries, message);
            tokio::time::sleep(site.delay() * retries).await;
        }
    }

    async fn write_snapshot(&self, site: &SiteConfig, result: &mut CrawlResult) {
        let path = format!(
            "{}/{}_{}.json",
            SNAPSHOT_DIR,
            site.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let written = match serde_json::to_vec_pretty(&result.products) {
            Ok(data) => self.storage.write_file(&path, &data).await,
            Err(e) => Err(e.into()),
        };

        match written {
            Ok(()) => {
                info!(site = %site.id, "💾 Snapshot saved to {}", self.storage.locate(&path));
                result.snapshot_path = Some(path);
            }
            Err(e) => {
                warn!(site = %site.id, "Failed to write snapshot: {}", e);
                result.errors.push(CrawlError::new(path, e.to_string(), 0));
            }
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::config::site::test_site;
    use crate::domain::page::Page;
    use crate::utils::error::{CrawlerError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct NullSession;

    #[async_trait]
    impl PageSession for NullSession {
        async fn navigate(&mut self, url: &str) -> Result<Page> {
            Err(CrawlerError::HttpStatusError {
                url: url.to_string(),
                status: 404,
            })
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NullFactory;

    #[async_trait]
    impl SessionFactory for NullFactory {
        async fn open(&self, _site: &SiteConfig) -> Result<Box<dyn PageSession>> {
            Ok(Box::new(NullSession))
        }
    }

    struct RefusingFactory;

    #[async_trait]
    impl SessionFactory for RefusingFactory {
        async fn open(&self, site: &SiteConfig) -> Result<Box<dyn PageSession>> {
            Err(CrawlerError::SessionError {
                site: site.id.clone(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// Fails every attempt on `flaky`, panics on `boom`, succeeds elsewhere.
    struct ScriptedStrategy {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ExtractionStrategy for ScriptedStrategy {
        fn family(&self) -> &'static str {
            "scripted"
        }

        async fn enumerate_item_urls(&self, _session: &mut dyn PageSession) -> Result<Vec<String>> {
            Ok(vec![
                "https://roastery.example/products/flaky".to_string(),
                "https://roastery.example/products/boom".to_string(),
                "https://roastery.example/products/kenya".to_string(),
            ])
        }

        async fn extract_item(
            &self,
            _session: &mut dyn PageSession,
            url: &str,
        ) -> Result<Option<ProductRecord>> {
            if url.ends_with("flaky") {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                return Err(CrawlerError::extraction(url, "timeout"));
            }
            if url.ends_with("boom") {
                panic!("selector exploded");
            }
            let mut record = ProductRecord::new(url, "test-roastery", "Test Roastery", "Kenya AA");
            record.origin = Some("Kenya".to_string());
            record.tasting_notes = vec!["Blackcurrant".to_string()];
            record.label_image = Some("https://roastery.example/label.png".to_string());
            Ok(Some(record))
        }
    }

    fn runner(dir: &TempDir, sessions: Arc<dyn SessionFactory>) -> CrawlSessionRunner<LocalStorage> {
        CrawlSessionRunner::new(
            sessions,
            QualityValidator::default(),
            LocalStorage::new(dir.path()),
            "bean-crawler/test",
        )
    }

    #[tokio::test]
    async fn test_retries_and_panics_are_isolated_per_item() {
        let dir = TempDir::new().unwrap();
        let mut site = test_site("https://roastery.example", "paginated");
        site.max_retries = 2;
        let strategy = ScriptedStrategy {
            attempts: AtomicU32::new(0),
        };

        let result = runner(&dir, Arc::new(NullFactory)).crawl(&site, &strategy).await;

        assert_eq!(strategy.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(result.total_products, 3);
        assert_eq!(result.successful_products, 1);
        assert_eq!(result.failed_products, 2);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].retry_count, 2);
        assert!(result.errors[1].message.contains("selector exploded"));
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_session_failure_yields_zero_success_and_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let site = test_site("https://roastery.example", "paginated");
        let strategy = ScriptedStrategy {
            attempts: AtomicU32::new(0),
        };

        let result = runner(&dir, Arc::new(RefusingFactory)).crawl(&site, &strategy).await;

        assert!(!result.success);
        assert_eq!(result.successful_products, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("connection refused"));

        let snapshot = result.snapshot_path.expect("snapshot written");
        let saved = std::fs::read_to_string(dir.path().join(snapshot)).unwrap();
        assert_eq!(saved.trim(), "[]");
    }
}
