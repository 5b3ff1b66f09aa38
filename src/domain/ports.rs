use crate::config::site::SiteConfig;
use crate::domain::model::{ProductRecord, StoreStats, StoredProduct};
use crate::domain::page::Page;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Local durable artifacts (snapshots, reports, batches, checkpoints).
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Display path of an artifact, for reports and logs.
    fn locate(&self, path: &str) -> String;
}

/// The only browsing capability extraction gets: navigate and close.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<Page>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, site: &SiteConfig) -> Result<Box<dyn PageSession>>;
}

/// Per-site discovery and field extraction.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn family(&self) -> &'static str;

    /// De-duplicated item URLs, in discovery order.
    async fn enumerate_item_urls(&self, session: &mut dyn PageSession) -> Result<Vec<String>>;

    /// `Ok(None)` when the page does not look like a product at all.
    async fn extract_item(
        &self,
        session: &mut dyn PageSession,
        url: &str,
    ) -> Result<Option<ProductRecord>>;
}

/// Record-oriented persistent store keyed by `source_url`.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn test_connection(&self) -> Result<()>;
    async fn ensure_schema(&self) -> Result<()>;
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<StoredProduct>>;
    async fn insert(&self, record: &ProductRecord) -> Result<()>;
    /// Overwrites every field of row `id` except identity, stamping `updated_at`.
    async fn update(&self, id: &str, record: &ProductRecord) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<StoredProduct>>;
    async fn delete(&self, ids: &[String]) -> Result<u64>;
    async fn stats(&self) -> Result<StoreStats>;
}
