use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a record came from. Only the crawler writes `Crawled`; the other
/// variants are produced by downstream tools sharing the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    #[default]
    Crawled,
    Manual,
    Feedback,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawled => "crawled",
            Self::Manual => "manual",
            Self::Feedback => "feedback",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "manual" => Self::Manual,
            "feedback" => Self::Feedback,
            _ => Self::Crawled,
        }
    }
}

/// Canonical product record. `source_url` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub source_url: String,
    pub site_id: String,
    pub site_name: String,
    pub name: String,
    pub origin: Option<String>,
    pub region: Option<String>,
    pub variety: Option<String>,
    pub processing: Option<String>,
    pub roast_level: Option<String>,
    #[serde(default)]
    pub tasting_notes: Vec<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub label_image: Option<String>,
    pub crawled_at: DateTime<Utc>,
    #[serde(default)]
    pub source: RecordSource,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub quality_score: u8,
}

impl ProductRecord {
    pub fn new(
        source_url: impl Into<String>,
        site_id: impl Into<String>,
        site_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            site_id: site_id.into(),
            site_name: site_name.into(),
            name: name.into(),
            origin: None,
            region: None,
            variety: None,
            processing: None,
            roast_level: None,
            tasting_notes: Vec::new(),
            price: None,
            currency: None,
            image_urls: Vec::new(),
            label_image: None,
            crawled_at: Utc::now(),
            source: RecordSource::Crawled,
            verified: false,
            quality_score: 0,
        }
    }
}

/// A failure scoped to one candidate URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlError {
    pub url: String,
    pub message: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl CrawlError {
    pub fn new(url: impl Into<String>, message: impl Into<String>, retry_count: u32) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            retry_count,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one site run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub site_id: String,
    pub site_name: String,
    pub total_products: usize,
    pub successful_products: usize,
    pub failed_products: usize,
    pub rejected_products: usize,
    pub errors: Vec<CrawlError>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub snapshot_path: Option<String>,
    #[serde(skip)]
    pub products: Vec<ProductRecord>,
}

impl CrawlResult {
    pub fn new(site_id: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            site_name: site_name.into(),
            total_products: 0,
            successful_products: 0,
            failed_products: 0,
            rejected_products: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
            success: false,
            snapshot_path: None,
            products: Vec::new(),
        }
    }

    /// A result for a site whose run never got past setup.
    pub fn failed(site_id: &str, site_name: &str, url: &str, message: impl Into<String>) -> Self {
        let mut result = Self::new(site_id, site_name);
        result.errors.push(CrawlError::new(url, message, 0));
        result
    }

    /// Recomputes the derived counters after the item loop. `failed_products`
    /// is counted per item as it fails; rejections are not failures.
    pub fn finish(&mut self) {
        self.successful_products = self.products.len();
        self.success = self.successful_products > 0;
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileError {
    pub source_url: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub inserted_count: usize,
    pub updated_count: usize,
    pub errors: Vec<ReconcileError>,
}

/// Aggregate across all sites of one orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_sites: usize,
    pub successful_sites: usize,
    pub total_products: usize,
    pub successful_products: usize,
    pub failed_products: usize,
    pub total_errors: usize,
    pub results: Vec<CrawlResult>,
    pub snapshot_path: Option<String>,
    pub reconciliation: Option<ReconcileSummary>,
}

impl RunReport {
    pub fn from_results(started_at: DateTime<Utc>, results: Vec<CrawlResult>) -> Self {
        let finished_at = Utc::now();
        Self {
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            total_sites: results.len(),
            successful_sites: results.iter().filter(|r| r.success).count(),
            total_products: results.iter().map(|r| r.total_products).sum(),
            successful_products: results.iter().map(|r| r.successful_products).sum(),
            failed_products: results.iter().map(|r| r.failed_products).sum(),
            total_errors: results.iter().map(|r| r.errors.len()).sum(),
            results,
            snapshot_path: None,
            reconciliation: None,
        }
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductRecord> {
        self.results.iter().flat_map(|r| r.products.iter())
    }
}

/// Per-site batching progress, persisted between processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub total_products: usize,
    pub completed_products: usize,
    pub current_batch: usize,
    pub errors: usize,
    pub start_time: DateTime<Utc>,
    pub last_checkpoint: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            total_products: 0,
            completed_products: 0,
            current_batch: 0,
            errors: 0,
            start_time: now,
            last_checkpoint: now,
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted row: the record plus store-managed timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub record: ProductRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: i64,
    pub by_site: BTreeMap<String, i64>,
    pub by_origin: BTreeMap<String, i64>,
    pub crawled_last_hour: i64,
}
