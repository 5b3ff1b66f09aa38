use crate::domain::model::{ProductRecord, StoreStats, StoredProduct};
use crate::domain::ports::ProductStore;
use crate::utils::error::{CrawlerError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// In-process store for dry runs and tests. Rows keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryProductStore {
    rows: Mutex<Vec<StoredProduct>>,
    offline: bool,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with pre-existing rows, duplicates included.
    pub fn with_rows(rows: Vec<StoredProduct>) -> Self {
        Self {
            rows: Mutex::new(rows),
            offline: false,
        }
    }

    /// A store whose connectivity check always fails.
    pub fn offline() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            offline: true,
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn test_connection(&self) -> Result<()> {
        if self.offline {
            return Err(CrawlerError::StoreUnavailableError {
                message: "memory store marked offline".to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<StoredProduct>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|row| row.record.source_url == source_url)
            .max_by_key(|row| row.created_at)
            .cloned())
    }

    async fn insert(&self, record: &ProductRecord) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|row| row.record.id == record.id) {
            return Err(CrawlerError::PersistenceError {
                source_url: record.source_url.clone(),
                message: format!("duplicate id {}", record.id),
            });
        }
        rows.push(StoredProduct {
            record: record.clone(),
            created_at: Utc::now(),
            updated_at: None,
        });
        Ok(())
    }

    async fn update(&self, id: &str, record: &ProductRecord) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.record.id == id)
            .ok_or_else(|| CrawlerError::PersistenceError {
                source_url: record.source_url.clone(),
                message: format!("no row with id {}", id),
            })?;

        row.record = ProductRecord {
            id: row.record.id.clone(),
            ..record.clone()
        };
        row.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredProduct>> {
        Ok(self.rows.lock().await.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| !ids.contains(&row.record.id));
        Ok((before - rows.len()) as u64)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let rows = self.rows.lock().await;
        let since = Utc::now() - Duration::hours(1);

        let mut stats = StoreStats {
            total: rows.len() as i64,
            by_site: BTreeMap::new(),
            by_origin: BTreeMap::new(),
            crawled_last_hour: 0,
        };
        for row in rows.iter() {
            *stats.by_site.entry(row.record.site_id.clone()).or_default() += 1;
            let origin = row.record.origin.clone().unwrap_or_else(|| "Unknown".to_string());
            *stats.by_origin.entry(origin).or_default() += 1;
            if row.record.crawled_at >= since {
                stats.crawled_last_hour += 1;
            }
        }
        Ok(stats)
    }
}
