use crate::domain::model::{
    ProductRecord, ReconcileError, ReconcileSummary, StoreStats, StoredProduct,
};
use crate::domain::ports::ProductStore;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum Upserted {
    Inserted,
    Updated,
}

/// Upserts records into a [`ProductStore`] keyed by `source_url`.
#[derive(Clone)]
pub struct StorageReconciler {
    store: Arc<dyn ProductStore>,
}

impl StorageReconciler {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// Connectivity pre-check plus schema setup. `false` means reconciliation
    /// should be skipped and the local snapshot stands.
    pub async fn prepare(&self) -> bool {
        if let Err(e) = self.store.test_connection().await {
            warn!("⚠️ Product store unreachable, keeping local snapshot only: {}", e);
            return false;
        }
        if let Err(e) = self.store.ensure_schema().await {
            warn!("⚠️ Could not prepare product store schema: {}", e);
            return false;
        }
        true
    }

    pub async fn test_connection(&self) -> Result<()> {
        self.store.test_connection().await
    }

    /// Each record is reconciled independently; failures are collected, never raised.
    pub async fn upsert_all(&self, records: &[ProductRecord]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for record in records {
            match self.upsert(record).await {
                Ok(Upserted::Inserted) => summary.inserted_count += 1,
                Ok(Upserted::Updated) => summary.updated_count += 1,
                Err(e) => {
                    warn!(url = %record.source_url, "Failed to persist record: {}", e);
                    summary.errors.push(ReconcileError {
                        source_url: record.source_url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            inserted = summary.inserted_count,
            updated = summary.updated_count,
            errors = summary.errors.len(),
            "Reconciled {} records",
            records.len()
        );
        summary
    }

    async fn upsert(&self, record: &ProductRecord) -> Result<Upserted> {
        match self.store.find_by_source_url(&record.source_url).await? {
            Some(existing) => {
                debug!(url = %record.source_url, id = %existing.record.id, "Updating");
                self.store.update(&existing.record.id, record).await?;
                Ok(Upserted::Updated)
            }
            None => {
                debug!(url = %record.source_url, "Inserting");
                self.store.insert(record).await?;
                Ok(Upserted::Inserted)
            }
        }
    }

    /// Deletes all but the most recently created row per `source_url`,
    /// returning how many rows were removed.
    pub async fn cleanup_duplicates(&self) -> Result<usize> {
        let rows = self.store.list_all().await?;
        let doomed = duplicate_ids(&rows);
        if doomed.is_empty() {
            info!("No duplicate rows found");
            return Ok(0);
        }

        let deleted = self.store.delete(&doomed).await? as usize;
        info!("🧹 Removed {} duplicate rows", deleted);
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }
}

/// Ids to drop: for each `source_url`, everything except the newest row.
/// Rows arrive in insertion order, so equal timestamps keep the later row.
fn duplicate_ids(rows: &[StoredProduct]) -> Vec<String> {
    let mut survivors: HashMap<&str, &StoredProduct> = HashMap::new();
    for row in rows {
        let keep = survivors
            .get(row.record.source_url.as_str())
            .map_or(true, |current| row.created_at >= current.created_at);
        if keep {
            survivors.insert(&row.record.source_url, row);
        }
    }

    rows.iter()
        .filter(|row| {
            survivors
                .get(row.record.source_url.as_str())
                .is_some_and(|kept| kept.record.id != row.record.id)
        })
        .map(|row| row.record.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryProductStore;
    use crate::utils::error::CrawlerError;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Delegates to a memory store but refuses to insert one URL.
    struct RefusingStore {
        inner: MemoryProductStore,
        refused_url: String,
    }

    #[async_trait]
    impl ProductStore for RefusingStore {
        async fn test_connection(&self) -> Result<()> {
            self.inner.test_connection().await
        }

        async fn ensure_schema(&self) -> Result<()> {
            self.inner.ensure_schema().await
        }

        async fn find_by_source_url(&self, source_url: &str) -> Result<Option<StoredProduct>> {
            self.inner.find_by_source_url(source_url).await
        }

        async fn insert(&self, record: &ProductRecord) -> Result<()> {
            if record.source_url == self.refused_url {
                return Err(CrawlerError::PersistenceError {
                    source_url: record.source_url.clone(),
                    message: "disk I/O error".to_string(),
                });
            }
            self.inner.insert(record).await
        }

        async fn update(&self, id: &str, record: &ProductRecord) -> Result<()> {
            self.inner.update(id, record).await
        }

        async fn list_all(&self) -> Result<Vec<StoredProduct>> {
            self.inner.list_all().await
        }

        async fn delete(&self, ids: &[String]) -> Result<u64> {
            self.inner.delete(ids).await
        }

        async fn stats(&self) -> Result<StoreStats> {
            self.inner.stats().await
        }
    }

    fn stored(url: &str, name: &str, age_minutes: i64) -> StoredProduct {
        StoredProduct {
            record: ProductRecord::new(url, "roastery", "Roastery", name),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = Arc::new(MemoryProductStore::new());
        let reconciler = StorageReconciler::new(store.clone());
        let records = vec![
            ProductRecord::new("https://r.example/p/1", "r", "R", "Kenya AA"),
            ProductRecord::new("https://r.example/p/2", "r", "R", "Brazil Cerrado"),
        ];

        let first = reconciler.upsert_all(&records).await;
        assert_eq!((first.inserted_count, first.updated_count), (2, 0));

        let second = reconciler.upsert_all(&records).await;
        assert_eq!((second.inserted_count, second.updated_count), (0, 2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_same_url_collapses_to_latest_values() {
        let store = Arc::new(MemoryProductStore::new());
        let reconciler = StorageReconciler::new(store.clone());
        let records = vec![
            ProductRecord::new("https://r.example/p/1", "r", "R", "Kenya AA"),
            ProductRecord::new("https://r.example/p/1", "r", "R", "Kenya AA Kiambu"),
        ];

        let summary = reconciler.upsert_all(&records).await;
        assert_eq!((summary.inserted_count, summary.updated_count), (1, 1));

        let rows = store.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.name, "Kenya AA Kiambu");
        assert_eq!(rows[0].record.id, records[0].id);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_newest_per_url() {
        let rows = vec![
            stored("https://r.example/p/1", "old", 30),
            stored("https://r.example/p/1", "newest", 1),
            stored("https://r.example/p/1", "middle", 10),
            stored("https://r.example/p/2", "only", 5),
        ];
        let store = Arc::new(MemoryProductStore::with_rows(rows));
        let reconciler = StorageReconciler::new(store.clone());

        assert_eq!(reconciler.cleanup_duplicates().await.unwrap(), 2);

        let mut names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.record.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["newest", "only"]);
        assert_eq!(reconciler.cleanup_duplicates().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_one_failed_write_does_not_stop_the_batch() {
        let store = Arc::new(RefusingStore {
            inner: MemoryProductStore::new(),
            refused_url: "https://r.example/p/2".to_string(),
        });
        let reconciler = StorageReconciler::new(store.clone());
        let records = vec![
            ProductRecord::new("https://r.example/p/1", "r", "R", "Kenya AA"),
            ProductRecord::new("https://r.example/p/2", "r", "R", "Brazil Cerrado"),
            ProductRecord::new("https://r.example/p/3", "r", "R", "Colombia Huila"),
        ];

        let summary = reconciler.upsert_all(&records).await;

        assert_eq!(summary.inserted_count, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].source_url, "https://r.example/p/2");
        assert!(summary.errors[0].message.contains("disk I/O error"));

        let urls: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.record.source_url)
            .collect();
        assert_eq!(urls, vec!["https://r.example/p/1", "https://r.example/p/3"]);
    }

    #[tokio::test]
    async fn test_offline_store_skips_reconciliation() {
        let reconciler = StorageReconciler::new(Arc::new(MemoryProductStore::offline()));
        assert!(!reconciler.prepare().await);
        assert!(reconciler.test_connection().await.is_err());
    }
}
