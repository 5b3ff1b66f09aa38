//! Large-scale mode: split each site's accepted records into fixed-size batch
//! files and keep per-site progress in a checkpoint that survives restarts.
//!
//! Only bookkeeping resumes; crawling itself always starts from scratch.

use crate::core::orchestrator::Orchestrator;
use crate::domain::model::{Checkpoint, CrawlResult, ProductRecord, RunReport};
use crate::domain::ports::Storage;
use crate::utils::error::{CrawlerError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use tracing::{info, warn};

pub const BATCH_DIR: &str = "batches";

/// Consecutive slices of at most `size` records, order preserved.
pub fn split_into_batches<T: Clone>(records: &[T], size: usize) -> Vec<Vec<T>> {
    records.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

pub struct BatchRunner<S: Storage> {
    storage: S,
    batch_size: usize,
    checkpoint_path: String,
    checkpoints: BTreeMap<String, Checkpoint>,
}

impl<S: Storage> BatchRunner<S> {
    /// Restores progress from `checkpoint_path`. A missing file starts empty;
    /// an unreadable or corrupt one is logged and also starts empty.
    pub async fn load(storage: S, batch_size: usize, checkpoint_path: impl Into<String>) -> Self {
        let checkpoint_path = checkpoint_path.into();
        let checkpoints = match storage.read_file(&checkpoint_path).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!("Ignoring corrupt checkpoint {}: {}", storage.locate(&checkpoint_path), e);
                BTreeMap::new()
            }),
            Err(CrawlerError::IoError(e)) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Could not read checkpoint {}: {}", storage.locate(&checkpoint_path), e);
                BTreeMap::new()
            }
        };

        if !checkpoints.is_empty() {
            info!("Resuming batch bookkeeping for {} sites", checkpoints.len());
        }

        Self {
            storage,
            batch_size,
            checkpoint_path,
            checkpoints,
        }
    }

    pub fn progress(&self, site_id: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(site_id)
    }

    pub fn checkpoints(&self) -> &BTreeMap<String, Checkpoint> {
        &self.checkpoints
    }

    /// Crawls everything, then batches each site's snapshot.
    pub async fn run<T: Storage>(&mut self, orchestrator: &Orchestrator<T>) -> Result<RunReport> {
        let report = orchestrator.run_all().await?;

        for result in &report.results {
            match self.process_site_output(result).await {
                Ok(written) => info!(site = %result.site_id, "📦 Wrote {} batch files", written),
                Err(e) => warn!(site = %result.site_id, "Batching failed: {}", e),
            }
        }
        Ok(report)
    }

    /// Reads `result`'s snapshot back, writes its batch files and persists the
    /// updated checkpoint. Returns the number of batch files written.
    pub async fn process_site_output(&mut self, result: &CrawlResult) -> Result<usize> {
        let records: Vec<ProductRecord> = match &result.snapshot_path {
            Some(path) => serde_json::from_slice(&self.storage.read_file(path).await?)?,
            None => {
                warn!(site = %result.site_id, "No snapshot to batch");
                Vec::new()
            }
        };

        let first_index = self
            .checkpoints
            .get(&result.site_id)
            .map_or(0, |checkpoint| checkpoint.current_batch)
            + 1;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");

        let batches = split_into_batches(&records, self.batch_size);
        for (offset, batch) in batches.iter().enumerate() {
            let path = format!(
                "{}/{}_batch_{:03}_{}.json",
                BATCH_DIR,
                result.site_id,
                first_index + offset,
                stamp
            );
            self.storage
                .write_file(&path, &serde_json::to_vec_pretty(batch)?)
                .await?;
        }

        let checkpoint = self.checkpoints.entry(result.site_id.clone()).or_default();
        checkpoint.total_products += result.total_products;
        checkpoint.completed_products += records.len();
        checkpoint.current_batch += batches.len();
        checkpoint.errors += result.errors.len();
        checkpoint.last_checkpoint = Utc::now();

        self.persist().await?;
        Ok(batches.len())
    }

    async fn persist(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.checkpoints)?;
        self.storage.write_file(&self.checkpoint_path, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_order_and_remainder() {
        let records: Vec<u32> = (1..=23).collect();
        let batches = split_into_batches(&records, 10);

        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![10, 10, 3]
        );
        assert_eq!(batches[2], vec![21, 22, 23]);
    }

    #[test]
    fn test_split_edge_cases() {
        assert!(split_into_batches::<u8>(&[], 10).is_empty());
        assert_eq!(split_into_batches(&[1, 2], 0).len(), 2);
    }
}
