pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{HttpSessionFactory, LocalStorage, MemoryProductStore, SqliteProductStore};
pub use config::catalog::{SiteCatalog, StoreConfig};
pub use config::site::SiteConfig;
pub use core::{BatchRunner, CrawlSessionRunner, Orchestrator, QualityValidator, StorageReconciler};
pub use domain::model::{CrawlError, CrawlResult, ProductRecord, RunReport};
pub use utils::error::{CrawlerError, Result};
