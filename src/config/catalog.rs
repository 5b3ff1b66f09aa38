use crate::config::site::SiteConfig;
use crate::utils::error::{CrawlerError, Result};
use crate::utils::validation::{validate_path, validate_positive_number, validate_range, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// The site catalog: run-wide settings plus every site, grouped by region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCatalog {
    #[serde(default)]
    pub crawler: CrawlerSettings,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub regions: Vec<RegionGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionGroup {
    pub name: String,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    pub output_dir: String,
    pub inter_site_delay_ms: u64,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub min_quality_score: u8,
    pub batch_size: usize,
    pub checkpoint_file: String,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            output_dir: "./output".to_string(),
            inter_site_delay_ms: 3000,
            user_agent: concat!("bean-crawler/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 30,
            min_quality_score: crate::core::validator::DEFAULT_MIN_SCORE,
            batch_size: 10,
            checkpoint_file: "checkpoint.json".to_string(),
        }
    }
}

impl CrawlerSettings {
    pub fn inter_site_delay(&self) -> Duration {
        Duration::from_millis(self.inter_site_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Connection settings for the persistent product store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://bean_crawler.db".to_string(),
            max_connections: 5,
            connect_timeout_secs: 5,
        }
    }
}

impl SiteCatalog {
    /// 從 TOML 檔案載入站點目錄
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CrawlerError::config(format!(
                "cannot read site catalog {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut catalog: SiteCatalog = toml::from_str(&processed_content)
            .map_err(|e| CrawlerError::config(format!("TOML parsing error: {}", e)))?;

        for group in &mut catalog.regions {
            for site in &mut group.sites {
                if site.region.is_none() {
                    site.region = Some(group.name.clone());
                }
            }
        }

        Ok(catalog)
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| CrawlerError::config(format!("invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// All configured sites in catalog order, active or not.
    pub fn all_sites(&self) -> impl Iterator<Item = &SiteConfig> {
        self.regions.iter().flat_map(|group| group.sites.iter())
    }

    pub fn active_sites(&self) -> Vec<SiteConfig> {
        self.all_sites().filter(|site| site.is_active).cloned().collect()
    }

    pub fn find_active(&self, site_id: &str) -> Option<&SiteConfig> {
        self.all_sites()
            .find(|site| site.id == site_id && site.is_active)
    }

    pub fn validate_catalog(&self) -> Result<()> {
        validate_path("crawler.output_dir", &self.crawler.output_dir)?;
        validate_path("crawler.checkpoint_file", &self.crawler.checkpoint_file)?;
        validate_positive_number("crawler.batch_size", self.crawler.batch_size, 1)?;
        validate_range(
            "crawler.min_quality_score",
            self.crawler.min_quality_score,
            0,
            100,
        )?;
        validate_positive_number(
            "store.max_connections",
            self.store.max_connections as usize,
            1,
        )?;

        if self.all_sites().next().is_none() {
            return Err(CrawlerError::MissingConfigError {
                field: "regions.sites".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for site in self.all_sites() {
            site.validate_site()?;
            if !seen.insert(site.id.as_str()) {
                return Err(CrawlerError::InvalidConfigValueError {
                    field: "sites.id".to_string(),
                    value: site.id.clone(),
                    reason: "Duplicate site id".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for SiteCatalog {
    fn validate(&self) -> Result<()> {
        self.validate_catalog()
    }
}
