pub mod catalog;
pub mod site;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "bean-crawler")]
#[command(about = "Crawls coffee retailers into a deduplicated product store")]
pub struct CliConfig {
    /// Path to the TOML site catalog
    #[arg(short, long, default_value = "sites.toml")]
    pub config: String,

    /// Override crawler.output_dir from the catalog
    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    /// Keep reconciled records in memory instead of the configured store
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Crawl every active site, or only --site
    Run {
        #[arg(long)]
        site: Option<String>,
    },
    /// List active sites
    List,
    /// Crawl all sites, then split output into checkpointed batches
    Batch,
    /// Delete historical duplicate rows from the store
    Cleanup,
    /// Print store statistics
    Stats,
}
