use bean_crawler::core::ProductStore;
use bean_crawler::domain::model::{RunReport, StoreStats};
use bean_crawler::utils::error::{CrawlerError, ErrorSeverity};
use bean_crawler::utils::{logger, validation::Validate};
use bean_crawler::{
    BatchRunner, CliConfig, Command, CrawlSessionRunner, HttpSessionFactory, LocalStorage,
    MemoryProductStore, Orchestrator, QualityValidator, SiteCatalog, SqliteProductStore,
    StorageReconciler,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting bean-crawler");
    tracing::info!("📁 Loading site catalog from: {}", cli.config);

    let mut catalog = match SiteCatalog::from_file(&cli.config) {
        Ok(catalog) => catalog,
        Err(e) => exit_with(&e),
    };
    if let Some(output_dir) = &cli.output_dir {
        catalog.crawler.output_dir = output_dir.clone();
    }

    // 驗證配置
    if let Err(e) = catalog.validate() {
        tracing::error!("❌ Site catalog validation failed: {}", e);
        exit_with(&e);
    }

    if let Err(e) = execute(&cli, catalog).await {
        tracing::error!(
            "❌ bean-crawler failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        exit_with(&e);
    }

    Ok(())
}

async fn execute(cli: &CliConfig, catalog: SiteCatalog) -> bean_crawler::Result<()> {
    let store: Arc<dyn ProductStore> = if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - records are reconciled in memory only");
        Arc::new(MemoryProductStore::new())
    } else {
        Arc::new(SqliteProductStore::connect(&catalog.store)?)
    };
    let reconciler = StorageReconciler::new(store);

    match &cli.command {
        Command::List => {
            print_sites(&catalog);
            Ok(())
        }
        Command::Cleanup => {
            require_store(&reconciler).await?;
            let deleted = reconciler.cleanup_duplicates().await?;
            println!("🧹 Removed {} duplicate rows", deleted);
            Ok(())
        }
        Command::Stats => {
            require_store(&reconciler).await?;
            print_stats(&reconciler.stats().await?);
            Ok(())
        }
        Command::Run { site } => {
            let storage = LocalStorage::new(&catalog.crawler.output_dir);
            let orchestrator = build_orchestrator(catalog, storage, reconciler);

            match site {
                Some(site_id) => {
                    let result = orchestrator.run_one(site_id).await?.ok_or_else(|| {
                        CrawlerError::InvalidConfigValueError {
                            field: "--site".to_string(),
                            value: site_id.clone(),
                            reason: "no active site with a known family has this id".to_string(),
                        }
                    })?;
                    println!(
                        "✅ {}: {}/{} products accepted, {} rejected, {} errors",
                        result.site_name,
                        result.successful_products,
                        result.total_products,
                        result.rejected_products,
                        result.errors.len()
                    );
                }
                None => print_report(&orchestrator.run_all().await?),
            }
            Ok(())
        }
        Command::Batch => {
            let storage = LocalStorage::new(&catalog.crawler.output_dir);
            let batch_size = catalog.crawler.batch_size;
            let checkpoint_file = catalog.crawler.checkpoint_file.clone();
            let orchestrator = build_orchestrator(catalog, storage.clone(), reconciler);

            let mut batches = BatchRunner::load(storage, batch_size, checkpoint_file).await;
            let report = batches.run(&orchestrator).await?;
            print_report(&report);
            for (site_id, checkpoint) in batches.checkpoints() {
                println!(
                    "📦 {}: {} completed of {} seen, {} batches, {} errors",
                    site_id,
                    checkpoint.completed_products,
                    checkpoint.total_products,
                    checkpoint.current_batch,
                    checkpoint.errors
                );
            }
            Ok(())
        }
    }
}

fn build_orchestrator(
    catalog: SiteCatalog,
    storage: LocalStorage,
    reconciler: StorageReconciler,
) -> Orchestrator<LocalStorage> {
    let settings = &catalog.crawler;
    let sessions = Arc::new(HttpSessionFactory::new(
        settings.user_agent.as_str(),
        settings.request_timeout(),
    ));
    let runner = CrawlSessionRunner::new(
        sessions,
        QualityValidator::new(settings.min_quality_score),
        storage,
        settings.user_agent.as_str(),
    );
    Orchestrator::new(catalog, runner, Some(reconciler))
}

async fn require_store(reconciler: &StorageReconciler) -> bean_crawler::Result<()> {
    if reconciler.prepare().await {
        Ok(())
    } else {
        Err(CrawlerError::StoreUnavailableError {
            message: "the product store did not respond".to_string(),
        })
    }
}

fn print_sites(catalog: &SiteCatalog) {
    let sites = catalog.active_sites();
    println!("📋 {} active sites", sites.len());
    for site in sites {
        println!(
            "  {:<24} {:<28} {:<12} {:<10} {}",
            site.id,
            site.name,
            site.site_type,
            site.region.as_deref().unwrap_or("-"),
            site.base_url
        );
    }
}

fn print_report(report: &RunReport) {
    println!("✅ Crawl completed in {} ms", report.duration_ms);
    println!(
        "   Sites: {}/{} successful",
        report.successful_sites, report.total_sites
    );
    println!(
        "   Products: {} accepted, {} failed, {} errors",
        report.successful_products, report.failed_products, report.total_errors
    );
    if let Some(path) = &report.snapshot_path {
        println!("📁 Records saved to: {}", path);
    }
    match &report.reconciliation {
        Some(summary) => println!(
            "💾 Store: {} inserted, {} updated, {} failed",
            summary.inserted_count,
            summary.updated_count,
            summary.errors.len()
        ),
        None => println!("⚠️ Store was not updated; the local snapshot is the durable output"),
    }
}

fn print_stats(stats: &StoreStats) {
    println!("📊 {} products ({} crawled in the last hour)", stats.total, stats.crawled_last_hour);
    println!("   By site:");
    for (site, count) in &stats.by_site {
        println!("     {:<24} {}", site, count);
    }
    println!("   By origin:");
    for (origin, count) in &stats.by_origin {
        println!("     {:<24} {}", origin, count);
    }
}

fn exit_with(e: &CrawlerError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
