#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ps3_update_collector_lib::application::{FetchProgress, UpdateCollector};
use ps3_update_collector_lib::infrastructure::config::{AppConfig, ConfigManager};
use ps3_update_collector_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use ps3_update_collector_lib::infrastructure::retry_policy::RetryPolicy;
use ps3_update_collector_lib::infrastructure::{output, CatalogScraper, HttpClient};

/// Collect PS3 title updates for every entry of the catalog listing
#[derive(Parser, Debug)]
#[command(name = "ps3-update-collector", version, about)]
struct Cli {
    /// Config file (JSON/TOML/YAML); defaults to the per-user config when present
    #[arg(short, long, env = "TITLE_UPDATES_CONFIG")]
    config: Option<PathBuf>,

    /// Use a previously saved catalog instead of scraping
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Save the scraped catalog here before collecting
    #[arg(long)]
    save_catalog: Option<PathBuf>,

    /// First listing page to scrape
    #[arg(long)]
    start_page: Option<u32>,

    /// Last listing page to scrape
    #[arg(long)]
    pages: Option<u32>,

    /// Concurrent manifest fetches
    #[arg(short, long)]
    workers: Option<usize>,

    /// Merged output (JSON array)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimal {title, version, url} export
    #[arg(long)]
    downloads_output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write the effective configuration to the per-user config file and exit
    #[arg(long)]
    init_config: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(start_page) = self.start_page {
            config.catalog.start_page = start_page;
        }
        if let Some(pages) = self.pages {
            config.catalog.total_pages = pages;
        }
        if let Some(workers) = self.workers {
            config.fetch.workers = workers;
        }
        if let Some(output) = &self.output {
            config.output.updates_path = output.clone();
        }
        if let Some(downloads) = &self.downloads_output {
            config.output.downloads_path = Some(downloads.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(Some(path.as_path()))?,
        None => ConfigManager::new()?.load_config()?,
    };
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Logs a line every few completed titles
fn spawn_progress_logger(mut rx: mpsc::UnboundedReceiver<FetchProgress>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event.completed % 25 == 0 || event.completed == event.total {
                info!(
                    "📈 Manifests: {}/{} (last: {} {})",
                    event.completed, event.total, event.title_id, event.class
                );
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;

    if cli.init_config {
        let manager = ConfigManager::new()?;
        manager.save_config(&config).await?;
        println!("Configuration written to {}", manager.config_path.display());
        return Ok(());
    }

    init_logging_with_config(config.logging.clone())?;
    log_system_info();

    let client = Arc::new(HttpClient::new(config.fetch.clone())?);

    let catalog = match &cli.catalog {
        Some(path) => output::read_catalog(path).await?,
        None => {
            let scraper = CatalogScraper::new(
                Arc::clone(&client),
                config.catalog.clone(),
                RetryPolicy::from(&config.fetch),
            )?;
            scraper.scrape_all().await
        }
    };
    if let Some(path) = &cli.save_catalog {
        output::write_json(path, &catalog).await?;
        info!("💾 Catalog saved to {}", path.display());
    }

    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let progress_task = spawn_progress_logger(progress_rx);
    let collector = UpdateCollector::new(Arc::clone(&client), &config)?.with_progress(progress_tx);

    let report = tokio::select! {
        report = collector.collect(catalog) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 Interrupted, nothing written");
            return Ok(());
        }
    };
    drop(collector);
    if let Err(e) = progress_task.await {
        warn!("Progress logger task failed: {}", e);
    }

    output::write_merged(&config.output.updates_path, &report.merged).await?;
    if let Some(path) = &config.output.downloads_path {
        output::write_downloads(path, &report.merged).await?;
    }
    report.log_summary();

    Ok(())
}
