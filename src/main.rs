use std::path::PathBuf;

use clap::Parser;
use config::Config;
use serde::Deserialize;
use tracing::info;

use tvharvest::checkpoint::{CheckpointState, CheckpointStore, CHECKPOINT_FILE};
use tvharvest::{catalog, fetcher, processor};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

#[derive(Debug, Deserialize)]
struct Settings {
    catalog: CatalogConfig,
    #[serde(default)]
    storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
struct CatalogConfig {
    path: String,
}

#[derive(Debug, Deserialize)]
struct StorageConfig {
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_output_path")]
    output_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_path: default_output_path(),
        }
    }
}

fn default_work_dir() -> String {
    std::env::temp_dir().join("tvharvest").to_string_lossy().into_owned()
}

fn default_output_path() -> String {
    "matched_channels.json".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let settings = Config::builder()
        .add_source(config::File::with_name(&args.config))
        .build()?;
    let settings: Settings = settings.try_deserialize()?;

    info!("Configuration loaded from {}: {:?}", args.config, settings);

    let catalog_path = PathBuf::from(&settings.catalog.path);
    let catalog = catalog::load(&catalog_path)?;
    info!(
        "Catalog loaded: {} channels, {} subscription urls",
        catalog.channel_count(),
        catalog.subscribe_urls.len()
    );

    if catalog.subscribe_urls.is_empty() {
        info!("Catalog declares no subscription urls, nothing to do");
        return Ok(());
    }

    let work_dir = PathBuf::from(&settings.storage.work_dir);
    tokio::fs::create_dir_all(&work_dir).await?;
    let output_path = PathBuf::from(&settings.storage.output_path);

    // Download phase runs exactly once; the marker suppresses re-downloading.
    let fetched = if fetcher::marker_exists(&work_dir).await {
        info!("Download marker present, reusing fetched subscriptions");
        fetcher::list_fetched_files(&work_dir).await?
    } else {
        let urls: Vec<String> = catalog
            .subscribe_urls
            .iter()
            .map(|entry| entry.url().to_string())
            .collect();
        let client = fetcher::build_client()?;
        fetcher::download_all(&client, &urls, &work_dir).await?
    };

    let checkpoint_path = work_dir.join(CHECKPOINT_FILE);
    match CheckpointStore::load(&checkpoint_path)? {
        CheckpointState::Missing => {
            info!("No checkpoint found, starting a fresh run");
            CheckpointStore::create(&checkpoint_path, &catalog, &fetched).save()?;
        }
        CheckpointState::Exhausted => {
            info!("Checkpoint exhausted, reinitializing (a re-run reprocesses every channel)");
            CheckpointStore::create(&checkpoint_path, &catalog, &fetched).save()?;
        }
        CheckpointState::Active(store) => {
            info!("Resuming: {} channels still pending", store.pending_count());
        }
    }

    processor::drain(&catalog, &work_dir, &output_path).await?;

    info!("All channels processed, output at {}", output_path.display());
    Ok(())
}
