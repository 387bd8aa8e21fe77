//! Cache warmer.
//!
//! Fetches every configured dataset through the cache gate so the server can
//! start from a populated cache.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use proxmap::cache::{CacheGate, DatasetCache};
use proxmap::config::{Config, DatasetConfig};
use proxmap::normalize::normalize_records;
use proxmap::source::HttpSource;

#[derive(Parser, Debug)]
#[command(name = "warm")]
#[command(about = "Populate the dataset cache")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "proxmap.toml")]
    config: PathBuf,

    /// Refetch datasets even when a cached copy exists
    #[arg(long)]
    refresh: bool,

    /// Drop cached copies first; a failed fetch then leaves the dataset empty
    #[arg(long, conflicts_with = "refresh")]
    invalidate: bool,

    /// Only warm these datasets (comma-separated keys)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Override the cache directory from the config
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(dir) = args.cache_dir {
        config.cache.path = dir;
    }

    let selected: Vec<DatasetConfig> = if args.only.is_empty() {
        config.datasets.clone()
    } else {
        for key in &args.only {
            if config.dataset(key).is_none() {
                bail!("Unknown dataset '{}'", key);
            }
        }
        config
            .datasets
            .iter()
            .filter(|d| args.only.contains(&d.key))
            .cloned()
            .collect()
    };

    info!("Opening dataset cache at {}", config.cache.path.display());
    let cache = DatasetCache::open(&config.cache.path)
        .with_context(|| format!("Failed to open cache at {}", config.cache.path.display()))?;
    let gate = CacheGate::new(HttpSource::new(&config.source)?, cache);

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut empty = 0;
    for dataset in &selected {
        pb.set_message(dataset.key.clone());

        if args.invalidate && gate.invalidate(dataset) {
            info!("Dropped cached copy of '{}'", dataset.key);
        }

        let loaded = if args.refresh {
            gate.refresh(dataset).await
        } else {
            gate.load(dataset).await
        };

        let mapping = config
            .mapping(&dataset.mapping)
            .with_context(|| format!("Unknown mapping '{}'", dataset.mapping))?;
        let valid = normalize_records(&loaded.records, &mapping)
            .iter()
            .filter(|p| p.is_valid())
            .count();

        if loaded.is_empty() {
            empty += 1;
            warn!("Dataset '{}' is empty", dataset.key);
        }
        pb.println(format!(
            "{:<24} {:>7} records {:>7} valid points",
            dataset.key,
            loaded.len(),
            valid
        ));
        pb.inc(1);
    }

    pb.finish_with_message("done");

    gate.cache().flush().context("Failed to flush cache")?;

    info!(
        "Warmed {} datasets ({} empty)",
        selected.len(),
        empty
    );

    Ok(())
}
