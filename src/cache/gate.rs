//! Cache gate: local store first, network second, never fatal.

use tracing::{debug, info, warn};

use super::DatasetCache;
use crate::config::DatasetConfig;
use crate::models::{Dataset, RawRecord};
use crate::source::DatasetSource;

/// Loads datasets through the persistent cache.
///
/// A fetch failure yields an empty dataset: the affected categories simply
/// contribute no points.
pub struct CacheGate<S> {
    source: S,
    cache: DatasetCache,
}

impl<S: DatasetSource> CacheGate<S> {
    pub fn new(source: S, cache: DatasetCache) -> Self {
        Self { source, cache }
    }

    /// Cached copy if present and parseable, otherwise fetch and persist.
    pub async fn load(&self, dataset: &DatasetConfig) -> Dataset {
        if let Some(records) = self.cached(dataset) {
            debug!(
                "Cache hit for '{}' ({} records)",
                dataset.cache_key,
                records.len()
            );
            return Dataset::new(&dataset.key, records);
        }

        match self.fetch_and_store(dataset).await {
            Some(records) => Dataset::new(&dataset.key, records),
            None => Dataset::empty(&dataset.key),
        }
    }

    /// Fetch regardless of the cache; keep the cached copy if the fetch fails.
    pub async fn refresh(&self, dataset: &DatasetConfig) -> Dataset {
        if let Some(records) = self.fetch_and_store(dataset).await {
            return Dataset::new(&dataset.key, records);
        }

        match self.cached(dataset) {
            Some(records) => {
                info!(
                    "Refresh of '{}' failed; keeping {} cached records",
                    dataset.key,
                    records.len()
                );
                Dataset::new(&dataset.key, records)
            }
            None => Dataset::empty(&dataset.key),
        }
    }

    /// Drop the cached copy of a dataset
    pub fn invalidate(&self, dataset: &DatasetConfig) -> bool {
        match self.cache.remove(&dataset.cache_key) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to invalidate '{}': {}", dataset.cache_key, e);
                false
            }
        }
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    fn cached(&self, dataset: &DatasetConfig) -> Option<Vec<RawRecord>> {
        match self.cache.get(&dataset.cache_key) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring unreadable cache entry: {}", e);
                None
            }
        }
    }

    async fn fetch_and_store(&self, dataset: &DatasetConfig) -> Option<Vec<RawRecord>> {
        let records = match self.source.fetch(&dataset.endpoint).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Dataset '{}' unavailable: {}", dataset.key, e);
                return None;
            }
        };

        if let Err(e) = self.cache.put(&dataset.cache_key, &records) {
            warn!("Failed to persist '{}': {}", dataset.cache_key, e);
        }

        info!(
            "Fetched {} records for '{}'",
            records.len(),
            dataset.key
        );
        Some(records)
    }
}
