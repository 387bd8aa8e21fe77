//! Dataset catalog with a generation-token stale-write guard.

use anyhow::{Context, Result};
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::{Aggregator, CatalogSnapshot, CategoryPoints, DatasetPoints};
use crate::config::{Config, DatasetConfig};
use crate::models::Dataset;
use crate::normalize::{normalize_records, FieldMapping};

/// Ticket for one fetch of one dataset.
///
/// Only the most recently issued token of a dataset may apply its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchToken {
    pub key: String,
    generation: u64,
}

/// Owns every dataset and the category aggregation built from them.
pub struct Catalog {
    datasets: Vec<DatasetConfig>,
    mappings: HashMap<String, FieldMapping>,
    issued: HashMap<String, u64>,
    awaiting_first: HashSet<String>,
    record_counts: HashMap<String, usize>,
    aggregator: Aggregator,
}

impl Catalog {
    pub fn new(config: &Config) -> Result<Self> {
        let mut mappings = HashMap::new();
        for dataset in &config.datasets {
            let mapping = config.mapping(&dataset.mapping).with_context(|| {
                format!(
                    "Dataset '{}' uses unknown mapping '{}'",
                    dataset.key, dataset.mapping
                )
            })?;
            mappings.insert(dataset.key.clone(), mapping);
        }

        Ok(Self {
            datasets: config.datasets.clone(),
            mappings,
            issued: HashMap::new(),
            awaiting_first: config.datasets.iter().map(|d| d.key.clone()).collect(),
            record_counts: HashMap::new(),
            aggregator: Aggregator::new(config.categories.clone()),
        })
    }

    pub fn datasets(&self) -> &[DatasetConfig] {
        &self.datasets
    }

    pub fn dataset(&self, key: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.key == key)
    }

    /// Issue a new token for `key`, superseding any fetch still in flight.
    pub fn begin_fetch(&mut self, key: &str) -> Option<FetchToken> {
        self.dataset(key)?;
        let generation = self.issued.entry(key.to_string()).or_insert(0);
        *generation += 1;
        Some(FetchToken {
            key: key.to_string(),
            generation: *generation,
        })
    }

    /// Apply a fetch result. Returns `false` when the token was superseded.
    pub fn apply(&mut self, token: &FetchToken, dataset: Dataset) -> bool {
        if self.issued.get(&token.key) != Some(&token.generation) {
            debug!(
                "Dropping stale result for '{}' (generation {})",
                token.key, token.generation
            );
            return false;
        }

        let Some(mapping) = self.mappings.get(&token.key) else {
            return false;
        };

        let points = normalize_records(&dataset.records, mapping);
        let valid = points.iter().filter(|p| p.is_valid()).count();
        info!(
            "Dataset '{}': {} records, {} with valid coordinates",
            token.key,
            dataset.len(),
            valid
        );

        self.record_counts.insert(token.key.clone(), dataset.len());
        self.aggregator
            .replace_dataset(&token.key, Arc::new(points));

        if self.awaiting_first.remove(&token.key) && self.awaiting_first.is_empty() {
            info!("All {} datasets loaded", self.datasets.len());
        }
        true
    }

    pub fn is_loading(&self) -> bool {
        !self.awaiting_first.is_empty()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let categories = self
            .aggregator
            .categories()
            .iter()
            .map(|c| CategoryPoints {
                name: c.name.clone(),
                label: c.label().to_string(),
                points: self.aggregator.aggregate(&c.name),
            })
            .collect();

        let datasets = self
            .datasets
            .iter()
            .filter_map(|d| {
                let points = self.aggregator.dataset(&d.key)?;
                let records = self.record_counts.get(&d.key).copied().unwrap_or(0);
                Some((d.key.clone(), DatasetPoints { records, points }))
            })
            .collect();

        CatalogSnapshot {
            loading: self.is_loading(),
            categories,
            datasets,
        }
    }
}
