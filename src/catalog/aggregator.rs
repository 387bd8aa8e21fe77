//! Category aggregation over normalized datasets.

use hashbrown::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::CategoryConfig;
use crate::models::GeoPoint;

/// Unions dataset points into the configured probe categories.
///
/// Combined point lists are rebuilt eagerly whenever a constituent dataset is
/// replaced, so a category never mixes in a superseded dataset version.
#[derive(Debug, Clone)]
pub struct Aggregator {
    categories: Vec<CategoryConfig>,
    datasets: HashMap<String, Arc<Vec<GeoPoint>>>,
    combined: HashMap<String, Arc<Vec<GeoPoint>>>,
}

impl Aggregator {
    pub fn new(categories: Vec<CategoryConfig>) -> Self {
        let combined = categories
            .iter()
            .map(|c| (c.name.clone(), Arc::new(Vec::new())))
            .collect();

        Self {
            categories,
            datasets: HashMap::new(),
            combined,
        }
    }

    /// Swap in a new version of a dataset and rebuild affected categories
    pub fn replace_dataset(&mut self, key: &str, points: Arc<Vec<GeoPoint>>) {
        self.datasets.insert(key.to_string(), points);

        for category in &self.categories {
            if !category.datasets.iter().any(|d| d == key) {
                continue;
            }

            let union: Vec<GeoPoint> = category
                .datasets
                .iter()
                .filter_map(|d| self.datasets.get(d))
                .flat_map(|points| points.iter().cloned())
                .collect();

            debug!(
                "Category '{}' rebuilt with {} points",
                category.name,
                union.len()
            );
            self.combined.insert(category.name.clone(), Arc::new(union));
        }
    }

    /// Points of every dataset registered under `category`, in registration
    /// order. Unknown categories are empty.
    pub fn aggregate(&self, category: &str) -> Arc<Vec<GeoPoint>> {
        self.combined
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    pub fn dataset(&self, key: &str) -> Option<Arc<Vec<GeoPoint>>> {
        self.datasets.get(key).cloned()
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }
}
