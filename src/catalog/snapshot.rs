//! Immutable catalog views handed to readers.

use hashbrown::HashMap;
use std::sync::Arc;

use crate::models::{Coordinate, GeoPoint, ProximityResult};
use crate::proximity;

/// One probe category with its aggregated points
#[derive(Debug, Clone)]
pub struct CategoryPoints {
    pub name: String,
    pub label: String,
    pub points: Arc<Vec<GeoPoint>>,
}

/// Normalized points of one dataset plus its raw record count
#[derive(Debug, Clone)]
pub struct DatasetPoints {
    pub records: usize,
    pub points: Arc<Vec<GeoPoint>>,
}

impl DatasetPoints {
    pub fn valid(&self) -> impl Iterator<Item = &GeoPoint> {
        self.points.iter().filter(|p| p.is_valid())
    }
}

/// Everything a reader needs at one point in time.
///
/// Snapshots are replaced wholesale; a reader holding one never observes a
/// partially updated dataset.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Some dataset has not completed its first fetch yet
    pub loading: bool,
    pub categories: Vec<CategoryPoints>,
    pub datasets: HashMap<String, DatasetPoints>,
}

impl CatalogSnapshot {
    /// Nearest distance for every category, in configuration order
    pub fn probe(&self, query: Coordinate, ceiling: f64) -> Vec<ProximityResult> {
        proximity::probe(
            query,
            self.categories
                .iter()
                .map(|c| (c.name.as_str(), c.points.as_slice())),
            ceiling,
        )
    }

    pub fn category(&self, name: &str) -> Option<&CategoryPoints> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn dataset(&self, key: &str) -> Option<&DatasetPoints> {
        self.datasets.get(key)
    }
}
