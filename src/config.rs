//! TOML configuration: data source, datasets, field mappings and categories.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::normalize::FieldMapping;
use crate::proximity::DEFAULT_CEILING_M;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub heatmap: Option<HeatmapConfig>,
    /// Named field mappings; `housing` and `facility` are built in
    #[serde(default)]
    pub mappings: BTreeMap<String, FieldMapping>,
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("proxmap-cache"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    /// Pointer must rest this long before a probe runs
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_ceiling_m")]
    pub ceiling_m: f64,
}

impl ProbeConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            ceiling_m: default_ceiling_m(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "proxmap/0.1 (facility proximity map)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeatmapConfig {
    pub dataset: String,
    #[serde(default = "default_heat_weight")]
    pub weight: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatasetConfig {
    pub key: String,
    pub endpoint: String,
    pub cache_key: String,
    #[serde(default = "default_mapping")]
    pub mapping: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Dataset keys unioned for this category, in order
    pub datasets: Vec<String>,
}

impl CategoryConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_settle_ms() -> u64 {
    200
}

fn default_ceiling_m() -> f64 {
    DEFAULT_CEILING_M
}

fn default_heat_weight() -> f64 {
    0.5
}

fn default_mapping() -> String {
    "facility".to_string()
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve a mapping by name: configured tables first, then built-ins
    pub fn mapping(&self, name: &str) -> Option<FieldMapping> {
        if let Some(mapping) = self.mappings.get(name) {
            return Some(mapping.clone());
        }
        match name {
            "housing" => Some(FieldMapping::housing()),
            "facility" => Some(FieldMapping::facility()),
            _ => None,
        }
    }

    pub fn dataset(&self, key: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.key == key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            bail!("No datasets configured");
        }
        if !(self.probe.ceiling_m > 0.0 && self.probe.ceiling_m.is_finite()) {
            bail!("probe.ceiling_m must be a positive number");
        }
        url::Url::parse(&self.source.base_url)
            .with_context(|| format!("Invalid source.base_url '{}'", self.source.base_url))?;

        let mut keys = HashSet::new();
        let mut cache_keys = HashSet::new();
        for dataset in &self.datasets {
            if !keys.insert(dataset.key.as_str()) {
                bail!("Duplicate dataset key '{}'", dataset.key);
            }
            if !cache_keys.insert(dataset.cache_key.as_str()) {
                bail!("Duplicate cache key '{}'", dataset.cache_key);
            }
            let mapping = self.mapping(&dataset.mapping).with_context(|| {
                format!(
                    "Dataset '{}' uses unknown mapping '{}'",
                    dataset.key, dataset.mapping
                )
            })?;
            if mapping.latitude.is_empty() || mapping.longitude.is_empty() {
                bail!(
                    "Mapping '{}' needs at least one latitude and longitude key",
                    dataset.mapping
                );
            }
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if !names.insert(category.name.as_str()) {
                bail!("Duplicate category '{}'", category.name);
            }
            for key in &category.datasets {
                if !keys.contains(key.as_str()) {
                    bail!(
                        "Category '{}' references unknown dataset '{}'",
                        category.name,
                        key
                    );
                }
            }
        }

        if let Some(heatmap) = &self.heatmap {
            if !keys.contains(heatmap.dataset.as_str()) {
                bail!("Heatmap references unknown dataset '{}'", heatmap.dataset);
            }
        }

        Ok(())
    }
}
