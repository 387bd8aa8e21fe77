//! Persistent key-value store for raw dataset payloads (sled).

use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::models::RawRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] sled::Error),

    #[error("cache entry '{key}' is not a record array: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode records for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Raw record arrays keyed by a fixed per-dataset cache key
#[derive(Clone)]
pub struct DatasetCache {
    db: sled::Db,
}

impl DatasetCache {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref();
        info!("Opening dataset cache at {}", path.display());
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store that lives only as long as the process
    pub fn temporary() -> Result<Self, CacheError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<RawRecord>>, CacheError> {
        let Some(bytes) = self.db.get(key)? else {
            return Ok(None);
        };
        let records = serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            source: e,
        })?;
        Ok(Some(records))
    }

    pub fn put(&self, key: &str, records: &[RawRecord]) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(records).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            source: e,
        })?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    /// Store an arbitrary payload; used to seed or repair entries
    pub fn put_raw(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.db.insert(key, bytes)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.db.remove(key)?.is_some())
    }

    pub fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.db.contains_key(key)?)
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<RawRecord> {
        vec![json!({ "nome": "Praça XV", "latitude": "-22.903" })
            .as_object()
            .cloned()
            .unwrap()]
    }

    #[test]
    fn test_put_get_remove() {
        let cache = DatasetCache::temporary().unwrap();
        assert!(cache.get("squares_cache").unwrap().is_none());

        cache.put("squares_cache", &records()).unwrap();
        assert_eq!(cache.get("squares_cache").unwrap(), Some(records()));

        assert!(cache.remove("squares_cache").unwrap());
        assert!(!cache.contains("squares_cache").unwrap());
    }

    #[test]
    fn test_corrupt_entry_reported() {
        let cache = DatasetCache::temporary().unwrap();
        cache.put_raw("squares_cache", b"{not json").unwrap();
        assert!(matches!(
            cache.get("squares_cache"),
            Err(CacheError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::Builder::new()
            .prefix("proxmap-cache-")
            .tempdir()
            .unwrap();

        let cache = DatasetCache::open(dir.path().join("db")).unwrap();
        cache.put("locations_cache", &records()).unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.get("locations_cache").unwrap(), Some(records()));
    }
}
