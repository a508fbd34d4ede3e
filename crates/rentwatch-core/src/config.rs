//! Store configuration.

use std::path::{Path, PathBuf};

use crate::snapshot::SnapshotFormat;

/// Default unique-key column: the canonical listing URL.
pub const DEFAULT_UNIQUE_KEY: &str = "listing_url";

/// Configuration for a [`ListingsStore`](crate::ListingsStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Durable snapshot location. `None` keeps the store in memory only.
    pub storage_path: Option<PathBuf>,

    /// Column whose non-null values must be unique across records.
    pub unique_key: String,
}

impl StoreConfig {
    /// Create a configuration persisting to the given snapshot path.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: Some(storage_path.into()),
            unique_key: DEFAULT_UNIQUE_KEY.to_string(),
        }
    }

    /// Create a memory-only configuration.
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            unique_key: DEFAULT_UNIQUE_KEY.to_string(),
        }
    }

    /// Set the snapshot path.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Disable persistence.
    pub fn without_storage(mut self) -> Self {
        self.storage_path = None;
        self
    }

    /// Set the unique-key column.
    pub fn with_unique_key(mut self, column: impl Into<String>) -> Self {
        self.unique_key = column.into();
        self
    }

    /// The snapshot path, if persistence is enabled.
    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    /// The snapshot format implied by the path's extension.
    pub fn snapshot_format(&self) -> Option<SnapshotFormat> {
        self.storage_path().map(SnapshotFormat::from_path)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("data/listings.parquet")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = StoreConfig::in_memory()
            .with_storage_path("/tmp/listings.csv")
            .with_unique_key("url");

        assert_eq!(config.unique_key, "url");
        assert_eq!(config.snapshot_format(), Some(SnapshotFormat::Csv));
        assert_eq!(config.without_storage().snapshot_format(), None);
    }

    #[test]
    fn test_default_is_parquet_keyed_on_url() {
        let config = StoreConfig::default();
        assert_eq!(config.unique_key, DEFAULT_UNIQUE_KEY);
        assert_eq!(config.snapshot_format(), Some(SnapshotFormat::Parquet));
    }
}
