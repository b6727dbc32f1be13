//! Storage layout configuration.

use std::path::{Path, PathBuf};

use notesync_core::defaults;

use crate::pool::PoolConfig;

/// Where the registry, the physical stores, and the snapshots live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub registry_path: PathBuf,
    pub stores_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub pool: PoolConfig,
    /// Owned-database cap per user.
    pub max_databases_per_user: i64,
}

impl StorageConfig {
    /// Standard layout under one data directory:
    /// `registry.db`, `databases/`, `backups/`.
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            registry_path: data_dir.join(defaults::REGISTRY_FILE),
            stores_dir: data_dir.join(defaults::STORES_DIR),
            snapshots_dir: data_dir.join(defaults::SNAPSHOTS_DIR),
            pool: PoolConfig::default(),
            max_databases_per_user: defaults::MAX_DATABASES_PER_USER,
        }
    }

    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = path.into();
        self
    }

    pub fn stores_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stores_dir = dir.into();
        self
    }

    pub fn snapshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshots_dir = dir.into();
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn max_databases_per_user(mut self, n: i64) -> Self {
        self.max_databases_per_user = n;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::under(defaults::DATA_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_uses_standard_layout() {
        let config = StorageConfig::under("/srv/notesync");
        assert_eq!(config.registry_path, PathBuf::from("/srv/notesync/registry.db"));
        assert_eq!(config.stores_dir, PathBuf::from("/srv/notesync/databases"));
        assert_eq!(config.snapshots_dir, PathBuf::from("/srv/notesync/backups"));
        assert_eq!(config.max_databases_per_user, defaults::MAX_DATABASES_PER_USER);
    }

    #[test]
    fn test_builder_overrides() {
        let config = StorageConfig::default()
            .stores_dir("/mnt/stores")
            .max_databases_per_user(3);
        assert_eq!(config.stores_dir, PathBuf::from("/mnt/stores"));
        assert_eq!(config.max_databases_per_user, 3);
        assert_eq!(config.registry_path, PathBuf::from("./data/registry.db"));
    }
}
