//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `NOTESYNC_DATA_DIR` | `./data` |
//! | `NOTESYNC_REGISTRY_PATH` | `<data>/registry.db` |
//! | `NOTESYNC_STORES_DIR` | `<data>/databases` |
//! | `NOTESYNC_SNAPSHOTS_DIR` | `<data>/backups` |
//! | `NOTESYNC_MAX_CONNECTIONS` | `5` |
//! | `NOTESYNC_MAX_DATABASES_PER_USER` | `50` |
//! | `LOG_FORMAT` | `text` |
//! | `LOG_FILE` | unset (stdout) |

use std::path::PathBuf;
use std::str::FromStr;

use notesync_core::{defaults, Error, Result};
use notesync_db::{PoolConfig, StorageConfig};

use crate::telemetry::{LogFormat, TelemetryConfig};

/// Everything the server process needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub registry_path: PathBuf,
    pub stores_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub max_connections: u32,
    pub max_databases_per_user: i64,
    pub telemetry: TelemetryConfig,
}

impl ServerConfig {
    /// Load `.env` (if present), then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = var("NOTESYNC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(defaults::DATA_DIR));
        let registry_path = var("NOTESYNC_REGISTRY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(defaults::REGISTRY_FILE));
        let stores_dir = var("NOTESYNC_STORES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(defaults::STORES_DIR));
        let snapshots_dir = var("NOTESYNC_SNAPSHOTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(defaults::SNAPSHOTS_DIR));

        let max_connections = parse_var(
            "NOTESYNC_MAX_CONNECTIONS",
            var("NOTESYNC_MAX_CONNECTIONS"),
            defaults::REGISTRY_MAX_CONNECTIONS,
        )?;
        if max_connections == 0 {
            return Err(Error::Config(
                "NOTESYNC_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        let max_databases_per_user = parse_var(
            "NOTESYNC_MAX_DATABASES_PER_USER",
            var("NOTESYNC_MAX_DATABASES_PER_USER"),
            defaults::MAX_DATABASES_PER_USER,
        )?;

        let format = match var("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::Text,
        };
        let telemetry = TelemetryConfig {
            format,
            file: var("LOG_FILE").map(PathBuf::from),
        };

        Ok(Self {
            data_dir,
            registry_path,
            stores_dir,
            snapshots_dir,
            max_connections,
            max_databases_per_user,
            telemetry,
        })
    }

    /// The storage layout handed to `notesync-db`.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig::under(&self.data_dir)
            .registry_path(&self.registry_path)
            .stores_dir(&self.stores_dir)
            .snapshots_dir(&self.snapshots_dir)
            .pool(PoolConfig::default().max_connections(self.max_connections))
            .max_databases_per_user(self.max_databases_per_user)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::Config(format!("{} must be a number, got {:?}", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.registry_path, PathBuf::from("./data/registry.db"));
        assert_eq!(config.stores_dir, PathBuf::from("./data/databases"));
        assert_eq!(config.snapshots_dir, PathBuf::from("./data/backups"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.max_databases_per_user, 50);
        assert_eq!(config.telemetry.format, LogFormat::Text);
        assert!(config.telemetry.file.is_none());
    }

    #[test]
    fn test_paths_follow_data_dir_unless_overridden() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("NOTESYNC_DATA_DIR", "/srv/notesync"),
            ("NOTESYNC_SNAPSHOTS_DIR", "/backups"),
        ]))
        .unwrap();
        assert_eq!(config.registry_path, PathBuf::from("/srv/notesync/registry.db"));
        assert_eq!(config.stores_dir, PathBuf::from("/srv/notesync/databases"));
        assert_eq!(config.snapshots_dir, PathBuf::from("/backups"));

        let storage = config.storage();
        assert_eq!(storage.snapshots_dir, PathBuf::from("/backups"));
        assert_eq!(storage.pool.max_connections, 5);
    }

    #[test]
    fn test_invalid_numbers_are_config_errors() {
        let err = ServerConfig::from_lookup(lookup(&[("NOTESYNC_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ServerConfig::from_lookup(lookup(&[("NOTESYNC_MAX_CONNECTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            ServerConfig::from_lookup(lookup(&[("NOTESYNC_MAX_DATABASES_PER_USER", "-")]))
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_log_settings() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LOG_FORMAT", "JSON"),
            ("LOG_FILE", "/var/log/notesync/api.log"),
        ]))
        .unwrap();
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(
            config.telemetry.file,
            Some(PathBuf::from("/var/log/notesync/api.log"))
        );

        let err = ServerConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
