//! Physical store lifecycle.
//!
//! Each logical database is materialized as one SQLite file,
//! `<stores_dir>/<database_id>.db`, holding the six entity tables. The
//! provisioner creates, opens, and destroys those files. Whether a store
//! should exist is decided by the registry, never here.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sqlx::ConnectOptions;
use tracing::{debug, error, info, warn};

use notesync_core::defaults::{SQLITE_BUSY_TIMEOUT_MS, STORE_EXTENSION};
use notesync_core::{validate_database_id, Error, Result};

use crate::pool::sqlite_options;
use crate::schema::ensure_store_tables;
use crate::store::StoreHandle;

/// SQLite sidecar files that belong to a store in WAL mode.
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm"];

/// Creates, opens, and destroys per-database SQLite stores.
#[derive(Debug, Clone)]
pub struct StoreProvisioner {
    stores_dir: PathBuf,
    busy_timeout: Duration,
}

impl StoreProvisioner {
    pub fn new(stores_dir: impl Into<PathBuf>) -> Self {
        Self {
            stores_dir: stores_dir.into(),
            busy_timeout: Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS),
        }
    }

    /// Set the SQLite busy timeout used for store connections.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn stores_dir(&self) -> &Path {
        &self.stores_dir
    }

    /// Path of the store file for `database_id`.
    ///
    /// The id is validated first so that it can never escape `stores_dir`.
    pub fn locator(&self, database_id: &str) -> Result<PathBuf> {
        validate_database_id(database_id)?;
        Ok(self
            .stores_dir
            .join(format!("{}.{}", database_id, STORE_EXTENSION)))
    }

    /// Create the store with all six tables if absent. Calling this on an
    /// existing store leaves its rows untouched.
    ///
    /// Returns the store locator.
    pub async fn provision(&self, database_id: &str) -> Result<String> {
        let start = Instant::now();
        let path = self.locator(database_id)?;

        let handle = self
            .connect(database_id, &path, true)
            .await
            .inspect_err(|e| log_failure("provision", database_id, e))?;
        let created = handle.healed_tables().len();
        handle.close().await?;

        info!(
            subsystem = "store",
            component = "provisioner",
            op = "provision",
            database_id,
            tables_created = created,
            duration_ms = start.elapsed().as_millis() as u64,
            "Physical store provisioned"
        );
        Ok(path.to_string_lossy().into_owned())
    }

    /// Open a handle on an existing store, recreating any missing table
    /// first.
    ///
    /// Never creates the store file: a missing file means the database was
    /// never provisioned or has been destroyed, and yields `NotFound`.
    pub async fn open(&self, database_id: &str) -> Result<StoreHandle> {
        let path = self.locator(database_id)?;

        let handle = match self.connect(database_id, &path, false).await {
            Ok(handle) => handle,
            Err(e) => {
                if !tokio::fs::try_exists(&path).await? {
                    warn!(
                        subsystem = "store",
                        component = "provisioner",
                        op = "open",
                        database_id,
                        path = %path.display(),
                        error = %e,
                        "Store file missing; refusing to recreate it"
                    );
                    return Err(Error::NotFound(format!(
                        "Store for database {} does not exist",
                        database_id
                    )));
                }
                log_failure("open", database_id, &e);
                return Err(e);
            }
        };

        if !handle.healed_tables().is_empty() {
            debug!(
                subsystem = "store",
                component = "provisioner",
                op = "self_heal",
                database_id,
                healed = ?handle.healed_tables(),
                "Recreated missing store tables on open"
            );
        }
        Ok(handle)
    }

    /// Connect to the store file. Only provisioning may create it.
    async fn connect(&self, database_id: &str, path: &Path, create: bool) -> Result<StoreHandle> {
        if create {
            tokio::fs::create_dir_all(&self.stores_dir).await?;
        }
        let mut conn = sqlite_options(path, self.busy_timeout)
            .create_if_missing(create)
            .connect()
            .await
            .map_err(Error::Database)?;
        let healed = ensure_store_tables(&mut conn).await?;
        Ok(StoreHandle::new(database_id, conn, healed))
    }

    /// Remove the store file and its WAL sidecars. A missing store is not
    /// an error.
    pub async fn destroy(&self, database_id: &str) -> Result<()> {
        let path = self.locator(database_id)?;

        let mut removed = remove_if_present(&path)
            .await
            .inspect_err(|e| log_failure("destroy", database_id, e))?;
        for suffix in SIDECAR_SUFFIXES {
            removed |= remove_if_present(&sidecar(&path, suffix))
                .await
                .inspect_err(|e| log_failure("destroy", database_id, e))?;
        }

        info!(
            subsystem = "store",
            component = "provisioner",
            op = "destroy",
            database_id,
            removed,
            "Physical store destroyed"
        );
        Ok(())
    }

    pub async fn exists(&self, database_id: &str) -> Result<bool> {
        let path = self.locator(database_id)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Bytes on disk for the store, including its WAL sidecars.
    pub async fn size_bytes(&self, database_id: &str) -> Result<u64> {
        let path = self.locator(database_id)?;
        let mut total = file_len(&path).await?;
        for suffix in SIDECAR_SUFFIXES {
            total += file_len(&sidecar(&path, suffix)).await?;
        }
        Ok(total)
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn file_len(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::Io(e)),
    }
}

pub(crate) fn log_failure(op: &str, database_id: &str, err: &Error) {
    error!(
        subsystem = "store",
        op,
        database_id,
        error = %err,
        error_kind = %err.kind(),
        "Physical store operation failed"
    );
}
