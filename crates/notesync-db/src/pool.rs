//! SQLite connection management.
//!
//! The registry is a single SQLite file served through a small pool. Physical
//! stores are opened one connection per operation (open, act, close) with the
//! same pragmas, so concurrent requests on different stores never share a
//! handle.

use std::path::Path;
use std::time::{Duration, Instant};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info, warn};

use notesync_core::defaults::{
    REGISTRY_ACQUIRE_TIMEOUT_SECS, REGISTRY_MAX_CONNECTIONS, SQLITE_BUSY_TIMEOUT_MS,
};
use notesync_core::{Error, Result};

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// How long SQLite waits on a locked database file.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: REGISTRY_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout: Duration::from_secs(REGISTRY_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            busy_timeout: Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Set the connection acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Connection options shared by the registry and every physical store.
///
/// WAL journaling lets readers proceed while a writer holds the lock; the
/// busy timeout turns short write contention into waiting instead of
/// `SQLITE_BUSY` errors.
pub fn sqlite_options(path: &Path, busy_timeout: Duration) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(busy_timeout)
}

/// Create the registry connection pool, creating the file (and its parent
/// directory) if needed.
pub async fn create_registry_pool(path: &Path, config: &PoolConfig) -> Result<SqlitePool> {
    let start = Instant::now();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    info!(
        subsystem = "registry",
        component = "pool",
        op = "create",
        path = %path.display(),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating registry connection pool"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(sqlite_options(path, config.busy_timeout))
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "registry",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Registry connection pool established"
    );
    Ok(pool)
}

/// Log current pool health metrics.
///
/// Emits a debug-level event with pool size and idle count, and warns when no
/// idle connection is left.
pub fn log_pool_metrics(pool: &SqlitePool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "registry",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "registry",
            component = "pool",
            pool_size = size,
            "Registry pool has no idle connections"
        );
    }
}
