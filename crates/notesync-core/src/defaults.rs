//! Centralized default constants for notesync.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Environment-driven configuration falls back to these values.

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Root data directory when `NOTESYNC_DATA_DIR` is unset.
pub const DATA_DIR: &str = "./data";

/// Registry database file name inside the data directory.
pub const REGISTRY_FILE: &str = "registry.db";

/// Directory (inside the data directory) holding one store file per database.
pub const STORES_DIR: &str = "databases";

/// Directory (inside the data directory) holding one snapshot per database.
pub const SNAPSHOTS_DIR: &str = "backups";

/// File extension of physical store files.
pub const STORE_EXTENSION: &str = "db";

/// File extension of snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "json";

// =============================================================================
// REGISTRY POOL
// =============================================================================

/// Maximum registry connections.
pub const REGISTRY_MAX_CONNECTIONS: u32 = 5;

/// Seconds to wait for a registry connection.
pub const REGISTRY_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Milliseconds SQLite waits on a locked file before returning SQLITE_BUSY.
/// Applies to the registry and to every physical store connection.
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum number of databases one user may own.
pub const MAX_DATABASES_PER_USER: i64 = 50;

/// Days an unanswered invitation stays acceptable.
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Maximum length of a database display name (characters).
pub const DATABASE_NAME_MAX_LEN: usize = 200;

/// Maximum length of a database id accepted from callers.
pub const DATABASE_ID_MAX_LEN: usize = 64;

// =============================================================================
// ENTITY DEFAULTS
// =============================================================================

/// Default folder color (opaque dark grey, ARGB).
pub const FOLDER_COLOR: i64 = 0xFF42_4242;

/// Default pinboard card width in logical pixels.
pub const PINBOARD_WIDTH: f64 = 200.0;

/// Default pinboard card height in logical pixels.
pub const PINBOARD_HEIGHT: f64 = 150.0;
