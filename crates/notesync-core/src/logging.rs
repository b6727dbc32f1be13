//! Structured logging schema and field name constants for notesync.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation failed with an internal error |
//! | WARN  | Tolerated partial failure (cascade cleanup after delete) |
//! | INFO  | Lifecycle events: database created/deleted, snapshot saved, replace finished |
//! | DEBUG | Decision points: self-healed tables, per-list upsert counts |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "registry", "store", "sync", "backup", "api"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "provisioner", "reconciler", "snapshots"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_database", "upsert", "replace_all", "save"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Logical database id being operated on.
pub const DATABASE_ID: &str = "database_id";

/// Caller user id.
pub const USER_ID: &str = "user_id";

/// Entity kind ("note", "folder", ...).
pub const ENTITY_KIND: &str = "entity_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of rows written or read.
pub const ROW_COUNT: &str = "row_count";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Caller-facing error kind.
pub const ERROR_KIND: &str = "error_kind";
