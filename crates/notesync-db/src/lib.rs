//! # notesync-db
//!
//! SQLite persistence for notesync collaborative databases.
//!
//! This crate provides:
//! - The database registry (`shared_databases` plus relational collaborators)
//! - One isolated SQLite store per logical database, with self-healing schema
//! - Live entity CRUD and bulk sync (upsert, replace-all, export)
//! - Single-slot JSON snapshot backups on the filesystem
//! - [`CollaborationService`], which composes the above behind access checks
//!
//! ## Example
//!
//! ```rust,ignore
//! use notesync_db::{CollaborationService, StorageConfig};
//!
//! #[tokio::main]
//! async fn main() -> notesync_core::Result<()> {
//!     let service = CollaborationService::open(&StorageConfig::under("./data")).await?;
//!     let db = service.create_database("u1", "Trip Notes").await?;
//!     service.add_collaborator(&db.id, "u1", "u2").await?;
//!     let snapshot = service.export_all(&db.id, "u2").await?;
//!     assert!(snapshot.entities.is_empty());
//!     Ok(())
//! }
//! ```
pub mod config;
pub mod entities;
pub mod pool;
pub mod provisioner;
pub mod registry;
pub mod schema;
pub mod service;
pub mod snapshots;
pub mod store;
pub mod sync;

// Always compiled so integration tests (in tests/) can share it.
pub mod test_fixtures;

// Re-export core types
pub use notesync_core::*;

pub use config::StorageConfig;
pub use entities::StoredEntity;
pub use pool::{create_registry_pool, log_pool_metrics, sqlite_options, PoolConfig};
pub use provisioner::StoreProvisioner;
pub use registry::SqliteDatabaseRegistry;
pub use schema::{ensure_store_tables, STORE_SCHEMA_VERSION};
pub use service::CollaborationService;
pub use snapshots::FilesystemSnapshotStore;
pub use store::StoreHandle;
pub use sync::{SyncReconciler, UpsertSummary};
