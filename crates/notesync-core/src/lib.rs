//! # notesync-core
//!
//! Core types, traits, and access rules for notesync collaborative
//! databases.
//!
//! This crate provides the entity model, the snapshot document, the registry
//! row, the error taxonomy, and the authorization predicates. It performs no
//! I/O; storage lives in `notesync-db`.

pub mod access;
pub mod defaults;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorKind, Result};
pub use ids::{new_database_id, normalize_database_name, validate_database_id, validate_user_id};
pub use models::*;
pub use traits::*;
