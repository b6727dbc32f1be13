//! Identifier allocation and validation for logical databases.
//!
//! Database ids are UUIDv7 strings: opaque to callers, time-ordered for
//! operators. Because ids name files on disk, any id that arrives from a
//! caller is validated before a path is derived from it.

use uuid::Uuid;

use crate::defaults::{DATABASE_ID_MAX_LEN, DATABASE_NAME_MAX_LEN};
use crate::error::{Error, Result};

/// Allocate a fresh database id.
///
/// # Example
///
/// ```
/// use notesync_core::ids::{new_database_id, validate_database_id};
///
/// let id = new_database_id();
/// assert!(validate_database_id(&id).is_ok());
/// ```
pub fn new_database_id() -> String {
    Uuid::now_v7().as_hyphenated().to_string()
}

/// Validate a caller-supplied database id.
///
/// Accepted ids are 1 to 64 characters of ASCII alphanumerics, `-` and `_`.
/// Anything else (path separators, dots, whitespace) is rejected with
/// [`Error::Validation`].
///
/// ```
/// use notesync_core::ids::validate_database_id;
///
/// assert!(validate_database_id("0195f3c2-7a10-7cc1-9d2e-3b4f5a6b7c8d").is_ok());
/// assert!(validate_database_id("legacy_42").is_ok());
/// assert!(validate_database_id("../registry").is_err());
/// assert!(validate_database_id("").is_err());
/// ```
pub fn validate_database_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Validation(
            "Database id cannot be empty".to_string(),
        ));
    }

    if id.len() > DATABASE_ID_MAX_LEN {
        return Err(Error::Validation(format!(
            "Database id exceeds {} character limit: {} characters",
            DATABASE_ID_MAX_LEN,
            id.len()
        )));
    }

    if let Some(bad) = id
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(Error::Validation(format!(
            "Database id contains invalid character: '{}'",
            bad
        )));
    }

    Ok(())
}

/// Validate and normalize a database display name.
///
/// Returns the trimmed name. Empty (or whitespace-only) names and names over
/// the length limit fail with [`Error::Validation`].
pub fn normalize_database_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            "Database name cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > DATABASE_NAME_MAX_LEN {
        return Err(Error::Validation(format!(
            "Database name exceeds {} character limit",
            DATABASE_NAME_MAX_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a user id supplied as an operation argument (collaborator to
/// add, new owner, ...).
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::Validation("User id cannot be empty".to_string()));
    }
    Ok(())
}
