//! Authorization rules for shared databases.
//!
//! Pure predicates over a registry row and a caller id. The `ensure_*`
//! variants turn a failed predicate into [`Error::Forbidden`]; callers that
//! looked the row up first have already produced `NotFound` for unknown ids.

use crate::error::{Error, Result};
use crate::models::SharedDatabase;

/// Owner or collaborator may read, export, back up, and sync.
pub fn can_read(db: &SharedDatabase, user_id: &str) -> bool {
    db.is_member(user_id)
}

/// Only the owner manages the collaborator set and renames.
pub fn can_write_collaborators(db: &SharedDatabase, user_id: &str) -> bool {
    db.is_owner(user_id)
}

/// Only the owner deletes the database.
pub fn can_delete(db: &SharedDatabase, user_id: &str) -> bool {
    db.is_owner(user_id)
}

/// Only the owner hands ownership to someone else.
pub fn can_transfer(db: &SharedDatabase, user_id: &str) -> bool {
    db.is_owner(user_id)
}

pub fn ensure_read(db: &SharedDatabase, user_id: &str) -> Result<()> {
    if can_read(db, user_id) {
        Ok(())
    } else {
        Err(forbidden(db, user_id, "is not a member of"))
    }
}

pub fn ensure_write_collaborators(db: &SharedDatabase, user_id: &str) -> Result<()> {
    if can_write_collaborators(db, user_id) {
        Ok(())
    } else {
        Err(forbidden(db, user_id, "does not own"))
    }
}

pub fn ensure_delete(db: &SharedDatabase, user_id: &str) -> Result<()> {
    if can_delete(db, user_id) {
        Ok(())
    } else {
        Err(forbidden(db, user_id, "does not own"))
    }
}

pub fn ensure_transfer(db: &SharedDatabase, user_id: &str) -> Result<()> {
    if can_transfer(db, user_id) {
        Ok(())
    } else {
        Err(forbidden(db, user_id, "does not own"))
    }
}

fn forbidden(db: &SharedDatabase, user_id: &str, relation: &str) -> Error {
    Error::Forbidden(format!("User {} {} database {}", user_id, relation, db.id))
}
