//! Core traits for notesync persistence seams.
//!
//! The registry and the snapshot store are swappable backends; concrete
//! SQLite and filesystem implementations live in `notesync-db`.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DatabaseVersion, Invitation, Member, SharedDatabase, Snapshot};

// =============================================================================
// DATABASE REGISTRY
// =============================================================================

/// Metadata registry of logical databases and their collaborators.
///
/// The registry is the single source of truth for who may act on a database
/// id. Guarded methods take the caller id and fail with `NotFound` for unknown
/// ids and `Forbidden` for existing rows the caller may not act on.
#[async_trait]
pub trait DatabaseRegistry: Send + Sync {
    /// Insert a new registry row owned by `owner_id` with no collaborators.
    ///
    /// The ownership quota is checked in the same statement as the insert, so
    /// concurrent creates by one user never exceed `max_owned`.
    ///
    /// # Arguments
    /// * `id` - Freshly allocated database id
    /// * `owner_id` - Creating user
    /// * `name` - Display name; empty names fail with `Validation`
    /// * `store_locator` - Opaque reference to the physical store
    /// * `max_owned` - Databases `owner_id` may own; reaching it fails with `Validation`
    async fn create_database(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        store_locator: &str,
        max_owned: i64,
    ) -> Result<SharedDatabase>;

    /// Every database where `user_id` is owner or collaborator, newest first.
    async fn list_databases(&self, user_id: &str) -> Result<Vec<SharedDatabase>>;

    /// Unguarded lookup by id.
    async fn find_database(&self, id: &str) -> Result<Option<SharedDatabase>>;

    /// Guarded lookup: caller must be owner or collaborator.
    async fn get_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase>;

    /// Rename a database (owner only).
    async fn rename_database(&self, id: &str, owner_id: &str, name: &str)
        -> Result<SharedDatabase>;

    /// Remove the registry row (owner only). Returns the removed row so the
    /// caller can cascade to the physical store and snapshot.
    async fn delete_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase>;

    /// Unguarded removal, used to roll back a failed creation.
    async fn remove_database(&self, id: &str) -> Result<()>;

    /// Add a collaborator (owner only). Adding an existing member is a no-op.
    async fn add_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        new_user_id: &str,
    ) -> Result<SharedDatabase>;

    /// Remove a collaborator (owner only). Removing a non-member is a no-op;
    /// targeting the owner fails with `InvalidOperation`.
    async fn remove_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        target_user_id: &str,
    ) -> Result<SharedDatabase>;

    /// A collaborator removes themselves. The owner gets `InvalidOperation`.
    async fn leave_database(&self, id: &str, user_id: &str) -> Result<()>;

    /// Join a database by id as collaborator. Members joining again is a no-op.
    async fn join_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase>;

    /// Swap owner and collaborator roles between the current owner and an
    /// existing collaborator.
    async fn transfer_ownership(
        &self,
        id: &str,
        current_owner_id: &str,
        new_owner_id: &str,
    ) -> Result<SharedDatabase>;

    /// Owner followed by collaborators in join order (caller must be a member).
    async fn list_members(&self, id: &str, user_id: &str) -> Result<Vec<Member>>;

    /// Number of databases owned by `owner_id`.
    async fn count_owned(&self, owner_id: &str) -> Result<i64>;

    /// Invite `invitee_id` to join (owner only). Members and users with a
    /// live pending invitation get `InvalidOperation`.
    async fn invite_user(&self, id: &str, owner_id: &str, invitee_id: &str)
        -> Result<Invitation>;

    /// Unexpired pending invitations addressed to `user_id`, newest first.
    async fn pending_invitations(&self, user_id: &str) -> Result<Vec<Invitation>>;

    /// Accept a pending invitation, making the invitee a collaborator.
    /// Answered or expired invitations get `InvalidOperation`; invitations
    /// addressed to someone else get `Forbidden`.
    async fn accept_invitation(&self, invitation_id: i64, user_id: &str)
        -> Result<SharedDatabase>;

    /// Decline a pending invitation addressed to `user_id`.
    async fn decline_invitation(&self, invitation_id: i64, user_id: &str) -> Result<()>;

    /// Bump the change counter after a committed store write.
    async fn record_change(&self, id: &str) -> Result<DatabaseVersion>;

    /// Current change counter (caller must be a member).
    async fn database_version(&self, id: &str, user_id: &str) -> Result<DatabaseVersion>;
}

// =============================================================================
// SNAPSHOT STORE
// =============================================================================

/// Persistence for database snapshots, keyed by database id.
///
/// Implementations keep a single slot per database: saving overwrites the
/// previous snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stamp `last_modified`, `database_id` and `user_id`, persist, and
    /// return the stamped snapshot.
    async fn save(&self, database_id: &str, user_id: &str, snapshot: Snapshot)
        -> Result<Snapshot>;

    /// Most recent snapshot, or an empty well-formed snapshot if none exists.
    async fn load(&self, database_id: &str, user_id: &str) -> Result<Snapshot>;

    /// Whether a snapshot has been saved for this database.
    async fn exists(&self, database_id: &str) -> Result<bool>;

    /// Delete the snapshot. Missing snapshots are not an error.
    async fn delete(&self, database_id: &str) -> Result<()>;
}
