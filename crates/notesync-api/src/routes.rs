//! Route-level operations.
//!
//! One function per endpoint. Each resolves the caller, delegates to the
//! [`CollaborationService`](notesync_db::CollaborationService), and returns
//! the success status the router should send. The router itself owns
//! extraction and wire encoding.

use serde::{Deserialize, Serialize};
use tracing::debug;

use notesync_core::{
    DatabaseStats, DatabaseVersion, EntityBundle, Error, Folder, Invitation, Member, Note,
    SharedDatabase, Snapshot,
};
use notesync_db::UpsertSummary;

use crate::error::{ApiResponse, ApiResult};
use crate::identity::{require_caller, CallerIdentity};
use crate::state::AppState;

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

/// Request body for creating a database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateDatabaseRequest {
    pub name: String,
}

/// Request body for renaming a database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenameDatabaseRequest {
    pub name: String,
}

/// Request body for adding a collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorRequest {
    pub user_id: String,
}

/// Request body for inviting a user.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub user_id: String,
}

/// Request body for handing a database to another member.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnershipRequest {
    pub new_owner_id: String,
}

fn caller(identity: &dyn CallerIdentity, op: &'static str) -> notesync_core::Result<String> {
    let user_id = require_caller(identity)?;
    debug!(subsystem = "api", op, user_id = %user_id, "Route invoked");
    Ok(user_id)
}

fn path_entity_id(entity_id: i64) -> notesync_core::Result<i64> {
    if entity_id <= 0 {
        return Err(Error::Validation(format!(
            "Entity id must be positive, got {}",
            entity_id
        )));
    }
    Ok(entity_id)
}

// =============================================================================
// DATABASES
// =============================================================================

/// List databases the caller owns or collaborates on.
///
/// # Returns
/// - 200 OK with the databases, newest first
pub async fn list_databases(
    state: &AppState,
    identity: &dyn CallerIdentity,
) -> ApiResult<Vec<SharedDatabase>> {
    let user_id = caller(identity, "list_databases")?;
    let databases = state.service.list_databases(&user_id).await?;
    Ok(ApiResponse::ok(databases))
}

/// Create a database owned by the caller.
///
/// # Returns
/// - 201 Created with the registry row
/// - 400 Bad Request if the name is empty or the caller's quota is used up
pub async fn create_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    body: CreateDatabaseRequest,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "create_database")?;
    let db = state.service.create_database(&user_id, &body.name).await?;
    Ok(ApiResponse::created(db))
}

/// Get one database.
///
/// # Returns
/// - 200 OK with the registry row
/// - 403 Forbidden if the caller is not a member
/// - 404 Not Found if the id is unknown
pub async fn get_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "get_database")?;
    let db = state.service.get_database(database_id, &user_id).await?;
    Ok(ApiResponse::ok(db))
}

/// Rename a database (owner only).
pub async fn rename_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: RenameDatabaseRequest,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "rename_database")?;
    let db = state
        .service
        .rename_database(database_id, &user_id, &body.name)
        .await?;
    Ok(ApiResponse::ok(db))
}

/// Delete a database, its live store and its backup (owner only).
///
/// # Returns
/// - 204 No Content
/// - 403 Forbidden if the caller is not the owner
pub async fn delete_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<()> {
    let user_id = caller(identity, "delete_database")?;
    state.service.delete_database(database_id, &user_id).await?;
    Ok(ApiResponse::no_content())
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Add a collaborator (owner only). Adding an existing member is a no-op.
pub async fn add_collaborator(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: CollaboratorRequest,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "add_collaborator")?;
    let db = state
        .service
        .add_collaborator(database_id, &user_id, &body.user_id)
        .await?;
    Ok(ApiResponse::ok(db))
}

/// Remove a collaborator (owner only).
///
/// # Returns
/// - 200 OK with the updated registry row
/// - 409 Conflict when asked to remove the owner
pub async fn remove_collaborator(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    target_user_id: &str,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "remove_collaborator")?;
    let db = state
        .service
        .remove_collaborator(database_id, &user_id, target_user_id)
        .await?;
    Ok(ApiResponse::ok(db))
}

/// Leave a database the caller collaborates on.
///
/// # Returns
/// - 204 No Content
/// - 409 Conflict if the caller is the owner
pub async fn leave_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<()> {
    let user_id = caller(identity, "leave_database")?;
    state.service.leave_database(database_id, &user_id).await?;
    Ok(ApiResponse::no_content())
}

/// Join a shared database by id.
pub async fn join_database(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "join_database")?;
    let db = state.service.join_database(database_id, &user_id).await?;
    Ok(ApiResponse::ok(db))
}

/// Hand ownership to an existing collaborator (owner only).
pub async fn transfer_ownership(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: TransferOwnershipRequest,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "transfer_ownership")?;
    let db = state
        .service
        .transfer_ownership(database_id, &user_id, &body.new_owner_id)
        .await?;
    Ok(ApiResponse::ok(db))
}

pub async fn list_members(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Vec<Member>> {
    let user_id = caller(identity, "list_members")?;
    let members = state.service.list_members(database_id, &user_id).await?;
    Ok(ApiResponse::ok(members))
}

// =============================================================================
// INVITATIONS
// =============================================================================

/// Invite a user to a database the caller owns.
///
/// # Returns
/// - 201 Created with the pending invitation
/// - 403 Forbidden if the caller is not the owner
/// - 409 Conflict if the invitee is a member or already has a pending invitation
pub async fn invite_user(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: InviteRequest,
) -> ApiResult<Invitation> {
    let user_id = caller(identity, "invite_user")?;
    let invitation = state
        .service
        .invite_user(database_id, &user_id, &body.user_id)
        .await?;
    Ok(ApiResponse::created(invitation))
}

/// Pending, unexpired invitations addressed to the caller.
pub async fn pending_invitations(
    state: &AppState,
    identity: &dyn CallerIdentity,
) -> ApiResult<Vec<Invitation>> {
    let user_id = caller(identity, "pending_invitations")?;
    let invitations = state.service.pending_invitations(&user_id).await?;
    Ok(ApiResponse::ok(invitations))
}

/// Accept an invitation and join its database.
///
/// # Returns
/// - 200 OK with the joined database
/// - 403 Forbidden if the invitation is addressed to someone else
/// - 404 Not Found if the invitation does not exist
/// - 409 Conflict if it was already answered or has expired
pub async fn accept_invitation(
    state: &AppState,
    identity: &dyn CallerIdentity,
    invitation_id: i64,
) -> ApiResult<SharedDatabase> {
    let user_id = caller(identity, "accept_invitation")?;
    let db = state
        .service
        .accept_invitation(invitation_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(db))
}

pub async fn decline_invitation(
    state: &AppState,
    identity: &dyn CallerIdentity,
    invitation_id: i64,
) -> ApiResult<()> {
    let user_id = caller(identity, "decline_invitation")?;
    state
        .service
        .decline_invitation(invitation_id, &user_id)
        .await?;
    Ok(ApiResponse::no_content())
}

// =============================================================================
// SYNC
// =============================================================================

/// Upsert a client bundle into the live store.
///
/// # Returns
/// - 200 OK with per-kind row counts
pub async fn sync(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: EntityBundle,
) -> ApiResult<UpsertSummary> {
    let user_id = caller(identity, "sync")?;
    let summary = state.service.sync(database_id, &user_id, &body).await?;
    Ok(ApiResponse::ok(summary))
}

/// Replace the live store with the submitted snapshot.
pub async fn replace_all(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: Snapshot,
) -> ApiResult<()> {
    let user_id = caller(identity, "replace_all")?;
    state
        .service
        .replace_all(database_id, &user_id, &body)
        .await?;
    Ok(ApiResponse::no_content())
}

pub async fn export_all(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Snapshot> {
    let user_id = caller(identity, "export_all")?;
    let snapshot = state.service.export_all(database_id, &user_id).await?;
    Ok(ApiResponse::ok(snapshot))
}

// =============================================================================
// BACKUPS
// =============================================================================

/// Save the database's backup.
///
/// With a body, the submitted snapshot becomes the backup. Without one, the
/// live store is exported and saved.
pub async fn save_backup(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    body: Option<Snapshot>,
) -> ApiResult<Snapshot> {
    let user_id = caller(identity, "save_backup")?;
    let saved = match body {
        Some(snapshot) => {
            state
                .service
                .save_backup(database_id, &user_id, snapshot)
                .await?
        }
        None => {
            state
                .service
                .backup_from_store(database_id, &user_id)
                .await?
        }
    };
    Ok(ApiResponse::ok(saved))
}

/// Saved backup; an empty snapshot when none exists yet.
pub async fn get_backup(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Snapshot> {
    let user_id = caller(identity, "get_backup")?;
    let snapshot = state.service.get_backup(database_id, &user_id).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// Replace the live store with the saved backup.
pub async fn restore_backup(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Snapshot> {
    let user_id = caller(identity, "restore_backup")?;
    let snapshot = state
        .service
        .restore_from_backup(database_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(snapshot))
}

pub async fn database_stats(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<DatabaseStats> {
    let user_id = caller(identity, "database_stats")?;
    let stats = state.service.database_stats(database_id, &user_id).await?;
    Ok(ApiResponse::ok(stats))
}

/// Change counter of the live store; clients compare it to decide whether
/// to pull.
pub async fn database_version(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<DatabaseVersion> {
    let user_id = caller(identity, "database_version")?;
    let version = state.service.database_version(database_id, &user_id).await?;
    Ok(ApiResponse::ok(version))
}

// =============================================================================
// NOTES AND FOLDERS
// =============================================================================

pub async fn list_notes(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Vec<Note>> {
    let user_id = caller(identity, "list_notes")?;
    let notes = state.service.list_notes(database_id, &user_id).await?;
    Ok(ApiResponse::ok(notes))
}

pub async fn get_note(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    note_id: i64,
) -> ApiResult<Note> {
    let user_id = caller(identity, "get_note")?;
    let note = state
        .service
        .get_note(database_id, &user_id, note_id)
        .await?;
    Ok(ApiResponse::ok(note))
}

/// Create a note; any id in the body is ignored and the store assigns one.
///
/// # Returns
/// - 201 Created with the stored note
/// - 400 Bad Request if `folderId` names a missing folder
pub async fn create_note(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    mut body: Note,
) -> ApiResult<Note> {
    let user_id = caller(identity, "create_note")?;
    body.id = 0;
    let note = state.service.save_note(database_id, &user_id, body).await?;
    Ok(ApiResponse::created(note))
}

/// Overwrite the note named by `note_id`.
pub async fn update_note(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    note_id: i64,
    mut body: Note,
) -> ApiResult<Note> {
    let user_id = caller(identity, "update_note")?;
    body.id = path_entity_id(note_id)?;
    let note = state.service.save_note(database_id, &user_id, body).await?;
    Ok(ApiResponse::ok(note))
}

pub async fn delete_note(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    note_id: i64,
) -> ApiResult<()> {
    let user_id = caller(identity, "delete_note")?;
    state
        .service
        .delete_note(database_id, &user_id, note_id)
        .await?;
    Ok(ApiResponse::no_content())
}

pub async fn list_folders(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
) -> ApiResult<Vec<Folder>> {
    let user_id = caller(identity, "list_folders")?;
    let folders = state.service.list_folders(database_id, &user_id).await?;
    Ok(ApiResponse::ok(folders))
}

pub async fn create_folder(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    mut body: Folder,
) -> ApiResult<Folder> {
    let user_id = caller(identity, "create_folder")?;
    body.id = 0;
    let folder = state
        .service
        .save_folder(database_id, &user_id, body)
        .await?;
    Ok(ApiResponse::created(folder))
}

pub async fn update_folder(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    folder_id: i64,
    mut body: Folder,
) -> ApiResult<Folder> {
    let user_id = caller(identity, "update_folder")?;
    body.id = path_entity_id(folder_id)?;
    let folder = state
        .service
        .save_folder(database_id, &user_id, body)
        .await?;
    Ok(ApiResponse::ok(folder))
}

/// Delete a folder. Its notes and child folders become unfiled.
pub async fn delete_folder(
    state: &AppState,
    identity: &dyn CallerIdentity,
    database_id: &str,
    folder_id: i64,
) -> ApiResult<()> {
    let user_id = caller(identity, "delete_folder")?;
    state
        .service
        .delete_folder(database_id, &user_id, folder_id)
        .await?;
    Ok(ApiResponse::no_content())
}
