//! SQLite implementation of the database registry.
//!
//! Three tables: `shared_databases` (one row per logical database, with its
//! change counter), `database_collaborators` (one row per non-owner member)
//! and `database_invitations`. The owner is never stored as a collaborator.
//!
//! Guarded mutations re-check the caller's role inside the writing SQL
//! statement itself (`... WHERE owner_id = ?`), so a concurrent transfer or
//! delete cannot be overtaken by a stale read. SQLite's single writer lock
//! serializes concurrent collaborator changes on the same database.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use notesync_core::access::{ensure_delete, ensure_read, ensure_transfer, ensure_write_collaborators};
use notesync_core::defaults::INVITATION_TTL_DAYS;
use notesync_core::{
    normalize_database_name, validate_database_id, validate_user_id, DatabaseRegistry,
    DatabaseVersion, Error, Invitation, InvitationStatus, Member, MemberRole, Result,
    SharedDatabase,
};

use crate::schema::apply_registry_schema;

const SELECT_DATABASE: &str =
    "SELECT id, name, owner_id, created_at, updated_at, store_locator FROM shared_databases";

const SELECT_INVITATION: &str = "SELECT id, database_id, inviter_id, invitee_id, status, \
     created_at, expires_at FROM database_invitations";

/// Registry of shared databases stored in a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteDatabaseRegistry {
    pool: SqlitePool,
    invitation_ttl: Duration,
}

impl SqliteDatabaseRegistry {
    /// Wrap an existing pool. Call [`SqliteDatabaseRegistry::migrate`]
    /// before first use.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            invitation_ttl: Duration::days(INVITATION_TTL_DAYS),
        }
    }

    /// Set how long an invitation stays acceptable.
    pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
        self.invitation_ttl = ttl;
        self
    }

    /// Create the registry tables if absent.
    pub async fn migrate(&self) -> Result<()> {
        apply_registry_schema(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn collaborators(&self, database_id: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT user_id, added_at FROM database_collaborators \
             WHERE database_id = ? ORDER BY added_at, user_id",
        )
        .bind(database_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| -> Result<(String, DateTime<Utc>)> {
                Ok((row.try_get("user_id")?, row.try_get("added_at")?))
            })
            .collect()
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<SharedDatabase> {
        let id: String = row.try_get("id")?;
        let collaborators: BTreeSet<String> = self
            .collaborators(&id)
            .await?
            .into_iter()
            .map(|(user_id, _)| user_id)
            .collect();

        Ok(SharedDatabase {
            name: row.try_get("name")?,
            owner_id: row.try_get("owner_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            store_locator: row.try_get("store_locator")?,
            collaborators,
            id,
        })
    }

    /// Lookup that turns an absent row into `NotFound`.
    async fn require(&self, id: &str) -> Result<SharedDatabase> {
        self.find_database(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Database {} not found", id)))
    }

    async fn find_invitation(&self, invitation_id: i64) -> Result<Option<Invitation>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_INVITATION))
            .bind(invitation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(invitation_from_row).transpose()
    }

    /// Explain why an answer to `invitation_id` by `user_id` changed nothing.
    async fn unanswerable(&self, invitation_id: i64, user_id: &str) -> Error {
        match self.find_invitation(invitation_id).await {
            Ok(None) => Error::NotFound(format!("Invitation {} not found", invitation_id)),
            Ok(Some(inv)) if inv.invitee_id != user_id => Error::Forbidden(format!(
                "Invitation {} is not addressed to user {}",
                invitation_id, user_id
            )),
            Ok(Some(inv)) if inv.status != InvitationStatus::Pending => {
                Error::InvalidOperation(format!(
                    "Invitation {} was already {}",
                    invitation_id, inv.status
                ))
            }
            Ok(Some(_)) => {
                Error::InvalidOperation(format!("Invitation {} has expired", invitation_id))
            }
            Err(e) => e,
        }
    }

    async fn touch(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE shared_databases SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseRegistry for SqliteDatabaseRegistry {
    async fn create_database(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        store_locator: &str,
        max_owned: i64,
    ) -> Result<SharedDatabase> {
        validate_database_id(id)?;
        validate_user_id(owner_id)?;
        let name = normalize_database_name(name)?;
        let now = Utc::now();

        // The count runs under the insert's write lock, so racing creates
        // by one owner are serialized against the quota.
        let result = sqlx::query(
            "INSERT INTO shared_databases (id, name, owner_id, created_at, updated_at, store_locator) \
             SELECT ?, ?, ?, ?, ?, ? \
             WHERE (SELECT COUNT(*) FROM shared_databases WHERE owner_id = ?) < ?",
        )
        .bind(id)
        .bind(&name)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .bind(store_locator)
        .bind(owner_id)
        .bind(max_owned)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Validation(format!(
                "User {} already owns the maximum of {} databases",
                owner_id, max_owned
            )));
        }

        info!(
            subsystem = "registry",
            component = "databases",
            op = "create",
            database_id = id,
            user_id = owner_id,
            "Registry row created"
        );

        Ok(SharedDatabase {
            id: id.to_string(),
            name,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
            collaborators: BTreeSet::new(),
            store_locator: store_locator.to_string(),
        })
    }

    async fn list_databases(&self, user_id: &str) -> Result<Vec<SharedDatabase>> {
        let rows = sqlx::query(
            "SELECT d.id, d.name, d.owner_id, d.created_at, d.updated_at, d.store_locator \
             FROM shared_databases d \
             WHERE d.owner_id = ? \
                OR EXISTS (SELECT 1 FROM database_collaborators c \
                           WHERE c.database_id = d.id AND c.user_id = ?) \
             ORDER BY d.created_at DESC, d.id DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        try_join_all(rows.iter().map(|row| self.hydrate(row))).await
    }

    async fn find_database(&self, id: &str) -> Result<Option<SharedDatabase>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_DATABASE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn get_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        let db = self.require(id).await?;
        ensure_read(&db, user_id)?;
        Ok(db)
    }

    async fn rename_database(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<SharedDatabase> {
        let db = self.require(id).await?;
        ensure_write_collaborators(&db, owner_id)?;
        let name = normalize_database_name(name)?;

        let result = sqlx::query(
            "UPDATE shared_databases SET name = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(&name)
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Forbidden(format!(
                "User {} does not own database {}",
                owner_id, id
            )));
        }
        self.require(id).await
    }

    async fn delete_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        let db = self.require(id).await?;
        ensure_delete(&db, user_id)?;

        let result = sqlx::query("DELETE FROM shared_databases WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            // Ownership moved or the row vanished between the read and the delete.
            return match self.find_database(id).await? {
                Some(_) => Err(Error::Forbidden(format!(
                    "User {} does not own database {}",
                    user_id, id
                ))),
                None => Err(Error::NotFound(format!("Database {} not found", id))),
            };
        }

        info!(
            subsystem = "registry",
            component = "databases",
            op = "delete",
            database_id = id,
            user_id,
            "Registry row deleted"
        );
        Ok(db)
    }

    async fn remove_database(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM shared_databases WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn add_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        new_user_id: &str,
    ) -> Result<SharedDatabase> {
        validate_user_id(new_user_id)?;
        let db = self.require(id).await?;
        ensure_write_collaborators(&db, owner_id)?;

        if db.is_member(new_user_id) {
            return Ok(db);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO database_collaborators (database_id, user_id, added_at) \
             SELECT id, ?, ? FROM shared_databases \
             WHERE id = ? AND owner_id = ? AND owner_id <> ?",
        )
        .bind(new_user_id)
        .bind(Utc::now())
        .bind(id)
        .bind(owner_id)
        .bind(new_user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            self.touch(id).await?;
            debug!(
                subsystem = "registry",
                component = "collaborators",
                op = "add",
                database_id = id,
                user_id = new_user_id,
                "Collaborator added"
            );
        }
        self.require(id).await
    }

    async fn remove_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        target_user_id: &str,
    ) -> Result<SharedDatabase> {
        let db = self.require(id).await?;
        ensure_write_collaborators(&db, owner_id)?;

        if db.is_owner(target_user_id) {
            return Err(Error::InvalidOperation(format!(
                "Owner {} cannot be removed from database {}; transfer ownership first",
                target_user_id, id
            )));
        }

        let result = sqlx::query(
            "DELETE FROM database_collaborators \
             WHERE database_id = ? AND user_id = ? \
               AND EXISTS (SELECT 1 FROM shared_databases WHERE id = ? AND owner_id = ?)",
        )
        .bind(id)
        .bind(target_user_id)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            self.touch(id).await?;
            debug!(
                subsystem = "registry",
                component = "collaborators",
                op = "remove",
                database_id = id,
                user_id = target_user_id,
                "Collaborator removed"
            );
        }
        self.require(id).await
    }

    async fn leave_database(&self, id: &str, user_id: &str) -> Result<()> {
        let db = self.require(id).await?;

        if db.is_owner(user_id) {
            return Err(Error::InvalidOperation(format!(
                "Owner cannot leave database {}; transfer ownership first",
                id
            )));
        }
        ensure_read(&db, user_id)?;

        let result = sqlx::query(
            "DELETE FROM database_collaborators WHERE database_id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            self.touch(id).await?;
        }
        debug!(
            subsystem = "registry",
            component = "collaborators",
            op = "leave",
            database_id = id,
            user_id,
            "Collaborator left database"
        );
        Ok(())
    }

    async fn join_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        validate_user_id(user_id)?;
        let db = self.require(id).await?;
        if db.is_member(user_id) {
            return Ok(db);
        }

        let result = sqlx::query(
            "INSERT OR IGNORE INTO database_collaborators (database_id, user_id, added_at) \
             SELECT id, ?, ? FROM shared_databases WHERE id = ? AND owner_id <> ?",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() > 0 {
            self.touch(id).await?;
            info!(
                subsystem = "registry",
                component = "collaborators",
                op = "join",
                database_id = id,
                user_id,
                "User joined shared database"
            );
        }
        self.require(id).await
    }

    async fn transfer_ownership(
        &self,
        id: &str,
        current_owner_id: &str,
        new_owner_id: &str,
    ) -> Result<SharedDatabase> {
        validate_user_id(new_owner_id)?;
        let db = self.require(id).await?;
        ensure_transfer(&db, current_owner_id)?;

        if db.is_owner(new_owner_id) {
            return Err(Error::InvalidOperation(format!(
                "User {} already owns database {}",
                new_owner_id, id
            )));
        }
        if !db.is_collaborator(new_owner_id) {
            return Err(Error::InvalidOperation(format!(
                "User {} is not a collaborator of database {}",
                new_owner_id, id
            )));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // First statement writes, so the transaction holds the write lock
        // before anything else is read or changed.
        let result = sqlx::query(
            "UPDATE shared_databases SET owner_id = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ? \
               AND EXISTS (SELECT 1 FROM database_collaborators \
                           WHERE database_id = ? AND user_id = ?)",
        )
        .bind(new_owner_id)
        .bind(now)
        .bind(id)
        .bind(current_owner_id)
        .bind(id)
        .bind(new_owner_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::InvalidOperation(format!(
                "Membership of database {} changed during ownership transfer",
                id
            )));
        }

        sqlx::query("DELETE FROM database_collaborators WHERE database_id = ? AND user_id = ?")
            .bind(id)
            .bind(new_owner_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO database_collaborators (database_id, user_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(current_owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "registry",
            component = "databases",
            op = "transfer_ownership",
            database_id = id,
            from_user = current_owner_id,
            to_user = new_owner_id,
            "Ownership transferred"
        );
        self.require(id).await
    }

    async fn list_members(&self, id: &str, user_id: &str) -> Result<Vec<Member>> {
        let db = self.require(id).await?;
        ensure_read(&db, user_id)?;

        let mut members = vec![Member {
            user_id: db.owner_id.clone(),
            role: MemberRole::Owner,
            joined_at: db.created_at,
        }];
        members.extend(
            self.collaborators(id)
                .await?
                .into_iter()
                .map(|(user_id, added_at)| Member {
                    user_id,
                    role: MemberRole::Collaborator,
                    joined_at: added_at,
                }),
        );
        Ok(members)
    }

    async fn count_owned(&self, owner_id: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shared_databases WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn invite_user(
        &self,
        id: &str,
        owner_id: &str,
        invitee_id: &str,
    ) -> Result<Invitation> {
        let db = self.require(id).await?;
        ensure_write_collaborators(&db, owner_id)?;
        validate_user_id(invitee_id)?;

        if db.is_member(invitee_id) {
            return Err(Error::InvalidOperation(format!(
                "User {} is already a member of database {}",
                invitee_id, id
            )));
        }

        let now = Utc::now();
        let expires_at = now + self.invitation_ttl;
        let result = sqlx::query(
            "INSERT INTO database_invitations \
                 (database_id, inviter_id, invitee_id, status, created_at, expires_at) \
             SELECT id, ?, ?, 'pending', ?, ? FROM shared_databases \
             WHERE id = ? AND owner_id = ? \
               AND NOT EXISTS (SELECT 1 FROM database_invitations \
                               WHERE database_id = ? AND invitee_id = ? \
                                 AND status = 'pending' AND expires_at > ?)",
        )
        .bind(owner_id)
        .bind(invitee_id)
        .bind(now)
        .bind(expires_at)
        .bind(id)
        .bind(owner_id)
        .bind(id)
        .bind(invitee_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return match self.find_database(id).await? {
                Some(db) if db.is_owner(owner_id) => Err(Error::InvalidOperation(format!(
                    "User {} already has a pending invitation to database {}",
                    invitee_id, id
                ))),
                Some(_) => Err(Error::Forbidden(format!(
                    "User {} does not own database {}",
                    owner_id, id
                ))),
                None => Err(Error::NotFound(format!("Database {} not found", id))),
            };
        }

        let invitation = Invitation {
            id: result.last_insert_rowid(),
            database_id: id.to_string(),
            inviter_id: owner_id.to_string(),
            invitee_id: invitee_id.to_string(),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at,
        };
        info!(
            subsystem = "registry",
            component = "invitations",
            op = "invite",
            database_id = id,
            user_id = invitee_id,
            invitation_id = invitation.id,
            "Invitation created"
        );
        Ok(invitation)
    }

    async fn pending_invitations(&self, user_id: &str) -> Result<Vec<Invitation>> {
        let rows = sqlx::query(&format!(
            "{} WHERE invitee_id = ? AND status = 'pending' AND expires_at > ? \
             ORDER BY created_at DESC, id DESC",
            SELECT_INVITATION
        ))
        .bind(user_id)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(invitation_from_row).collect()
    }

    async fn accept_invitation(
        &self,
        invitation_id: i64,
        user_id: &str,
    ) -> Result<SharedDatabase> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let database_id: Option<String> = sqlx::query_scalar(
            "UPDATE database_invitations SET status = 'accepted' \
             WHERE id = ? AND invitee_id = ? AND status = 'pending' AND expires_at > ? \
             RETURNING database_id",
        )
        .bind(invitation_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some(database_id) = database_id else {
            tx.rollback().await.map_err(Error::Database)?;
            return Err(self.unanswerable(invitation_id, user_id).await);
        };

        // Ownership may have been transferred to the invitee meanwhile.
        sqlx::query(
            "INSERT OR IGNORE INTO database_collaborators (database_id, user_id, added_at) \
             SELECT id, ?, ? FROM shared_databases WHERE id = ? AND owner_id <> ?",
        )
        .bind(user_id)
        .bind(now)
        .bind(&database_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE shared_databases SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&database_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "registry",
            component = "invitations",
            op = "accept",
            database_id = %database_id,
            user_id,
            invitation_id,
            "Invitation accepted"
        );
        self.require(&database_id).await
    }

    async fn decline_invitation(&self, invitation_id: i64, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE database_invitations SET status = 'declined' \
             WHERE id = ? AND invitee_id = ? AND status = 'pending'",
        )
        .bind(invitation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(self.unanswerable(invitation_id, user_id).await);
        }
        debug!(
            subsystem = "registry",
            component = "invitations",
            op = "decline",
            user_id,
            invitation_id,
            "Invitation declined"
        );
        Ok(())
    }

    async fn record_change(&self, id: &str) -> Result<DatabaseVersion> {
        let row: Option<(i64, Option<DateTime<Utc>>)> = sqlx::query_as(
            "UPDATE shared_databases SET version = version + 1, last_sync = ? \
             WHERE id = ? RETURNING version, last_sync",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let (version, last_sync) =
            row.ok_or_else(|| Error::NotFound(format!("Database {} not found", id)))?;
        Ok(DatabaseVersion {
            database_id: id.to_string(),
            version,
            last_sync,
        })
    }

    async fn database_version(&self, id: &str, user_id: &str) -> Result<DatabaseVersion> {
        let db = self.require(id).await?;
        ensure_read(&db, user_id)?;

        let (version, last_sync): (i64, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT version, last_sync FROM shared_databases WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?
                .ok_or_else(|| Error::NotFound(format!("Database {} not found", id)))?;

        Ok(DatabaseVersion {
            database_id: id.to_string(),
            version,
            last_sync,
        })
    }
}

fn invitation_from_row(row: &SqliteRow) -> Result<Invitation> {
    let status: String = row.try_get("status")?;
    let status = InvitationStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown invitation status {:?}", status)))?;

    Ok(Invitation {
        id: row.try_get("id")?,
        database_id: row.try_get("database_id")?,
        inviter_id: row.try_get("inviter_id")?,
        invitee_id: row.try_get("invitee_id")?,
        status,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}
