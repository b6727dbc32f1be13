//! Collaboration service: the operations exposed to the HTTP layer.
//!
//! Every operation takes the caller's user id explicitly and authorizes it
//! against the registry before touching a physical store or snapshot.
//! Physical stores are opened per operation and closed before returning.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use notesync_core::{
    new_database_id, normalize_database_name, validate_user_id, DatabaseRegistry, DatabaseStats,
    DatabaseVersion, EntityBundle, EntityKind, Folder, Invitation, Member, Note, Result,
    SharedDatabase, Snapshot, SnapshotStore,
};

use crate::config::StorageConfig;
use crate::entities::StoredEntity;
use crate::pool::create_registry_pool;
use crate::provisioner::StoreProvisioner;
use crate::registry::SqliteDatabaseRegistry;
use crate::snapshots::FilesystemSnapshotStore;
use crate::sync::{SyncReconciler, UpsertSummary};

/// Facade composing the registry, provisioner, reconciler, and snapshot store.
#[derive(Clone)]
pub struct CollaborationService {
    registry: Arc<dyn DatabaseRegistry>,
    snapshots: Arc<dyn SnapshotStore>,
    provisioner: StoreProvisioner,
    reconciler: SyncReconciler,
    max_databases_per_user: i64,
}

impl CollaborationService {
    pub fn new(
        registry: Arc<dyn DatabaseRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        provisioner: StoreProvisioner,
    ) -> Self {
        Self {
            registry,
            snapshots,
            reconciler: SyncReconciler::new(provisioner.clone()),
            provisioner,
            max_databases_per_user: notesync_core::defaults::MAX_DATABASES_PER_USER,
        }
    }

    /// Set the owned-database cap per user.
    pub fn with_max_databases_per_user(mut self, n: i64) -> Self {
        self.max_databases_per_user = n;
        self
    }

    /// Open the SQLite registry and filesystem stores described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let pool = create_registry_pool(&config.registry_path, &config.pool).await?;
        let registry = SqliteDatabaseRegistry::new(pool);
        registry.migrate().await?;

        let provisioner =
            StoreProvisioner::new(&config.stores_dir).with_busy_timeout(config.pool.busy_timeout);
        let snapshots = FilesystemSnapshotStore::new(&config.snapshots_dir);

        info!(
            subsystem = "service",
            component = "collaboration",
            op = "open",
            registry = %config.registry_path.display(),
            stores_dir = %config.stores_dir.display(),
            snapshots_dir = %config.snapshots_dir.display(),
            "Collaboration service ready"
        );

        Ok(Self::new(Arc::new(registry), Arc::new(snapshots), provisioner)
            .with_max_databases_per_user(config.max_databases_per_user))
    }

    pub fn registry(&self) -> &Arc<dyn DatabaseRegistry> {
        &self.registry
    }

    pub fn snapshots(&self) -> &Arc<dyn SnapshotStore> {
        &self.snapshots
    }

    pub fn provisioner(&self) -> &StoreProvisioner {
        &self.provisioner
    }

    // =========================================================================
    // DATABASE LIFECYCLE
    // =========================================================================

    /// Create a database owned by `owner_id`, provision its store, and seed
    /// an empty backup.
    pub async fn create_database(&self, owner_id: &str, name: &str) -> Result<SharedDatabase> {
        let start = Instant::now();
        validate_user_id(owner_id)?;
        let name = normalize_database_name(name)?;

        let id = new_database_id();
        let locator = self.provisioner.locator(&id)?;
        let db = self
            .registry
            .create_database(
                &id,
                owner_id,
                &name,
                &locator.to_string_lossy(),
                self.max_databases_per_user,
            )
            .await?;

        if let Err(e) = self.provisioner.provision(&id).await {
            if let Err(rollback) = self.registry.remove_database(&id).await {
                warn!(
                    subsystem = "service",
                    op = "create_database",
                    database_id = %id,
                    error = %rollback,
                    "Failed to roll back registry row after provisioning failure"
                );
            }
            return Err(e);
        }

        if let Err(e) = self
            .snapshots
            .save(&id, owner_id, Snapshot::empty(&id, owner_id))
            .await
        {
            warn!(
                subsystem = "service",
                op = "create_database",
                database_id = %id,
                error = %e,
                "Failed to seed empty snapshot"
            );
        }

        info!(
            subsystem = "service",
            component = "collaboration",
            op = "create_database",
            database_id = %id,
            user_id = owner_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Database created"
        );
        Ok(db)
    }

    pub async fn list_databases(&self, user_id: &str) -> Result<Vec<SharedDatabase>> {
        self.registry.list_databases(user_id).await
    }

    pub async fn get_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        self.registry.get_database(id, user_id).await
    }

    pub async fn rename_database(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<SharedDatabase> {
        self.registry.rename_database(id, user_id, name).await
    }

    /// Delete the registry row, then the physical store and the snapshot.
    ///
    /// Once the row is gone the database is deleted as far as callers are
    /// concerned; store or snapshot cleanup failures are logged and left for
    /// operators.
    pub async fn delete_database(&self, id: &str, user_id: &str) -> Result<()> {
        let db = self.registry.delete_database(id, user_id).await?;

        if let Err(e) = self.provisioner.destroy(&db.id).await {
            warn!(
                subsystem = "service",
                op = "delete_database",
                database_id = %db.id,
                error = %e,
                "Physical store cleanup failed; registry row already removed"
            );
        }
        if let Err(e) = self.snapshots.delete(&db.id).await {
            warn!(
                subsystem = "service",
                op = "delete_database",
                database_id = %db.id,
                error = %e,
                "Snapshot cleanup failed; registry row already removed"
            );
        }

        info!(
            subsystem = "service",
            component = "collaboration",
            op = "delete_database",
            database_id = %db.id,
            user_id,
            "Database deleted"
        );
        Ok(())
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    pub async fn add_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        new_user_id: &str,
    ) -> Result<SharedDatabase> {
        self.registry.add_collaborator(id, owner_id, new_user_id).await
    }

    pub async fn remove_collaborator(
        &self,
        id: &str,
        owner_id: &str,
        target_user_id: &str,
    ) -> Result<SharedDatabase> {
        self.registry
            .remove_collaborator(id, owner_id, target_user_id)
            .await
    }

    pub async fn leave_database(&self, id: &str, user_id: &str) -> Result<()> {
        self.registry.leave_database(id, user_id).await
    }

    pub async fn join_database(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        self.registry.join_database(id, user_id).await
    }

    pub async fn transfer_ownership(
        &self,
        id: &str,
        current_owner_id: &str,
        new_owner_id: &str,
    ) -> Result<SharedDatabase> {
        self.registry
            .transfer_ownership(id, current_owner_id, new_owner_id)
            .await
    }

    pub async fn list_members(&self, id: &str, user_id: &str) -> Result<Vec<Member>> {
        self.registry.list_members(id, user_id).await
    }

    pub async fn invite_user(
        &self,
        id: &str,
        owner_id: &str,
        invitee_id: &str,
    ) -> Result<Invitation> {
        self.registry.invite_user(id, owner_id, invitee_id).await
    }

    pub async fn pending_invitations(&self, user_id: &str) -> Result<Vec<Invitation>> {
        self.registry.pending_invitations(user_id).await
    }

    pub async fn accept_invitation(
        &self,
        invitation_id: i64,
        user_id: &str,
    ) -> Result<SharedDatabase> {
        self.registry.accept_invitation(invitation_id, user_id).await
    }

    pub async fn decline_invitation(&self, invitation_id: i64, user_id: &str) -> Result<()> {
        self.registry.decline_invitation(invitation_id, user_id).await
    }

    // =========================================================================
    // SYNC AND BACKUP
    // =========================================================================

    /// Member-only guard; returns the registry row.
    async fn authorize_read(&self, id: &str, user_id: &str) -> Result<SharedDatabase> {
        self.registry.get_database(id, user_id).await
    }

    /// Bump the change counter after a committed store write. The write
    /// already succeeded, so a failure here is only logged.
    async fn record_change(&self, id: &str, op: &'static str) {
        if let Err(e) = self.registry.record_change(id).await {
            warn!(
                subsystem = "service",
                op,
                database_id = id,
                error = %e,
                "Failed to bump database version"
            );
        }
    }

    /// Change counter and time of the last committed write.
    pub async fn database_version(&self, id: &str, user_id: &str) -> Result<DatabaseVersion> {
        self.registry.database_version(id, user_id).await
    }

    /// Merge a client bundle into the live store.
    pub async fn sync(
        &self,
        id: &str,
        user_id: &str,
        bundle: &EntityBundle,
    ) -> Result<UpsertSummary> {
        let db = self.authorize_read(id, user_id).await?;
        let summary = self.reconciler.upsert(&db.id, bundle).await?;
        self.record_change(&db.id, "sync").await;
        Ok(summary)
    }

    /// Replace the live store's contents with `snapshot`.
    pub async fn replace_all(&self, id: &str, user_id: &str, snapshot: &Snapshot) -> Result<()> {
        let db = self.authorize_read(id, user_id).await?;
        self.reconciler.replace_all(&db.id, snapshot).await?;
        self.record_change(&db.id, "replace_all").await;
        Ok(())
    }

    /// Current live store contents as an unsaved snapshot.
    pub async fn export_all(&self, id: &str, user_id: &str) -> Result<Snapshot> {
        let db = self.authorize_read(id, user_id).await?;
        self.reconciler.export_all(&db.id, user_id).await
    }

    /// Persist a client-submitted snapshot as the database's backup.
    pub async fn save_backup(
        &self,
        id: &str,
        user_id: &str,
        snapshot: Snapshot,
    ) -> Result<Snapshot> {
        let db = self.authorize_read(id, user_id).await?;
        self.snapshots.save(&db.id, user_id, snapshot).await
    }

    /// Export the live store and persist it as the database's backup.
    pub async fn backup_from_store(&self, id: &str, user_id: &str) -> Result<Snapshot> {
        let db = self.authorize_read(id, user_id).await?;
        let snapshot = self.reconciler.export_all(&db.id, user_id).await?;
        self.snapshots.save(&db.id, user_id, snapshot).await
    }

    /// Saved backup, or an empty snapshot if none was saved yet.
    pub async fn get_backup(&self, id: &str, user_id: &str) -> Result<Snapshot> {
        let db = self.authorize_read(id, user_id).await?;
        self.snapshots.load(&db.id, user_id).await
    }

    /// Replace the live store with the saved backup. Returns the snapshot
    /// that was applied.
    pub async fn restore_from_backup(&self, id: &str, user_id: &str) -> Result<Snapshot> {
        let db = self.authorize_read(id, user_id).await?;
        let snapshot = self.snapshots.load(&db.id, user_id).await?;
        self.reconciler.replace_all(&db.id, &snapshot).await?;
        self.record_change(&db.id, "restore_from_backup").await;

        info!(
            subsystem = "service",
            component = "collaboration",
            op = "restore_from_backup",
            database_id = %db.id,
            user_id,
            row_count = snapshot.entities.len() as u64,
            "Database restored from backup"
        );
        Ok(snapshot)
    }

    /// Row counts per table and bytes on disk.
    pub async fn database_stats(&self, id: &str, user_id: &str) -> Result<DatabaseStats> {
        let db = self.authorize_read(id, user_id).await?;

        let mut stats = DatabaseStats {
            database_id: db.id.clone(),
            ..Default::default()
        };
        let mut store = self.provisioner.open(&db.id).await?;
        let mut counted = Ok(());
        for kind in EntityKind::ALL {
            match store.count(kind).await {
                Ok(n) => stats.set_count(kind, n),
                Err(e) => {
                    counted = Err(e);
                    break;
                }
            }
        }
        store.close_with(counted).await?;

        stats.size_bytes = self.provisioner.size_bytes(&db.id).await?;
        Ok(stats)
    }

    // =========================================================================
    // LIVE ENTITIES
    // =========================================================================

    pub async fn list_entities<E: StoredEntity>(&self, id: &str, user_id: &str) -> Result<Vec<E>> {
        let db = self.authorize_read(id, user_id).await?;
        let mut store = self.provisioner.open(&db.id).await?;
        let result = store.list::<E>().await;
        store.close_with(result).await
    }

    pub async fn get_entity<E: StoredEntity>(
        &self,
        id: &str,
        user_id: &str,
        entity_id: i64,
    ) -> Result<E> {
        let db = self.authorize_read(id, user_id).await?;
        let mut store = self.provisioner.open(&db.id).await?;
        let result = store.get::<E>(entity_id).await;
        store.close_with(result).await
    }

    /// Create the entity when its id is zero or negative (the store assigns
    /// one), otherwise overwrite the existing entity with that id.
    pub async fn save_entity<E: StoredEntity>(
        &self,
        id: &str,
        user_id: &str,
        entity: E,
    ) -> Result<E> {
        let db = self.authorize_read(id, user_id).await?;
        let mut store = self.provisioner.open(&db.id).await?;
        let result = if entity.id() > 0 {
            store.update(entity).await
        } else {
            store.create(entity).await
        };
        let saved = store.close_with(result).await?;
        self.record_change(&db.id, "save_entity").await;
        Ok(saved)
    }

    pub async fn delete_entity<E: StoredEntity>(
        &self,
        id: &str,
        user_id: &str,
        entity_id: i64,
    ) -> Result<()> {
        let db = self.authorize_read(id, user_id).await?;
        let mut store = self.provisioner.open(&db.id).await?;
        let result = store.delete::<E>(entity_id).await;
        store.close_with(result).await?;
        self.record_change(&db.id, "delete_entity").await;
        Ok(())
    }

    pub async fn list_notes(&self, id: &str, user_id: &str) -> Result<Vec<Note>> {
        self.list_entities(id, user_id).await
    }

    pub async fn get_note(&self, id: &str, user_id: &str, note_id: i64) -> Result<Note> {
        self.get_entity(id, user_id, note_id).await
    }

    pub async fn save_note(&self, id: &str, user_id: &str, note: Note) -> Result<Note> {
        self.save_entity(id, user_id, note).await
    }

    pub async fn delete_note(&self, id: &str, user_id: &str, note_id: i64) -> Result<()> {
        self.delete_entity::<Note>(id, user_id, note_id).await
    }

    pub async fn list_folders(&self, id: &str, user_id: &str) -> Result<Vec<Folder>> {
        self.list_entities(id, user_id).await
    }

    pub async fn save_folder(&self, id: &str, user_id: &str, folder: Folder) -> Result<Folder> {
        self.save_entity(id, user_id, folder).await
    }

    /// Delete a folder; its notes and child folders become unfiled.
    pub async fn delete_folder(&self, id: &str, user_id: &str, folder_id: i64) -> Result<()> {
        self.delete_entity::<Folder>(id, user_id, folder_id).await
    }
}
