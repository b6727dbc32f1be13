//! Bulk merge, replace, and export of a database's entity state.
//!
//! The reconciler does no access checks; callers authorize against the
//! registry first. Entity ids come from the client on every path here.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use notesync_core::{EntityBundle, Result, Snapshot};

use crate::provisioner::{log_failure, StoreProvisioner};
use crate::store::StoreHandle;

/// Per-kind row counts written by an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    pub folders: u64,
    pub notes: u64,
    pub schedule_entries: u64,
    pub pinboard_notes: u64,
    pub connections: u64,
    pub note_images: u64,
}

impl UpsertSummary {
    pub fn total(&self) -> u64 {
        self.folders
            + self.notes
            + self.schedule_entries
            + self.pinboard_notes
            + self.connections
            + self.note_images
    }
}

/// Merges client bundles into physical stores.
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    provisioner: StoreProvisioner,
}

impl SyncReconciler {
    pub fn new(provisioner: StoreProvisioner) -> Self {
        Self { provisioner }
    }

    /// Insert-or-overwrite every entity of `bundle` by id.
    ///
    /// Each list is applied as its own transaction. Last write wins per
    /// entity; there is no version comparison. Applying the same bundle
    /// twice leaves the store exactly as applying it once.
    pub async fn upsert(&self, database_id: &str, bundle: &EntityBundle) -> Result<UpsertSummary> {
        let start = Instant::now();
        let mut bundle = bundle.clone();
        bundle.retag(database_id);

        let mut store = self.provisioner.open(database_id).await?;
        let result = upsert_lists(&mut store, &bundle).await;
        let summary = store
            .close_with(result)
            .await
            .inspect_err(|e| log_failure("upsert", database_id, e))?;

        debug!(
            subsystem = "sync",
            component = "reconciler",
            op = "upsert",
            database_id,
            folders = summary.folders,
            notes = summary.notes,
            schedule_entries = summary.schedule_entries,
            pinboard_notes = summary.pinboard_notes,
            connections = summary.connections,
            note_images = summary.note_images,
            duration_ms = start.elapsed().as_millis() as u64,
            "Bundle upserted"
        );
        Ok(summary)
    }

    /// Wipe all six tables and bulk-load the snapshot's entities.
    ///
    /// All-or-nothing: a failure leaves the previous contents in place.
    pub async fn replace_all(&self, database_id: &str, snapshot: &Snapshot) -> Result<()> {
        let start = Instant::now();

        let mut store = self.provisioner.open(database_id).await?;
        let result = store.replace_all(&snapshot.entities).await;
        store
            .close_with(result)
            .await
            .inspect_err(|e| log_failure("replace_all", database_id, e))?;

        info!(
            subsystem = "sync",
            component = "reconciler",
            op = "replace_all",
            database_id,
            row_count = snapshot.entities.len() as u64,
            duration_ms = start.elapsed().as_millis() as u64,
            "Store replaced from snapshot"
        );
        Ok(())
    }

    /// Read all six tables into an unsaved snapshot attributed to `user_id`.
    pub async fn export_all(&self, database_id: &str, user_id: &str) -> Result<Snapshot> {
        let mut store = self.provisioner.open(database_id).await?;
        let result = store.export().await;
        let entities = store
            .close_with(result)
            .await
            .inspect_err(|e| log_failure("export_all", database_id, e))?;

        debug!(
            subsystem = "sync",
            component = "reconciler",
            op = "export_all",
            database_id,
            row_count = entities.len() as u64,
            "Store exported"
        );
        Ok(Snapshot::from_entities(database_id, user_id, entities))
    }
}

async fn upsert_lists(store: &mut StoreHandle, bundle: &EntityBundle) -> Result<UpsertSummary> {
    Ok(UpsertSummary {
        folders: store.upsert_all(&bundle.folders).await?,
        notes: store.upsert_all(&bundle.notes).await?,
        schedule_entries: store.upsert_all(&bundle.schedule_entries).await?,
        pinboard_notes: store.upsert_all(&bundle.pinboard_notes).await?,
        connections: store.upsert_all(&bundle.connections).await?,
        note_images: store.upsert_all(&bundle.note_images).await?,
    })
}
