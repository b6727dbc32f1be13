//! Filesystem snapshot backup store.
//!
//! One JSON document per database at `<snapshots_dir>/<database_id>.json`.
//! Saving overwrites the previous document (single slot). Writes go to a
//! temp file that is renamed into place, so readers never observe a
//! half-written snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use notesync_core::defaults::SNAPSHOT_EXTENSION;
use notesync_core::{validate_database_id, Error, Result, Snapshot, SnapshotStore};

const TEMP_PREFIX: &str = ".snapshot-";
const TEMP_SUFFIX: &str = ".tmp";

/// Snapshot store backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FilesystemSnapshotStore {
    root: PathBuf,
}

impl FilesystemSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot document for `database_id`.
    pub fn path_for(&self, database_id: &str) -> Result<PathBuf> {
        validate_database_id(database_id)?;
        Ok(self
            .root
            .join(format!("{}.{}", database_id, SNAPSHOT_EXTENSION)))
    }

    /// Write `data` to a uniquely named temp file in the snapshot directory,
    /// then rename it over `path`. Concurrent writers never share a temp
    /// file, so the last rename wins and every reader sees a complete
    /// document.
    async fn write_atomic(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            warn!(root = %self.root.display(), error = %e, "snapshots: create_dir_all failed");
            e
        })?;

        let root = self.root.clone();
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut temp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .suffix(TEMP_SUFFIX)
                .tempfile_in(&root)?;
            temp.write_all(&data)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| {
                warn!(to = %target.display(), error = %e.error, "snapshots: persist failed");
                e.error
            })?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("snapshot writer task failed: {}", e)))??;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FilesystemSnapshotStore {
    async fn save(&self, database_id: &str, user_id: &str, mut snapshot: Snapshot) -> Result<Snapshot> {
        let path = self.path_for(database_id)?;

        snapshot.last_modified = Some(Utc::now());
        snapshot.database_id = database_id.to_string();
        snapshot.user_id = user_id.to_string();
        snapshot.entities.retag(database_id);

        let data = serde_json::to_vec(&snapshot)?;
        let size_bytes = data.len() as u64;
        self.write_atomic(&path, data).await.inspect_err(|e| {
            tracing::error!(
                subsystem = "snapshots",
                op = "save",
                database_id,
                error = %e,
                "Snapshot write failed"
            )
        })?;

        info!(
            subsystem = "snapshots",
            component = "filesystem",
            op = "save",
            database_id,
            user_id,
            row_count = snapshot.entities.len() as u64,
            size_bytes,
            "Snapshot saved"
        );
        Ok(snapshot)
    }

    async fn load(&self, database_id: &str, user_id: &str) -> Result<Snapshot> {
        let path = self.path_for(database_id)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    subsystem = "snapshots",
                    op = "load",
                    database_id,
                    "No snapshot saved yet; returning empty snapshot"
                );
                return Ok(Snapshot::empty(database_id, user_id));
            }
            Err(e) => {
                tracing::error!(
                    subsystem = "snapshots",
                    op = "load",
                    database_id,
                    error = %e,
                    "Snapshot read failed"
                );
                return Err(Error::Io(e));
            }
        };

        let mut snapshot: Snapshot = serde_json::from_slice(&data)?;
        snapshot.database_id = database_id.to_string();
        snapshot.entities.retag(database_id);
        Ok(snapshot)
    }

    async fn exists(&self, database_id: &str) -> Result<bool> {
        let path = self.path_for(database_id)?;
        Ok(fs::try_exists(path).await?)
    }

    async fn delete(&self, database_id: &str) -> Result<()> {
        let path = self.path_for(database_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::Note;
    use tempfile::TempDir;

    fn note(id: i64, title: &str) -> Note {
        Note {
            id,
            database_id: String::new(),
            title: title.to_string(),
            content: None,
            folder_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            images: vec![],
            metadata: Default::default(),
            content_json: None,
        }
    }

    #[tokio::test]
    async fn test_load_without_save_returns_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSnapshotStore::new(dir.path());

        let snapshot = store.load("db1", "u1").await.unwrap();
        assert!(snapshot.entities.is_empty());
        assert!(snapshot.last_modified.is_none());
        assert_eq!(snapshot.database_id, "db1");
        assert_eq!(snapshot.user_id, "u1");
        assert!(!store.exists("db1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_stamps_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSnapshotStore::new(dir.path().join("backups"));

        let mut first = Snapshot::empty("ignored", "ignored");
        first.entities.notes.push(note(1, "Pack"));
        let saved = store.save("db1", "u2", first).await.unwrap();
        assert!(saved.last_modified.is_some());
        assert_eq!(saved.database_id, "db1");
        assert_eq!(saved.user_id, "u2");
        assert_eq!(saved.entities.notes[0].database_id, "db1");

        let mut second = Snapshot::default();
        second.entities.notes.push(note(2, "Tickets"));
        store.save("db1", "u1", second).await.unwrap();

        let loaded = store.load("db1", "u3").await.unwrap();
        assert_eq!(loaded.entities.notes.len(), 1);
        assert_eq!(loaded.entities.notes[0].title, "Tickets");
        assert_eq!(loaded.user_id, "u1");

        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_on_one_id_all_succeed() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSnapshotStore::new(dir.path());

        for round in 0..10 {
            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let mut snapshot = Snapshot::default();
                        snapshot
                            .entities
                            .notes
                            .push(note(i, &format!("round {} writer {}", round, i)));
                        store.save("db1", "u1", snapshot).await
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }

            let loaded = store.load("db1", "u1").await.unwrap();
            assert_eq!(loaded.entities.notes.len(), 1);
            assert!(loaded.entities.notes[0]
                .title
                .starts_with(&format!("round {} ", round)));
        }

        let names: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["db1.json".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSnapshotStore::new(dir.path());

        store.save("db1", "u1", Snapshot::default()).await.unwrap();
        assert!(store.exists("db1").await.unwrap());
        store.delete("db1").await.unwrap();
        store.delete("db1").await.unwrap();
        assert!(!store.exists("db1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSnapshotStore::new(dir.path());
        let err = store.load("../x", "u1").await.unwrap_err();
        assert_eq!(err.kind(), notesync_core::ErrorKind::ValidationError);
    }
}
