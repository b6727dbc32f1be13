//! Live CRUD on opened stores, reference checks, and schema self-heal.

use std::time::Duration;

use sqlx::{ConnectOptions, Connection as _};

use notesync_db::test_fixtures::{connection, folder, note, note_image, TestEnvironment};
use notesync_db::{sqlite_options, Connection, EntityKind, ErrorKind, NoteImage};

#[tokio::test]
async fn test_create_assigns_ids_and_update_overwrites() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let first = service.save_note(&db.id, "u1", note(0, "Pack")).await.unwrap();
    let second = service.save_note(&db.id, "u1", note(0, "Tickets")).await.unwrap();
    assert!(first.id > 0);
    assert!(second.id > first.id);
    assert_eq!(first.database_id, db.id);

    let mut edited = first.clone();
    edited.title = "Pack bags".to_string();
    service.save_note(&db.id, "u1", edited).await.unwrap();

    let fetched = service.get_note(&db.id, "u1", first.id).await.unwrap();
    assert_eq!(fetched.title, "Pack bags");
    assert_eq!(service.list_notes(&db.id, "u1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_entities_are_not_found() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service.get_note(&db.id, "u1", 404).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .save_note(&db.id, "u1", note(404, "ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.delete_note(&db.id, "u1", 404).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_live_path_checks_references() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let mut orphan = note(0, "Orphan");
    orphan.folder_id = Some(99);
    let err = service.save_note(&db.id, "u1", orphan).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = service
        .save_entity(&db.id, "u1", connection(0, 1, 2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let parent = service.save_folder(&db.id, "u1", folder(0, "Trip")).await.unwrap();
    let mut filed = note(0, "Filed");
    filed.folder_id = Some(parent.id);
    let filed = service.save_note(&db.id, "u1", filed).await.unwrap();

    let image: NoteImage = service
        .save_entity(&db.id, "u1", note_image(0, filed.id, "map.png"))
        .await
        .unwrap();
    assert_eq!(image.note_id, filed.id);
}

#[tokio::test]
async fn test_folder_delete_detaches_notes_and_children() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let parent = service.save_folder(&db.id, "u1", folder(0, "Trip")).await.unwrap();
    let mut child = folder(0, "Day trips");
    child.parent_id = Some(parent.id);
    let child = service.save_folder(&db.id, "u1", child).await.unwrap();
    let mut filed = note(0, "Filed");
    filed.folder_id = Some(parent.id);
    let filed = service.save_note(&db.id, "u1", filed).await.unwrap();

    service.delete_folder(&db.id, "u1", parent.id).await.unwrap();

    let folders = service.list_folders(&db.id, "u1").await.unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, child.id);
    assert_eq!(folders[0].parent_id, None);
    let note = service.get_note(&db.id, "u1", filed.id).await.unwrap();
    assert_eq!(note.folder_id, None);
}

#[tokio::test]
async fn test_note_delete_leaves_other_references() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let a = service.save_note(&db.id, "u1", note(0, "A")).await.unwrap();
    let b = service.save_note(&db.id, "u1", note(0, "B")).await.unwrap();
    service
        .save_entity(&db.id, "u1", connection(0, a.id, b.id))
        .await
        .unwrap();

    service.delete_note(&db.id, "u1", a.id).await.unwrap();
    let edges: Vec<Connection> = service.list_entities(&db.id, "u1").await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from_id, a.id);
}

#[tokio::test]
async fn test_open_recreates_dropped_tables() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let path = service.provisioner().locator(&db.id).unwrap();
    let mut raw = sqlite_options(&path, Duration::from_secs(1))
        .connect()
        .await
        .unwrap();
    sqlx::query("DROP TABLE notes").execute(&mut raw).await.unwrap();
    sqlx::query("DROP TABLE note_images")
        .execute(&mut raw)
        .await
        .unwrap();
    raw.close().await.unwrap();

    let handle = service.provisioner().open(&db.id).await.unwrap();
    assert_eq!(
        handle.healed_tables(),
        &[EntityKind::Note, EntityKind::NoteImage]
    );
    handle.close().await.unwrap();

    assert!(service.list_notes(&db.id, "u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_count_rows() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    service
        .sync(&db.id, "u1", &notesync_db::test_fixtures::sample_bundle())
        .await
        .unwrap();

    let stats = service.database_stats(&db.id, "u1").await.unwrap();
    assert_eq!(stats.folders, 2);
    assert_eq!(stats.notes, 2);
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.total_rows(), 8);
    assert!(stats.size_bytes > 0);

    let err = service.database_stats(&db.id, "u9").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
