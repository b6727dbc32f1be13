//! Upsert, replace-all, and export against real SQLite stores.

use notesync_db::test_fixtures::{connection, folder, note, sample_bundle, TestEnvironment};
use notesync_db::{EntityBundle, ErrorKind, Snapshot};

fn tagged(mut bundle: EntityBundle, database_id: &str) -> EntityBundle {
    bundle.retag(database_id);
    bundle.sort_by_id();
    bundle
}

#[tokio::test]
async fn test_replace_then_export_round_trips() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let input = Snapshot::from_entities(&db.id, "u1", sample_bundle());
    service.replace_all(&db.id, "u1", &input).await.unwrap();

    let exported = service.export_all(&db.id, "u1").await.unwrap();
    assert_eq!(exported.entities, tagged(sample_bundle(), &db.id));
    assert_eq!(exported.database_id, db.id);
}

#[tokio::test]
async fn test_replace_removes_rows_absent_from_snapshot() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    service
        .sync(&db.id, "u1", &sample_bundle())
        .await
        .unwrap();

    let replacement = EntityBundle {
        notes: vec![note(42, "Only one")],
        ..Default::default()
    };
    service
        .replace_all(&db.id, "u1", &Snapshot::from_entities(&db.id, "u1", replacement.clone()))
        .await
        .unwrap();

    let exported = service.export_all(&db.id, "u1").await.unwrap();
    assert_eq!(exported.entities, tagged(replacement, &db.id));
}

#[tokio::test]
async fn test_failed_replace_leaves_store_untouched() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();
    service.sync(&db.id, "u1", &sample_bundle()).await.unwrap();

    // Duplicate primary keys make the bulk load fail midway.
    let broken = EntityBundle {
        folders: vec![folder(1, "New")],
        notes: vec![note(5, "a"), note(5, "b")],
        ..Default::default()
    };
    let err = service
        .replace_all(&db.id, "u1", &Snapshot::from_entities(&db.id, "u1", broken))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);

    let exported = service.export_all(&db.id, "u1").await.unwrap();
    assert_eq!(exported.entities, tagged(sample_bundle(), &db.id));
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let bundle = sample_bundle();
    let first = service.sync(&db.id, "u1", &bundle).await.unwrap();
    let once = service.export_all(&db.id, "u1").await.unwrap();

    service.sync(&db.id, "u1", &bundle).await.unwrap();
    let twice = service.export_all(&db.id, "u1").await.unwrap();

    assert_eq!(first.total(), bundle.len() as u64);
    assert_eq!(once.entities, twice.entities);
}

#[tokio::test]
async fn test_upsert_overwrites_and_inserts_by_client_id() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let initial = EntityBundle {
        notes: vec![note(1, "Pack"), note(2, "Tickets")],
        ..Default::default()
    };
    service.sync(&db.id, "u1", &initial).await.unwrap();

    let mut edited = note(1, "Pack bags");
    edited.content = Some("socks".to_string());
    let update = EntityBundle {
        notes: vec![edited, note(900, "Visa")],
        ..Default::default()
    };
    service.sync(&db.id, "u1", &update).await.unwrap();

    let notes = service.export_all(&db.id, "u1").await.unwrap().entities.notes;
    let ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, 900]);
    assert_eq!(notes[0].title, "Pack bags");
    assert_eq!(notes[0].content.as_deref(), Some("socks"));
    assert_eq!(notes[1].title, "Tickets");
}

#[tokio::test]
async fn test_upsert_accepts_dangling_references() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    // Connections may arrive before the notes they link.
    let bundle = EntityBundle {
        connections: vec![connection(1, 77, 78)],
        ..Default::default()
    };
    service.sync(&db.id, "u1", &bundle).await.unwrap();

    let exported = service.export_all(&db.id, "u1").await.unwrap();
    assert_eq!(exported.entities.connections.len(), 1);
}

#[tokio::test]
async fn test_sync_requires_membership() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service
        .sync(&db.id, "u2", &sample_bundle())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = service.export_all(&db.id, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_concurrent_upserts_last_writer_wins_per_entity() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();
    service.add_collaborator(&db.id, "u1", "u2").await.unwrap();

    let from_u1 = EntityBundle {
        notes: vec![note(1, "from u1"), note(2, "only u1")],
        ..Default::default()
    };
    let from_u2 = EntityBundle {
        notes: vec![note(1, "from u2"), note(3, "only u2")],
        ..Default::default()
    };

    let (a, b) = tokio::join!(
        service.sync(&db.id, "u1", &from_u1),
        service.sync(&db.id, "u2", &from_u2),
    );
    a.unwrap();
    b.unwrap();

    let notes = service.export_all(&db.id, "u1").await.unwrap().entities.notes;
    let ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(notes[0].title == "from u1" || notes[0].title == "from u2");
}

#[tokio::test]
async fn test_concurrent_replace_all_leaves_one_complete_snapshot() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let left = EntityBundle {
        notes: vec![note(1, "left"), note(2, "left")],
        ..Default::default()
    };
    let right = EntityBundle {
        folders: vec![folder(1, "right")],
        notes: vec![note(3, "right")],
        ..Default::default()
    };
    let left_snapshot = Snapshot::from_entities(&db.id, "u1", left.clone());
    let right_snapshot = Snapshot::from_entities(&db.id, "u1", right.clone());

    let (a, b) = tokio::join!(
        service.replace_all(&db.id, "u1", &left_snapshot),
        service.replace_all(&db.id, "u1", &right_snapshot),
    );
    a.unwrap();
    b.unwrap();

    let exported = service.export_all(&db.id, "u1").await.unwrap().entities;
    assert!(exported == tagged(left, &db.id) || exported == tagged(right, &db.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sync_racing_delete_leaves_no_store_behind() {
    let env = TestEnvironment::new().await;

    for _ in 0..20 {
        let db = env.service.create_database("u1", "Short lived").await.unwrap();

        let syncer = {
            let service = env.service.clone();
            let id = db.id.clone();
            tokio::spawn(async move { service.sync(&id, "u1", &sample_bundle()).await })
        };
        let deleter = {
            let service = env.service.clone();
            let id = db.id.clone();
            tokio::spawn(async move { service.delete_database(&id, "u1").await })
        };

        deleter.await.unwrap().unwrap();
        // Either side may win; a sync that loses sees NotFound.
        let _ = syncer.await.unwrap();

        assert!(!env.service.provisioner().exists(&db.id).await.unwrap());
        let err = env.service.export_all(&db.id, "u1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!env.service.provisioner().exists(&db.id).await.unwrap());
    }
}

#[tokio::test]
async fn test_writes_bump_database_version() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let fresh = service.database_version(&db.id, "u1").await.unwrap();
    assert_eq!(fresh.version, 0);
    assert!(fresh.last_sync.is_none());

    service.sync(&db.id, "u1", &sample_bundle()).await.unwrap();
    let after_sync = service.database_version(&db.id, "u1").await.unwrap();
    assert_eq!(after_sync.version, 1);
    assert!(after_sync.last_sync.is_some());

    // Reads leave the counter alone.
    service.export_all(&db.id, "u1").await.unwrap();
    service.list_notes(&db.id, "u1").await.unwrap();

    let saved = service.save_note(&db.id, "u1", note(0, "Extra")).await.unwrap();
    service.delete_note(&db.id, "u1", saved.id).await.unwrap();
    service
        .replace_all(&db.id, "u1", &Snapshot::empty(&db.id, "u1"))
        .await
        .unwrap();
    assert_eq!(
        service.database_version(&db.id, "u1").await.unwrap().version,
        4
    );

    // A failed write does not count.
    let err = service.delete_note(&db.id, "u1", 9999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        service.database_version(&db.id, "u1").await.unwrap().version,
        4
    );

    let err = service.database_version(&db.id, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
