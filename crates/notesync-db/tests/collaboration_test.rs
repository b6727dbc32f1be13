//! Registry and access-control behavior through the collaboration service.

use notesync_db::test_fixtures::{note, TestEnvironment};
use notesync_db::{EntityBundle, Error, ErrorKind, InvitationStatus, MemberRole};

#[tokio::test]
async fn test_created_database_is_listed_for_owner() {
    let env = TestEnvironment::new().await;
    let service = &env.service;

    let first = service.create_database("u1", "Trip Notes").await.unwrap();
    let second = service.create_database("u1", "Recipes").await.unwrap();

    let listed: Vec<String> = service
        .list_databases("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert!(listed.contains(&first.id));
    assert!(listed.contains(&second.id));
    assert!(service.list_databases("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_empty_name() {
    let env = TestEnvironment::new().await;
    let err = env.service.create_database("u1", "  ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(env.service.list_databases("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_owned_database_quota() {
    let env = TestEnvironment::with_config(|c| c.max_databases_per_user(2)).await;
    let service = &env.service;

    service.create_database("u1", "One").await.unwrap();
    service.create_database("u1", "Two").await.unwrap();
    let err = service.create_database("u1", "Three").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The cap is per owner.
    service.create_database("u2", "Other").await.unwrap();
}

#[tokio::test]
async fn test_non_member_is_forbidden_until_added() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service.get_database(&db.id, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    service.add_collaborator(&db.id, "u1", "u2").await.unwrap();
    let seen = service.get_database(&db.id, "u2").await.unwrap();
    assert_eq!(seen.id, db.id);
    assert!(seen.is_collaborator("u2"));
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let env = TestEnvironment::new().await;
    let err = env
        .service
        .get_database("0195f3c2-0000-7000-8000-000000000000", "u1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = env.service.export_all("../../etc", "u1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_trip_notes_scenario() {
    let env = TestEnvironment::new().await;
    let service = &env.service;

    let db = service.create_database("u1", "Trip Notes").await.unwrap();
    service.add_collaborator(&db.id, "u1", "u2").await.unwrap();

    let exported = service.export_all(&db.id, "u2").await.unwrap();
    assert!(exported.entities.is_empty());

    let bundle = EntityBundle {
        notes: vec![note(1, "Pack")],
        ..Default::default()
    };
    service.sync(&db.id, "u2", &bundle).await.unwrap();

    let exported = service.export_all(&db.id, "u2").await.unwrap();
    assert_eq!(exported.entities.notes.len(), 1);
    assert_eq!(exported.entities.notes[0].id, 1);
    assert_eq!(exported.entities.notes[0].title, "Pack");
    assert_eq!(exported.entities.notes[0].database_id, db.id);

    service.delete_database(&db.id, "u1").await.unwrap();
    for user in ["u1", "u2"] {
        let err = service.get_database(&db.id, user).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test]
async fn test_transfer_ownership_scenario() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service
        .transfer_ownership(&db.id, "u1", "u2")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    service.add_collaborator(&db.id, "u1", "u2").await.unwrap();
    let transferred = service.transfer_ownership(&db.id, "u1", "u2").await.unwrap();
    assert_eq!(transferred.owner_id, "u2");
    assert_eq!(transferred.member_count(), 2);

    let err = service.delete_database(&db.id, "u1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    service.delete_database(&db.id, "u2").await.unwrap();
}

#[tokio::test]
async fn test_only_owner_manages_database() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();
    service.add_collaborator(&db.id, "u1", "u2").await.unwrap();

    for err in [
        service.add_collaborator(&db.id, "u2", "u3").await.unwrap_err(),
        service.remove_collaborator(&db.id, "u2", "u1").await.unwrap_err(),
        service.rename_database(&db.id, "u2", "Mine").await.unwrap_err(),
        service.delete_database(&db.id, "u2").await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    let renamed = service.rename_database(&db.id, "u1", "Summer Trip").await.unwrap();
    assert_eq!(renamed.name, "Summer Trip");
}

#[tokio::test]
async fn test_leave_join_and_members() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service.leave_database(&db.id, "u1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    service.join_database(&db.id, "u2").await.unwrap();
    service.join_database(&db.id, "u2").await.unwrap();
    service.add_collaborator(&db.id, "u1", "u3").await.unwrap();

    let members = service.list_members(&db.id, "u3").await.unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].user_id, "u1");
    assert_eq!(members[0].role, MemberRole::Owner);
    assert!(members[1..]
        .iter()
        .all(|m| m.role == MemberRole::Collaborator));

    service.leave_database(&db.id, "u2").await.unwrap();
    assert!(service.list_databases("u2").await.unwrap().is_empty());
    let err = service.list_members(&db.id, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_concurrent_collaborator_adds_are_not_lost() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let (a, b, c) = tokio::join!(
        service.add_collaborator(&db.id, "u1", "u2"),
        service.add_collaborator(&db.id, "u1", "u3"),
        service.add_collaborator(&db.id, "u1", "u4"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let db = service.get_database(&db.id, "u1").await.unwrap();
    assert_eq!(db.collaborators.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_respect_quota() {
    let env = TestEnvironment::with_config(|c| c.max_databases_per_user(3)).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let service = env.service.clone();
            tokio::spawn(async move { service.create_database("u1", &format!("db {}", i)).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::ValidationError),
        }
    }
    assert_eq!(created, 3);
    assert_eq!(env.service.list_databases("u1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_invitation_flow() {
    let env = TestEnvironment::new().await;
    let service = &env.service;
    let db = service.create_database("u1", "Trip Notes").await.unwrap();

    let err = service.invite_user(&db.id, "u2", "u3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let to_u2 = service.invite_user(&db.id, "u1", "u2").await.unwrap();
    let to_u3 = service.invite_user(&db.id, "u1", "u3").await.unwrap();
    assert_eq!(to_u2.status, InvitationStatus::Pending);

    // Pending invitations grant no access.
    let err = service.get_database(&db.id, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let pending = service.pending_invitations("u2").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].database_id, db.id);

    let joined = service.accept_invitation(to_u2.id, "u2").await.unwrap();
    assert!(joined.is_collaborator("u2"));
    service.get_database(&db.id, "u2").await.unwrap();

    service.decline_invitation(to_u3.id, "u3").await.unwrap();
    assert!(service.pending_invitations("u3").await.unwrap().is_empty());
    let err = service.get_database(&db.id, "u3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = service.accept_invitation(to_u3.id, "u3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}
