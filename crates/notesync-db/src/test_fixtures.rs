//! Test fixtures for integration tests.
//!
//! Every [`TestEnvironment`] lives in its own temporary directory, so tests
//! can run in parallel and need no external database server.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notesync_db::test_fixtures::{note, TestEnvironment};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let env = TestEnvironment::new().await;
//!     let db = env.service.create_database("u1", "Trip Notes").await.unwrap();
//!     // ...
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use notesync_core::{
    Connection, EntityBundle, Folder, Note, NoteImage, PinboardNote, ScheduleEntry,
};

use crate::config::StorageConfig;
use crate::pool::PoolConfig;
use crate::service::CollaborationService;

/// A service backed by a throw-away data directory.
pub struct TestEnvironment {
    pub service: CollaborationService,
    pub config: StorageConfig,
    // Held so the directory outlives the service.
    _dir: TempDir,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_config(|c| c).await
    }

    /// Build with a tweaked [`StorageConfig`] (quota, pool size, ...).
    pub async fn with_config(tweak: impl FnOnce(StorageConfig) -> StorageConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = tweak(
            StorageConfig::under(dir.path()).pool(PoolConfig::default().max_connections(4)),
        );
        let service = CollaborationService::open(&config)
            .await
            .expect("Failed to open collaboration service");
        Self {
            service,
            config,
            _dir: dir,
        }
    }
}

/// Fixed timestamp so fixtures compare equal across runs.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn folder(id: i64, name: &str) -> Folder {
    Folder {
        id,
        database_id: String::new(),
        name: name.to_string(),
        parent_id: None,
        color: notesync_core::defaults::FOLDER_COLOR,
        is_expanded: true,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn note(id: i64, title: &str) -> Note {
    Note {
        id,
        database_id: String::new(),
        title: title.to_string(),
        content: None,
        folder_id: None,
        created_at: fixed_time(),
        updated_at: fixed_time(),
        images: Vec::new(),
        metadata: Default::default(),
        content_json: None,
    }
}

pub fn schedule_entry(id: i64, date: &str, time: &str) -> ScheduleEntry {
    ScheduleEntry {
        id,
        database_id: String::new(),
        time: time.to_string(),
        date: date.to_string(),
        note: None,
        dynamic_fields_json: None,
        recurrence_json: None,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn pinboard_note(id: i64, title: &str) -> PinboardNote {
    PinboardNote {
        id,
        database_id: String::new(),
        title: title.to_string(),
        content: String::new(),
        position_x: 10.0,
        position_y: 20.0,
        width: notesync_core::defaults::PINBOARD_WIDTH,
        height: notesync_core::defaults::PINBOARD_HEIGHT,
        background_color: 0xFFFF_EB3B,
        icon: 0,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn connection(id: i64, from_id: i64, to_id: i64) -> Connection {
    Connection {
        id,
        database_id: String::new(),
        from_id,
        to_id,
        name: String::new(),
        connection_color: 0xFF00_0000,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

pub fn note_image(id: i64, note_id: i64, file_name: &str) -> NoteImage {
    NoteImage {
        id,
        database_id: String::new(),
        note_id,
        file_name: file_name.to_string(),
        image_data: None,
        created_at: fixed_time(),
    }
}

/// A bundle with at least one entity of every kind, references resolved.
pub fn sample_bundle() -> EntityBundle {
    let mut packing = note(1, "Pack");
    packing.folder_id = Some(10);
    packing.content = Some("passport, charger".to_string());
    packing.images = vec!["map.png".to_string()];
    packing.metadata.insert("pinned".to_string(), "true".to_string());

    let mut nested = folder(11, "Day trips");
    nested.parent_id = Some(10);

    EntityBundle {
        folders: vec![folder(10, "Trip"), nested],
        notes: vec![packing, note(2, "Tickets")],
        schedule_entries: vec![schedule_entry(1, "2026-07-01", "09:30")],
        pinboard_notes: vec![pinboard_note(1, "Ideas")],
        connections: vec![connection(1, 1, 2)],
        note_images: vec![note_image(1, 1, "map.png")],
    }
}
