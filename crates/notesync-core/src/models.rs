//! Data models for notesync.
//!
//! Entities carry an integer id that is unique only inside one physical
//! store, plus a `database_id` tag naming that store. Wire names are camelCase
//! and fixed; the snapshot document uses exactly the keys defined on
//! [`Snapshot`] and [`EntityBundle`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults;

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// The six entity collections held by every physical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    Note,
    ScheduleEntry,
    PinboardNote,
    Connection,
    NoteImage,
}

impl EntityKind {
    /// All kinds in dependency-friendly order (folders before notes, notes
    /// before images and connections).
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Folder,
        EntityKind::Note,
        EntityKind::ScheduleEntry,
        EntityKind::PinboardNote,
        EntityKind::Connection,
        EntityKind::NoteImage,
    ];

    /// Table name inside the physical store.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Folder => "folders",
            EntityKind::Note => "notes",
            EntityKind::ScheduleEntry => "schedule_entries",
            EntityKind::PinboardNote => "pinboard_notes",
            EntityKind::Connection => "connections",
            EntityKind::NoteImage => "note_images",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Folder => "folder",
            EntityKind::Note => "note",
            EntityKind::ScheduleEntry => "schedule_entry",
            EntityKind::PinboardNote => "pinboard_note",
            EntityKind::Connection => "connection",
            EntityKind::NoteImage => "note_image",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A folder grouping notes. Folders may nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    /// ARGB color value.
    #[serde(default = "default_folder_color")]
    pub color: i64,
    #[serde(default = "default_true")]
    pub is_expanded: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A note. `folder_id` is a soft reference into the same store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Image file names referenced inline by the note body.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Rich-text document as produced by the client editor.
    #[serde(default)]
    pub content_json: Option<String>,
}

/// A calendar entry. `time` is `HH:mm`, `date` is `yyyy-MM-dd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    pub time: String,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub dynamic_fields_json: Option<String>,
    #[serde(default)]
    pub recurrence_json: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A card placed on the pinboard canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinboardNote {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default = "default_pinboard_width")]
    pub width: f64,
    #[serde(default = "default_pinboard_height")]
    pub height: f64,
    /// ARGB color value.
    #[serde(default)]
    pub background_color: i64,
    /// Icon code point.
    #[serde(default)]
    pub icon: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A directed edge between two notes on the pinboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    pub from_id: i64,
    pub to_id: i64,
    #[serde(default)]
    pub name: String,
    /// ARGB color value.
    #[serde(default)]
    pub connection_color: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Metadata for an image attached to a note. The raw upload lives outside the
/// store; `image_data` carries the optional base64 payload submitted by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteImage {
    pub id: i64,
    #[serde(default)]
    pub database_id: String,
    pub note_id: i64,
    pub file_name: String,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_folder_color() -> i64 {
    defaults::FOLDER_COLOR
}

fn default_pinboard_width() -> f64 {
    defaults::PINBOARD_WIDTH
}

fn default_pinboard_height() -> f64 {
    defaults::PINBOARD_HEIGHT
}

// =============================================================================
// BUNDLES AND SNAPSHOTS
// =============================================================================

/// The six entity lists, as submitted by a client for sync or held by a
/// snapshot. Missing lists deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBundle {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub schedule_entries: Vec<ScheduleEntry>,
    #[serde(default)]
    pub pinboard_notes: Vec<PinboardNote>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub note_images: Vec<NoteImage>,
}

impl EntityBundle {
    /// Total number of entities across all six lists.
    pub fn len(&self) -> usize {
        self.folders.len()
            + self.notes.len()
            + self.schedule_entries.len()
            + self.pinboard_notes.len()
            + self.connections.len()
            + self.note_images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entities of one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Folder => self.folders.len(),
            EntityKind::Note => self.notes.len(),
            EntityKind::ScheduleEntry => self.schedule_entries.len(),
            EntityKind::PinboardNote => self.pinboard_notes.len(),
            EntityKind::Connection => self.connections.len(),
            EntityKind::NoteImage => self.note_images.len(),
        }
    }

    /// Rewrite every entity's `database_id` tag to `database_id`.
    pub fn retag(&mut self, database_id: &str) {
        for f in &mut self.folders {
            f.database_id = database_id.to_string();
        }
        for n in &mut self.notes {
            n.database_id = database_id.to_string();
        }
        for s in &mut self.schedule_entries {
            s.database_id = database_id.to_string();
        }
        for p in &mut self.pinboard_notes {
            p.database_id = database_id.to_string();
        }
        for c in &mut self.connections {
            c.database_id = database_id.to_string();
        }
        for i in &mut self.note_images {
            i.database_id = database_id.to_string();
        }
    }

    /// Sort every list by id. Stores export in id order, so a sorted bundle
    /// compares equal to an export of the same rows.
    pub fn sort_by_id(&mut self) {
        self.folders.sort_by_key(|e| e.id);
        self.notes.sort_by_key(|e| e.id);
        self.schedule_entries.sort_by_key(|e| e.id);
        self.pinboard_notes.sort_by_key(|e| e.id);
        self.connections.sort_by_key(|e| e.id);
        self.note_images.sort_by_key(|e| e.id);
    }
}

/// A full backup of one database: all six collections plus stamping metadata.
///
/// A snapshot always replaces the previous backup state wholesale; it is
/// never a diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub entities: EntityBundle,
    /// `None` until the snapshot has been saved at least once.
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub user_id: String,
}

impl Snapshot {
    /// An empty, well-formed snapshot for a database that has no backup yet.
    pub fn empty(database_id: &str, user_id: &str) -> Self {
        Self {
            entities: EntityBundle::default(),
            last_modified: None,
            database_id: database_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn from_entities(database_id: &str, user_id: &str, entities: EntityBundle) -> Self {
        Self {
            entities,
            last_modified: None,
            database_id: database_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

// =============================================================================
// REGISTRY TYPES
// =============================================================================

/// Registry row for one logical collaborative database.
///
/// `collaborators` never contains `owner_id`: owner and collaborator are
/// disjoint roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDatabase {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub collaborators: BTreeSet<String>,
    /// Opaque reference to the physical store (a file path for SQLite stores).
    pub store_locator: String,
}

impl SharedDatabase {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn is_collaborator(&self, user_id: &str) -> bool {
        self.collaborators.contains(user_id)
    }

    /// Owner or collaborator.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.is_collaborator(user_id)
    }

    /// Owner plus collaborators.
    pub fn member_count(&self) -> usize {
        1 + self.collaborators.len()
    }
}

/// Role of a member in a shared database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Collaborator,
}

/// One member of a shared database, as returned by member listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Lifecycle of an invitation. Only `Pending` invitations can be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "declined" => Some(InvitationStatus::Declined),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An owner's invitation for another user to join a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: i64,
    pub database_id: String,
    pub inviter_id: String,
    pub invitee_id: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Change counter of a database. `version` grows by one on every committed
/// write to the store; `last_sync` is the time of the latest one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseVersion {
    pub database_id: String,
    pub version: i64,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Row counts and file size of one physical store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub database_id: String,
    pub folders: i64,
    pub notes: i64,
    pub schedule_entries: i64,
    pub pinboard_notes: i64,
    pub connections: i64,
    pub note_images: i64,
    pub size_bytes: u64,
}

impl DatabaseStats {
    pub fn set_count(&mut self, kind: EntityKind, count: i64) {
        match kind {
            EntityKind::Folder => self.folders = count,
            EntityKind::Note => self.notes = count,
            EntityKind::ScheduleEntry => self.schedule_entries = count,
            EntityKind::PinboardNote => self.pinboard_notes = count,
            EntityKind::Connection => self.connections = count,
            EntityKind::NoteImage => self.note_images = count,
        }
    }

    pub fn total_rows(&self) -> i64 {
        self.folders
            + self.notes
            + self.schedule_entries
            + self.pinboard_notes
            + self.connections
            + self.note_images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_snapshot_wire_keys_are_canonical() {
        let snapshot = Snapshot::empty("db1", "u1");
        let value = serde_json::to_value(&snapshot).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "folders",
            "notes",
            "scheduleEntries",
            "pinboardNotes",
            "connections",
            "noteImages",
            "lastModified",
            "databaseId",
            "userId",
        ] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
        assert_eq!(obj.len(), 9);
    }

    #[test]
    fn test_snapshot_missing_lists_default_to_empty() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "notes": [{"id": 1, "title": "Pack"}],
            "databaseId": "db1"
        }))
        .unwrap();

        assert_eq!(snapshot.entities.notes.len(), 1);
        assert!(snapshot.entities.folders.is_empty());
        assert!(snapshot.entities.note_images.is_empty());
        assert!(snapshot.last_modified.is_none());
        assert_eq!(snapshot.user_id, "");
    }

    #[test]
    fn test_note_defaults() {
        let note: Note = serde_json::from_value(json!({"id": 7, "title": "t"})).unwrap();
        assert_eq!(note.content, None);
        assert_eq!(note.folder_id, None);
        assert!(note.images.is_empty());
        assert!(note.metadata.is_empty());
    }

    #[test]
    fn test_folder_and_pinboard_defaults() {
        let folder: Folder = serde_json::from_value(json!({"id": 1, "name": "f"})).unwrap();
        assert_eq!(folder.color, defaults::FOLDER_COLOR);
        assert!(folder.is_expanded);

        let card: PinboardNote = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(card.width, defaults::PINBOARD_WIDTH);
        assert_eq!(card.height, defaults::PINBOARD_HEIGHT);
    }

    #[test]
    fn test_bundle_retag_and_count() {
        let mut bundle = EntityBundle::default();
        bundle.notes.push(Note {
            id: 1,
            database_id: "other".into(),
            title: "a".into(),
            content: None,
            folder_id: None,
            created_at: ts(),
            updated_at: ts(),
            images: vec![],
            metadata: BTreeMap::new(),
            content_json: None,
        });
        bundle.connections.push(Connection {
            id: 3,
            database_id: String::new(),
            from_id: 1,
            to_id: 1,
            name: "self".into(),
            connection_color: 0,
            created_at: ts(),
            updated_at: ts(),
        });

        bundle.retag("db9");
        assert_eq!(bundle.notes[0].database_id, "db9");
        assert_eq!(bundle.connections[0].database_id, "db9");
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.count(EntityKind::Note), 1);
        assert_eq!(bundle.count(EntityKind::Folder), 0);
    }

    #[test]
    fn test_shared_database_roles() {
        let db = SharedDatabase {
            id: "db1".into(),
            name: "Trip Notes".into(),
            owner_id: "u1".into(),
            created_at: ts(),
            updated_at: ts(),
            collaborators: ["u2".to_string()].into_iter().collect(),
            store_locator: "/tmp/db1.db".into(),
        };

        assert!(db.is_owner("u1"));
        assert!(!db.is_collaborator("u1"));
        assert!(db.is_member("u2"));
        assert!(!db.is_member("u3"));
        assert_eq!(db.member_count(), 2);
    }

    #[test]
    fn test_entity_kind_tables() {
        let tables: Vec<_> = EntityKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(
            tables,
            vec![
                "folders",
                "notes",
                "schedule_entries",
                "pinboard_notes",
                "connections",
                "note_images"
            ]
        );
    }

    #[test]
    fn test_invitation_wire_shape() {
        let invitation = Invitation {
            id: 3,
            database_id: "db1".into(),
            inviter_id: "u1".into(),
            invitee_id: "u2".into(),
            status: InvitationStatus::Pending,
            created_at: ts(),
            expires_at: ts() + chrono::Duration::days(defaults::INVITATION_TTL_DAYS),
        };
        let value = serde_json::to_value(&invitation).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["inviteeId"], "u2");
        assert!(!invitation.is_expired_at(ts()));
        assert!(invitation.is_expired_at(invitation.expires_at));

        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Declined,
        ] {
            assert_eq!(InvitationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvitationStatus::parse("revoked"), None);
    }
}
