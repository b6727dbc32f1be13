//! Row mapping for the six entity kinds.
//!
//! [`StoredEntity`] describes how one entity type maps onto its store table:
//! the non-id columns in bind order, how to bind them, and how to rebuild the
//! entity from a row. The generic CRUD, upsert, and bulk-load code in
//! [`crate::store`] is written once against this trait.
//!
//! The `database_id` tag is not a column. It is stamped from the store id
//! when rows are read.

use std::collections::BTreeMap;

use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::Row;

use notesync_core::{
    Connection, EntityKind, Folder, Note, NoteImage, PinboardNote, Result, ScheduleEntry,
};

/// A query under construction against a store connection.
pub type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Mapping between an entity type and its store table.
pub trait StoredEntity: Sized + Send + Sync + Unpin + 'static {
    const KIND: EntityKind;

    /// Columns other than `id`, in the order [`StoredEntity::bind_columns`] binds them.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn set_database_id(&mut self, database_id: &str);

    /// Bind every non-id column value, in [`StoredEntity::COLUMNS`] order.
    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>>;

    /// Rebuild an entity from a row selected with [`select_sql`].
    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self>;

    /// Soft references this entity holds into the same store.
    fn references(&self) -> Vec<(EntityKind, i64)> {
        Vec::new()
    }
}

fn table<E: StoredEntity>() -> &'static str {
    E::KIND.table()
}

/// `SELECT id, <columns> FROM <table>` without a trailing clause.
pub fn select_sql<E: StoredEntity>() -> String {
    format!("SELECT id, {} FROM {}", E::COLUMNS.join(", "), table::<E>())
}

/// Insert with a caller-supplied id, or overwrite every column of the row
/// that already has that id.
pub fn upsert_sql<E: StoredEntity>() -> String {
    let placeholders = vec!["?"; E::COLUMNS.len() + 1].join(", ");
    let assignments = E::COLUMNS
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} (id, {}) VALUES ({}) ON CONFLICT (id) DO UPDATE SET {}",
        table::<E>(),
        E::COLUMNS.join(", "),
        placeholders,
        assignments
    )
}

/// Plain insert with a caller-supplied id (bulk load into an emptied table).
pub fn insert_with_id_sql<E: StoredEntity>() -> String {
    let placeholders = vec!["?"; E::COLUMNS.len() + 1].join(", ");
    format!(
        "INSERT INTO {} (id, {}) VALUES ({})",
        table::<E>(),
        E::COLUMNS.join(", "),
        placeholders
    )
}

/// Insert letting the store assign the id.
pub fn insert_sql<E: StoredEntity>() -> String {
    let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table::<E>(),
        E::COLUMNS.join(", "),
        placeholders
    )
}

/// Overwrite every non-id column; the id is bound last.
pub fn update_sql<E: StoredEntity>() -> String {
    let assignments = E::COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {} WHERE id = ?", table::<E>(), assignments)
}

// =============================================================================
// IMPLEMENTATIONS
// =============================================================================

impl StoredEntity for Folder {
    const KIND: EntityKind = EntityKind::Folder;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "parent_id",
        "color",
        "is_expanded",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        Ok(query
            .bind(self.name.as_str())
            .bind(self.parent_id)
            .bind(self.color)
            .bind(self.is_expanded)
            .bind(self.created_at)
            .bind(self.updated_at))
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        self.parent_id
            .map(|id| vec![(EntityKind::Folder, id)])
            .unwrap_or_default()
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        Ok(Folder {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            name: row.try_get("name")?,
            parent_id: row.try_get("parent_id")?,
            color: row.try_get("color")?,
            is_expanded: row.try_get("is_expanded")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredEntity for Note {
    const KIND: EntityKind = EntityKind::Note;
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "content",
        "folder_id",
        "created_at",
        "updated_at",
        "images",
        "metadata",
        "content_json",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        let images = serde_json::to_string(&self.images)?;
        let metadata = serde_json::to_string(&self.metadata)?;
        Ok(query
            .bind(self.title.as_str())
            .bind(self.content.as_deref())
            .bind(self.folder_id)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(images)
            .bind(metadata)
            .bind(self.content_json.as_deref()))
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        self.folder_id
            .map(|id| vec![(EntityKind::Folder, id)])
            .unwrap_or_default()
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        let images: Option<String> = row.try_get("images")?;
        let metadata: Option<String> = row.try_get("metadata")?;
        Ok(Note {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            folder_id: row.try_get("folder_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            images: parse_images(images.as_deref()),
            metadata: parse_metadata(metadata.as_deref()),
            content_json: row.try_get("content_json")?,
        })
    }
}

/// Malformed JSON in the images column reads as an empty list.
fn parse_images(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Malformed JSON in the metadata column reads as an empty map.
fn parse_metadata(raw: Option<&str>) -> BTreeMap<String, String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

impl StoredEntity for ScheduleEntry {
    const KIND: EntityKind = EntityKind::ScheduleEntry;
    const COLUMNS: &'static [&'static str] = &[
        "time",
        "date",
        "note",
        "dynamic_fields_json",
        "recurrence_json",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        Ok(query
            .bind(self.time.as_str())
            .bind(self.date.as_str())
            .bind(self.note.as_deref())
            .bind(self.dynamic_fields_json.as_deref())
            .bind(self.recurrence_json.as_deref())
            .bind(self.created_at)
            .bind(self.updated_at))
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        Ok(ScheduleEntry {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            time: row.try_get("time")?,
            date: row.try_get("date")?,
            note: row.try_get("note")?,
            dynamic_fields_json: row.try_get("dynamic_fields_json")?,
            recurrence_json: row.try_get("recurrence_json")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredEntity for PinboardNote {
    const KIND: EntityKind = EntityKind::PinboardNote;
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "content",
        "position_x",
        "position_y",
        "width",
        "height",
        "background_color",
        "icon",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        Ok(query
            .bind(self.title.as_str())
            .bind(self.content.as_str())
            .bind(self.position_x)
            .bind(self.position_y)
            .bind(self.width)
            .bind(self.height)
            .bind(self.background_color)
            .bind(self.icon)
            .bind(self.created_at)
            .bind(self.updated_at))
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        Ok(PinboardNote {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            position_x: row.try_get("position_x")?,
            position_y: row.try_get("position_y")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            background_color: row.try_get("background_color")?,
            icon: row.try_get("icon")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredEntity for Connection {
    const KIND: EntityKind = EntityKind::Connection;
    const COLUMNS: &'static [&'static str] = &[
        "from_id",
        "to_id",
        "name",
        "connection_color",
        "created_at",
        "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        Ok(query
            .bind(self.from_id)
            .bind(self.to_id)
            .bind(self.name.as_str())
            .bind(self.connection_color)
            .bind(self.created_at)
            .bind(self.updated_at))
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        vec![(EntityKind::Note, self.from_id), (EntityKind::Note, self.to_id)]
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        Ok(Connection {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            from_id: row.try_get("from_id")?,
            to_id: row.try_get("to_id")?,
            name: row.try_get("name")?,
            connection_color: row.try_get("connection_color")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredEntity for NoteImage {
    const KIND: EntityKind = EntityKind::NoteImage;
    const COLUMNS: &'static [&'static str] = &["note_id", "file_name", "image_data", "created_at"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn set_database_id(&mut self, database_id: &str) {
        self.database_id = database_id.to_string();
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> Result<SqliteQuery<'q>> {
        Ok(query
            .bind(self.note_id)
            .bind(self.file_name.as_str())
            .bind(self.image_data.as_deref())
            .bind(self.created_at))
    }

    fn references(&self) -> Vec<(EntityKind, i64)> {
        vec![(EntityKind::Note, self.note_id)]
    }

    fn from_row(row: &SqliteRow, database_id: &str) -> Result<Self> {
        Ok(NoteImage {
            id: row.try_get("id")?,
            database_id: database_id.to_string(),
            note_id: row.try_get("note_id")?,
            file_name: row.try_get("file_name")?,
            image_data: row.try_get("image_data")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
