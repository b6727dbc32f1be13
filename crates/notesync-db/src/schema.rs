//! DDL for the registry and for physical stores.
//!
//! Every statement is `IF NOT EXISTS`, so applying a schema is idempotent.
//! Soft references between entity tables (note → folder, connection → note,
//! image → note) are deliberately not SQL foreign keys: sync and restore
//! submit rows in arbitrary order.

use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use notesync_core::{EntityKind, Error, Result};

/// Bumped whenever a store table gains a column or a new table appears.
/// Recorded in `PRAGMA user_version` of every store.
pub const STORE_SCHEMA_VERSION: i64 = 1;

const REGISTRY_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS shared_databases (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        store_locator TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        last_sync TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_shared_databases_owner ON shared_databases (owner_id)",
    r#"
    CREATE TABLE IF NOT EXISTS database_collaborators (
        database_id TEXT NOT NULL REFERENCES shared_databases (id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        added_at TEXT NOT NULL,
        PRIMARY KEY (database_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_database_collaborators_user ON database_collaborators (user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS database_invitations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        database_id TEXT NOT NULL REFERENCES shared_databases (id) ON DELETE CASCADE,
        inviter_id TEXT NOT NULL,
        invitee_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_database_invitations_invitee \
     ON database_invitations (invitee_id, status)",
];

/// Columns added to `shared_databases` after its first release. Registries
/// created earlier gain them on migrate.
const REGISTRY_ADDED_COLUMNS: &[(&str, &str)] = &[
    ("version", "INTEGER NOT NULL DEFAULT 0"),
    ("last_sync", "TEXT"),
];

/// Create the registry tables if absent and add columns missing from
/// older registries.
pub async fn apply_registry_schema(pool: &SqlitePool) -> Result<()> {
    for statement in REGISTRY_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(Error::Database)?;
    }

    let columns: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info('shared_databases')")
            .fetch_all(pool)
            .await
            .map_err(Error::Database)?;

    for (name, definition) in REGISTRY_ADDED_COLUMNS {
        if columns.iter().any(|c| c == name) {
            continue;
        }
        sqlx::query(&format!(
            "ALTER TABLE shared_databases ADD COLUMN {} {}",
            name, definition
        ))
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        debug!(
            subsystem = "registry",
            component = "schema",
            op = "add_column",
            column = name,
            "Added missing registry column"
        );
    }
    Ok(())
}

/// DDL for one store table plus its indexes.
fn table_statements(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Folder => &[r#"
            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                parent_id INTEGER,
                color INTEGER NOT NULL DEFAULT 4282532418,
                is_expanded INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#],
        EntityKind::Note => &[
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT,
                folder_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                images TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}',
                content_json TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_notes_folder ON notes (folder_id)",
        ],
        EntityKind::ScheduleEntry => &[r#"
            CREATE TABLE IF NOT EXISTS schedule_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time TEXT NOT NULL,
                date TEXT NOT NULL,
                note TEXT,
                dynamic_fields_json TEXT,
                recurrence_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#],
        EntityKind::PinboardNote => &[r#"
            CREATE TABLE IF NOT EXISTS pinboard_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL DEFAULT '',
                position_x REAL NOT NULL DEFAULT 0,
                position_y REAL NOT NULL DEFAULT 0,
                width REAL NOT NULL DEFAULT 200,
                height REAL NOT NULL DEFAULT 150,
                background_color INTEGER NOT NULL DEFAULT 0,
                icon INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#],
        EntityKind::Connection => &[
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_id INTEGER NOT NULL,
                to_id INTEGER NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                connection_color INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_connections_from ON connections (from_id)",
            "CREATE INDEX IF NOT EXISTS idx_connections_to ON connections (to_id)",
        ],
        EntityKind::NoteImage => &[
            r#"
            CREATE TABLE IF NOT EXISTS note_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                note_id INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                image_data TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_note_images_note ON note_images (note_id)",
        ],
    }
}

/// Tables of the six entity kinds currently present in a store.
pub async fn existing_store_tables(conn: &mut SqliteConnection) -> Result<Vec<EntityKind>> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Database)?;

    let names: Vec<String> = rows
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<_, _>>()
        .map_err(Error::Database)?;

    Ok(EntityKind::ALL
        .into_iter()
        .filter(|kind| names.iter().any(|n| n == kind.table()))
        .collect())
}

/// Create every missing entity table in a store and stamp the schema version.
///
/// Returns the kinds whose tables had to be created. An empty result means
/// the store was already complete.
pub async fn ensure_store_tables(conn: &mut SqliteConnection) -> Result<Vec<EntityKind>> {
    let present = existing_store_tables(conn).await?;
    let missing: Vec<EntityKind> = EntityKind::ALL
        .into_iter()
        .filter(|kind| !present.contains(kind))
        .collect();

    for kind in &missing {
        for statement in table_statements(*kind) {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(Error::Database)?;
        }
        debug!(
            subsystem = "store",
            component = "schema",
            op = "create_table",
            entity_kind = %kind,
            table = kind.table(),
            "Created missing store table"
        );
    }

    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(Error::Database)?;
    if version < STORE_SCHEMA_VERSION {
        // PRAGMA does not accept bound parameters.
        sqlx::query(&format!("PRAGMA user_version = {}", STORE_SCHEMA_VERSION))
            .execute(&mut *conn)
            .await
            .map_err(Error::Database)?;
    }

    Ok(missing)
}
