//! Open handle on one physical store.
//!
//! A [`StoreHandle`] owns a single SQLite connection for the duration of one
//! operation and is closed when the operation ends. It provides live CRUD for
//! each entity kind (server-assigned ids) plus the bulk primitives the sync
//! reconciler builds on (client-assigned ids).

use sqlx::sqlite::SqliteConnection;
use sqlx::Connection as _;
use tracing::debug;

use notesync_core::{
    Connection, EntityBundle, EntityKind, Error, Folder, Note, NoteImage, PinboardNote, Result,
    ScheduleEntry,
};

use crate::entities::{
    insert_sql, insert_with_id_sql, select_sql, update_sql, upsert_sql, StoredEntity,
};

/// Connection to one database's physical store.
#[derive(Debug)]
pub struct StoreHandle {
    database_id: String,
    conn: SqliteConnection,
    healed: Vec<EntityKind>,
}

impl StoreHandle {
    pub(crate) fn new(database_id: &str, conn: SqliteConnection, healed: Vec<EntityKind>) -> Self {
        Self {
            database_id: database_id.to_string(),
            conn,
            healed,
        }
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Tables that were missing when the store was opened and had to be
    /// recreated.
    pub fn healed_tables(&self) -> &[EntityKind] {
        &self.healed
    }

    // =========================================================================
    // LIVE CRUD
    // =========================================================================

    /// Every entity of one kind, ordered by id.
    pub async fn list<E: StoredEntity>(&mut self) -> Result<Vec<E>> {
        let sql = format!("{} ORDER BY id", select_sql::<E>());
        let rows = sqlx::query(&sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(Error::Database)?;
        rows.iter()
            .map(|row| E::from_row(row, &self.database_id))
            .collect()
    }

    pub async fn get<E: StoredEntity>(&mut self, id: i64) -> Result<E> {
        let sql = format!("{} WHERE id = ?", select_sql::<E>());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(Error::Database)?;
        match row {
            Some(row) => E::from_row(&row, &self.database_id),
            None => Err(self.missing(E::KIND, id)),
        }
    }

    /// Insert a new entity. The store assigns the id; whatever id the caller
    /// put on `entity` is ignored.
    pub async fn create<E: StoredEntity>(&mut self, mut entity: E) -> Result<E> {
        self.check_references(&entity).await?;

        let sql = insert_sql::<E>();
        let result = entity
            .bind_columns(sqlx::query(&sql))?
            .execute(&mut self.conn)
            .await
            .map_err(Error::Database)?;

        entity.set_id(result.last_insert_rowid());
        entity.set_database_id(&self.database_id);
        debug!(
            subsystem = "store",
            component = "entities",
            op = "create",
            database_id = %self.database_id,
            entity_kind = %E::KIND,
            entity_id = entity.id(),
            "Entity created"
        );
        Ok(entity)
    }

    /// Overwrite every field of an existing entity.
    pub async fn update<E: StoredEntity>(&mut self, mut entity: E) -> Result<E> {
        self.check_references(&entity).await?;

        let sql = update_sql::<E>();
        let result = entity
            .bind_columns(sqlx::query(&sql))?
            .bind(entity.id())
            .execute(&mut self.conn)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(self.missing(E::KIND, entity.id()));
        }
        entity.set_database_id(&self.database_id);
        Ok(entity)
    }

    /// Delete one entity. Deleting a folder detaches its notes and child
    /// folders in the same transaction; other references are left as-is.
    pub async fn delete<E: StoredEntity>(&mut self, id: i64) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;

        if E::KIND == EntityKind::Folder {
            sqlx::query("UPDATE notes SET folder_id = NULL WHERE folder_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            sqlx::query("UPDATE folders SET parent_id = NULL WHERE parent_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", E::KIND.table()))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the detach updates.
            return Err(Error::NotFound(format!(
                "{} {} not found in database {}",
                E::KIND,
                id,
                self.database_id
            )));
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn exists(&mut self, kind: EntityKind, id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ?", kind.table()))
                .bind(id)
                .fetch_optional(&mut self.conn)
                .await
                .map_err(Error::Database)?;
        Ok(found.is_some())
    }

    async fn check_references<E: StoredEntity>(&mut self, entity: &E) -> Result<()> {
        for (kind, id) in entity.references() {
            if !self.exists(kind, id).await? {
                return Err(Error::Validation(format!(
                    "{} references {} {} which does not exist in database {}",
                    E::KIND,
                    kind,
                    id,
                    self.database_id
                )));
            }
        }
        Ok(())
    }

    fn missing(&self, kind: EntityKind, id: i64) -> Error {
        Error::NotFound(format!(
            "{} {} not found in database {}",
            kind, id, self.database_id
        ))
    }

    // =========================================================================
    // BULK
    // =========================================================================

    /// Insert-or-overwrite every entity by its client-supplied id, as one
    /// transaction. Returns the number of rows written.
    pub async fn upsert_all<E: StoredEntity>(&mut self, entities: &[E]) -> Result<u64> {
        if entities.is_empty() {
            return Ok(0);
        }

        let sql = upsert_sql::<E>();
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;
        let mut written = 0;
        for entity in entities {
            let result = entity
                .bind_columns(sqlx::query(&sql).bind(entity.id()))?
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            written += result.rows_affected();
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(written)
    }

    pub async fn count(&mut self, kind: EntityKind) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", kind.table()))
            .fetch_one(&mut self.conn)
            .await
            .map_err(Error::Database)
    }

    /// All six tables in full, each list ordered by id and tagged with this
    /// store's database id.
    pub async fn export(&mut self) -> Result<EntityBundle> {
        Ok(EntityBundle {
            folders: self.list::<Folder>().await?,
            notes: self.list::<Note>().await?,
            schedule_entries: self.list::<ScheduleEntry>().await?,
            pinboard_notes: self.list::<PinboardNote>().await?,
            connections: self.list::<Connection>().await?,
            note_images: self.list::<NoteImage>().await?,
        })
    }

    /// Wipe all six tables and load `entities` with their ids preserved.
    ///
    /// Runs as a single transaction: on any failure the store keeps its
    /// previous contents.
    pub async fn replace_all(&mut self, entities: &EntityBundle) -> Result<()> {
        let mut tx = self.conn.begin().await.map_err(Error::Database)?;

        for kind in EntityKind::ALL {
            sqlx::query(&format!("DELETE FROM {}", kind.table()))
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        insert_rows(&mut tx, &entities.folders).await?;
        insert_rows(&mut tx, &entities.notes).await?;
        insert_rows(&mut tx, &entities.schedule_entries).await?;
        insert_rows(&mut tx, &entities.pinboard_notes).await?;
        insert_rows(&mut tx, &entities.connections).await?;
        insert_rows(&mut tx, &entities.note_images).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(Error::Database)
    }

    /// Close the handle, then hand back `result`. An operation error takes
    /// precedence over a close error.
    pub async fn close_with<T>(self, result: Result<T>) -> Result<T> {
        let closed = self.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }
}

async fn insert_rows<E: StoredEntity>(conn: &mut SqliteConnection, rows: &[E]) -> Result<()> {
    let sql = insert_with_id_sql::<E>();
    for entity in rows {
        entity
            .bind_columns(sqlx::query(&sql).bind(entity.id()))?
            .execute(&mut *conn)
            .await
            .map_err(Error::Database)?;
    }
    Ok(())
}
