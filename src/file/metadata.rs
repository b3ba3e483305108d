//! File records and their repository.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::folder::parse_timestamp;
use super::Attributes;
use crate::{FolioError, Result};

const FILE_COLUMNS: &str = "id, folders_id, file, obscured_filename, mimetype, referenced_table,
     referenced_id, attributes, created_by, updated_by, created_at, updated_at";

/// Reference to an external entity owning a file (many files to one entity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// Table-like discriminator, e.g. `articles`.
    pub table: String,
    /// Entity id within that table.
    pub id: i64,
}

impl EntityRef {
    /// Create a new reference.
    pub fn new(table: impl Into<String>, id: i64) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }
}

/// A persisted file row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRow {
    /// Unique file ID.
    pub id: i64,
    /// Owning folder ID.
    pub folders_id: i64,
    /// Display name.
    pub file: String,
    /// Physical name when it differs from the display name.
    pub obscured_filename: Option<String>,
    /// Cached MIME type.
    pub mimetype: Option<String>,
    /// Owning entity table.
    pub referenced_table: Option<String>,
    /// Owning entity id.
    pub referenced_id: Option<i64>,
    /// Free-form attributes.
    #[sqlx(try_from = "String")]
    pub attributes: Attributes,
    /// Creating user reference.
    pub created_by: Option<i64>,
    /// Last updating user reference.
    pub updated_by: Option<i64>,
    /// When the row was created.
    pub created_at: String,
    /// When the row was last updated.
    pub updated_at: String,
}

impl FileRow {
    /// Name of the file on disk.
    pub fn physical_name(&self) -> &str {
        self.obscured_filename.as_deref().unwrap_or(&self.file)
    }

    /// Owning entity, if both reference columns are set.
    pub fn reference(&self) -> Option<EntityRef> {
        match (&self.referenced_table, self.referenced_id) {
            (Some(table), Some(id)) => Some(EntityRef::new(table.clone(), id)),
            _ => None,
        }
    }

    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        parse_timestamp(&self.created_at)
    }
}

/// In-memory handle for a persisted file record.
#[derive(Debug)]
pub struct FileRecord {
    id: i64,
    row: RwLock<FileRow>,
}

impl FileRecord {
    pub(crate) fn from_row(row: FileRow) -> Self {
        Self {
            id: row.id,
            row: RwLock::new(row),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FileRow> {
        self.row.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// File ID.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Snapshot of the current row.
    pub fn row(&self) -> FileRow {
        self.read().clone()
    }

    /// Owning folder ID.
    pub fn folder_id(&self) -> i64 {
        self.read().folders_id
    }

    /// Name surfaced to the rest of the application.
    pub fn display_name(&self) -> String {
        self.read().file.clone()
    }

    /// Physical name, if obscured.
    pub fn obscured_name(&self) -> Option<String> {
        self.read().obscured_filename.clone()
    }

    /// Whether the physical name differs from the display name.
    pub fn is_obscured(&self) -> bool {
        self.read().obscured_filename.is_some()
    }

    /// Name of the file on disk.
    pub fn physical_name(&self) -> String {
        self.read().physical_name().to_string()
    }

    /// Stored MIME type.
    pub fn stored_mime_type(&self) -> Option<String> {
        self.read().mimetype.clone()
    }

    /// Owning entity.
    pub fn reference(&self) -> Option<EntityRef> {
        self.read().reference()
    }

    /// Free-form attributes.
    pub fn attributes(&self) -> Attributes {
        self.read().attributes.clone()
    }

    pub(crate) fn replace_row(&self, row: FileRow) {
        *self.row.write().unwrap_or_else(PoisonError::into_inner) = row;
    }
}

/// Caller-supplied metadata for a new file record.
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    /// Display name, when it should differ from the physical name.
    pub display_name: Option<String>,
    /// MIME type; guessed from the name when absent.
    pub mimetype: Option<String>,
    /// Owning entity.
    pub reference: Option<EntityRef>,
    /// Free-form attributes.
    pub attributes: Attributes,
    /// Creating user reference.
    pub created_by: Option<i64>,
}

impl FileMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface the file under `name` instead of its physical name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the MIME type.
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Link the file to an owning entity.
    pub fn with_reference(mut self, reference: EntityRef) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Set the creating user.
    pub fn with_created_by(mut self, user_id: i64) -> Self {
        self.created_by = Some(user_id);
        self
    }
}

/// Data for inserting a file row.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Owning folder ID.
    pub folders_id: i64,
    /// Display name.
    pub file: String,
    /// Physical name when it differs from the display name.
    pub obscured_filename: Option<String>,
    /// Remaining metadata.
    pub metadata: FileMetadata,
}

impl NewFile {
    /// Create a new NewFile stored under its display name.
    pub fn new(folders_id: i64, file: impl Into<String>) -> Self {
        Self {
            folders_id,
            file: file.into(),
            obscured_filename: None,
            metadata: FileMetadata::default(),
        }
    }

    /// Store the file on disk under `name`.
    pub fn with_obscured_filename(mut self, name: impl Into<String>) -> Self {
        self.obscured_filename = Some(name.into());
        self
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Builder for updating file rows.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New display name.
    pub file: Option<String>,
    /// New obscured name.
    pub obscured_filename: Option<Option<String>>,
    /// New owning folder.
    pub folders_id: Option<i64>,
    /// New MIME type.
    pub mimetype: Option<Option<String>>,
    /// New owning entity.
    pub reference: Option<Option<EntityRef>>,
    /// New attributes.
    pub attributes: Option<Attributes>,
    /// Updating user.
    pub updated_by: Option<i64>,
}

impl FileUpdate {
    /// Create a new FileUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn file(mut self, name: impl Into<String>) -> Self {
        self.file = Some(name.into());
        self
    }

    /// Set the obscured name.
    pub fn obscured_filename(mut self, name: Option<impl Into<String>>) -> Self {
        self.obscured_filename = Some(name.map(|s| s.into()));
        self
    }

    /// Set the owning folder.
    pub fn folders_id(mut self, folder_id: i64) -> Self {
        self.folders_id = Some(folder_id);
        self
    }

    /// Set the MIME type.
    pub fn mimetype(mut self, mimetype: Option<impl Into<String>>) -> Self {
        self.mimetype = Some(mimetype.map(|s| s.into()));
        self
    }

    /// Set or clear the owning entity.
    pub fn reference(mut self, reference: Option<EntityRef>) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Replace the attributes.
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Record the updating user.
    pub fn updated_by(mut self, user_id: i64) -> Self {
        self.updated_by = Some(user_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.file.is_none()
            && self.obscured_filename.is_none()
            && self.folders_id.is_none()
            && self.mimetype.is_none()
            && self.reference.is_none()
            && self.attributes.is_none()
            && self.updated_by.is_none()
    }
}

/// Repository for file rows.
pub struct FileRepository;

impl FileRepository {
    /// Create a new file row.
    pub async fn create(conn: &mut SqliteConnection, file: &NewFile) -> Result<FileRow> {
        let meta = &file.metadata;
        let (table, entity_id) = match &meta.reference {
            Some(r) => (Some(r.table.as_str()), Some(r.id)),
            None => (None, None),
        };

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (folders_id, file, obscured_filename, mimetype, referenced_table,
                                referenced_id, attributes, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(file.folders_id)
        .bind(&file.file)
        .bind(&file.obscured_filename)
        .bind(&meta.mimetype)
        .bind(table)
        .bind(entity_id)
        .bind(meta.attributes.to_json()?)
        .bind(meta.created_by)
        .fetch_one(&mut *conn)
        .await?;

        Self::get_by_id(conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("file {id}")))
    }

    /// Get a file by ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<FileRow>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        Ok(sqlx::query_as::<_, FileRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Get a file by display name within a folder.
    pub async fn get_by_display_name(
        conn: &mut SqliteConnection,
        folder_id: i64,
        name: &str,
    ) -> Result<Option<FileRow>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folders_id = ? AND file = ? ORDER BY id LIMIT 1"
        );
        Ok(sqlx::query_as::<_, FileRow>(&sql)
            .bind(folder_id)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Get the file stored on disk as `name` within a folder.
    pub async fn get_by_physical_name(
        conn: &mut SqliteConnection,
        folder_id: i64,
        name: &str,
    ) -> Result<Option<FileRow>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE folders_id = ?
               AND (obscured_filename = ? OR (obscured_filename IS NULL AND file = ?))
             ORDER BY id LIMIT 1"
        );
        Ok(sqlx::query_as::<_, FileRow>(&sql)
            .bind(folder_id)
            .bind(name)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// List files in a folder ordered by display name.
    pub async fn list_by_folder(
        conn: &mut SqliteConnection,
        folder_id: i64,
    ) -> Result<Vec<FileRow>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE folders_id = ? ORDER BY file, id");
        Ok(sqlx::query_as::<_, FileRow>(&sql)
            .bind(folder_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// List files owned by an external entity.
    pub async fn list_by_reference(
        conn: &mut SqliteConnection,
        reference: &EntityRef,
    ) -> Result<Vec<FileRow>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files
             WHERE referenced_table = ? AND referenced_id = ? ORDER BY id"
        );
        Ok(sqlx::query_as::<_, FileRow>(&sql)
            .bind(&reference.table)
            .bind(reference.id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// Update a file row.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        update: &FileUpdate,
    ) -> Result<Option<FileRow>> {
        if update.is_empty() {
            return Self::get_by_id(conn, id).await;
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE files SET updated_at = datetime('now')");

        if let Some(ref name) = update.file {
            query.push(", file = ");
            query.push_bind(name.clone());
        }
        if let Some(ref obscured) = update.obscured_filename {
            query.push(", obscured_filename = ");
            query.push_bind(obscured.clone());
        }
        if let Some(folder_id) = update.folders_id {
            query.push(", folders_id = ");
            query.push_bind(folder_id);
        }
        if let Some(ref mimetype) = update.mimetype {
            query.push(", mimetype = ");
            query.push_bind(mimetype.clone());
        }
        if let Some(ref reference) = update.reference {
            query.push(", referenced_table = ");
            query.push_bind(reference.as_ref().map(|r| r.table.clone()));
            query.push(", referenced_id = ");
            query.push_bind(reference.as_ref().map(|r| r.id));
        }
        if let Some(ref attributes) = update.attributes {
            query.push(", attributes = ");
            query.push_bind(attributes.to_json()?);
        }
        if let Some(updated_by) = update.updated_by {
            query.push(", updated_by = ");
            query.push_bind(updated_by);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::get_by_id(conn, id).await
    }

    /// Delete a file row. Returns true if a row was deleted.
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count files in a folder.
    pub async fn count_by_folder(conn: &mut SqliteConnection, folder_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folders_id = ?")
            .bind(folder_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
