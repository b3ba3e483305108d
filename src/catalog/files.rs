//! File operations of the catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{file_key, metadata_failed, normalize_folder_path, Catalog};
use crate::file::{
    Attributes, EntityRef, FileMetadata, FileRecord, FileRepository, FileUpdate, FolderNode,
    NewFile, WEB_IMAGE_TYPES,
};
use crate::identity::{lock, CacheKey};
use crate::storage::{guess_mime_type, validate_name, CacheStats, PhysicalFile};
use crate::{FolioError, Result};

impl Catalog {
    /// Create a record for an existing physical file in `node`.
    ///
    /// The record is surfaced under `metadata.display_name` when given,
    /// otherwise under the physical name. Fails with `AlreadyExists` when
    /// the folder already holds a record with that display name or a record
    /// for the same physical file.
    pub async fn create_from_physical(
        &self,
        file: &PhysicalFile,
        node: &FolderNode,
        metadata: FileMetadata,
    ) -> Result<Arc<FileRecord>> {
        let folder_path = self.store.relative_path(file.folder())?;
        if folder_path != node.path() {
            return Err(FolioError::Validation(format!(
                "'{}' is not inside folder '{}'",
                file.name(),
                node.path()
            )));
        }

        let _guard = self.structure.lock().await;
        self.insert_record(file, node, metadata).await
    }

    /// Write `content` as a new file in `node` and create its record.
    ///
    /// Folders that obscure files store the content under a random
    /// `uuid.ext` name. The physical file is removed again when the record
    /// cannot be written.
    pub async fn store_upload(
        &self,
        node: &FolderNode,
        display_name: &str,
        content: &[u8],
        metadata: FileMetadata,
    ) -> Result<Arc<FileRecord>> {
        validate_name(display_name)?;
        let _guard = self.structure.lock().await;
        self.ensure_display_name_free(node, display_name).await?;

        let physical_name = if node.obscures_files() {
            obscured_name(display_name)
        } else {
            display_name.to_string()
        };

        let folder = self.physical_folder(node)?;
        let file = self.store.write_file(&folder, &physical_name, content)?;

        let metadata = FileMetadata {
            display_name: Some(display_name.to_string()),
            ..metadata
        };
        match self.insert_record(&file, node, metadata).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(file = %file.path().display(), error = %e, "removing upload without record");
                if let Err(cleanup) = self.store.delete_file(&file) {
                    return Err(metadata_failed("store upload", cleanup));
                }
                Err(e)
            }
        }
    }

    /// Get the record for `file`, creating it when none exists yet.
    ///
    /// The owning folder's node is materialized first if needed.
    pub async fn ensure_file(&self, file: &PhysicalFile) -> Result<Arc<FileRecord>> {
        let (record, _) = self.ensure_file_counted(file).await?;
        Ok(record)
    }

    pub(crate) async fn ensure_file_counted(
        &self,
        file: &PhysicalFile,
    ) -> Result<(Arc<FileRecord>, bool)> {
        let node = self.ensure_node(file.folder()).await?;
        let key = file_key(&node.path(), file.name());
        if let Some(record) = lock(&self.files).get_by_path(&key) {
            return Ok((record, false));
        }

        let _guard = self.structure.lock().await;
        let mut conn = self.conn().await?;
        let existing = FileRepository::get_by_physical_name(&mut conn, node.id(), file.name()).await?;
        drop(conn);

        match existing {
            Some(row) => Ok((self.cache_file(row, &node.path()), false)),
            None => {
                let record = self.insert_record(file, &node, FileMetadata::new()).await?;
                Ok((record, true))
            }
        }
    }

    /// Look up a record by id.
    pub async fn file_by_id(&self, id: i64) -> Result<Arc<FileRecord>> {
        if let Some(record) = lock(&self.files).get_by_id(id) {
            return Ok(record);
        }

        let mut conn = self.conn().await?;
        let row = FileRepository::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("file {id}")))?;
        drop(conn);

        let node = self.node_by_id(row.folders_id).await?;
        Ok(self.cache_file(row, &node.path()))
    }

    /// Look up a record by folder path and display name.
    pub async fn file_by_path(&self, folder_path: &str, display_name: &str) -> Result<Arc<FileRecord>> {
        let node = self.node_by_path(folder_path).await?;
        let mut conn = self.conn().await?;
        let row = FileRepository::get_by_display_name(&mut conn, node.id(), display_name)
            .await?
            .ok_or_else(|| {
                FolioError::RecordNotFound(format!(
                    "file '{}{display_name}'",
                    normalize_folder_path(folder_path)
                ))
            })?;
        Ok(self.cache_file(row, &node.path()))
    }

    /// Records stored in `node`, ordered by display name.
    pub async fn files_in(&self, node: &FolderNode) -> Result<Vec<Arc<FileRecord>>> {
        let mut conn = self.conn().await?;
        let rows = FileRepository::list_by_folder(&mut conn, node.id()).await?;
        let folder_path = node.path();
        Ok(rows
            .into_iter()
            .map(|row| self.cache_file(row, &folder_path))
            .collect())
    }

    /// Records linked to an external entity.
    pub async fn files_referencing(&self, reference: &EntityRef) -> Result<Vec<Arc<FileRecord>>> {
        let mut conn = self.conn().await?;
        let rows = FileRepository::list_by_reference(&mut conn, reference).await?;
        drop(conn);

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let node = self.node_by_id(row.folders_id).await?;
            records.push(self.cache_file(row, &node.path()));
        }
        Ok(records)
    }

    /// Physical file backing `record`.
    ///
    /// Fails with `ReferentialMismatch` when the record is obscured, the
    /// obscured file is missing but a file under the display name exists.
    pub async fn physical_file(&self, record: &FileRecord) -> Result<Arc<PhysicalFile>> {
        let node = self.node_by_id(record.folder_id()).await?;
        let folder = self.physical_folder(&node)?;
        let physical_name = record.physical_name();
        match self.store.file_in(&folder, &physical_name) {
            Ok(file) => Ok(file),
            Err(FolioError::PathNotFound(path)) => {
                let display = record.display_name();
                if record.is_obscured() && folder.path().join(&display).is_file() {
                    return Err(FolioError::ReferentialMismatch(format!(
                        "record {} names '{physical_name}' but only '{display}' exists",
                        record.id()
                    )));
                }
                Err(FolioError::PathNotFound(path))
            }
            Err(e) => Err(e),
        }
    }

    /// Absolute path of the file backing `record`.
    pub async fn physical_path(&self, record: &FileRecord) -> Result<PathBuf> {
        Ok(self.physical_file(record).await?.path())
    }

    /// MIME type of `record`: the stored one, else guessed from its name.
    pub fn mime_type(&self, record: &FileRecord) -> String {
        record
            .stored_mime_type()
            .unwrap_or_else(|| guess_mime_type(&record.display_name()))
    }

    /// Whether `record` is an image browsers display directly.
    pub fn is_web_image(&self, record: &FileRecord) -> bool {
        WEB_IMAGE_TYPES.contains(&self.mime_type(record).as_str())
    }

    /// Rename `record` within its folder.
    ///
    /// Plain files are renamed on disk first, together with their derived
    /// artifacts. Obscured files only change their display name.
    pub async fn rename_file(&self, record: &FileRecord, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let node = self.node_by_id(record.folder_id()).await?;
        let _guard = self.structure.lock().await;
        let old_name = record.display_name();
        if new_name == old_name {
            return Ok(());
        }
        self.ensure_display_name_free(&node, new_name).await?;
        let folder_path = node.path();

        if record.is_obscured() {
            let mut conn = self.conn().await?;
            let row = FileRepository::update(&mut conn, record.id(), &FileUpdate::new().file(new_name))
                .await?
                .ok_or_else(|| FolioError::RecordNotFound(format!("file {}", record.id())))?;
            record.replace_row(row);
            info!(id = record.id(), from = %old_name, to = new_name, "renamed obscured file");
            return Ok(());
        }

        let physical = self.physical_file(record).await?;
        self.store.rename_file(&physical, new_name)?;
        lock(&self.files).rekey(&file_key(&folder_path, &old_name), file_key(&folder_path, new_name));

        let mut conn = self.conn().await?;
        let row = FileRepository::update(&mut conn, record.id(), &FileUpdate::new().file(new_name))
            .await
            .and_then(|row| {
                row.ok_or_else(|| FolioError::RecordNotFound(format!("file {}", record.id())))
            })
            .map_err(|e| metadata_failed("rename file", e))?;
        record.replace_row(row);

        info!(id = record.id(), folder = %folder_path, from = %old_name, to = new_name, "renamed file");
        Ok(())
    }

    /// Move `record` into `destination`, keeping its names.
    ///
    /// Derived artifacts are dropped rather than carried over.
    pub async fn move_file(&self, record: &FileRecord, destination: &FolderNode) -> Result<()> {
        if record.folder_id() == destination.id() {
            return Ok(());
        }
        let display_name = record.display_name();
        let source = self.node_by_id(record.folder_id()).await?;
        let _guard = self.structure.lock().await;
        self.ensure_display_name_free(destination, &display_name).await?;

        let physical = self.physical_file(record).await?;
        let dest_folder = self.physical_folder(destination)?;
        self.store.move_file(&physical, &dest_folder)?;

        let mut conn = self.conn().await?;
        let row = FileRepository::update(
            &mut conn,
            record.id(),
            &FileUpdate::new().folders_id(destination.id()),
        )
        .await
        .and_then(|row| row.ok_or_else(|| FolioError::RecordNotFound(format!("file {}", record.id()))))
        .map_err(|e| metadata_failed("move file", e))?;
        drop(conn);

        let physical_name = row.physical_name().to_string();
        record.replace_row(row);
        lock(&self.files).rekey(
            &file_key(&source.path(), &physical_name),
            file_key(&destination.path(), &physical_name),
        );

        info!(id = record.id(), from = %source.path(), to = %destination.path(), file = %display_name, "moved file");
        Ok(())
    }

    /// Unlink the file backing `record`, its derived artifacts and the
    /// record itself.
    pub async fn delete_file(&self, record: &FileRecord) -> Result<()> {
        let node = self.node_by_id(record.folder_id()).await?;
        let physical = self.physical_file(record).await?;
        self.store.delete_file(&physical)?;

        let mut conn = self.conn().await?;
        FileRepository::delete(&mut conn, record.id())
            .await
            .map_err(|e| metadata_failed("delete file", e))?;
        drop(conn);

        let mut files = lock(&self.files);
        files.evict(CacheKey::Id(record.id()));
        files.evict(CacheKey::Path(&file_key(&node.path(), &record.physical_name())));
        info!(id = record.id(), folder = %node.path(), file = %record.display_name(), "deleted file");
        Ok(())
    }

    /// Derived artifacts of `record`, sorted by name.
    pub async fn derived_entries(&self, record: &FileRecord) -> Result<Vec<PathBuf>> {
        let folder = self.record_folder(record).await?;
        folder.derived_cache().list_for(&record.physical_name())
    }

    /// Count and total size of the derived artifacts of `record`.
    pub async fn cache_stats(&self, record: &FileRecord) -> Result<CacheStats> {
        let folder = self.record_folder(record).await?;
        folder.derived_cache().stats(&record.physical_name())
    }

    /// Store a derived artifact of `record` named by its physical name
    /// followed by `suffix`.
    pub async fn store_derived(
        &self,
        record: &FileRecord,
        suffix: &str,
        content: &[u8],
    ) -> Result<PathBuf> {
        let folder = self.record_folder(record).await?;
        folder
            .derived_cache()
            .store(&record.physical_name(), suffix, content)
    }

    /// Delete the derived artifacts of `record`.
    pub async fn purge_file_cache(&self, record: &FileRecord) -> Result<usize> {
        let folder = self.record_folder(record).await?;
        let purged = folder.derived_cache().delete_for(&record.physical_name())?;
        debug!(id = record.id(), purged, "purged file cache");
        Ok(purged)
    }

    /// Link `record` to an external entity, or unlink it with `None`.
    pub async fn link_reference(
        &self,
        record: &FileRecord,
        reference: Option<EntityRef>,
    ) -> Result<()> {
        self.update_file(record, &FileUpdate::new().reference(reference))
            .await
    }

    /// Replace the free-form attributes of `record`.
    pub async fn update_file_attributes(
        &self,
        record: &FileRecord,
        attributes: Attributes,
    ) -> Result<()> {
        self.update_file(record, &FileUpdate::new().attributes(attributes))
            .await
    }

    async fn update_file(&self, record: &FileRecord, update: &FileUpdate) -> Result<()> {
        let mut conn = self.conn().await?;
        let row = FileRepository::update(&mut conn, record.id(), update)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("file {}", record.id())))?;
        record.replace_row(row);
        Ok(())
    }

    async fn record_folder(
        &self,
        record: &FileRecord,
    ) -> Result<Arc<crate::storage::PhysicalFolder>> {
        let node = self.node_by_id(record.folder_id()).await?;
        self.physical_folder(&node)
    }

    async fn ensure_display_name_free(&self, node: &FolderNode, name: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        if FileRepository::get_by_display_name(&mut conn, node.id(), name)
            .await?
            .is_some()
        {
            return Err(FolioError::AlreadyExists(format!(
                "file '{name}' in '{}'",
                node.path()
            )));
        }
        Ok(())
    }

    /// Insert the record for `file` in `node`. The caller holds the
    /// structure lock.
    async fn insert_record(
        &self,
        file: &PhysicalFile,
        node: &FolderNode,
        metadata: FileMetadata,
    ) -> Result<Arc<FileRecord>> {
        let display = metadata
            .display_name
            .clone()
            .unwrap_or_else(|| file.name().to_string());
        validate_name(&display)?;

        let mut conn = self.conn().await?;
        if FileRepository::get_by_display_name(&mut conn, node.id(), &display)
            .await?
            .is_some()
        {
            return Err(FolioError::AlreadyExists(format!(
                "file '{display}' in '{}'",
                node.path()
            )));
        }
        if let Some(existing) =
            FileRepository::get_by_physical_name(&mut conn, node.id(), file.name()).await?
        {
            return Err(FolioError::AlreadyExists(format!(
                "'{}' is already recorded as file {}",
                file.name(),
                existing.id
            )));
        }

        let mut new_file = NewFile::new(node.id(), display.clone());
        if display != file.name() {
            new_file = new_file.with_obscured_filename(file.name());
        }
        let metadata = FileMetadata {
            mimetype: metadata
                .mimetype
                .clone()
                .or_else(|| Some(file.mime_type().to_string())),
            ..metadata
        };
        let row = FileRepository::create(&mut conn, &new_file.with_metadata(metadata)).await?;
        drop(conn);

        info!(id = row.id, folder = %node.path(), file = %row.file, physical = %row.physical_name(), "created file record");
        Ok(self.cache_file(row, &node.path()))
    }
}

/// Random physical name keeping the extension of `display_name`.
fn obscured_name(display_name: &str) -> String {
    match Path::new(display_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
