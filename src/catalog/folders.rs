//! Folder operations of the catalog.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{file_key, metadata_failed, normalize_folder_path, Catalog};
use crate::file::{
    parent_path, Attributes, FileRepository, FileRow, FolderNode, FolderRepository, FolderRow,
    FolderUpdate, NestedSet, NewFolder,
};
use crate::identity::{lock, CacheKey};
use crate::storage::{validate_name, PhysicalFolder};
use crate::{FolioError, Result};

impl Catalog {
    /// Get the node for `folder`, creating it (and any missing ancestors)
    /// when the folder has no record yet.
    ///
    /// Calling this twice on the same folder returns the same handle.
    pub async fn ensure_node(&self, folder: &PhysicalFolder) -> Result<Arc<FolderNode>> {
        let (node, _) = self.ensure_node_counted(folder).await?;
        Ok(node)
    }

    /// Like [`ensure_node`](Self::ensure_node), also returning how many rows
    /// were inserted.
    pub(crate) async fn ensure_node_counted(
        &self,
        folder: &PhysicalFolder,
    ) -> Result<(Arc<FolderNode>, usize)> {
        let path = self.store.relative_path(folder)?;
        if path.is_empty() {
            return Err(FolioError::Validation(
                "the assets root has no folder node".to_string(),
            ));
        }
        if let Some(node) = lock(&self.folders).get_by_path(&path) {
            return Ok((node, 0));
        }

        let _guard = self.structure.lock().await;
        let mut tx = self.db.begin().await?;

        // Materialize ancestors top-down: "a/", "a/b/", "a/b/c/".
        let mut parent_id: Option<i64> = None;
        let mut created: Vec<FolderRow> = Vec::new();
        let mut target: Option<FolderRow> = None;
        for (end, _) in path.match_indices('/') {
            let prefix = &path[..=end];
            let row = match FolderRepository::get_by_path(&mut *tx, prefix).await? {
                Some(row) => row,
                None => {
                    let new_folder = NewFolder::new(prefix);
                    let row = match parent_id {
                        Some(parent) => {
                            FolderRepository::insert_child(&mut *tx, parent, &new_folder).await?
                        }
                        None => FolderRepository::insert_root(&mut *tx, &new_folder).await?,
                    };
                    created.push(row.clone());
                    row
                }
            };
            parent_id = Some(row.id);
            target = Some(row);
        }
        tx.commit().await?;

        let target = target.ok_or_else(|| {
            FolioError::Validation(format!("invalid folder path '{path}'"))
        })?;
        for row in &created {
            info!(id = row.id, path = %row.path, level = row.level, "created folder node");
        }
        let count = created.len();
        let node = self.cache_node(target);
        if count > 0 {
            self.refresh_cached_nodes().await;
        }
        Ok((node, count))
    }

    /// Look up a node by its path relative to the assets root.
    pub async fn node_by_path(&self, path: &str) -> Result<Arc<FolderNode>> {
        let path = normalize_folder_path(path);
        if let Some(node) = lock(&self.folders).get_by_path(&path) {
            return Ok(node);
        }

        let mut conn = self.conn().await?;
        let row = FolderRepository::get_by_path(&mut conn, &path)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder '{path}'")))?;
        Ok(self.cache_node(row))
    }

    /// Look up a node by id.
    pub async fn node_by_id(&self, id: i64) -> Result<Arc<FolderNode>> {
        if let Some(node) = lock(&self.folders).get_by_id(id) {
            return Ok(node);
        }

        let mut conn = self.conn().await?;
        let row = FolderRepository::get_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {id}")))?;
        Ok(self.cache_node(row))
    }

    /// The first root node.
    ///
    /// An empty forest is a configuration error, not an empty result.
    pub async fn root(&self) -> Result<Arc<FolderNode>> {
        self.roots()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::StructuralInvariant("no root folder found".to_string()))
    }

    /// All root nodes in coordinate order.
    pub async fn roots(&self) -> Result<Vec<Arc<FolderNode>>> {
        let mut conn = self.conn().await?;
        let rows = FolderRepository::list_roots(&mut conn).await?;
        Ok(rows.into_iter().map(|row| self.cache_node(row)).collect())
    }

    /// Parent of `node`, `None` for roots or when the parent has no record.
    pub async fn parent(&self, node: &FolderNode) -> Result<Option<Arc<FolderNode>>> {
        let Some(path) = parent_path(&node.path()) else {
            return Ok(None);
        };
        match self.node_by_path(&path).await {
            Ok(parent) => Ok(Some(parent)),
            Err(FolioError::RecordNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Direct children of `node`.
    pub async fn children(&self, node: &FolderNode) -> Result<Vec<Arc<FolderNode>>> {
        let mut conn = self.conn().await?;
        let coords = current_coords(&mut conn, node.id()).await?;
        let rows = FolderRepository::list_children(&mut conn, coords).await?;
        Ok(rows.into_iter().map(|row| self.cache_node(row)).collect())
    }

    /// Ancestors of `node`, outermost first.
    pub async fn ancestors(&self, node: &FolderNode) -> Result<Vec<Arc<FolderNode>>> {
        let mut conn = self.conn().await?;
        let coords = current_coords(&mut conn, node.id()).await?;
        let rows = FolderRepository::list_ancestors(&mut conn, coords).await?;
        Ok(rows.into_iter().map(|row| self.cache_node(row)).collect())
    }

    /// All descendants of `node` in preorder.
    pub async fn descendants(&self, node: &FolderNode) -> Result<Vec<Arc<FolderNode>>> {
        let mut conn = self.conn().await?;
        let coords = current_coords(&mut conn, node.id()).await?;
        let rows = FolderRepository::list_descendants(&mut conn, coords).await?;
        Ok(rows.into_iter().map(|row| self.cache_node(row)).collect())
    }

    /// Physical folder backing `node`.
    pub fn physical_folder(&self, node: &FolderNode) -> Result<Arc<PhysicalFolder>> {
        self.store.folder_at(&node.path())
    }

    /// Create the directory `name` under `parent` (or the assets root) and
    /// its node.
    pub async fn create_folder(
        &self,
        parent: Option<&FolderNode>,
        name: &str,
    ) -> Result<Arc<FolderNode>> {
        let physical_parent = match parent {
            Some(node) => self.physical_folder(node)?,
            None => self.store.root_folder()?,
        };
        let created = self.store.create_folder(&physical_parent, name)?;
        self.ensure_node(&created)
            .await
            .map_err(|e| metadata_failed("create folder", e))
    }

    /// Rename `node` within its parent. Coordinates do not change; the
    /// stored path of the node and of every descendant does.
    pub async fn rename_folder(&self, node: &FolderNode, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let old_path = node.path();
        let new_path = format!("{}{new_name}/", parent_path(&old_path).unwrap_or_default());
        if new_path == old_path {
            return Ok(());
        }

        let _guard = self.structure.lock().await;
        self.ensure_path_vacant(&new_path).await?;

        let physical = self.store.folder_at(&old_path)?;
        self.store.rename_folder(&physical, new_name)?;

        self.rewrite_subtree_paths(node.id(), &old_path, &new_path, None)
            .await
            .map_err(|e| metadata_failed("rename folder", e))?;

        self.rekey_subtree(&old_path, &new_path);
        info!(id = node.id(), from = %old_path, to = %new_path, "renamed folder");
        Ok(())
    }

    /// Move `node` (with its subtree) under `destination`, or make it a
    /// root when `destination` is `None`.
    pub async fn move_folder(
        &self,
        node: &FolderNode,
        destination: Option<&FolderNode>,
    ) -> Result<()> {
        let old_path = node.path();
        let dest_path = destination.map(|d| d.path()).unwrap_or_default();
        let new_path = format!("{dest_path}{}/", node.name());
        if new_path == old_path {
            return Ok(());
        }
        if destination.is_some_and(|d| d.id() == node.id()) || dest_path.starts_with(&old_path) {
            return Err(FolioError::Validation(format!(
                "cannot move '{old_path}' into its own subtree"
            )));
        }

        let _guard = self.structure.lock().await;
        self.ensure_path_vacant(&new_path).await?;

        let physical = self.store.folder_at(&old_path)?;
        let physical_dest = match destination {
            Some(dest) => self.physical_folder(dest)?,
            None => self.store.root_folder()?,
        };
        self.store.move_folder(&physical, &physical_dest)?;

        self.rewrite_subtree_paths(
            node.id(),
            &old_path,
            &new_path,
            Some(destination.map(|d| d.id())),
        )
        .await
        .map_err(|e| metadata_failed("move folder", e))?;

        self.rekey_subtree(&old_path, &new_path);
        self.refresh_cached_nodes().await;
        info!(id = node.id(), from = %old_path, to = %new_path, "moved folder");
        Ok(())
    }

    /// Delete `node`, its descendants and every contained file record.
    ///
    /// Files go before folders and deeper folders before shallower ones.
    /// Unless `keep_physical` is set the physical entries are removed
    /// first.
    pub async fn delete_node(&self, node: &FolderNode, keep_physical: bool) -> Result<()> {
        let _guard = self.structure.lock().await;

        let mut conn = self.conn().await?;
        let coords = current_coords(&mut conn, node.id()).await?;
        let mut subtree = FolderRepository::list_descendants(&mut conn, coords).await?;
        let own = FolderRepository::get_by_id(&mut conn, node.id())
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {}", node.id())))?;
        subtree.insert(0, own);
        // Reverse preorder puts every node after all of its descendants.
        subtree.reverse();

        let mut files: Vec<(String, FileRow)> = Vec::new();
        for folder in &subtree {
            for file in FileRepository::list_by_folder(&mut conn, folder.id).await? {
                files.push((folder.path.clone(), file));
            }
        }
        drop(conn);

        for (folder_path, file) in &files {
            self.delete_file_row(folder_path, file, keep_physical).await?;
        }

        let root_path = node.path();
        if !keep_physical {
            match self.store.folder_at(&root_path) {
                Ok(physical) => self.store.delete_folder(&physical)?,
                Err(FolioError::PathNotFound(_)) => {
                    warn!(path = %root_path, "physical folder already gone");
                }
                Err(e) => return Err(e),
            }
        }

        let deleted = self
            .delete_folder_rows(&subtree)
            .await
            .map_err(|e| {
                if keep_physical {
                    e
                } else {
                    metadata_failed("delete folder", e)
                }
            })?;

        {
            let mut folders = lock(&self.folders);
            for row in &subtree {
                folders.evict(CacheKey::Id(row.id));
            }
        }
        lock(&self.files).evict_prefix(&root_path);
        self.refresh_cached_nodes().await;

        info!(
            id = node.id(),
            path = %root_path,
            folders = deleted,
            files = files.len(),
            keep_physical,
            "deleted folder"
        );
        Ok(())
    }

    /// Set whether files stored in `node` get obscured physical names.
    ///
    /// Only affects files stored afterwards.
    pub async fn set_obscure_files(&self, node: &FolderNode, obscure: bool) -> Result<()> {
        self.update_folder(node, &FolderUpdate::new().obscure_files(obscure))
            .await
    }

    /// Replace the free-form attributes of `node`.
    pub async fn update_folder_attributes(
        &self,
        node: &FolderNode,
        attributes: Attributes,
    ) -> Result<()> {
        self.update_folder(node, &FolderUpdate::new().attributes(attributes))
            .await
    }

    /// Update non-structural columns of `node`.
    pub async fn update_folder(&self, node: &FolderNode, update: &FolderUpdate) -> Result<()> {
        let mut conn = self.conn().await?;
        let row = FolderRepository::update(&mut conn, node.id(), update)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {}", node.id())))?;
        self.cache_node(row);
        Ok(())
    }

    /// Remove the whole derived-artifact cache of `node`'s folder.
    pub fn purge_folder_cache(&self, node: &FolderNode) -> Result<usize> {
        let purged = self.physical_folder(node)?.derived_cache().purge()?;
        debug!(path = %node.path(), purged, "purged folder cache");
        Ok(purged)
    }

    /// Fail with `AlreadyExists` when a record already uses `path`.
    async fn ensure_path_vacant(&self, path: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        if FolderRepository::get_by_path(&mut conn, path).await?.is_some() {
            return Err(FolioError::AlreadyExists(format!("folder '{path}'")));
        }
        Ok(())
    }

    /// Rewrite stored paths of a subtree, relocating it first when
    /// `new_parent` is given (`Some(None)` makes it a root).
    async fn rewrite_subtree_paths(
        &self,
        id: i64,
        old_path: &str,
        new_path: &str,
        new_parent: Option<Option<i64>>,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;
        if let Some(parent) = new_parent {
            FolderRepository::relocate_subtree(&mut *tx, id, parent).await?;
        }
        let coords = current_coords(&mut *tx, id).await?;
        FolderRepository::rewrite_paths(&mut *tx, coords, old_path, new_path).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete folder rows in the given (bottom-up) order in one transaction.
    async fn delete_folder_rows(&self, rows: &[FolderRow]) -> Result<usize> {
        let mut tx = self.db.begin().await?;
        for row in rows {
            FolderRepository::delete_leaf(&mut *tx, row.id).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Move cached folder and file handles from `old_path` to `new_path`.
    fn rekey_subtree(&self, old_path: &str, new_path: &str) {
        let moved = lock(&self.folders).rekey_prefix(old_path, new_path);
        for (path, node) in moved {
            node.set_path(path);
        }
        let files = lock(&self.files).rekey_prefix(old_path, new_path);
        debug!(
            from = old_path,
            to = new_path,
            files = files.len(),
            "rekeyed cached handles"
        );
    }

    /// Drop a file record, unlinking the physical file first unless
    /// `keep_physical` is set.
    pub(crate) async fn delete_file_row(
        &self,
        folder_path: &str,
        file: &FileRow,
        keep_physical: bool,
    ) -> Result<()> {
        if !keep_physical {
            let physical = self
                .store
                .folder_at(folder_path)
                .and_then(|folder| self.store.file_in(&folder, file.physical_name()));
            match physical {
                Ok(physical) => self.store.delete_file(&physical)?,
                Err(FolioError::PathNotFound(_)) => {
                    warn!(folder = folder_path, file = %file.file, "physical file already gone");
                }
                Err(e) => return Err(e),
            }
        }

        let mut conn = self.conn().await?;
        let result = FileRepository::delete(&mut conn, file.id).await;
        drop(conn);
        match result {
            Ok(_) => {}
            Err(e) if keep_physical => return Err(e),
            Err(e) => return Err(metadata_failed("delete file", e)),
        }

        let mut files = lock(&self.files);
        files.evict(CacheKey::Id(file.id));
        files.evict(CacheKey::Path(&file_key(folder_path, file.physical_name())));
        Ok(())
    }
}

/// Current coordinates of folder `id`, re-read from the database.
async fn current_coords(conn: &mut sqlx::SqliteConnection, id: i64) -> Result<NestedSet> {
    FolderRepository::nested_set(conn, id)
        .await?
        .ok_or_else(|| FolioError::RecordNotFound(format!("folder {id}")))
}
