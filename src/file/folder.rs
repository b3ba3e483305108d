//! Folder nodes and the nested-set repository.
//!
//! Folders form a forest stored in one flat table. Every node carries
//! `(l, r, level)` coordinates: a node's descendants are exactly the nodes
//! whose interval lies strictly inside its own. All trees share a single
//! coordinate space, so every structural edit shifts coordinates across the
//! whole table, not just within one tree.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use super::Attributes;
use crate::{FolioError, Result};

const FOLDER_COLUMNS: &str = "id, path, l, r, level, obscure_files, alias, access, attributes,
     created_by, updated_by, created_at, updated_at";

/// Nested-set coordinates of a folder node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct NestedSet {
    /// Left bound.
    pub l: i64,
    /// Right bound.
    pub r: i64,
    /// Number of ancestors.
    pub level: i64,
}

impl NestedSet {
    /// Whether `other` lies strictly inside this interval.
    pub fn contains(&self, other: &NestedSet) -> bool {
        self.l < other.l && other.r < self.r
    }

    /// Whether the node has no descendants.
    pub fn is_leaf(&self) -> bool {
        self.r == self.l + 1
    }

    /// Number of descendants.
    pub fn descendant_count(&self) -> i64 {
        (self.r - self.l - 1) / 2
    }

    /// Width of the interval, i.e. twice the subtree size.
    pub fn width(&self) -> i64 {
        self.r - self.l + 1
    }
}

/// Access mode of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Contents may be changed.
    #[default]
    ReadWrite,
    /// Contents are read-only.
    ReadOnly,
}

impl Access {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::ReadWrite => "rw",
            Access::ReadOnly => "r",
        }
    }
}

impl std::str::FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rw" => Ok(Access::ReadWrite),
            "r" => Ok(Access::ReadOnly),
            _ => Err(format!("unknown access mode: {s}")),
        }
    }
}

impl TryFrom<String> for Access {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// A persisted folder row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FolderRow {
    /// Unique folder ID.
    pub id: i64,
    /// Path relative to the assets root, with a trailing `/`.
    pub path: String,
    /// Left bound.
    pub l: i64,
    /// Right bound.
    pub r: i64,
    /// Number of ancestors.
    pub level: i64,
    /// Whether files stored in this folder get obscured physical names.
    pub obscure_files: bool,
    /// Optional alias.
    pub alias: Option<String>,
    /// Access mode.
    #[sqlx(try_from = "String")]
    pub access: Access,
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

impl FolderRow {
    /// Nested-set coordinates of this row.
    pub fn nested_set(&self) -> NestedSet {
        NestedSet {
            l: self.l,
            r: self.r,
            level: self.level,
        }
    }

    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        parse_timestamp(&self.created_at)
    }
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parent of a relative folder path, `None` for top-level paths.
///
/// `"a/b/"` yields `Some("a/")`, `"a/"` yields `None`.
pub fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let cut = trimmed.rfind('/')?;
    Some(trimmed[..=cut].to_string())
}

/// Last segment of a relative folder path.
pub fn path_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(cut) => &trimmed[cut + 1..],
        None => trimmed,
    }
}

/// In-memory handle for a persisted folder node.
///
/// One handle exists per node (see [`crate::Catalog`]); its coordinates are
/// refreshed in place whenever a structural edit shifts them.
#[derive(Debug)]
pub struct FolderNode {
    id: i64,
    row: RwLock<FolderRow>,
}

impl FolderNode {
    pub(crate) fn from_row(row: FolderRow) -> Self {
        Self {
            id: row.id,
            row: RwLock::new(row),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FolderRow> {
        self.row.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FolderRow> {
        self.row.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Folder ID.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Snapshot of the current row.
    pub fn row(&self) -> FolderRow {
        self.read().clone()
    }

    /// Path relative to the assets root.
    pub fn path(&self) -> String {
        self.read().path.clone()
    }

    /// Folder name (last path segment).
    pub fn name(&self) -> String {
        path_name(&self.read().path).to_string()
    }

    /// Path of the parent folder, `None` for roots.
    pub fn parent_path(&self) -> Option<String> {
        parent_path(&self.read().path)
    }

    /// Current nested-set coordinates.
    pub fn nested_set(&self) -> NestedSet {
        self.read().nested_set()
    }

    /// Number of ancestors.
    pub fn level(&self) -> i64 {
        self.read().level
    }

    /// Whether this is a root node.
    pub fn is_root(&self) -> bool {
        self.level() == 0
    }

    /// Whether files stored here get obscured physical names.
    pub fn obscures_files(&self) -> bool {
        self.read().obscure_files
    }

    /// Access mode.
    pub fn access(&self) -> Access {
        self.read().access
    }

    /// Alias.
    pub fn alias(&self) -> Option<String> {
        self.read().alias.clone()
    }

    /// Free-form attributes.
    pub fn attributes(&self) -> Attributes {
        self.read().attributes.clone()
    }

    pub(crate) fn set_nested_set(&self, coords: NestedSet) {
        let mut row = self.write();
        row.l = coords.l;
        row.r = coords.r;
        row.level = coords.level;
    }

    pub(crate) fn set_path(&self, path: String) {
        self.write().path = path;
    }

    pub(crate) fn replace_row(&self, row: FolderRow) {
        *self.write() = row;
    }
}

/// Data for creating a new folder row.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Path relative to the assets root, with a trailing `/`.
    pub path: String,
    /// Obscure files stored in this folder.
    pub obscure_files: bool,
    /// Optional alias.
    pub alias: Option<String>,
    /// Access mode.
    pub access: Access,
    /// Free-form attributes.
    pub attributes: Attributes,
    /// Creating user reference.
    pub created_by: Option<i64>,
}

impl NewFolder {
    /// Create a NewFolder with default settings.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            obscure_files: false,
            alias: None,
            access: Access::ReadWrite,
            attributes: Attributes::new(),
            created_by: None,
        }
    }

    /// Obscure files stored in this folder.
    pub fn with_obscure_files(mut self, obscure: bool) -> Self {
        self.obscure_files = obscure;
        self
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the access mode.
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
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

/// Builder for updating non-structural folder columns.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New obscure flag.
    pub obscure_files: Option<bool>,
    /// New alias.
    pub alias: Option<Option<String>>,
    /// New access mode.
    pub access: Option<Access>,
    /// New attributes.
    pub attributes: Option<Attributes>,
    /// Updating user.
    pub updated_by: Option<i64>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the obscure flag.
    pub fn obscure_files(mut self, obscure: bool) -> Self {
        self.obscure_files = Some(obscure);
        self
    }

    /// Set the alias.
    pub fn alias(mut self, alias: Option<impl Into<String>>) -> Self {
        self.alias = Some(alias.map(|s| s.into()));
        self
    }

    /// Set the access mode.
    pub fn access(mut self, access: Access) -> Self {
        self.access = Some(access);
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
        self.obscure_files.is_none()
            && self.alias.is_none()
            && self.access.is_none()
            && self.attributes.is_none()
            && self.updated_by.is_none()
    }
}

/// Repository for folder rows and nested-set maintenance.
///
/// Every function takes a connection so that multi-step edits can run
/// inside one transaction (`&mut *tx`).
pub struct FolderRepository;

impl FolderRepository {
    /// Get a folder by ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?");
        let row = sqlx::query_as::<_, FolderRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Get a folder by relative path.
    pub async fn get_by_path(conn: &mut SqliteConnection, path: &str) -> Result<Option<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE path = ?");
        let row = sqlx::query_as::<_, FolderRow>(&sql)
            .bind(path)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Read the current coordinates of a folder.
    pub async fn nested_set(conn: &mut SqliteConnection, id: i64) -> Result<Option<NestedSet>> {
        let coords = sqlx::query_as::<_, NestedSet>("SELECT l, r, level FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(coords)
    }

    /// Coordinates of every folder, keyed by id.
    pub async fn all_coordinates(conn: &mut SqliteConnection) -> Result<Vec<(i64, NestedSet)>> {
        let rows: Vec<(i64, i64, i64, i64)> =
            sqlx::query_as("SELECT id, l, r, level FROM folders")
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, l, r, level)| (id, NestedSet { l, r, level }))
            .collect())
    }

    /// List every folder in preorder.
    pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders ORDER BY l");
        Ok(sqlx::query_as::<_, FolderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// List root folders (level 0) in preorder.
    pub async fn list_roots(conn: &mut SqliteConnection) -> Result<Vec<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE level = 0 ORDER BY l");
        Ok(sqlx::query_as::<_, FolderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// List direct children of the node at `coords`.
    pub async fn list_children(
        conn: &mut SqliteConnection,
        coords: NestedSet,
    ) -> Result<Vec<FolderRow>> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders
             WHERE l > ? AND r < ? AND level = ? ORDER BY l"
        );
        Ok(sqlx::query_as::<_, FolderRow>(&sql)
            .bind(coords.l)
            .bind(coords.r)
            .bind(coords.level + 1)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// List all descendants of the node at `coords` in preorder.
    pub async fn list_descendants(
        conn: &mut SqliteConnection,
        coords: NestedSet,
    ) -> Result<Vec<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE l > ? AND r < ? ORDER BY l");
        Ok(sqlx::query_as::<_, FolderRow>(&sql)
            .bind(coords.l)
            .bind(coords.r)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// List the ancestors of the node at `coords`, outermost first.
    pub async fn list_ancestors(
        conn: &mut SqliteConnection,
        coords: NestedSet,
    ) -> Result<Vec<FolderRow>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE l < ? AND r > ? ORDER BY l");
        Ok(sqlx::query_as::<_, FolderRow>(&sql)
            .bind(coords.l)
            .bind(coords.r)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// Insert `folder` as the last child of `parent_id`.
    ///
    /// Opens a gap of two at the parent's right bound, shifting every node
    /// to the right of it across the whole table.
    pub async fn insert_child(
        conn: &mut SqliteConnection,
        parent_id: i64,
        folder: &NewFolder,
    ) -> Result<FolderRow> {
        let parent = Self::nested_set(conn, parent_id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("parent folder {parent_id}")))?;

        Self::open_gap(conn, parent.r, 2).await?;
        let coords = NestedSet {
            l: parent.r,
            r: parent.r + 1,
            level: parent.level + 1,
        };
        Self::insert_row(conn, folder, coords).await
    }

    /// Insert `folder` as a new root after every existing node.
    pub async fn insert_root(conn: &mut SqliteConnection, folder: &NewFolder) -> Result<FolderRow> {
        let l = match Self::max_r(conn).await? {
            Some(max) => max + 1,
            None => 0,
        };
        Self::insert_row(conn, folder, NestedSet { l, r: l + 1, level: 0 }).await
    }

    /// Delete the leaf node `id` and close the gap it leaves.
    ///
    /// Coordinates are re-read first, since earlier edits may have shifted
    /// them. Returns the coordinates the node had when deleted.
    pub async fn delete_leaf(conn: &mut SqliteConnection, id: i64) -> Result<NestedSet> {
        let coords = Self::nested_set(conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {id}")))?;
        if !coords.is_leaf() {
            return Err(FolioError::StructuralInvariant(format!(
                "folder {id} still has {} descendants",
                coords.descendant_count()
            )));
        }

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Self::close_gap(conn, coords.r, 2).await?;
        debug!(id, l = coords.l, r = coords.r, "deleted folder row");
        Ok(coords)
    }

    /// Move the subtree rooted at `id` under `new_parent` (or make it a new
    /// root), renumbering coordinates and levels.
    ///
    /// The subtree is parked at negative coordinates while the gap at its
    /// old position is closed and a new one is opened at the destination.
    pub async fn relocate_subtree(
        conn: &mut SqliteConnection,
        id: i64,
        new_parent: Option<i64>,
    ) -> Result<()> {
        let node = Self::nested_set(conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {id}")))?;

        if let Some(parent_id) = new_parent {
            let parent = Self::nested_set(conn, parent_id)
                .await?
                .ok_or_else(|| FolioError::RecordNotFound(format!("folder {parent_id}")))?;
            if parent_id == id || node.contains(&parent) {
                return Err(FolioError::Validation(format!(
                    "cannot move folder {id} into its own subtree"
                )));
            }
        }

        let width = node.width();
        sqlx::query("UPDATE folders SET l = -l - 1, r = -r - 1 WHERE l >= ? AND r <= ?")
            .bind(node.l)
            .bind(node.r)
            .execute(&mut *conn)
            .await?;
        Self::close_gap(conn, node.r, width).await?;

        let (new_l, new_level) = match new_parent {
            Some(parent_id) => {
                let parent = Self::nested_set(conn, parent_id)
                    .await?
                    .ok_or_else(|| FolioError::RecordNotFound(format!("folder {parent_id}")))?;
                Self::open_gap(conn, parent.r, width).await?;
                (parent.r, parent.level + 1)
            }
            None => match Self::max_r(conn).await? {
                Some(max) => (max + 1, 0),
                None => (0, 0),
            },
        };

        sqlx::query(
            "UPDATE folders SET l = -l - 1 + ?, r = -r - 1 + ?, level = level + ? WHERE l < 0",
        )
        .bind(new_l - node.l)
        .bind(new_l - node.l)
        .bind(new_level - node.level)
        .execute(&mut *conn)
        .await?;

        debug!(id, from = node.l, to = new_l, "relocated folder subtree");
        Ok(())
    }

    /// Replace the path prefix `old_prefix` with `new_prefix` for the node
    /// at `coords` and all of its descendants.
    pub async fn rewrite_paths(
        conn: &mut SqliteConnection,
        coords: NestedSet,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE folders
             SET path = ? || substr(path, ?), updated_at = datetime('now')
             WHERE l >= ? AND r <= ? AND substr(path, 1, ?) = ?",
        )
        .bind(new_prefix)
        .bind(old_prefix.chars().count() as i64 + 1)
        .bind(coords.l)
        .bind(coords.r)
        .bind(old_prefix.chars().count() as i64)
        .bind(old_prefix)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Update non-structural columns of a folder.
    pub async fn update(
        conn: &mut SqliteConnection,
        id: i64,
        update: &FolderUpdate,
    ) -> Result<Option<FolderRow>> {
        if update.is_empty() {
            return Self::get_by_id(conn, id).await;
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE folders SET updated_at = datetime('now')");

        if let Some(obscure) = update.obscure_files {
            query.push(", obscure_files = ");
            query.push_bind(obscure);
        }
        if let Some(ref alias) = update.alias {
            query.push(", alias = ");
            query.push_bind(alias.clone());
        }
        if let Some(access) = update.access {
            query.push(", access = ");
            query.push_bind(access.as_str());
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

    /// Count all folders.
    pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn insert_row(
        conn: &mut SqliteConnection,
        folder: &NewFolder,
        coords: NestedSet,
    ) -> Result<FolderRow> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (path, l, r, level, obscure_files, alias, access, attributes, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&folder.path)
        .bind(coords.l)
        .bind(coords.r)
        .bind(coords.level)
        .bind(folder.obscure_files)
        .bind(&folder.alias)
        .bind(folder.access.as_str())
        .bind(folder.attributes.to_json()?)
        .bind(folder.created_by)
        .fetch_one(&mut *conn)
        .await?;

        debug!(id, path = %folder.path, l = coords.l, r = coords.r, level = coords.level, "inserted folder row");
        Self::get_by_id(conn, id)
            .await?
            .ok_or_else(|| FolioError::RecordNotFound(format!("folder {id}")))
    }

    /// Highest right bound among placed (non-negative) nodes.
    async fn max_r(conn: &mut SqliteConnection) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(r) FROM folders WHERE l >= 0")
            .fetch_one(&mut *conn)
            .await?;
        Ok(max)
    }

    async fn open_gap(conn: &mut SqliteConnection, at: i64, width: i64) -> Result<()> {
        sqlx::query("UPDATE folders SET r = r + ? WHERE r >= ?")
            .bind(width)
            .bind(at)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE folders SET l = l + ? WHERE l > ?")
            .bind(width)
            .bind(at)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn close_gap(conn: &mut SqliteConnection, after: i64, width: i64) -> Result<()> {
        sqlx::query("UPDATE folders SET r = r - ? WHERE r > ?")
            .bind(width)
            .bind(after)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE folders SET l = l - ? WHERE l > ?")
            .bind(width)
            .bind(after)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn coords_of(conn: &mut SqliteConnection, path: &str) -> (i64, i64, i64) {
        let row = FolderRepository::get_by_path(conn, path)
            .await
            .unwrap()
            .unwrap();
        (row.l, row.r, row.level)
    }

    #[tokio::test]
    async fn test_insert_first_root() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let row = FolderRepository::insert_root(&mut conn, &NewFolder::new("docs/"))
            .await
            .unwrap();

        assert_eq!((row.l, row.r, row.level), (0, 1, 0));
        assert_eq!(row.path, "docs/");
        assert_eq!(row.access, Access::ReadWrite);
        assert!(!row.obscure_files);
    }

    #[tokio::test]
    async fn test_roots_share_coordinate_space() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        for path in ["a/", "b/", "c/"] {
            FolderRepository::insert_root(&mut conn, &NewFolder::new(path))
                .await
                .unwrap();
        }

        assert_eq!(coords_of(&mut conn, "a/").await, (0, 1, 0));
        assert_eq!(coords_of(&mut conn, "b/").await, (2, 3, 0));
        assert_eq!(coords_of(&mut conn, "c/").await, (4, 5, 0));
    }

    #[tokio::test]
    async fn test_insert_child_shifts_following_nodes() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        FolderRepository::insert_root(&mut conn, &NewFolder::new("b/"))
            .await
            .unwrap();

        let child = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();

        assert_eq!((child.l, child.r, child.level), (1, 2, 1));
        assert_eq!(coords_of(&mut conn, "a/").await, (0, 3, 0));
        assert_eq!(coords_of(&mut conn, "b/").await, (4, 5, 0));
    }

    #[tokio::test]
    async fn test_delete_leaf_closes_gap() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let b = FolderRepository::insert_root(&mut conn, &NewFolder::new("b/"))
            .await
            .unwrap();
        FolderRepository::insert_root(&mut conn, &NewFolder::new("c/"))
            .await
            .unwrap();

        let removed = FolderRepository::delete_leaf(&mut conn, b.id).await.unwrap();

        assert_eq!((removed.l, removed.r), (2, 3));
        assert_eq!(coords_of(&mut conn, "a/").await, (0, 1, 0));
        assert_eq!(coords_of(&mut conn, "c/").await, (2, 3, 0));
    }

    #[tokio::test]
    async fn test_delete_non_leaf_rejected() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();

        let result = FolderRepository::delete_leaf(&mut conn, a.id).await;
        assert!(matches!(result, Err(FolioError::StructuralInvariant(_))));
    }

    #[tokio::test]
    async fn test_relocate_subtree_under_other_root() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let x = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();
        FolderRepository::insert_child(&mut conn, x.id, &NewFolder::new("a/x/y/"))
            .await
            .unwrap();
        let b = FolderRepository::insert_root(&mut conn, &NewFolder::new("b/"))
            .await
            .unwrap();

        // a(0,5) x(1,4) y(2,3) b(6,7)
        FolderRepository::relocate_subtree(&mut conn, x.id, Some(b.id))
            .await
            .unwrap();

        assert_eq!(coords_of(&mut conn, "a/").await, (0, 1, 0));
        assert_eq!(coords_of(&mut conn, "b/").await, (2, 7, 0));
        assert_eq!(coords_of(&mut conn, "a/x/").await, (3, 6, 1));
        assert_eq!(coords_of(&mut conn, "a/x/y/").await, (4, 5, 2));
    }

    #[tokio::test]
    async fn test_relocate_subtree_to_root() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let x = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();
        FolderRepository::insert_root(&mut conn, &NewFolder::new("b/"))
            .await
            .unwrap();

        FolderRepository::relocate_subtree(&mut conn, x.id, None)
            .await
            .unwrap();

        assert_eq!(coords_of(&mut conn, "a/").await, (0, 1, 0));
        assert_eq!(coords_of(&mut conn, "b/").await, (2, 3, 0));
        assert_eq!(coords_of(&mut conn, "a/x/").await, (4, 5, 0));
    }

    #[tokio::test]
    async fn test_relocate_into_own_subtree_rejected() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let x = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();

        let result = FolderRepository::relocate_subtree(&mut conn, a.id, Some(x.id)).await;
        assert!(matches!(result, Err(FolioError::Validation(_))));
        assert_eq!(coords_of(&mut conn, "a/").await, (0, 3, 0));
    }

    #[tokio::test]
    async fn test_rewrite_paths() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let x = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();
        FolderRepository::insert_child(&mut conn, x.id, &NewFolder::new("a/x/y/"))
            .await
            .unwrap();

        let coords = FolderRepository::nested_set(&mut conn, x.id)
            .await
            .unwrap()
            .unwrap();
        let changed = FolderRepository::rewrite_paths(&mut conn, coords, "a/x/", "a/z/")
            .await
            .unwrap();

        assert_eq!(changed, 2);
        assert!(FolderRepository::get_by_path(&mut conn, "a/z/y/")
            .await
            .unwrap()
            .is_some());
        assert!(FolderRepository::get_by_path(&mut conn, "a/")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_children_ancestors_descendants() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();
        let x = FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/x/"))
            .await
            .unwrap();
        let y = FolderRepository::insert_child(&mut conn, x.id, &NewFolder::new("a/x/y/"))
            .await
            .unwrap();
        FolderRepository::insert_child(&mut conn, a.id, &NewFolder::new("a/w/"))
            .await
            .unwrap();

        let a_coords = FolderRepository::nested_set(&mut conn, a.id)
            .await
            .unwrap()
            .unwrap();
        let children = FolderRepository::list_children(&mut conn, a_coords)
            .await
            .unwrap();
        let names: Vec<_> = children.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["a/x/", "a/w/"]);

        let descendants = FolderRepository::list_descendants(&mut conn, a_coords)
            .await
            .unwrap();
        assert_eq!(descendants.len(), 3);

        let y_coords = FolderRepository::nested_set(&mut conn, y.id)
            .await
            .unwrap()
            .unwrap();
        let ancestors = FolderRepository::list_ancestors(&mut conn, y_coords)
            .await
            .unwrap();
        let names: Vec<_> = ancestors.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["a/", "a/x/"]);
    }

    #[tokio::test]
    async fn test_update_folder() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let a = FolderRepository::insert_root(&mut conn, &NewFolder::new("a/"))
            .await
            .unwrap();

        let update = FolderUpdate::new()
            .obscure_files(true)
            .alias(Some("alpha"))
            .access(Access::ReadOnly)
            .updated_by(3);
        let updated = FolderRepository::update(&mut conn, a.id, &update)
            .await
            .unwrap()
            .unwrap();

        assert!(updated.obscure_files);
        assert_eq!(updated.alias.as_deref(), Some("alpha"));
        assert_eq!(updated.access, Access::ReadOnly);
        assert_eq!(updated.updated_by, Some(3));
        assert_eq!((updated.l, updated.r), (0, 1));
    }

    #[tokio::test]
    async fn test_update_missing_folder() {
        let db = setup_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let result = FolderRepository::update(&mut conn, 999, &FolderUpdate::new().obscure_files(true))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("a/b/c/"), Some("a/b/".to_string()));
        assert_eq!(parent_path("a/b/"), Some("a/".to_string()));
        assert_eq!(parent_path("a/"), None);
        assert_eq!(parent_path(""), None);
    }

    #[test]
    fn test_path_name() {
        assert_eq!(path_name("a/b/"), "b");
        assert_eq!(path_name("a/"), "a");
    }

    #[test]
    fn test_nested_set_helpers() {
        let outer = NestedSet { l: 0, r: 7, level: 0 };
        let inner = NestedSet { l: 1, r: 2, level: 1 };

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(inner.is_leaf());
        assert_eq!(outer.descendant_count(), 3);
        assert_eq!(outer.width(), 8);
    }

    #[test]
    fn test_access_conversion() {
        assert_eq!(Access::ReadWrite.as_str(), "rw");
        assert_eq!(Access::ReadOnly.as_str(), "r");
        assert_eq!("RW".parse::<Access>(), Ok(Access::ReadWrite));
        assert!("x".parse::<Access>().is_err());
    }

    #[test]
    fn test_new_folder_builder() {
        let folder = NewFolder::new("private/")
            .with_obscure_files(true)
            .with_alias("vault")
            .with_access(Access::ReadOnly)
            .with_attribute("owner", "ops")
            .with_created_by(5);

        assert_eq!(folder.path, "private/");
        assert!(folder.obscure_files);
        assert_eq!(folder.alias.as_deref(), Some("vault"));
        assert_eq!(folder.access, Access::ReadOnly);
        assert_eq!(folder.attributes.get("owner"), Some("ops"));
        assert_eq!(folder.created_by, Some(5));
    }
}
