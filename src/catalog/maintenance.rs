//! Re-synchronization and structure checks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Catalog;
use crate::file::{parent_path, FolderRepository, FolderRow};
use crate::storage::PhysicalFolder;
use crate::{FolioError, Result};

/// Outcome of [`Catalog::sync_from_disk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Folder nodes inserted.
    pub folders_created: usize,
    /// File records inserted.
    pub files_created: usize,
    /// Files left without a record because they collide with an existing one.
    pub files_skipped: usize,
}

impl Catalog {
    /// Walk the assets root and make sure every directory has a node and
    /// every regular file a record.
    ///
    /// Files directly in the assets root belong to no folder and are
    /// skipped.
    pub async fn sync_from_disk(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let root = self.store.root_folder()?;

        let skipped = root.file_names()?.len();
        if skipped > 0 {
            debug!(count = skipped, "skipping files in the assets root");
        }

        let mut pending: Vec<Arc<PhysicalFolder>> = self.store.subfolders(&root)?;
        pending.reverse();
        while let Some(folder) = pending.pop() {
            let (_, created) = self.ensure_node_counted(&folder).await?;
            report.folders_created += created;

            for file in self.store.files_in(&folder)? {
                match self.ensure_file_counted(&file).await {
                    Ok((_, true)) => report.files_created += 1,
                    Ok((_, false)) => {}
                    Err(e @ (FolioError::AlreadyExists(_) | FolioError::Validation(_))) => {
                        warn!(file = %file.path().display(), error = %e, "skipping file during sync");
                        report.files_skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            let mut children = self.store.subfolders(&folder)?;
            children.reverse();
            pending.extend(children);
        }

        info!(
            folders_created = report.folders_created,
            files_created = report.files_created,
            files_skipped = report.files_skipped,
            "synchronized catalog with disk"
        );
        Ok(report)
    }

    /// Check the nested-set invariants over the whole folder table.
    ///
    /// Verifies that every node has `l < r`, that no coordinate is shared,
    /// that intervals are either nested or disjoint, that `level` counts
    /// the enclosing nodes and that each node's path extends its parent's.
    pub async fn verify_structure(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let rows = FolderRepository::list_all(&mut conn).await?;
        drop(conn);

        check_nested_set(&rows)?;
        debug!(folders = rows.len(), "folder structure verified");
        Ok(())
    }
}

/// Check rows sorted by `l`.
fn check_nested_set(rows: &[FolderRow]) -> Result<()> {
    let mut seen: HashSet<i64> = HashSet::with_capacity(rows.len() * 2);
    let mut open: Vec<&FolderRow> = Vec::new();

    for row in rows {
        if row.l < 0 || row.l >= row.r {
            return Err(violation(row, format!("bad bounds ({}, {})", row.l, row.r)));
        }
        if !seen.insert(row.l) || !seen.insert(row.r) {
            return Err(violation(row, "shares a coordinate".to_string()));
        }

        while open.last().is_some_and(|top| top.r < row.l) {
            open.pop();
        }
        if let Some(parent) = open.last() {
            if row.r >= parent.r {
                return Err(violation(
                    row,
                    format!("overlaps folder {} without nesting", parent.id),
                ));
            }
        }
        if row.level != open.len() as i64 {
            return Err(violation(
                row,
                format!("level {} but {} ancestors", row.level, open.len()),
            ));
        }
        let expected_parent = open.last().map(|p| p.path.clone());
        if parent_path(&row.path) != expected_parent {
            return Err(violation(row, "path does not match its parent".to_string()));
        }
        open.push(row);
    }
    Ok(())
}

fn violation(row: &FolderRow, detail: String) -> FolioError {
    FolioError::StructuralInvariant(format!("folder {} ('{}') {detail}", row.id, row.path))
}
