//! Database schema and migrations for folio.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: folder tree (nested set) and file records
    r#"
-- Folder nodes. (l, r, level) is a nested-set encoding over the whole table;
-- every tree of the forest shares one coordinate space.
CREATE TABLE folders (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    path            TEXT NOT NULL UNIQUE,            -- relative to the assets root, trailing '/'
    l               INTEGER NOT NULL,
    r               INTEGER NOT NULL,
    level           INTEGER NOT NULL,
    obscure_files   INTEGER NOT NULL DEFAULT 0,
    alias           TEXT,
    access          TEXT NOT NULL DEFAULT 'rw',      -- 'rw' or 'r'
    attributes      TEXT NOT NULL DEFAULT '{}',      -- JSON object
    created_by      INTEGER,
    updated_by      INTEGER,
    created_at      TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_l ON folders(l);
CREATE INDEX idx_folders_r ON folders(r);
CREATE INDEX idx_folders_level ON folders(level);

-- File records, one per physical file.
CREATE TABLE files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    folders_id          INTEGER NOT NULL REFERENCES folders(id),
    file                TEXT NOT NULL,               -- display name
    obscured_filename   TEXT,                        -- physical name when it differs
    mimetype            TEXT,
    referenced_table    TEXT,
    referenced_id       INTEGER,
    attributes          TEXT NOT NULL DEFAULT '{}',  -- JSON object
    created_by          INTEGER,
    updated_by          INTEGER,
    created_at          TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX idx_files_folder_name ON files(folders_id, file);
CREATE INDEX idx_files_reference ON files(referenced_table, referenced_id);
"#,
];
