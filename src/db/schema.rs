//! Database schema and migrations.
//!
//! Migrations are applied in order; `schema_version` records the ones done.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users and refresh tokens
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password    TEXT NOT NULL,                      -- Argon2 hash
    role        TEXT NOT NULL DEFAULT 'basic',      -- 'admin', 'manager', 'basic'
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    last_login  TEXT
);

CREATE TABLE refresh_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    revoked_at  TEXT
);

CREATE INDEX idx_refresh_tokens_user ON refresh_tokens(user_id);
"#,
    // v2: folder hierarchy and per-folder grants
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL,                      -- '/Root/Child'
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    created_by  INTEGER REFERENCES users(id) ON DELETE SET NULL,
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Sibling names are unique; roots share parent 0.
CREATE UNIQUE INDEX idx_folders_sibling_name
    ON folders(COALESCE(parent_id, 0), name COLLATE NOCASE);
CREATE INDEX idx_folders_parent ON folders(parent_id);

CREATE TABLE folder_permissions (
    folder_id   INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    granted_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (folder_id, user_id)
);

CREATE INDEX idx_folder_permissions_user ON folder_permissions(user_id);
"#,
    // v3: files
    r#"
CREATE TABLE files (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id   INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    mime_type   TEXT NOT NULL DEFAULT 'application/octet-stream',
    size        INTEGER NOT NULL,
    stored_name TEXT NOT NULL UNIQUE,               -- blob key in FileStorage
    created_by  INTEGER REFERENCES users(id) ON DELETE SET NULL,
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX idx_files_folder_name ON files(folder_id, name COLLATE NOCASE);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
];
