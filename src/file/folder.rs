//! Folder types and repository.
//!
//! Folders form a tree through `parent_id`. Each row also stores its full
//! `path` (`/Root/Child`), which rename and move keep consistent for the
//! whole subtree.

use std::collections::{HashMap, HashSet};

use sqlx::{SqliteConnection, SqlitePool};

use crate::db::conflict_on_unique;
use crate::{CabinetError, Result};

const FOLDER_COLUMNS: &str =
    "id, name, path, parent_id, created_by, is_public, created_at, updated_at";

/// A folder in the cabinet.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Full path from the root, e.g. `/Docs/2024`.
    pub path: String,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    /// Creator, cleared when that user is deleted.
    pub created_by: Option<i64>,
    /// Visible on the public surface (if every ancestor is too).
    pub is_public: bool,
    /// When the folder was created.
    pub created_at: String,
    /// Last rename, move or flag change.
    pub updated_at: String,
}

impl Folder {
    /// Path of a direct child with the given name.
    pub fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }

    /// Whether this is a root folder.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Path for a folder named `name` under `parent`.
pub fn path_under(parent: Option<&Folder>, name: &str) -> String {
    match parent {
        Some(p) => p.child_path(name),
        None => format!("/{name}"),
    }
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name (already validated).
    pub name: String,
    /// Parent folder ID (None for root folders).
    pub parent_id: Option<i64>,
    /// Creator.
    pub created_by: Option<i64>,
    /// Public flag.
    pub is_public: bool,
    /// Users granted access from the start.
    pub user_ids: Vec<i64>,
}

impl NewFolder {
    /// Create a private root folder with no grants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
            created_by: None,
            is_public: false,
            user_ids: Vec::new(),
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the creator.
    pub fn with_creator(mut self, user_id: i64) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Set the public flag.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Set the initial grant set.
    pub fn with_users(mut self, user_ids: Vec<i64>) -> Self {
        self.user_ids = user_ids;
        self
    }
}

/// Partial update of a folder. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New name.
    pub name: Option<String>,
    /// New public flag.
    pub is_public: Option<bool>,
}

impl FolderUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the public flag.
    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// True when nothing would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_public.is_none()
    }
}

/// A user holding a grant on a folder.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FolderUser {
    /// User ID.
    pub id: i64,
    /// Username.
    pub username: String,
}

fn duplicate_name(name: &str) -> String {
    format!("a folder named '{name}' already exists here")
}

/// Rewrite the path of `old` and every folder below it to start with `new`.
async fn rewrite_subtree_paths(conn: &mut SqliteConnection, old: &str, new: &str) -> Result<()> {
    // substr() instead of LIKE so '%' and '_' in names are not wildcards.
    sqlx::query(
        "UPDATE folders SET path = ?1 || substr(path, length(?2) + 1)
         WHERE path = ?2 OR substr(path, 1, length(?2) + 1) = ?2 || '/'",
    )
    .bind(new)
    .bind(old)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn copy_grants(conn: &mut SqliteConnection, from: i64, to: i64) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO folder_permissions (folder_id, user_id)
         SELECT ?, user_id FROM folder_permissions WHERE folder_id = ?",
    )
    .bind(to)
    .bind(from)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Copy the files and subfolders of `source_id` into `target_id`.
///
/// `blobs` maps every source `stored_name` in the subtree to the name of
/// its already written copy.
async fn copy_contents(
    conn: &mut SqliteConnection,
    source_id: i64,
    target_id: i64,
    target_path: &str,
    created_by: Option<i64>,
    blobs: &HashMap<String, String>,
) -> Result<()> {
    let mut queue = vec![(source_id, target_id, target_path.to_string())];

    while let Some((src, dst, dst_path)) = queue.pop() {
        let files: Vec<(String, String, i64, String, bool)> = sqlx::query_as(
            "SELECT name, mime_type, size, stored_name, is_public FROM files WHERE folder_id = ?",
        )
        .bind(src)
        .fetch_all(&mut *conn)
        .await?;

        for (name, mime_type, size, stored_name, is_public) in files {
            let copy = blobs
                .get(&stored_name)
                .ok_or_else(|| CabinetError::NotFound(format!("copy of blob {stored_name}")))?;
            sqlx::query(
                "INSERT INTO files (folder_id, name, mime_type, size, stored_name, created_by, is_public)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(dst)
            .bind(&name)
            .bind(&mime_type)
            .bind(size)
            .bind(copy)
            .bind(created_by)
            .bind(is_public)
            .execute(&mut *conn)
            .await?;
        }

        let children = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id = ?"
        ))
        .bind(src)
        .fetch_all(&mut *conn)
        .await?;

        for child in children {
            let path = format!("{dst_path}/{}", child.name);
            let new_id: i64 = sqlx::query_scalar(
                "INSERT INTO folders (name, path, parent_id, created_by, is_public)
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
            )
            .bind(&child.name)
            .bind(&path)
            .bind(dst)
            .bind(created_by)
            .bind(child.is_public)
            .fetch_one(&mut *conn)
            .await?;
            copy_grants(conn, child.id, new_id).await?;
            queue.push((child.id, new_id, path));
        }
    }

    Ok(())
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a folder together with its initial grants.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let mut tx = self.pool.begin().await?;

        let parent = match folder.parent_id {
            Some(parent_id) => Some(
                sqlx::query_as::<_, Folder>(&format!(
                    "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
                ))
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CabinetError::NotFound("parent folder".to_string()))?,
            ),
            None => None,
        };
        let path = path_under(parent.as_ref(), &folder.name);

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (name, path, parent_id, created_by, is_public)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&folder.name)
        .bind(&path)
        .bind(folder.parent_id)
        .bind(folder.created_by)
        .bind(folder.is_public)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate_name(&folder.name)))?;

        for user_id in &folder.user_ids {
            sqlx::query("INSERT OR IGNORE INTO folder_permissions (folder_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(folder)
    }

    /// All root folders, by name.
    pub async fn list_roots(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id IS NULL
             ORDER BY name COLLATE NOCASE"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// Direct children of a folder, by name.
    pub async fn list_children(&self, parent_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id = ?
             ORDER BY name COLLATE NOCASE"
        ))
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// Every folder, ordered by path.
    pub async fn list_all(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders ORDER BY path COLLATE NOCASE"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// Folders a user holds a grant on, ordered by path.
    pub async fn list_granted(&self, user_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT f.id, f.name, f.path, f.parent_id, f.created_by, f.is_public,
                    f.created_at, f.updated_at
             FROM folders f
             JOIN folder_permissions p ON p.folder_id = f.id
             WHERE p.user_id = ?
             ORDER BY f.path COLLATE NOCASE",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// IDs of the folders a user holds a grant on.
    pub async fn granted_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT folder_id FROM folder_permissions WHERE user_id = ? ORDER BY folder_id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Whether a user holds a grant on a folder.
    pub async fn is_granted(&self, folder_id: i64, user_id: i64) -> Result<bool> {
        let granted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM folder_permissions WHERE folder_id = ? AND user_id = ?)",
        )
        .bind(folder_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(granted)
    }

    /// Lowercased names of the folders directly under `parent_id`.
    pub async fn child_names(&self, parent_id: Option<i64>) -> Result<HashSet<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM folders WHERE COALESCE(parent_id, 0) = COALESCE(?, 0)")
                .bind(parent_id)
                .fetch_all(self.pool)
                .await?;
        Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
    }

    /// Whether a sibling other than `exclude_id` already uses `name`.
    pub async fn name_exists(
        &self,
        parent_id: Option<i64>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM folders
                WHERE COALESCE(parent_id, 0) = COALESCE(?, 0)
                  AND name = ? COLLATE NOCASE
                  AND id != COALESCE(?, 0))",
        )
        .bind(parent_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// The folder and its ancestors, root first.
    pub async fn ancestors(&self, id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "WITH RECURSIVE chain(id, parent_id, depth) AS (
                SELECT id, parent_id, 0 FROM folders WHERE id = ?
                UNION ALL
                SELECT f.id, f.parent_id, chain.depth + 1
                FROM folders f JOIN chain ON f.id = chain.parent_id
             )
             SELECT f.id, f.name, f.path, f.parent_id, f.created_by, f.is_public,
                    f.created_at, f.updated_at
             FROM folders f JOIN chain c ON f.id = c.id
             ORDER BY c.depth DESC",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// The folder and all its descendants, parents before children.
    pub async fn subtree(&self, id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "WITH RECURSIVE sub(id, depth) AS (
                SELECT id, 0 FROM folders WHERE id = ?
                UNION ALL
                SELECT f.id, sub.depth + 1 FROM folders f JOIN sub ON f.parent_id = sub.id
             )
             SELECT f.id, f.name, f.path, f.parent_id, f.created_by, f.is_public,
                    f.created_at, f.updated_at
             FROM folders f JOIN sub s ON f.id = s.id
             ORDER BY s.depth, f.name COLLATE NOCASE",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// Whether `candidate` is `ancestor` or lies somewhere below it.
    pub async fn is_within(&self, candidate: i64, ancestor: i64) -> Result<bool> {
        Ok(self.ancestors(candidate).await?.iter().any(|f| f.id == ancestor))
    }

    /// Whether a folder has no subfolders and no files.
    pub async fn is_empty(&self, id: i64) -> Result<bool> {
        let has_content: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM folders WHERE parent_id = ?1)
                 OR EXISTS(SELECT 1 FROM files WHERE folder_id = ?1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(!has_content)
    }

    /// Rename a folder and rewrite the paths below it.
    pub async fn rename(&self, id: i64, new_name: &str) -> Result<Folder> {
        let folder = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))?;

        let new_path = match folder.path.rsplit_once('/') {
            Some((prefix, _)) => format!("{prefix}/{new_name}"),
            None => format!("/{new_name}"),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE folders SET name = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(new_name)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, duplicate_name(new_name)))?;
        rewrite_subtree_paths(&mut tx, &folder.path, &new_path).await?;
        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))
    }

    /// Reparent a folder and rewrite the paths below it.
    ///
    /// The caller must already have ruled out moving into its own subtree.
    pub async fn move_to(&self, id: i64, new_parent: Option<&Folder>) -> Result<Folder> {
        let folder = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))?;
        let new_path = path_under(new_parent, &folder.name);

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE folders SET parent_id = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(new_parent.map(|p| p.id))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, duplicate_name(&folder.name)))?;
        rewrite_subtree_paths(&mut tx, &folder.path, &new_path).await?;
        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))
    }

    /// Set the public flag.
    pub async fn set_public(&self, id: i64, is_public: bool) -> Result<Option<Folder>> {
        let result = sqlx::query(
            "UPDATE folders SET is_public = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(is_public)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a folder. Subfolders, files and grants cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deep-copy `source` as a new child of `destination` named `name`.
    ///
    /// Grants are copied along with every subfolder.
    pub async fn copy_tree(
        &self,
        source: &Folder,
        destination: Option<&Folder>,
        name: &str,
        created_by: Option<i64>,
        blobs: &HashMap<String, String>,
    ) -> Result<Folder> {
        let path = path_under(destination, name);

        let mut tx = self.pool.begin().await?;
        let new_id: i64 = sqlx::query_scalar(
            "INSERT INTO folders (name, path, parent_id, created_by, is_public)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(&path)
        .bind(destination.map(|d| d.id))
        .bind(created_by)
        .bind(source.is_public)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate_name(name)))?;
        copy_grants(&mut tx, source.id, new_id).await?;
        copy_contents(&mut tx, source.id, new_id, &path, created_by, blobs).await?;
        tx.commit().await?;

        self.get_by_id(new_id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))
    }

    /// Replace everything inside `target` with a copy of the contents of `source`.
    pub async fn replace_contents(
        &self,
        target: &Folder,
        source: &Folder,
        created_by: Option<i64>,
        blobs: &HashMap<String, String>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM folders WHERE parent_id = ?")
            .bind(target.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM files WHERE folder_id = ?")
            .bind(target.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE folders SET updated_at = datetime('now') WHERE id = ?")
            .bind(target.id)
            .execute(&mut *tx)
            .await?;
        copy_contents(&mut tx, source.id, target.id, &target.path, created_by, blobs).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Users granted on a folder, by username.
    pub async fn users(&self, folder_id: i64) -> Result<Vec<FolderUser>> {
        let users = sqlx::query_as::<_, FolderUser>(
            "SELECT u.id, u.username FROM users u
             JOIN folder_permissions p ON p.user_id = u.id
             WHERE p.folder_id = ?
             ORDER BY u.username COLLATE NOCASE",
        )
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }

    /// Add and remove grants in one transaction. Removals win over additions.
    pub async fn update_permissions(
        &self,
        folder_id: i64,
        add: &[i64],
        remove: &[i64],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for user_id in add {
            sqlx::query("INSERT OR IGNORE INTO folder_permissions (folder_id, user_id) VALUES (?, ?)")
                .bind(folder_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        for user_id in remove {
            sqlx::query("DELETE FROM folder_permissions WHERE folder_id = ? AND user_id = ?")
                .bind(folder_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Folders reachable from a public root through public folders only.
    pub async fn list_public(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "WITH RECURSIVE reachable(id) AS (
                SELECT id FROM folders WHERE parent_id IS NULL AND is_public = 1
                UNION ALL
                SELECT f.id FROM folders f JOIN reachable r ON f.parent_id = r.id
                WHERE f.is_public = 1
             )
             SELECT f.id, f.name, f.path, f.parent_id, f.created_by, f.is_public,
                    f.created_at, f.updated_at
             FROM folders f JOIN reachable r ON f.id = r.id
             ORDER BY f.path COLLATE NOCASE",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(folders)
    }

    /// Whether the folder and all its ancestors are public.
    pub async fn is_publicly_reachable(&self, id: i64) -> Result<bool> {
        let chain = self.ancestors(id).await?;
        Ok(!chain.is_empty() && chain.iter().all(|f| f.is_public))
    }

    /// Total number of folders.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
