//! File metadata types and repository.

use std::collections::HashSet;

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::{conflict_on_unique, escape_like};
use crate::{CabinetError, Result};

const FILE_COLUMNS: &str =
    "id, folder_id, name, mime_type, size, stored_name, created_by, is_public, created_at, updated_at";

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredFile {
    /// Unique file ID.
    pub id: i64,
    /// Folder this file belongs to.
    pub folder_id: i64,
    /// Display name, unique within the folder.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Blob key in `FileStorage`.
    pub stored_name: String,
    /// Uploader, cleared when that user is deleted.
    pub created_by: Option<i64>,
    /// Visible on the public surface (if its folder is reachable).
    pub is_public: bool,
    /// Upload timestamp.
    pub created_at: String,
    /// Last rename, move, replace or flag change.
    pub updated_at: String,
}

impl StoredFile {
    /// Download URL relative to the server root.
    pub fn url(&self) -> String {
        format!("/api/files/{}/download", self.id)
    }
}

/// Data for creating a new file entry.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Folder to place the file in.
    pub folder_id: i64,
    /// Display name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Blob key.
    pub stored_name: String,
    /// Uploader.
    pub created_by: Option<i64>,
    /// Public flag.
    pub is_public: bool,
}

impl NewFile {
    /// Create a private file entry.
    pub fn new(
        folder_id: i64,
        name: impl Into<String>,
        stored_name: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            folder_id,
            name: name.into(),
            mime_type: "application/octet-stream".to_string(),
            size,
            stored_name: stored_name.into(),
            created_by: None,
            is_public: false,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Set the uploader.
    pub fn with_creator(mut self, user_id: i64) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Set the public flag.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Partial update of a file. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New folder.
    pub folder_id: Option<i64>,
    /// New MIME type.
    pub mime_type: Option<String>,
    /// New size.
    pub size: Option<i64>,
    /// New blob key.
    pub stored_name: Option<String>,
    /// New public flag.
    pub is_public: Option<bool>,
}

impl FileUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the folder.
    pub fn folder_id(mut self, folder_id: i64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    /// Point the entry at new content.
    pub fn content(
        mut self,
        stored_name: impl Into<String>,
        size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        self.stored_name = Some(stored_name.into());
        self.size = Some(size);
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the public flag.
    pub fn is_public(mut self, is_public: bool) -> Self {
        self.is_public = Some(is_public);
        self
    }

    /// True when nothing would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.folder_id.is_none()
            && self.mime_type.is_none()
            && self.size.is_none()
            && self.stored_name.is_none()
            && self.is_public.is_none()
    }
}

/// Sort key for file listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSort {
    /// By name, case-insensitive.
    #[default]
    Name,
    /// By size in bytes.
    Size,
    /// By upload date.
    Date,
}

impl FileSort {
    fn column(self) -> &'static str {
        match self {
            FileSort::Name => "name COLLATE NOCASE",
            FileSort::Size => "size",
            FileSort::Date => "created_at",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Filtering, ordering and paging of a folder's files.
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    /// Extension without the dot, lowercase.
    pub extension: Option<String>,
    /// Case-insensitive name substring.
    pub name: Option<String>,
    /// Only files with `is_public` set.
    pub public_only: bool,
    /// Sort key.
    pub sort: FileSort,
    /// Sort direction.
    pub direction: SortDirection,
    /// Page size; `None` returns everything.
    pub limit: Option<i64>,
    /// Rows to skip.
    pub offset: i64,
}

impl FileQuery {
    fn push_filters(&self, query: &mut QueryBuilder<'_, Sqlite>, folder_id: i64) {
        query.push(" WHERE folder_id = ");
        query.push_bind(folder_id);
        if let Some(ref ext) = self.extension {
            query.push(" AND lower(name) LIKE ");
            query.push_bind(format!("%.{}", escape_like(&ext.to_lowercase())));
            query.push(" ESCAPE '\\'");
        }
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query.push(" AND name LIKE ");
            query.push_bind(format!("%{}%", escape_like(name)));
            query.push(" ESCAPE '\\'");
        }
        if self.public_only {
            query.push(" AND is_public = 1");
        }
    }
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new file entry.
    pub async fn create(&self, file: &NewFile) -> Result<StoredFile> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (folder_id, name, mime_type, size, stored_name, created_by, is_public)
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(file.folder_id)
        .bind(&file.name)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(&file.stored_name)
        .bind(file.created_by)
        .bind(file.is_public)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, format!("a file named '{}' already exists here", file.name))
        })?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("file".to_string()))
    }

    /// Get a file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        let file = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(file)
    }

    /// All files of a folder, by name.
    pub async fn list_by_folder(&self, folder_id: i64) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE folder_id = ? ORDER BY name COLLATE NOCASE"
        ))
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;
        Ok(files)
    }

    /// Filtered, sorted page of a folder's files, plus the unpaged total.
    pub async fn query(&self, folder_id: i64, q: &FileQuery) -> Result<(Vec<StoredFile>, i64)> {
        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM files");
        q.push_filters(&mut count_query, folder_id);
        let total: i64 = count_query.build_query_scalar::<i64>().fetch_one(self.pool).await?;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files"));
        q.push_filters(&mut query, folder_id);
        query.push(format!(
            " ORDER BY {} {}, id {}",
            q.sort.column(),
            q.direction.keyword(),
            q.direction.keyword()
        ));
        if let Some(limit) = q.limit {
            query.push(" LIMIT ");
            query.push_bind(limit);
            query.push(" OFFSET ");
            query.push_bind(q.offset);
        }

        let files = query.build_query_as::<StoredFile>().fetch_all(self.pool).await?;
        Ok((files, total))
    }

    /// Every file in a folder and its descendants.
    pub async fn list_in_subtree(&self, folder_id: i64) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(&format!(
            "WITH RECURSIVE sub(id) AS (
                SELECT id FROM folders WHERE id = ?
                UNION ALL
                SELECT f.id FROM folders f JOIN sub ON f.parent_id = sub.id
             )
             SELECT {FILE_COLUMNS} FROM files WHERE folder_id IN (SELECT id FROM sub)
             ORDER BY folder_id, name COLLATE NOCASE"
        ))
        .bind(folder_id)
        .fetch_all(self.pool)
        .await?;
        Ok(files)
    }

    /// Lowercased names of the files in a folder.
    pub async fn names_in_folder(&self, folder_id: i64) -> Result<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_all(self.pool)
            .await?;
        Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
    }

    /// Whether a file other than `exclude_id` in the folder uses `name`.
    pub async fn name_exists(
        &self,
        folder_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM files
                WHERE folder_id = ? AND name = ? COLLATE NOCASE AND id != COALESCE(?, 0))",
        )
        .bind(folder_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Update a file. Returns the updated file, or None if not found.
    pub async fn update(&self, id: i64, update: &FileUpdate) -> Result<Option<StoredFile>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE files SET updated_at = datetime('now')");

        if let Some(ref name) = update.name {
            query.push(", name = ");
            query.push_bind(name);
        }
        if let Some(folder_id) = update.folder_id {
            query.push(", folder_id = ");
            query.push_bind(folder_id);
        }
        if let Some(ref mime_type) = update.mime_type {
            query.push(", mime_type = ");
            query.push_bind(mime_type);
        }
        if let Some(size) = update.size {
            query.push(", size = ");
            query.push_bind(size);
        }
        if let Some(ref stored_name) = update.stored_name {
            query.push(", stored_name = ");
            query.push_bind(stored_name);
        }
        if let Some(is_public) = update.is_public {
            query.push(", is_public = ");
            query.push_bind(is_public);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await.map_err(|e| {
            conflict_on_unique(e, "a file with that name already exists in the folder")
        })?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Delete a file entry. The blob is the caller's business.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of files in a folder.
    pub async fn count_by_folder(&self, folder_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FolderRepository, NewFolder};
    use crate::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let folder = FolderRepository::new(db.pool())
            .create(&NewFolder::new("Test"))
            .await
            .unwrap();
        (db, folder.id)
    }

    async fn add(repo: &FileRepository<'_>, folder_id: i64, name: &str, size: i64) -> StoredFile {
        repo.create(&NewFile::new(folder_id, name, format!("blob-{name}"), size))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_file() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());

        let file = repo
            .create(
                &NewFile::new(folder_id, "report.pdf", "ab12.pdf", 2048)
                    .with_mime_type("application/pdf")
                    .with_public(true),
            )
            .await
            .unwrap();

        assert_eq!(file.folder_id, folder_id);
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size, 2048);
        assert!(file.is_public);
        assert!(file.created_by.is_none());
        assert_eq!(file.url(), format!("/api/files/{}/download", file.id));
    }

    #[tokio::test]
    async fn test_duplicate_name_in_folder() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        add(&repo, folder_id, "a.txt", 1).await;

        let result = repo.create(&NewFile::new(folder_id, "A.TXT", "other", 1)).await;
        assert!(matches!(result, Err(CabinetError::Conflict(_))));
        assert!(repo.name_exists(folder_id, "a.TXT", None).await.unwrap());
        assert!(repo.names_in_folder(folder_id).await.unwrap().contains("a.txt"));
    }

    #[tokio::test]
    async fn test_query_sort_and_page() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        add(&repo, folder_id, "b.txt", 30).await;
        add(&repo, folder_id, "A.pdf", 10).await;
        add(&repo, folder_id, "c.PDF", 20).await;

        let (files, total) = repo.query(folder_id, &FileQuery::default()).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["A.pdf", "b.txt", "c.PDF"]);

        let by_size = FileQuery {
            sort: FileSort::Size,
            direction: SortDirection::Desc,
            limit: Some(2),
            ..Default::default()
        };
        let (files, total) = repo.query(folder_id, &by_size).await.unwrap();
        assert_eq!(total, 3);
        let sizes: Vec<_> = files.iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![30, 20]);

        let second_page = FileQuery {
            offset: 2,
            ..by_size
        };
        let (files, _) = repo.query(folder_id, &second_page).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 10);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        add(&repo, folder_id, "notes.txt", 1).await;
        add(&repo, folder_id, "Report.PDF", 1).await;
        add(&repo, folder_id, "report_draft.pdf", 1).await;
        let public = repo
            .create(&NewFile::new(folder_id, "open.pdf", "blob-open", 1).with_public(true))
            .await
            .unwrap();

        let pdfs = FileQuery {
            extension: Some("pdf".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.query(folder_id, &pdfs).await.unwrap().1, 3);

        let named = FileQuery {
            name: Some("REPORT".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.query(folder_id, &named).await.unwrap().1, 2);

        let underscore = FileQuery {
            name: Some("_".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.query(folder_id, &underscore).await.unwrap().1, 1);

        let public_only = FileQuery {
            public_only: true,
            ..Default::default()
        };
        let (files, _) = repo.query(folder_id, &public_only).await.unwrap();
        assert_eq!(files, vec![public]);
    }

    #[tokio::test]
    async fn test_update_file() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        let other = FolderRepository::new(db.pool())
            .create(&NewFolder::new("Other"))
            .await
            .unwrap();
        let file = add(&repo, folder_id, "a.txt", 1).await;

        let updated = repo
            .update(
                file.id,
                &FileUpdate::new()
                    .name("b.md")
                    .folder_id(other.id)
                    .content("new-blob", 99, "text/markdown")
                    .is_public(true),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "b.md");
        assert_eq!(updated.folder_id, other.id);
        assert_eq!(updated.stored_name, "new-blob");
        assert_eq!(updated.size, 99);
        assert_eq!(updated.mime_type, "text/markdown");
        assert!(updated.is_public);

        assert!(repo
            .update(999, &FileUpdate::new().name("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_name_conflict() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        add(&repo, folder_id, "a.txt", 1).await;
        let b = add(&repo, folder_id, "b.txt", 1).await;

        let result = repo.update(b.id, &FileUpdate::new().name("A.txt")).await;
        assert!(matches!(result, Err(CabinetError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_in_subtree_and_delete() {
        let (db, folder_id) = setup().await;
        let repo = FileRepository::new(db.pool());
        let folders = FolderRepository::new(db.pool());
        let child = folders
            .create(&NewFolder::new("Child").with_parent(folder_id))
            .await
            .unwrap();
        let unrelated = folders.create(&NewFolder::new("Unrelated")).await.unwrap();

        let top = add(&repo, folder_id, "top.txt", 1).await;
        add(&repo, child.id, "deep.txt", 1).await;
        add(&repo, unrelated.id, "elsewhere.txt", 1).await;

        let subtree = repo.list_in_subtree(folder_id).await.unwrap();
        assert_eq!(subtree.len(), 2);

        assert!(repo.delete(top.id).await.unwrap());
        assert!(!repo.delete(top.id).await.unwrap());
        assert_eq!(repo.count_by_folder(folder_id).await.unwrap(), 0);

        // Deleting the folder cascades to its files.
        folders.delete(folder_id).await.unwrap();
        assert!(repo.list_in_subtree(child.id).await.unwrap().is_empty());
        assert_eq!(repo.list_by_folder(unrelated.id).await.unwrap().len(), 1);
    }
}
