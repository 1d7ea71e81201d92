//! File operations with access checks.

use tracing::info;

use super::folder::Folder;
use super::folder_service::FolderService;
use super::metadata::{FileQuery, FileRepository, FileUpdate, NewFile, StoredFile};
use super::name::{sanitize_file_name, unique_name};
use super::storage::FileStorage;
use super::DEFAULT_MAX_UPLOAD_SIZE;
use crate::auth::Actor;
use crate::db::Database;
use crate::{CabinetError, Result};

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-side file name, sanitized on upload.
    pub name: String,
    /// File content.
    pub content: Vec<u8>,
    /// MIME type sent by the client, if any.
    pub mime_type: Option<String>,
    /// Public flag.
    pub is_public: bool,
}

impl UploadRequest {
    /// Create a new upload request.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            mime_type: None,
            is_public: false,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the public flag.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    fn resolved_mime(&self, name: &str) -> String {
        self.mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(|| mime_guess::from_path(name).first_or_octet_stream().to_string())
    }
}

/// Result of a file download.
#[derive(Debug)]
pub struct DownloadResult {
    /// File metadata.
    pub file: StoredFile,
    /// File content.
    pub content: Vec<u8>,
}

/// File service for uploads, downloads and file management.
pub struct FileService<'a> {
    db: &'a Database,
    storage: &'a FileStorage,
    max_upload_size: u64,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, storage: &'a FileStorage) -> Self {
        Self {
            db,
            storage,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Create a new FileService with a custom upload limit in bytes.
    pub fn with_max_upload_size(mut self, max_size: u64) -> Self {
        self.max_upload_size = max_size;
        self
    }

    fn repo(&self) -> FileRepository<'a> {
        FileRepository::new(self.db.pool())
    }

    fn folders(&self) -> FolderService<'a> {
        FolderService::new(self.db, self.storage)
    }

    /// Load a file or fail with `NotFound`.
    pub async fn get(&self, id: i64) -> Result<StoredFile> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("file".to_string()))
    }

    async fn viewable(&self, actor: &Actor, id: i64) -> Result<StoredFile> {
        let file = self.get(id).await?;
        self.folders().viewable(actor, file.folder_id).await?;
        Ok(file)
    }

    async fn manageable(&self, actor: &Actor, id: i64) -> Result<StoredFile> {
        let file = self.get(id).await?;
        self.folders().manageable(actor, file.folder_id).await?;
        Ok(file)
    }

    fn check_content(&self, content: &[u8]) -> Result<()> {
        if content.is_empty() {
            return Err(CabinetError::Validation("file is empty".to_string()));
        }
        if content.len() as u64 > self.max_upload_size {
            return Err(CabinetError::Validation(format!(
                "file exceeds the maximum size of {} bytes",
                self.max_upload_size
            )));
        }
        Ok(())
    }

    /// Upload a file into a folder.
    ///
    /// A name already used in the folder gets a ` (n)` suffix.
    pub async fn upload(
        &self,
        actor: &Actor,
        folder_id: i64,
        request: UploadRequest,
    ) -> Result<StoredFile> {
        let folder = self.folders().manageable(actor, folder_id).await?;
        self.store(actor, &folder, request).await
    }

    async fn store(&self, actor: &Actor, folder: &Folder, request: UploadRequest) -> Result<StoredFile> {
        self.check_content(&request.content)?;
        let clean = sanitize_file_name(&request.name)?;
        let taken = self.repo().names_in_folder(folder.id).await?;
        let name = unique_name(&clean, &taken);
        let mime_type = request.resolved_mime(&name);

        let stored_name = self.storage.save(&request.content, &name).await?;
        let new_file = NewFile::new(folder.id, &name, &stored_name, request.content.len() as i64)
            .with_mime_type(mime_type)
            .with_creator(actor.user_id)
            .with_public(request.is_public);

        match self.repo().create(&new_file).await {
            Ok(file) => {
                info!(
                    file_id = file.id,
                    folder_id = folder.id,
                    name = %file.name,
                    size = file.size,
                    user_id = actor.user_id,
                    "File uploaded"
                );
                Ok(file)
            }
            Err(e) => {
                self.storage.delete_all([stored_name]).await;
                Err(e)
            }
        }
    }

    /// Upload several files; empty parts are skipped.
    pub async fn upload_many(
        &self,
        actor: &Actor,
        folder_id: i64,
        requests: Vec<UploadRequest>,
    ) -> Result<Vec<StoredFile>> {
        let folder = self.folders().manageable(actor, folder_id).await?;
        let parts: Vec<UploadRequest> = requests
            .into_iter()
            .filter(|r| !r.content.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(CabinetError::Validation("no files were uploaded".to_string()));
        }

        let mut uploaded = Vec::with_capacity(parts.len());
        for part in parts {
            uploaded.push(self.store(actor, &folder, part).await?);
        }
        Ok(uploaded)
    }

    /// Rename a file.
    pub async fn rename(&self, actor: &Actor, id: i64, name: &str) -> Result<StoredFile> {
        let file = self.manageable(actor, id).await?;
        let name = sanitize_file_name(name)?;
        if name == file.name {
            return Ok(file);
        }
        if self.repo().name_exists(file.folder_id, &name, Some(id)).await? {
            return Err(CabinetError::Conflict(format!(
                "a file named '{name}' already exists in the folder"
            )));
        }
        let renamed = self.update(id, &FileUpdate::new().name(name)).await?;
        info!(file_id = id, name = %renamed.name, "File renamed");
        Ok(renamed)
    }

    /// Move a file to another folder.
    pub async fn move_file(&self, actor: &Actor, id: i64, folder_id: i64) -> Result<StoredFile> {
        let file = self.manageable(actor, id).await?;
        self.folders().manageable(actor, folder_id).await?;
        if file.folder_id == folder_id {
            return Ok(file);
        }
        if self.repo().name_exists(folder_id, &file.name, Some(id)).await? {
            return Err(CabinetError::Conflict(format!(
                "a file named '{}' already exists in the destination",
                file.name
            )));
        }
        let moved = self.update(id, &FileUpdate::new().folder_id(folder_id)).await?;
        info!(file_id = id, from = file.folder_id, to = folder_id, "File moved");
        Ok(moved)
    }

    /// Copy a file into a folder; the copy belongs to the caller.
    pub async fn copy(&self, actor: &Actor, id: i64, folder_id: i64) -> Result<StoredFile> {
        let file = self.manageable(actor, id).await?;
        self.folders().manageable(actor, folder_id).await?;

        let taken = self.repo().names_in_folder(folder_id).await?;
        let name = unique_name(&file.name, &taken);
        let stored_name = self.storage.copy(&file.stored_name).await?;

        let new_file = NewFile::new(folder_id, &name, &stored_name, file.size)
            .with_mime_type(&file.mime_type)
            .with_creator(actor.user_id)
            .with_public(file.is_public);

        match self.repo().create(&new_file).await {
            Ok(copy) => {
                info!(source_id = id, file_id = copy.id, folder_id, "File copied");
                Ok(copy)
            }
            Err(e) => {
                self.storage.delete_all([stored_name]).await;
                Err(e)
            }
        }
    }

    /// Replace a file's content and name.
    ///
    /// The old blob is removed only after the entry points at the new one.
    pub async fn replace(&self, actor: &Actor, id: i64, request: UploadRequest) -> Result<StoredFile> {
        let file = self.manageable(actor, id).await?;
        self.check_content(&request.content)?;

        let clean = sanitize_file_name(&request.name)?;
        let mut taken = self.repo().names_in_folder(file.folder_id).await?;
        taken.remove(&file.name.to_lowercase());
        let name = unique_name(&clean, &taken);
        let mime_type = request.resolved_mime(&name);

        let stored_name = self.storage.save(&request.content, &name).await?;
        let update = FileUpdate::new().name(&name).content(
            &stored_name,
            request.content.len() as i64,
            mime_type,
        );

        match self.update(id, &update).await {
            Ok(updated) => {
                self.storage.delete_all([&file.stored_name]).await;
                info!(file_id = id, name = %updated.name, size = updated.size, "File content replaced");
                Ok(updated)
            }
            Err(e) => {
                self.storage.delete_all([stored_name]).await;
                Err(e)
            }
        }
    }

    /// Make a file public or private.
    pub async fn set_visibility(&self, actor: &Actor, id: i64, is_public: bool) -> Result<StoredFile> {
        self.manageable(actor, id).await?;
        self.update(id, &FileUpdate::new().is_public(is_public)).await
    }

    async fn update(&self, id: i64, update: &FileUpdate) -> Result<StoredFile> {
        self.repo()
            .update(id, update)
            .await?
            .ok_or_else(|| CabinetError::NotFound("file".to_string()))
    }

    /// Delete a file and its blob.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let file = self.manageable(actor, id).await?;
        self.repo().delete(id).await?;
        self.storage.delete_all([&file.stored_name]).await;
        info!(file_id = id, folder_id = file.folder_id, name = %file.name, "File deleted");
        Ok(())
    }

    /// Delete files of a folder.
    ///
    /// `None` or an empty list deletes every file in the folder. IDs that do
    /// not belong to the folder are ignored.
    pub async fn delete_in_folder(
        &self,
        actor: &Actor,
        folder_id: i64,
        ids: Option<&[i64]>,
    ) -> Result<Vec<StoredFile>> {
        self.folders().manageable(actor, folder_id).await?;
        let mut files = self.repo().list_by_folder(folder_id).await?;
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            files.retain(|f| ids.contains(&f.id));
        }

        for file in &files {
            self.repo().delete(file.id).await?;
        }
        let blobs: Vec<String> = files.iter().map(|f| f.stored_name.clone()).collect();
        self.storage.delete_all(&blobs).await;
        info!(folder_id, count = files.len(), "Files deleted");
        Ok(files)
    }

    /// A page of a folder's files and the total matching the filters.
    pub async fn list(
        &self,
        actor: &Actor,
        folder_id: i64,
        query: &FileQuery,
    ) -> Result<(Vec<StoredFile>, i64)> {
        self.folders().viewable(actor, folder_id).await?;
        self.repo().query(folder_id, query).await
    }

    /// File metadata, for anyone who can view its folder.
    pub async fn metadata(&self, actor: &Actor, id: i64) -> Result<StoredFile> {
        self.viewable(actor, id).await
    }

    /// Load a file's content.
    pub async fn download(&self, actor: &Actor, id: i64) -> Result<DownloadResult> {
        let file = self.viewable(actor, id).await?;
        let content = self.storage.load(&file.stored_name).await?;
        Ok(DownloadResult { file, content })
    }

    /// Public files of a publicly reachable folder.
    pub async fn public_files(&self, folder_id: i64) -> Result<Vec<StoredFile>> {
        self.folders().public_folder(folder_id).await?;
        let query = FileQuery {
            public_only: true,
            ..Default::default()
        };
        Ok(self.repo().query(folder_id, &query).await?.0)
    }

    /// Download a public file; anything not public is `NotFound`.
    pub async fn public_download(&self, id: i64) -> Result<DownloadResult> {
        let not_found = || CabinetError::NotFound("file".to_string());
        let file = self.repo().get_by_id(id).await?.ok_or_else(not_found)?;
        if !file.is_public {
            return Err(not_found());
        }
        match self.folders().public_folder(file.folder_id).await {
            Ok(_) => {}
            Err(CabinetError::NotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e),
        }
        let content = self.storage.load(&file.stored_name).await?;
        Ok(DownloadResult { file, content })
    }
}
