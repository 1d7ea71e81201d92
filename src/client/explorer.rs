//! Folder browsing state on top of the API client.
//!
//! [`AdminExplorer`] fetches each folder from the server as it is opened and
//! mutates through the API. [`PublicExplorer`] loads the public tree once and
//! navigates it locally.

use crate::web::dto::{FileResponse, FolderResponse, FolderTreeResponse, FolderUserResponse, UserInfo};

use super::api::{AdminApi, ClientError, ClientResult, PublicApi, UploadFile};

/// Page size used when loading the users available for selection.
const USER_PAGE_SIZE: u32 = 100;

/// A breadcrumb entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    /// Folder ID.
    pub id: i64,
    /// Display name.
    pub name: String,
}

impl FolderSummary {
    /// Create a breadcrumb entry.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl From<&FolderResponse> for FolderSummary {
    fn from(folder: &FolderResponse) -> Self {
        Self::new(folder.id, folder.name.clone())
    }
}

impl From<&FolderTreeResponse> for FolderSummary {
    fn from(folder: &FolderTreeResponse) -> Self {
        Self::new(folder.id, folder.name.clone())
    }
}

/// A user picked for a folder grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedUser {
    /// User ID.
    pub id: i64,
    /// Login name.
    pub username: String,
}

impl From<&UserInfo> for SelectedUser {
    fn from(user: &UserInfo) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl From<&FolderUserResponse> for SelectedUser {
    fn from(user: &FolderUserResponse) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Users selected for a new folder, in selection order, unique by id.
#[derive(Debug, Clone, Default)]
pub struct UserSelection {
    users: Vec<SelectedUser>,
}

impl UserSelection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user unless one with the same id is already selected.
    ///
    /// Returns whether the user was added.
    pub fn select(&mut self, user: SelectedUser) -> bool {
        if self.contains(user.id) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Remove the user with this id. Returns whether one was removed.
    pub fn remove(&mut self, user_id: i64) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != user_id);
        self.users.len() != before
    }

    /// Whether a user is selected.
    pub fn contains(&self, user_id: i64) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    /// Selected user ids, in selection order.
    pub fn ids(&self) -> Vec<i64> {
        self.users.iter().map(|u| u.id).collect()
    }

    /// Selected users, in selection order.
    pub fn users(&self) -> &[SelectedUser] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Drop every selected user.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

fn required_name(name: &str, what: &str) -> ClientResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::Invalid(format!("{what} name is required")));
    }
    Ok(name.to_string())
}

/// Authenticated explorer with folder and file management.
pub struct AdminExplorer<A: AdminApi> {
    api: A,
    breadcrumb: Vec<FolderSummary>,
    folders: Vec<FolderResponse>,
    files: Vec<FileResponse>,
    users: Vec<UserInfo>,
    selection: UserSelection,
    loading: bool,
}

impl<A: AdminApi> AdminExplorer<A> {
    /// Create an explorer with nothing loaded.
    pub fn new(api: A) -> Self {
        Self {
            api,
            breadcrumb: Vec::new(),
            folders: Vec::new(),
            files: Vec::new(),
            users: Vec::new(),
            selection: UserSelection::new(),
            loading: false,
        }
    }

    /// The API the explorer calls.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Folders from the root to the current one.
    pub fn breadcrumb(&self) -> &[FolderSummary] {
        &self.breadcrumb
    }

    /// Subfolders of the current view.
    pub fn folders(&self) -> &[FolderResponse] {
        &self.folders
    }

    /// Files of the current view; empty at the root.
    pub fn files(&self) -> &[FileResponse] {
        &self.files
    }

    /// Users available for selection, see [`AdminExplorer::load_users`].
    pub fn users(&self) -> &[UserInfo] {
        &self.users
    }

    /// Users picked for the next folder.
    pub fn selection(&self) -> &UserSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut UserSelection {
        &mut self.selection
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The folder being viewed, `None` at the root.
    pub fn current_folder(&self) -> Option<&FolderSummary> {
        self.breadcrumb.last()
    }

    /// Show the root folders and clear the breadcrumb.
    pub async fn load_root(&mut self) -> ClientResult<()> {
        self.loading = true;
        let result = self.api.root_folders().await;
        self.loading = false;

        let folders = result.map_err(|e| {
            tracing::warn!(error = %e, "Failed to load root folders");
            e
        })?;
        self.breadcrumb.clear();
        self.folders = folders;
        self.files.clear();
        Ok(())
    }

    async fn load_folder(&mut self, folder_id: i64) -> ClientResult<()> {
        self.loading = true;
        let result = self.api.folder_detail(folder_id).await;
        self.loading = false;

        let detail = result.map_err(|e| {
            tracing::warn!(folder_id, error = %e, "Failed to load folder");
            e
        })?;
        self.folders = detail.subfolders;
        self.files = detail.files;
        Ok(())
    }

    /// Enter a folder: push it onto the breadcrumb and load its contents.
    ///
    /// The breadcrumb is left as it was when loading fails.
    pub async fn open_folder(&mut self, folder: FolderSummary) -> ClientResult<()> {
        let folder_id = folder.id;
        self.breadcrumb.push(folder);
        if let Err(e) = self.load_folder(folder_id).await {
            self.breadcrumb.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Jump to `breadcrumb[index]`, dropping everything after it.
    ///
    /// `None` or an index past the end goes back to the root. The breadcrumb
    /// only changes once the target has loaded.
    pub async fn navigate_to(&mut self, index: Option<usize>) -> ClientResult<()> {
        match index {
            Some(i) if i < self.breadcrumb.len() => {
                let folder_id = self.breadcrumb[i].id;
                self.load_folder(folder_id).await?;
                self.breadcrumb.truncate(i + 1);
                Ok(())
            }
            _ => self.load_root().await,
        }
    }

    /// Re-load the current view without touching the breadcrumb.
    pub async fn reload(&mut self) -> ClientResult<()> {
        match self.current_folder().map(|f| f.id) {
            Some(folder_id) => self.load_folder(folder_id).await,
            None => self.load_root().await,
        }
    }

    /// Re-load after a change the server already accepted.
    ///
    /// A failed refresh is logged and keeps the previous view, so the
    /// change itself still reports success.
    async fn refresh_after_change(&mut self) {
        if let Err(e) = self.reload().await {
            tracing::warn!(error = %e, "Change saved but the view could not be refreshed");
        }
    }

    /// Load the users that can be selected for a new folder.
    pub async fn load_users(&mut self) -> ClientResult<()> {
        let page = self
            .api
            .list_users(1, USER_PAGE_SIZE, None)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to load users");
                e
            })?;
        self.users = page.data;
        Ok(())
    }

    /// Create a folder in the current view, granted to the selected users.
    ///
    /// Needs a name and at least one selected user. The selection is cleared
    /// once the folder exists, even if refreshing the view then fails.
    pub async fn create_folder(&mut self, name: &str) -> ClientResult<FolderResponse> {
        let name = required_name(name, "Folder")?;
        if self.selection.is_empty() {
            return Err(ClientError::Invalid(
                "Select at least one user for the folder".to_string(),
            ));
        }

        let parent_id = self.current_folder().map(|f| f.id);
        let folder = self
            .api
            .create_folder(&name, parent_id, &self.selection.ids(), false)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to create folder");
                e
            })?;

        self.selection.clear();
        self.refresh_after_change().await;
        Ok(folder)
    }

    /// Rename a folder in the current view.
    pub async fn rename_folder(&mut self, folder_id: i64, name: &str) -> ClientResult<FolderResponse> {
        let name = required_name(name, "Folder")?;
        let folder = self.api.rename_folder(folder_id, &name).await.map_err(|e| {
            tracing::warn!(folder_id, error = %e, "Failed to rename folder");
            e
        })?;
        self.refresh_after_change().await;
        Ok(folder)
    }

    /// Rename a file in the current view.
    pub async fn rename_file(&mut self, file_id: i64, name: &str) -> ClientResult<FileResponse> {
        let name = required_name(name, "File")?;
        let file = self.api.rename_file(file_id, &name).await.map_err(|e| {
            tracing::warn!(file_id, error = %e, "Failed to rename file");
            e
        })?;
        self.refresh_after_change().await;
        Ok(file)
    }

    /// Delete a folder and refresh the view.
    pub async fn delete_folder(&mut self, folder_id: i64) -> ClientResult<()> {
        self.api.delete_folder(folder_id).await.map_err(|e| {
            tracing::warn!(folder_id, error = %e, "Failed to delete folder");
            e
        })?;
        self.refresh_after_change().await;
        Ok(())
    }

    /// Delete a file and refresh the view.
    pub async fn delete_file(&mut self, file_id: i64) -> ClientResult<()> {
        self.api.delete_file(file_id).await.map_err(|e| {
            tracing::warn!(file_id, error = %e, "Failed to delete file");
            e
        })?;
        self.refresh_after_change().await;
        Ok(())
    }

    /// Upload a file into the current folder.
    pub async fn upload(&mut self, name: &str, content: Vec<u8>) -> ClientResult<FileResponse> {
        let folder_id = self
            .current_folder()
            .map(|f| f.id)
            .ok_or_else(|| ClientError::Invalid("Open a folder before uploading".to_string()))?;

        let uploaded = self
            .api
            .upload_files(folder_id, vec![UploadFile::new(name, content)], false)
            .await
            .map_err(|e| {
                tracing::warn!(folder_id, error = %e, "Upload failed");
                e
            })?;
        let file = uploaded
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Invalid("Server accepted no file".to_string()))?;

        self.refresh_after_change().await;
        Ok(file)
    }

    /// Raw content of a file.
    pub async fn download(&self, file_id: i64) -> ClientResult<Vec<u8>> {
        self.api.download_file(file_id).await
    }
}

/// Read-only explorer over the public tree.
pub struct PublicExplorer<P: PublicApi> {
    api: P,
    roots: Vec<FolderTreeResponse>,
    breadcrumb: Vec<FolderTreeResponse>,
    loading: bool,
}

impl<P: PublicApi> PublicExplorer<P> {
    /// Create an explorer; call [`PublicExplorer::load`] before browsing.
    pub fn new(api: P) -> Self {
        Self {
            api,
            roots: Vec::new(),
            breadcrumb: Vec::new(),
            loading: false,
        }
    }

    /// Fetch the public tree and return to the root.
    pub async fn load(&mut self) -> ClientResult<()> {
        self.loading = true;
        let result = self.api.public_tree().await;
        self.loading = false;

        self.roots = result.map_err(|e| {
            tracing::warn!(error = %e, "Failed to load public folders");
            e
        })?;
        self.breadcrumb.clear();
        Ok(())
    }

    /// Whether a load is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The loaded public forest.
    pub fn roots(&self) -> &[FolderTreeResponse] {
        &self.roots
    }

    /// Opened folders from the root down.
    pub fn breadcrumb(&self) -> Vec<FolderSummary> {
        self.breadcrumb.iter().map(FolderSummary::from).collect()
    }

    /// The innermost opened folder.
    pub fn current_folder(&self) -> Option<&FolderTreeResponse> {
        self.breadcrumb.last()
    }

    /// Folders of the current view: roots, or the current folder's children.
    pub fn current_folders(&self) -> &[FolderTreeResponse] {
        match self.current_folder() {
            Some(folder) => &folder.children,
            None => &self.roots,
        }
    }

    /// Files of the current folder; none at the root.
    pub fn current_files(&self) -> &[FileResponse] {
        match self.current_folder() {
            Some(folder) => &folder.files,
            None => &[],
        }
    }

    /// Enter one of the current view's folders. Returns `false` when no such
    /// folder is visible here.
    pub fn open_folder(&mut self, folder_id: i64) -> bool {
        let Some(folder) = self
            .current_folders()
            .iter()
            .find(|f| f.id == folder_id)
            .cloned()
        else {
            return false;
        };
        self.breadcrumb.push(folder);
        true
    }

    /// `Some(i)` keeps `breadcrumb[..=i]`; `None` returns to the root.
    ///
    /// An index past the end leaves the view unchanged.
    pub fn navigate_to(&mut self, index: Option<usize>) {
        match index {
            None => self.reset(),
            Some(i) => self.breadcrumb.truncate(i + 1),
        }
    }

    /// Go back to the root.
    pub fn reset(&mut self) {
        self.breadcrumb.clear();
    }

    /// Raw content of a file.
    pub async fn download(&self, file_id: i64) -> ClientResult<Vec<u8>> {
        self.api.public_download_file(file_id).await
    }
}
