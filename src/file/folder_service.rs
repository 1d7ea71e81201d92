//! Folder operations with access checks.

use std::collections::{HashMap, HashSet};

use tracing::info;

use super::archive::build_zip;
use super::folder::{Folder, FolderRepository, FolderUpdate, FolderUser, NewFolder};
use super::metadata::{FileQuery, FileRepository, StoredFile};
use super::name::{copy_name, validate_folder_name};
use super::storage::FileStorage;
use super::tree::{build_forest, group_files, FolderNode};
use crate::auth::{require_admin, require_manage, require_view, Actor};
use crate::db::{Database, UserRepository};
use crate::{CabinetError, Result};

/// Everything the explorer shows for one folder.
#[derive(Debug, Clone)]
pub struct FolderDetail {
    /// The folder.
    pub folder: Folder,
    /// Root first, ending with the folder itself.
    pub breadcrumb: Vec<Folder>,
    /// Direct subfolders the user can see.
    pub subfolders: Vec<Folder>,
    /// Files, filtered and sorted per the request.
    pub files: Vec<StoredFile>,
}

/// Folder service.
pub struct FolderService<'a> {
    db: &'a Database,
    storage: &'a FileStorage,
}

impl<'a> FolderService<'a> {
    /// Create a new FolderService.
    pub fn new(db: &'a Database, storage: &'a FileStorage) -> Self {
        Self { db, storage }
    }

    fn folders(&self) -> FolderRepository<'a> {
        FolderRepository::new(self.db.pool())
    }

    fn files(&self) -> FileRepository<'a> {
        FileRepository::new(self.db.pool())
    }

    /// Load a folder or fail with `NotFound`.
    pub async fn get(&self, id: i64) -> Result<Folder> {
        self.folders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("folder".to_string()))
    }

    async fn is_granted(&self, actor: &Actor, folder_id: i64) -> Result<bool> {
        if actor.is_admin() {
            return Ok(true);
        }
        self.folders().is_granted(folder_id, actor.user_id).await
    }

    /// Load a folder the actor may view.
    pub async fn viewable(&self, actor: &Actor, id: i64) -> Result<Folder> {
        let folder = self.get(id).await?;
        require_view(actor.role, self.is_granted(actor, id).await?)?;
        Ok(folder)
    }

    /// Load a folder the actor may manage.
    pub async fn manageable(&self, actor: &Actor, id: i64) -> Result<Folder> {
        let folder = self.get(id).await?;
        require_manage(actor.role, self.is_granted(actor, id).await?)?;
        Ok(folder)
    }

    /// The folder a create/move/copy lands in; `None` (root) is admin only.
    async fn destination(&self, actor: &Actor, id: Option<i64>) -> Result<Option<Folder>> {
        match id {
            Some(id) => Ok(Some(self.manageable(actor, id).await?)),
            None => {
                require_admin(actor.role)?;
                Ok(None)
            }
        }
    }

    async fn ensure_users_exist(&self, ids: &[i64]) -> Result<()> {
        let missing = UserRepository::new(self.db.pool()).missing_ids(ids).await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CabinetError::Validation(format!("unknown user ids: {missing:?}")))
        }
    }

    /// Create a folder.
    ///
    /// A non-admin creator is added to the grant set so they keep access.
    pub async fn create(
        &self,
        actor: &Actor,
        name: &str,
        parent_id: Option<i64>,
        user_ids: &[i64],
        is_public: bool,
    ) -> Result<Folder> {
        let name = validate_folder_name(name)?;
        let parent = self.destination(actor, parent_id).await?;
        self.ensure_users_exist(user_ids).await?;

        if self.folders().name_exists(parent_id, &name, None).await? {
            return Err(CabinetError::Conflict(format!(
                "a folder named '{name}' already exists here"
            )));
        }

        let mut grants = user_ids.to_vec();
        if !actor.is_admin() && !grants.contains(&actor.user_id) {
            grants.push(actor.user_id);
        }

        let mut new_folder = NewFolder::new(name)
            .with_creator(actor.user_id)
            .with_public(is_public)
            .with_users(grants);
        new_folder.parent_id = parent.map(|p| p.id);

        let folder = self.folders().create(&new_folder).await?;
        info!(folder_id = folder.id, path = %folder.path, user_id = actor.user_id, "Folder created");
        Ok(folder)
    }

    /// Root folders the actor can see.
    pub async fn list_roots(&self, actor: &Actor) -> Result<Vec<Folder>> {
        if actor.is_admin() {
            return self.folders().list_roots().await;
        }
        let mut roots: Vec<Folder> = self
            .folders()
            .list_granted(actor.user_id)
            .await?
            .into_iter()
            .filter(Folder::is_root)
            .collect();
        roots.sort_by_key(|f| f.name.to_lowercase());
        Ok(roots)
    }

    /// Every folder the actor can see, ordered by path.
    pub async fn list_accessible(&self, actor: &Actor) -> Result<Vec<Folder>> {
        if actor.is_admin() {
            self.folders().list_all().await
        } else {
            self.folders().list_granted(actor.user_id).await
        }
    }

    /// Tree of the folders the actor can see, optionally with their files.
    pub async fn tree(&self, actor: &Actor, with_files: bool) -> Result<Vec<FolderNode>> {
        let folders = self.list_accessible(actor).await?;
        let mut files = HashMap::new();
        if with_files {
            for folder in &folders {
                files.insert(folder.id, self.files().list_by_folder(folder.id).await?);
            }
        }
        Ok(build_forest(folders, files))
    }

    /// Folder contents for the explorer.
    pub async fn detail(&self, actor: &Actor, id: i64, query: &FileQuery) -> Result<FolderDetail> {
        let folder = self.viewable(actor, id).await?;
        let breadcrumb = self.folders().ancestors(id).await?;

        let mut subfolders = self.folders().list_children(id).await?;
        if !actor.is_admin() {
            let granted: HashSet<i64> = self
                .folders()
                .granted_ids(actor.user_id)
                .await?
                .into_iter()
                .collect();
            subfolders.retain(|f| granted.contains(&f.id));
        }

        let unpaged = FileQuery {
            limit: None,
            offset: 0,
            ..query.clone()
        };
        let (files, _) = self.files().query(id, &unpaged).await?;

        Ok(FolderDetail {
            folder,
            breadcrumb,
            subfolders,
            files,
        })
    }

    /// Apply a partial update (name and/or public flag).
    pub async fn update(&self, actor: &Actor, id: i64, update: &FolderUpdate) -> Result<Folder> {
        let mut folder = self.manageable(actor, id).await?;
        if let Some(ref name) = update.name {
            folder = self.rename(actor, id, name).await?;
        }
        if let Some(is_public) = update.is_public {
            folder = self
                .folders()
                .set_public(id, is_public)
                .await?
                .ok_or_else(|| CabinetError::NotFound("folder".to_string()))?;
        }
        Ok(folder)
    }

    /// Rename a folder.
    pub async fn rename(&self, actor: &Actor, id: i64, name: &str) -> Result<Folder> {
        let folder = self.manageable(actor, id).await?;
        let name = validate_folder_name(name)?;
        if name == folder.name {
            return Ok(folder);
        }
        if self
            .folders()
            .name_exists(folder.parent_id, &name, Some(id))
            .await?
        {
            return Err(CabinetError::Conflict(format!(
                "a folder named '{name}' already exists here"
            )));
        }
        let renamed = self.folders().rename(id, &name).await?;
        info!(folder_id = id, path = %renamed.path, "Folder renamed");
        Ok(renamed)
    }

    /// Move a folder under `new_parent`, or to the root level.
    pub async fn move_folder(
        &self,
        actor: &Actor,
        id: i64,
        new_parent: Option<i64>,
    ) -> Result<Folder> {
        let folder = self.manageable(actor, id).await?;
        let destination = self.destination(actor, new_parent).await?;

        if let Some(ref dest) = destination {
            if self.folders().is_within(dest.id, id).await? {
                return Err(CabinetError::Validation(
                    "a folder cannot be moved into itself or one of its subfolders".to_string(),
                ));
            }
        }
        if folder.parent_id == new_parent {
            return Ok(folder);
        }
        if self
            .folders()
            .name_exists(new_parent, &folder.name, Some(id))
            .await?
        {
            return Err(CabinetError::Conflict(format!(
                "a folder named '{}' already exists at the destination",
                folder.name
            )));
        }

        let moved = self.folders().move_to(id, destination.as_ref()).await?;
        info!(folder_id = id, path = %moved.path, "Folder moved");
        Ok(moved)
    }

    /// Copy the blobs of `files`, returning old name -> new name.
    ///
    /// On failure the copies made so far are removed again.
    async fn copy_blobs(&self, files: &[StoredFile]) -> Result<HashMap<String, String>> {
        let mut copies = HashMap::new();
        for file in files {
            match self.storage.copy(&file.stored_name).await {
                Ok(copy) => {
                    copies.insert(file.stored_name.clone(), copy);
                }
                Err(e) => {
                    self.storage.delete_all(copies.values()).await;
                    return Err(e);
                }
            }
        }
        Ok(copies)
    }

    /// Deep-copy a folder under `destination`, or to the root level.
    pub async fn copy(&self, actor: &Actor, id: i64, destination: Option<i64>) -> Result<Folder> {
        let source = self.manageable(actor, id).await?;
        let dest = self.destination(actor, destination).await?;

        if let Some(ref d) = dest {
            if self.folders().is_within(d.id, id).await? {
                return Err(CabinetError::Validation(
                    "a folder cannot be copied into itself or one of its subfolders".to_string(),
                ));
            }
        }

        let taken = self.folders().child_names(destination).await?;
        let name = copy_name(&source.name, &taken);

        let files = self.files().list_in_subtree(id).await?;
        let blobs = self.copy_blobs(&files).await?;

        match self
            .folders()
            .copy_tree(&source, dest.as_ref(), &name, Some(actor.user_id), &blobs)
            .await
        {
            Ok(copy) => {
                info!(source_id = id, folder_id = copy.id, path = %copy.path, "Folder copied");
                Ok(copy)
            }
            Err(e) => {
                self.storage.delete_all(blobs.values()).await;
                Err(e)
            }
        }
    }

    /// Delete a folder with everything below it.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let folder = self.manageable(actor, id).await?;
        self.remove(&folder).await
    }

    async fn remove(&self, folder: &Folder) -> Result<()> {
        let blobs: Vec<String> = self
            .files()
            .list_in_subtree(folder.id)
            .await?
            .into_iter()
            .map(|f| f.stored_name)
            .collect();
        self.folders().delete(folder.id).await?;
        self.storage.delete_all(&blobs).await;
        info!(folder_id = folder.id, path = %folder.path, files = blobs.len(), "Folder deleted");
        Ok(())
    }

    /// Delete several folders.
    ///
    /// Every folder is checked before anything is deleted. Unless
    /// `delete_contents` is set, each one must be empty.
    pub async fn batch_delete(
        &self,
        actor: &Actor,
        ids: &[i64],
        delete_contents: bool,
    ) -> Result<usize> {
        if ids.is_empty() {
            return Err(CabinetError::Validation("no folders given".to_string()));
        }

        let mut targets = Vec::new();
        for &id in ids {
            let folder = self.manageable(actor, id).await?;
            if !delete_contents && !self.folders().is_empty(id).await? {
                return Err(CabinetError::Validation(format!(
                    "folder '{}' is not empty",
                    folder.name
                )));
            }
            targets.push(folder);
        }

        let listed: HashSet<i64> = ids.iter().copied().collect();
        let mut deleted = 0;
        for folder in &targets {
            let nested = self
                .folders()
                .ancestors(folder.id)
                .await?
                .iter()
                .any(|a| a.id != folder.id && listed.contains(&a.id));
            // Gone already if an ancestor was processed first.
            if nested || self.folders().get_by_id(folder.id).await?.is_none() {
                continue;
            }
            self.remove(folder).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Replace the contents of `target` with a copy of the contents of `source`.
    pub async fn replace_contents(
        &self,
        actor: &Actor,
        target_id: i64,
        source_id: i64,
    ) -> Result<Folder> {
        if target_id == source_id {
            return Err(CabinetError::Validation(
                "a folder cannot replace itself".to_string(),
            ));
        }
        let target = self.manageable(actor, target_id).await?;
        let source = self.manageable(actor, source_id).await?;

        if self.folders().is_within(target_id, source_id).await?
            || self.folders().is_within(source_id, target_id).await?
        {
            return Err(CabinetError::Validation(
                "source and target must not contain one another".to_string(),
            ));
        }

        let old_blobs: Vec<String> = self
            .files()
            .list_in_subtree(target_id)
            .await?
            .into_iter()
            .map(|f| f.stored_name)
            .collect();
        let source_files = self.files().list_in_subtree(source_id).await?;
        let blobs = self.copy_blobs(&source_files).await?;

        if let Err(e) = self
            .folders()
            .replace_contents(&target, &source, Some(actor.user_id), &blobs)
            .await
        {
            self.storage.delete_all(blobs.values()).await;
            return Err(e);
        }
        self.storage.delete_all(&old_blobs).await;

        info!(target_id, source_id, "Folder contents replaced");
        self.get(target_id).await
    }

    /// Grant and revoke access on a folder.
    pub async fn update_permissions(
        &self,
        actor: &Actor,
        folder_id: i64,
        add: &[i64],
        remove: &[i64],
    ) -> Result<()> {
        self.manageable(actor, folder_id).await?;
        let all: Vec<i64> = add.iter().chain(remove).copied().collect();
        self.ensure_users_exist(&all).await?;
        self.folders()
            .update_permissions(folder_id, add, remove)
            .await?;
        info!(folder_id, added = add.len(), removed = remove.len(), "Folder permissions updated");
        Ok(())
    }

    /// Users granted on a folder.
    pub async fn list_users(&self, actor: &Actor, folder_id: i64) -> Result<Vec<FolderUser>> {
        self.manageable(actor, folder_id).await?;
        self.folders().users(folder_id).await
    }

    /// ZIP of a folder and the subfolders the actor can see.
    ///
    /// For non-admins a subfolder is only included when every folder between
    /// it and the root is viewable too, so entry paths never name a hidden
    /// folder.
    pub async fn download_zip(&self, actor: &Actor, id: i64) -> Result<(Folder, Vec<u8>)> {
        let root = self.viewable(actor, id).await?;
        // Ordered by depth, so parents are seen before their children.
        let mut folders = self.folders().subtree(id).await?;
        if !actor.is_admin() {
            let granted: HashSet<i64> = self
                .folders()
                .granted_ids(actor.user_id)
                .await?
                .into_iter()
                .collect();
            let mut included = HashSet::from([id]);
            folders.retain(|f| {
                let keep = f.id == id
                    || (granted.contains(&f.id)
                        && f.parent_id.is_some_and(|p| included.contains(&p)));
                if keep {
                    included.insert(f.id);
                }
                keep
            });
        }
        let files = self.files().list_in_subtree(id).await?;
        let bytes = build_zip(&root, &folders, &files, self.storage).await?;
        Ok((root, bytes))
    }

    /// Tree of publicly reachable folders with their public files.
    pub async fn public_tree(&self) -> Result<Vec<FolderNode>> {
        let folders = self.folders().list_public().await?;
        let mut files = Vec::new();
        for folder in &folders {
            let query = FileQuery {
                public_only: true,
                ..Default::default()
            };
            files.extend(self.files().query(folder.id, &query).await?.0);
        }
        Ok(build_forest(folders, group_files(files)))
    }

    /// Load a publicly reachable folder; anything else is `NotFound`.
    pub async fn public_folder(&self, id: i64) -> Result<Folder> {
        if !self.folders().is_publicly_reachable(id).await? {
            return Err(CabinetError::NotFound("folder".to_string()));
        }
        self.get(id).await
    }

    /// ZIP of the public part of a publicly reachable folder.
    pub async fn public_zip(&self, id: i64) -> Result<(Folder, Vec<u8>)> {
        let root = self.public_folder(id).await?;
        let reachable: HashSet<i64> = self
            .folders()
            .list_public()
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();

        let mut folders = self.folders().subtree(id).await?;
        folders.retain(|f| reachable.contains(&f.id));
        let files: Vec<StoredFile> = self
            .files()
            .list_in_subtree(id)
            .await?
            .into_iter()
            .filter(|f| f.is_public)
            .collect();

        let bytes = build_zip(&root, &folders, &files, self.storage).await?;
        Ok((root, bytes))
    }

    /// IDs of the folders a user is granted on.
    pub async fn granted_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.folders().granted_ids(user_id).await
    }

    /// Total number of folders.
    pub async fn count(&self) -> Result<i64> {
        self.folders().count().await
    }
}
