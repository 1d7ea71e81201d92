//! Blob storage on disk.
//!
//! Blobs get UUID-based names and are sharded by the first two characters
//! of that name. The folder hierarchy is not mirrored on disk; it lives in
//! the database only.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::{CabinetError, Result};

/// Sharded blob store.
///
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a FileStorage rooted at `base_path`, creating the directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `content` under a fresh name derived from `original_name`'s extension.
    pub async fn save(&self, content: &[u8], original_name: &str) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name);
        let path = self.path_of(&stored_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        Ok(stored_name)
    }

    /// Read a blob.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        match fs::read(self.path_of(stored_name)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CabinetError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Duplicate a blob under a fresh name and return that name.
    pub async fn copy(&self, stored_name: &str) -> Result<String> {
        let target = Self::generate_stored_name(stored_name);
        let target_path = self.path_of(&target);
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::copy(self.path_of(stored_name), &target_path).await {
            Ok(_) => Ok(target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CabinetError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a blob. Returns false if it did not exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        match fs::remove_file(self.path_of(stored_name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove blobs whose rows are already gone, logging instead of failing.
    pub async fn delete_all<I, S>(&self, stored_names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in stored_names {
            let name = name.as_ref();
            if let Err(e) = self.delete(name).await {
                warn!(stored_name = name, error = %e, "Failed to remove blob");
            }
        }
    }

    /// Whether a blob exists.
    pub async fn exists(&self, stored_name: &str) -> bool {
        fs::try_exists(self.path_of(stored_name))
            .await
            .unwrap_or(false)
    }

    /// Full path of a blob: `{base_path}/{shard}/{stored_name}`.
    pub fn path_of(&self, stored_name: &str) -> PathBuf {
        self.base_path.join(Self::shard(stored_name)).join(stored_name)
    }

    fn shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// A fresh `uuid.ext` name; `bin` when there is no extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let ext = super::name::extension(original_name).unwrap_or_else(|| "bin".to_string());
        format!("{}.{ext}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("blobs")).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_new_creates_directory() {
        let (temp_dir, storage) = setup_storage();
        assert!(temp_dir.path().join("blobs").is_dir());
        assert_eq!(storage.base_path(), temp_dir.path().join("blobs"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_temp_dir, storage) = setup_storage();
        let stored_name = storage.save(b"Hello, World!", "greeting.TXT").await.unwrap();

        assert!(stored_name.ends_with(".txt"));
        assert_eq!(storage.load(&stored_name).await.unwrap(), b"Hello, World!");

        let shard = storage.base_path().join(&stored_name[..2]);
        assert!(shard.is_dir());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let (_temp_dir, storage) = setup_storage();
        let result = storage.load("nope.bin").await;
        assert!(matches!(result, Err(CabinetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_is_independent() {
        let (_temp_dir, storage) = setup_storage();
        let original = storage.save(b"data", "a.pdf").await.unwrap();

        let copy = storage.copy(&original).await.unwrap();
        assert_ne!(copy, original);
        assert!(copy.ends_with(".pdf"));

        storage.delete(&original).await.unwrap();
        assert_eq!(storage.load(&copy).await.unwrap(), b"data");

        assert!(matches!(
            storage.copy(&original).await,
            Err(CabinetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_temp_dir, storage) = setup_storage();
        let stored_name = storage.save(b"x", "x.txt").await.unwrap();

        assert!(storage.exists(&stored_name).await);
        assert!(storage.delete(&stored_name).await.unwrap());
        assert!(!storage.delete(&stored_name).await.unwrap());
        assert!(!storage.exists(&stored_name).await);
    }

    #[tokio::test]
    async fn test_delete_all_ignores_missing() {
        let (_temp_dir, storage) = setup_storage();
        let a = storage.save(b"a", "a.txt").await.unwrap();
        let b = storage.save(b"b", "b.txt").await.unwrap();

        storage
            .delete_all([a.as_str(), "missing.bin", b.as_str()])
            .await;
        assert!(!storage.exists(&a).await);
        assert!(!storage.exists(&b).await);
    }

    #[test]
    fn test_path_of_uses_shard() {
        let (_temp_dir, storage) = setup_storage();
        let name = "ab12cd34-5678-90ab-cdef-123456789012.txt";
        assert_eq!(storage.path_of(name), storage.base_path().join("ab").join(name));
        assert_eq!(FileStorage::shard("x"), "x");
    }

    #[test]
    fn test_generate_stored_name() {
        let a = FileStorage::generate_stored_name("report.PDF");
        let b = FileStorage::generate_stored_name("report.PDF");
        assert_ne!(a, b);
        assert!(a.ends_with(".pdf"));
        assert!(FileStorage::generate_stored_name("Makefile").ends_with(".bin"));
    }
}
