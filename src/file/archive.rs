//! ZIP archives of folder subtrees.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::folder::Folder;
use super::metadata::StoredFile;
use super::storage::FileStorage;
use crate::{CabinetError, Result};

/// Directory of `folder` inside an archive rooted at `root`, with a trailing `/`.
///
/// The root itself maps to the empty string.
fn relative_dir(root: &Folder, folder: &Folder) -> Option<String> {
    if folder.id == root.id {
        return Some(String::new());
    }
    folder
        .path
        .strip_prefix(&root.path)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| format!("{rest}/"))
}

/// Build a ZIP of `root` from its subtree.
///
/// `folders` must contain `root` and may contain any of its descendants;
/// `files` are placed by their folder. Every folder gets a directory entry
/// so empty ones survive extraction. Files whose blob is missing are
/// skipped with a warning.
pub async fn build_zip(
    root: &Folder,
    folders: &[Folder],
    files: &[StoredFile],
    storage: &FileStorage,
) -> Result<Vec<u8>> {
    let dirs: HashMap<i64, String> = folders
        .iter()
        .filter_map(|f| relative_dir(root, f).map(|dir| (f.id, dir)))
        .collect();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let mut dir_names: Vec<&String> = dirs.values().filter(|d| !d.is_empty()).collect();
    dir_names.sort();
    for dir in dir_names {
        zip.add_directory(dir.as_str(), options)?;
    }

    for file in files {
        let Some(dir) = dirs.get(&file.folder_id) else {
            continue;
        };
        let content = match storage.load(&file.stored_name).await {
            Ok(content) => content,
            Err(CabinetError::NotFound(_)) => {
                warn!(file_id = file.id, stored_name = %file.stored_name, "Blob missing, left out of archive");
                continue;
            }
            Err(e) => return Err(e),
        };
        zip.start_file(format!("{dir}{}", file.name), options)?;
        zip.write_all(&content)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// `Docs` -> `Docs.zip`.
pub fn archive_name(folder: &Folder) -> String {
    format!("{}.zip", folder.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn folder(id: i64, path: &str, parent_id: Option<i64>) -> Folder {
        Folder {
            id,
            name: path.rsplit('/').next().unwrap().to_string(),
            path: path.to_string(),
            parent_id,
            created_by: None,
            is_public: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    async fn stored(storage: &FileStorage, id: i64, folder_id: i64, name: &str, body: &[u8]) -> StoredFile {
        StoredFile {
            id,
            folder_id,
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            size: body.len() as i64,
            stored_name: storage.save(body, name).await.unwrap(),
            created_by: None,
            is_public: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_relative_dir() {
        let root = folder(1, "/Docs", None);
        assert_eq!(relative_dir(&root, &root).unwrap(), "");
        assert_eq!(
            relative_dir(&root, &folder(2, "/Docs/2024/Q1", Some(3))).unwrap(),
            "2024/Q1/"
        );
        assert!(relative_dir(&root, &folder(4, "/Docs_old", None)).is_none());
    }

    #[tokio::test]
    async fn test_build_zip_layout() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path()).unwrap();

        let root = folder(1, "/Docs", None);
        let sub = folder(2, "/Docs/sub", Some(1));
        let empty = folder(3, "/Docs/sub/empty", Some(2));
        let files = vec![
            stored(&storage, 10, 1, "top.txt", b"top").await,
            stored(&storage, 11, 2, "inner.txt", b"inner").await,
        ];

        let bytes = build_zip(&root, &[root.clone(), sub, empty], &files, &storage)
            .await
            .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec!["sub/", "sub/empty/", "sub/inner.txt", "top.txt"]);

        let mut body = String::new();
        archive
            .by_name("sub/inner.txt")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "inner");
    }

    #[tokio::test]
    async fn test_missing_blob_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path()).unwrap();
        let root = folder(1, "/Docs", None);
        let file = stored(&storage, 10, 1, "gone.txt", b"x").await;
        storage.delete(&file.stored_name).await.unwrap();

        let bytes = build_zip(&root, &[root.clone()], &[file], &storage).await.unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name(&folder(1, "/Q1 Reports", None)), "Q1 Reports.zip");
    }
}
