//! Folders, files and their blobs.
//!
//! Folders form a tree kept in the database with materialized paths. File
//! content lives in a flat sharded blob store; only metadata is in SQLite.

mod archive;
mod file_service;
mod folder;
mod folder_service;
mod metadata;
mod name;
mod storage;
mod tree;

pub use archive::{archive_name, build_zip};
pub use file_service::{DownloadResult, FileService, UploadRequest};
pub use folder::{path_under, Folder, FolderRepository, FolderUpdate, FolderUser, NewFolder};
pub use folder_service::{FolderDetail, FolderService};
pub use metadata::{
    FileQuery, FileRepository, FileSort, FileUpdate, NewFile, SortDirection, StoredFile,
};
pub use name::{
    copy_name, extension, format_size, normalize_extension, sanitize_file_name, unique_name,
    validate_folder_name, MAX_FILE_NAME_LENGTH, MAX_FOLDER_NAME_LENGTH,
};
pub use storage::FileStorage;
pub use tree::{build_forest, find_in_forest, group_files, FolderNode};

/// Upload limit when none is configured (50MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 50 * 1024 * 1024;
