//! Response DTOs for Web API.
//!
//! These types also derive `Deserialize` so the client can decode them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::db::{Role, User};
use crate::file::{format_size, Folder, FolderDetail, FolderNode, FolderUser, StoredFile};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
}

/// Plain confirmation message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth / Users
// ============================================================================

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    pub user: UserInfo,
}

/// Token refresh response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    /// New access token.
    pub access_token: String,
    /// New refresh token. The old one is revoked.
    pub refresh_token: String,
    /// Expiry in seconds.
    pub expires_in: u64,
}

/// User information in responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[schema(value_type = String, example = "manager")]
    pub role: Role,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            created_at: to_rfc3339(&user.created_at),
            last_login: user.last_login.as_deref().map(to_rfc3339),
        }
    }
}

/// Current user response (for /api/auth/me).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserInfo,
    /// Folders the user holds a grant on.
    pub folder_ids: Vec<i64>,
}

// ============================================================================
// Folders
// ============================================================================

/// Folder response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FolderResponse {
    pub id: i64,
    pub name: String,
    /// Full path, e.g. `/Docs/2024`.
    pub path: String,
    pub parent_id: Option<i64>,
    pub is_public: bool,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Folder> for FolderResponse {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            path: folder.path,
            parent_id: folder.parent_id,
            is_public: folder.is_public,
            created_by: folder.created_by,
            created_at: to_rfc3339(&folder.created_at),
            updated_at: to_rfc3339(&folder.updated_at),
        }
    }
}

/// A folder with its files and subfolders, recursively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FolderTreeResponse {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
    pub is_public: bool,
    #[serde(default)]
    pub files: Vec<FileResponse>,
    #[serde(default)]
    pub children: Vec<FolderTreeResponse>,
}

impl From<FolderNode> for FolderTreeResponse {
    fn from(node: FolderNode) -> Self {
        Self {
            id: node.folder.id,
            name: node.folder.name,
            path: node.folder.path,
            parent_id: node.folder.parent_id,
            is_public: node.folder.is_public,
            files: node.files.into_iter().map(FileResponse::from).collect(),
            children: node.children.into_iter().map(Self::from).collect(),
        }
    }
}

/// Folder detail view: the folder, its breadcrumb and contents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FolderDetailResponse {
    pub folder: FolderResponse,
    /// Root first, ending with the folder itself.
    pub breadcrumb: Vec<FolderResponse>,
    pub subfolders: Vec<FolderResponse>,
    pub files: Vec<FileResponse>,
}

impl From<FolderDetail> for FolderDetailResponse {
    fn from(detail: FolderDetail) -> Self {
        Self {
            folder: detail.folder.into(),
            breadcrumb: detail.breadcrumb.into_iter().map(Into::into).collect(),
            subfolders: detail.subfolders.into_iter().map(Into::into).collect(),
            files: detail.files.into_iter().map(Into::into).collect(),
        }
    }
}

/// A user granted on a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FolderUserResponse {
    pub id: i64,
    pub username: String,
}

impl From<FolderUser> for FolderUserResponse {
    fn from(user: FolderUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// Result of a batch folder delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchDeleteResponse {
    /// Folders actually removed (nested ones are removed with their parent).
    pub deleted: usize,
}

// ============================================================================
// Files
// ============================================================================

/// File metadata response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub id: i64,
    pub folder_id: i64,
    pub name: String,
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Human-readable size, e.g. `1.5 MB`.
    pub size_label: String,
    pub is_public: bool,
    /// Download URL.
    pub url: String,
    pub created_by: Option<i64>,
    /// Upload time.
    pub created_at: String,
    /// Last modification time.
    pub updated_at: String,
}

impl From<StoredFile> for FileResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            url: file.url(),
            size_label: format_size(file.size.max(0) as u64),
            id: file.id,
            folder_id: file.folder_id,
            name: file.name,
            mime_type: file.mime_type,
            size: file.size,
            is_public: file.is_public,
            created_by: file.created_by,
            created_at: to_rfc3339(&file.created_at),
            updated_at: to_rfc3339(&file.updated_at),
        }
    }
}

/// Files removed by a folder-level delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedFilesResponse {
    pub deleted: Vec<i64>,
}
