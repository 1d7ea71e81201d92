//! Request DTOs for Web API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::db::Role;
use crate::file::{normalize_extension, FileQuery, FileSort, SortDirection};
use crate::web::dto::validation::{no_control_chars, not_empty_trimmed};

/// Largest page size a client may ask for.
pub const MAX_PER_PAGE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Pagination query parameters.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (at most 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    /// Clamp page and page size into their allowed ranges.
    pub fn normalized(&self) -> (u32, u32) {
        (self.page.max(1), self.per_page.clamp(1, MAX_PER_PAGE))
    }

    /// SQL offset and limit for this page.
    pub fn to_offset_limit(&self) -> (i64, i64) {
        let (page, per_page) = self.normalized();
        (((page - 1) * per_page) as i64, per_page as i64)
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Logout request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to invalidate.
    pub refresh_token: String,
}

/// Token refresh request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

// ============================================================================
// Users
// ============================================================================

/// Create user request (admin).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 64, message = "Username must be 3 to 64 characters"),
        custom(function = "no_control_chars")
    )]
    pub username: String,
    pub password: String,
    #[serde(default)]
    #[schema(value_type = String, example = "basic")]
    pub role: Role,
}

/// Update user request (admin). Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 3, max = 64, message = "Username must be 3 to 64 characters"),
        custom(function = "no_control_chars")
    )]
    pub username: Option<String>,
    /// Changed only when present and non-empty.
    pub password: Option<String>,
    #[schema(value_type = Option<String>)]
    pub role: Option<Role>,
}

/// User list query.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Case-insensitive username substring.
    pub username: Option<String>,
}

impl UserListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

// ============================================================================
// Folders
// ============================================================================

/// Create folder request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFolderRequest {
    #[validate(
        length(max = 255, message = "Folder name is too long"),
        custom(function = "not_empty_trimmed")
    )]
    pub name: String,
    /// Parent folder, or root when absent.
    pub parent_id: Option<i64>,
    /// Users granted access to the new folder.
    #[serde(default)]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial folder update.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFolderRequest {
    #[validate(length(min = 1, max = 255, message = "Folder name must be 1 to 255 characters"))]
    pub name: Option<String>,
    pub is_public: Option<bool>,
}

/// Rename request, shared by folders and files.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenameRequest {
    #[validate(custom(function = "not_empty_trimmed"))]
    pub name: String,
}

/// Move a folder. A null parent moves it to the root.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveFolderRequest {
    pub parent_id: Option<i64>,
}

/// Copy a folder. A null destination copies it to the root.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CopyFolderRequest {
    pub destination_id: Option<i64>,
}

/// Delete several folders at once.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchDeleteRequest {
    #[validate(length(min = 1, message = "No folders selected"))]
    pub ids: Vec<i64>,
    /// Delete non-empty folders together with everything inside.
    #[serde(default)]
    pub delete_contents: bool,
}

/// Replace a folder's contents with a copy of another folder's.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceContentsRequest {
    pub source_id: i64,
}

/// Grant and revoke folder access.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PermissionsRequest {
    #[serde(default)]
    pub add: Vec<i64>,
    #[serde(default)]
    pub remove: Vec<i64>,
}

/// Options for the folder tree.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TreeQuery {
    /// Include each folder's files.
    #[serde(default)]
    pub files: bool,
}

/// File filter of the folder detail view.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FolderDetailQuery {
    /// Extension filter, leading dot optional.
    pub extension: Option<String>,
    /// Name substring.
    pub name: Option<String>,
    #[param(value_type = Option<String>)]
    pub sort: Option<FileSort>,
    #[param(value_type = Option<String>)]
    pub direction: Option<SortDirection>,
}

impl FolderDetailQuery {
    pub fn to_file_query(&self) -> FileQuery {
        FileQuery {
            extension: self.extension.as_deref().and_then(normalize_extension),
            name: self.name.clone().filter(|n| !n.trim().is_empty()),
            sort: self.sort.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
            ..FileQuery::default()
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// File list query.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[param(value_type = Option<String>)]
    pub sort: Option<FileSort>,
    #[param(value_type = Option<String>)]
    pub direction: Option<SortDirection>,
    pub extension: Option<String>,
}

impl FileListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn to_file_query(&self) -> FileQuery {
        let (offset, limit) = self.pagination().to_offset_limit();
        FileQuery {
            extension: self.extension.as_deref().and_then(normalize_extension),
            sort: self.sort.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
            limit: Some(limit),
            offset,
            ..FileQuery::default()
        }
    }
}

/// Move or copy a file into another folder.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FileDestinationRequest {
    pub folder_id: i64,
}

/// Change a file's public flag.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

/// Delete files of a folder. Absent or empty ids delete all of them.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteFilesRequest {
    pub ids: Option<Vec<i64>>,
}

// ============================================================================
// Stats
// ============================================================================

/// Statistics date range, `YYYY-MM-DD`, inclusive.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    #[param(value_type = Option<String>, example = "2024-01-01")]
    pub from: Option<chrono::NaiveDate>,
    #[param(value_type = Option<String>, example = "2024-12-31")]
    pub to: Option<chrono::NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset_limit() {
        let q = PaginationQuery { page: 3, per_page: 10 };
        assert_eq!(q.to_offset_limit(), (20, 10));

        let q = PaginationQuery { page: 0, per_page: 500 };
        assert_eq!(q.to_offset_limit(), (0, 100));

        let q = PaginationQuery { page: 1, per_page: 0 };
        assert_eq!(q.to_offset_limit(), (0, 1));
    }

    #[test]
    fn test_pagination_defaults() {
        let q: PaginationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.per_page, 20);
    }

    #[test]
    fn test_file_list_query_conversion() {
        let q: FileListQuery = serde_json::from_str(
            r#"{"page": 2, "per_page": 5, "sort": "size", "direction": "desc", "extension": ".PDF"}"#,
        )
        .unwrap();
        let fq = q.to_file_query();
        assert_eq!(fq.extension.as_deref(), Some("pdf"));
        assert_eq!(fq.sort, FileSort::Size);
        assert_eq!(fq.direction, SortDirection::Desc);
        assert_eq!(fq.limit, Some(5));
        assert_eq!(fq.offset, 5);
    }

    #[test]
    fn test_create_folder_validation() {
        let req = CreateFolderRequest {
            name: "   ".to_string(),
            parent_id: None,
            user_ids: vec![],
            is_public: false,
        };
        assert!(req.validate().is_err());

        let req = CreateFolderRequest {
            name: "Reports".to_string(),
            parent_id: Some(1),
            user_ids: vec![2],
            is_public: true,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_user_role_defaults_to_basic() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username": "alice", "password": "password1"}"#).unwrap();
        assert_eq!(req.role, Role::Basic);
    }

    #[test]
    fn test_batch_delete_requires_ids() {
        let req = BatchDeleteRequest {
            ids: vec![],
            delete_contents: true,
        };
        assert!(req.validate().is_err());
    }
}
