//! OpenAPI document.

use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::stats::{DailyCount, RankedEntry, Statistics};
use crate::web::dto::{
    BatchDeleteRequest, BatchDeleteResponse, CopyFolderRequest, CreateFolderRequest,
    CreateUserRequest, DeleteFilesRequest, DeletedFilesResponse, FileDestinationRequest,
    FileResponse, FolderDetailResponse, FolderResponse, FolderTreeResponse, FolderUserResponse,
    LoginRequest, LoginResponse, LogoutRequest, MeResponse, MessageResponse, MoveFolderRequest,
    PaginationMeta, PermissionsRequest, RefreshRequest, RefreshResponse, RenameRequest,
    ReplaceContentsRequest, UpdateFolderRequest, UpdateUserRequest, UserInfo, VisibilityRequest,
};
use crate::web::error::{ErrorBody, ErrorCode, ErrorDetail};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "cabinet", description = "Folder and file cabinet API"),
    paths(
        super::auth::login,
        super::auth::logout,
        super::auth::refresh,
        super::auth::me,
        super::user::list_users,
        super::user::create_user,
        super::user::get_user,
        super::user::update_user,
        super::user::delete_user,
        super::folder::create_folder,
        super::folder::list_root_folders,
        super::folder::folder_tree,
        super::folder::accessible_folders,
        super::folder::get_folder,
        super::folder::update_folder,
        super::folder::delete_folder,
        super::folder::batch_delete_folders,
        super::folder::rename_folder,
        super::folder::move_folder,
        super::folder::copy_folder,
        super::folder::replace_folder_contents,
        super::folder::folder_users,
        super::folder::update_folder_permissions,
        super::folder::download_folder,
        super::file::list_files,
        super::file::upload_files,
        super::file::delete_folder_files,
        super::file::get_file,
        super::file::download_file,
        super::file::rename_file,
        super::file::move_file,
        super::file::copy_file,
        super::file::replace_file,
        super::file::set_file_visibility,
        super::file::delete_file,
        super::public::public_tree,
        super::public::public_folder_files,
        super::public::public_download_file,
        super::public::public_download_folder,
        super::stats::get_stats,
    ),
    components(schemas(
        LoginRequest, LogoutRequest, RefreshRequest, LoginResponse, RefreshResponse,
        UserInfo, MeResponse, CreateUserRequest, UpdateUserRequest,
        CreateFolderRequest, UpdateFolderRequest, RenameRequest, MoveFolderRequest,
        CopyFolderRequest, BatchDeleteRequest, ReplaceContentsRequest, PermissionsRequest,
        FolderResponse, FolderTreeResponse, FolderDetailResponse, FolderUserResponse,
        BatchDeleteResponse, FileDestinationRequest, VisibilityRequest, DeleteFilesRequest,
        FileResponse, DeletedFilesResponse, MessageResponse, PaginationMeta,
        Statistics, DailyCount, RankedEntry, ErrorBody, ErrorDetail, ErrorCode,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and tokens"),
        (name = "users", description = "User administration"),
        (name = "folders", description = "Folder hierarchy and permissions"),
        (name = "files", description = "File upload, download and management"),
        (name = "public", description = "Unauthenticated read-only access"),
        (name = "stats", description = "Dashboard statistics"),
    )
)]
pub struct ApiDoc;

/// GET /api/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
