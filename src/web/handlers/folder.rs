//! Folder handlers for Web API.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::file::{archive_name, FolderUpdate};
use crate::web::dto::{
    ApiResponse, BatchDeleteRequest, BatchDeleteResponse, CopyFolderRequest, CreateFolderRequest,
    FolderDetailQuery, FolderDetailResponse, FolderResponse, FolderTreeResponse,
    FolderUserResponse, MessageResponse, MoveFolderRequest, PermissionsRequest, RenameRequest,
    ReplaceContentsRequest, TreeQuery, UpdateFolderRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::file::attachment;
use crate::web::handlers::AppState;
use crate::web::middleware::CurrentUser;

/// POST /api/folders - Create a folder.
#[utoipa::path(
    post,
    path = "/api/folders",
    tag = "folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = FolderResponse),
        (status = 403, description = "Not allowed to create here"),
        (status = 409, description = "Name already used in the parent"),
        (status = 422, description = "Invalid name or unknown users")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let folder = state
        .folders()
        .create(&user.actor(), &req.name, req.parent_id, &req.user_ids, req.is_public)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(folder.into()))))
}

/// GET /api/folders - Root folders visible to the user.
#[utoipa::path(
    get,
    path = "/api/folders",
    tag = "folders",
    responses(
        (status = 200, description = "Root folders", body = Vec<FolderResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_root_folders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let folders = state.folders().list_roots(&user.actor()).await?;
    Ok(Json(ApiResponse::new(
        folders.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/folders/tree - Folder tree visible to the user.
#[utoipa::path(
    get,
    path = "/api/folders/tree",
    tag = "folders",
    params(TreeQuery),
    responses((status = 200, description = "Folder forest", body = Vec<FolderTreeResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn folder_tree(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<TreeQuery>,
) -> Result<Json<ApiResponse<Vec<FolderTreeResponse>>>, ApiError> {
    let forest = state.folders().tree(&user.actor(), query.files).await?;
    Ok(Json(ApiResponse::new(
        forest.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/folders/accessible - Every folder the user can view, flat.
#[utoipa::path(
    get,
    path = "/api/folders/accessible",
    tag = "folders",
    responses((status = 200, description = "Viewable folders", body = Vec<FolderResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn accessible_folders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<FolderResponse>>>, ApiError> {
    let folders = state.folders().list_accessible(&user.actor()).await?;
    Ok(Json(ApiResponse::new(
        folders.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/folders/:id - Folder with breadcrumb, subfolders and files.
#[utoipa::path(
    get,
    path = "/api/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID"), FolderDetailQuery),
    responses(
        (status = 200, description = "Folder detail", body = FolderDetailResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Query(query): Query<FolderDetailQuery>,
) -> Result<Json<ApiResponse<FolderDetailResponse>>, ApiError> {
    let detail = state
        .folders()
        .detail(&user.actor(), folder_id, &query.to_file_query())
        .await?;
    Ok(Json(ApiResponse::new(detail.into())))
}

/// PATCH /api/folders/:id - Change name and/or public flag.
#[utoipa::path(
    patch,
    path = "/api/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = UpdateFolderRequest,
    responses(
        (status = 200, description = "Updated folder", body = FolderResponse),
        (status = 409, description = "Name already used in the parent")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFolderRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let mut update = FolderUpdate::new();
    if let Some(name) = req.name {
        update = update.name(name);
    }
    if let Some(is_public) = req.is_public {
        update = update.is_public(is_public);
    }

    let folder = state
        .folders()
        .update(&user.actor(), folder_id, &update)
        .await?;
    Ok(Json(ApiResponse::new(folder.into())))
}

/// DELETE /api/folders/:id - Delete a folder and everything below it.
#[utoipa::path(
    delete,
    path = "/api/folders/{id}",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.folders().delete(&user.actor(), folder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/folders/batch-delete - Delete several folders.
#[utoipa::path(
    post,
    path = "/api/folders/batch-delete",
    tag = "folders",
    request_body = BatchDeleteRequest,
    responses(
        (status = 200, description = "Folders deleted", body = BatchDeleteResponse),
        (status = 422, description = "A folder is not empty")
    ),
    security(("bearer_auth" = []))
)]
pub async fn batch_delete_folders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(req): ValidatedJson<BatchDeleteRequest>,
) -> Result<Json<ApiResponse<BatchDeleteResponse>>, ApiError> {
    let deleted = state
        .folders()
        .batch_delete(&user.actor(), &req.ids, req.delete_contents)
        .await?;
    Ok(Json(ApiResponse::new(BatchDeleteResponse { deleted })))
}

/// PUT /api/folders/:id/rename - Rename a folder.
#[utoipa::path(
    put,
    path = "/api/folders/{id}/rename",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Renamed folder", body = FolderResponse),
        (status = 409, description = "Name already used in the parent")
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let folder = state
        .folders()
        .rename(&user.actor(), folder_id, &req.name)
        .await?;
    Ok(Json(ApiResponse::new(folder.into())))
}

/// PUT /api/folders/:id/move - Move a folder.
#[utoipa::path(
    put,
    path = "/api/folders/{id}/move",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = MoveFolderRequest,
    responses(
        (status = 200, description = "Moved folder", body = FolderResponse),
        (status = 409, description = "Name already used in the destination"),
        (status = 422, description = "Destination is inside the folder")
    ),
    security(("bearer_auth" = []))
)]
pub async fn move_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Json(req): Json<MoveFolderRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let folder = state
        .folders()
        .move_folder(&user.actor(), folder_id, req.parent_id)
        .await?;
    Ok(Json(ApiResponse::new(folder.into())))
}

/// POST /api/folders/:id/copy - Deep-copy a folder.
#[utoipa::path(
    post,
    path = "/api/folders/{id}/copy",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = CopyFolderRequest,
    responses(
        (status = 201, description = "Root of the copy", body = FolderResponse),
        (status = 422, description = "Destination is inside the folder")
    ),
    security(("bearer_auth" = []))
)]
pub async fn copy_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Json(req): Json<CopyFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FolderResponse>>), ApiError> {
    let copy = state
        .folders()
        .copy(&user.actor(), folder_id, req.destination_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(copy.into()))))
}

/// PUT /api/folders/:id/replace - Replace contents with a copy of another folder's.
#[utoipa::path(
    put,
    path = "/api/folders/{id}/replace",
    tag = "folders",
    params(("id" = i64, Path, description = "Target folder ID")),
    request_body = ReplaceContentsRequest,
    responses(
        (status = 200, description = "Target folder", body = FolderResponse),
        (status = 422, description = "Source and target overlap")
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_folder_contents(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Json(req): Json<ReplaceContentsRequest>,
) -> Result<Json<ApiResponse<FolderResponse>>, ApiError> {
    let folder = state
        .folders()
        .replace_contents(&user.actor(), folder_id, req.source_id)
        .await?;
    Ok(Json(ApiResponse::new(folder.into())))
}

/// GET /api/folders/:id/users - Users granted on a folder.
#[utoipa::path(
    get,
    path = "/api/folders/{id}/users",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    responses((status = 200, description = "Granted users", body = Vec<FolderUserResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn folder_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FolderUserResponse>>>, ApiError> {
    let users = state.folders().list_users(&user.actor(), folder_id).await?;
    Ok(Json(ApiResponse::new(
        users.into_iter().map(Into::into).collect(),
    )))
}

/// PUT /api/folders/:id/permissions - Grant and revoke access.
#[utoipa::path(
    put,
    path = "/api/folders/{id}/permissions",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body = PermissionsRequest,
    responses(
        (status = 200, description = "Permissions updated", body = MessageResponse),
        (status = 422, description = "Unknown user ids")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_folder_permissions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Json(req): Json<PermissionsRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .folders()
        .update_permissions(&user.actor(), folder_id, &req.add, &req.remove)
        .await?;
    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Permissions updated",
    ))))
}

/// GET /api/folders/:id/download - ZIP of a folder.
#[utoipa::path(
    get,
    path = "/api/folders/{id}/download",
    tag = "folders",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let (folder, bytes) = state.folders().download_zip(&user.actor(), folder_id).await?;
    attachment(&archive_name(&folder), "application/zip", bytes)
}
