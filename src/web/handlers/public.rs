//! Unauthenticated read-only handlers.
//!
//! Only publicly reachable folders and public files are served. Anything
//! else answers 404 so hidden folders are indistinguishable from missing
//! ones.

use axum::{
    body::Body,
    extract::{Path, State},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::file::archive_name;
use crate::web::dto::{ApiResponse, FileResponse, FolderTreeResponse};
use crate::web::error::ApiError;
use crate::web::handlers::file::{attachment, file_attachment};
use crate::web::handlers::AppState;

/// GET /api/public/folders - Public folder tree with public files.
#[utoipa::path(
    get,
    path = "/api/public/folders",
    tag = "public",
    responses((status = 200, description = "Public folder forest", body = Vec<FolderTreeResponse>))
)]
pub async fn public_tree(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FolderTreeResponse>>>, ApiError> {
    let forest = state.folders().public_tree().await?;
    Ok(Json(ApiResponse::new(
        forest.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/public/folders/:id/files - Public files of a public folder.
#[utoipa::path(
    get,
    path = "/api/public/folders/{id}/files",
    tag = "public",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Public files", body = Vec<FileResponse>),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn public_folder_files(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.files().public_files(folder_id).await?;
    Ok(Json(ApiResponse::new(
        files.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/public/files/:id/download - Download a public file.
#[utoipa::path(
    get,
    path = "/api/public/files/{id}/download",
    tag = "public",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    )
)]
pub async fn public_download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files().public_download(file_id).await?;
    file_attachment(download)
}

/// GET /api/public/folders/:id/download - ZIP of the public part of a folder.
#[utoipa::path(
    get,
    path = "/api/public/folders/{id}/download",
    tag = "public",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn public_download_folder(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let (folder, bytes) = state.folders().public_zip(folder_id).await?;
    attachment(&archive_name(&folder), "application/zip", bytes)
}
