//! File handlers for Web API.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::file::{DownloadResult, UploadRequest};
use crate::web::dto::{
    ApiResponse, DeleteFilesRequest, DeletedFilesResponse, FileDestinationRequest, FileListQuery,
    FileResponse, PaginatedResponse, RenameRequest, ValidatedJson, VisibilityRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::CurrentUser;

/// Generate a safe Content-Disposition header value for downloads.
///
/// Control characters are dropped (no header injection), quotes and
/// backslashes are replaced in the plain `filename`, and non-ASCII names
/// also get an RFC 5987 `filename*` parameter.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = !filename.is_ascii()
        || filename
            .chars()
            .any(|c| c.is_control() || c == '"' || c == '\\');
    if !needs_encoding {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// Binary attachment response.
pub(crate) fn attachment(
    filename: &str,
    content_type: &str,
    content: Vec<u8>,
) -> Result<Response<Body>, ApiError> {
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition_header(filename))
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

pub(crate) fn file_attachment(download: DownloadResult) -> Result<Response<Body>, ApiError> {
    attachment(
        &download.file.name,
        &download.file.mime_type,
        download.content,
    )
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::unprocessable("Upload exceeds the request size limit");
    }
    tracing::warn!("Failed to read multipart data: {}", e);
    ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
}

/// Read `file` parts (any number) and an optional `is_public` flag.
///
/// A part larger than `max_size` bytes is rejected as soon as it crosses
/// the limit.
async fn read_upload_form(
    mut multipart: Multipart,
    max_size: u64,
) -> Result<Vec<UploadRequest>, ApiError> {
    let mut uploads = Vec::new();
    let mut is_public = false;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" | "files" => {
                let name = field.file_name().unwrap_or("").to_string();
                let mime = field
                    .content_type()
                    .filter(|m| *m != "application/octet-stream")
                    .map(str::to_string);

                let mut content = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if (content.len() + chunk.len()) as u64 > max_size {
                        return Err(ApiError::unprocessable(format!(
                            "'{}' exceeds the upload limit of {} bytes",
                            name, max_size
                        )));
                    }
                    content.extend_from_slice(&chunk);
                }

                let mut request = UploadRequest::new(name, content);
                if let Some(mime) = mime {
                    request = request.with_mime_type(mime);
                }
                uploads.push(request);
            }
            "is_public" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid is_public value"))?;
                is_public = truthy(&value);
            }
            _ => {}
        }
    }

    Ok(uploads
        .into_iter()
        .map(|u| u.with_public(is_public))
        .collect())
}

/// GET /api/folders/:id/files - List a folder's files.
#[utoipa::path(
    get,
    path = "/api/folders/{id}/files",
    tag = "files",
    params(("id" = i64, Path, description = "Folder ID"), FileListQuery),
    responses(
        (status = 200, description = "A page of files", body = Vec<FileResponse>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Folder not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>, ApiError> {
    let (page, per_page) = query.pagination().normalized();
    let (files, total) = state
        .files()
        .list(&user.actor(), folder_id, &query.to_file_query())
        .await?;

    Ok(Json(PaginatedResponse::new(
        files.into_iter().map(Into::into).collect(),
        page,
        per_page,
        total as u64,
    )))
}

/// POST /api/folders/:id/files - Upload one or more files.
///
/// Request body: multipart/form-data with one or more `file` parts and an
/// optional `is_public` field.
#[utoipa::path(
    post,
    path = "/api/folders/{id}/files",
    tag = "files",
    params(("id" = i64, Path, description = "Folder ID")),
    responses(
        (status = 201, description = "Files uploaded", body = Vec<FileResponse>),
        (status = 403, description = "Not allowed to upload here"),
        (status = 404, description = "Folder not found"),
        (status = 422, description = "Empty or oversized upload")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<FileResponse>>>), ApiError> {
    let uploads = read_upload_form(multipart, state.max_upload_size).await?;
    let files = state
        .files()
        .upload_many(&user.actor(), folder_id, uploads)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(files.into_iter().map(Into::into).collect())),
    ))
}

/// DELETE /api/folders/:id/files - Delete some or all files of a folder.
#[utoipa::path(
    delete,
    path = "/api/folders/{id}/files",
    tag = "files",
    params(("id" = i64, Path, description = "Folder ID")),
    request_body(content = DeleteFilesRequest, description = "Omit to delete every file"),
    responses((status = 200, description = "Deleted file IDs", body = DeletedFilesResponse)),
    security(("bearer_auth" = []))
)]
pub async fn delete_folder_files(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(folder_id): Path<i64>,
    body: Option<Json<DeleteFilesRequest>>,
) -> Result<Json<ApiResponse<DeletedFilesResponse>>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let deleted = state
        .files()
        .delete_in_folder(&user.actor(), folder_id, req.ids.as_deref())
        .await?;

    Ok(Json(ApiResponse::new(DeletedFilesResponse {
        deleted: deleted.into_iter().map(|f| f.id).collect(),
    })))
}

/// GET /api/files/:id - Get file metadata.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.files().metadata(&user.actor(), file_id).await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// GET /api/files/:id/download - Download a file.
#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files().download(&user.actor(), file_id).await?;
    file_attachment(download)
}

/// PUT /api/files/:id/rename - Rename a file.
#[utoipa::path(
    put,
    path = "/api/files/{id}/rename",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Renamed file", body = FileResponse),
        (status = 409, description = "Name already used in the folder")
    ),
    security(("bearer_auth" = []))
)]
pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RenameRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state
        .files()
        .rename(&user.actor(), file_id, &req.name)
        .await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// PUT /api/files/:id/move - Move a file to another folder.
#[utoipa::path(
    put,
    path = "/api/files/{id}/move",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = FileDestinationRequest,
    responses(
        (status = 200, description = "Moved file", body = FileResponse),
        (status = 409, description = "Name already used in the destination")
    ),
    security(("bearer_auth" = []))
)]
pub async fn move_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
    Json(req): Json<FileDestinationRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state
        .files()
        .move_file(&user.actor(), file_id, req.folder_id)
        .await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// POST /api/files/:id/copy - Copy a file into a folder.
#[utoipa::path(
    post,
    path = "/api/files/{id}/copy",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = FileDestinationRequest,
    responses((status = 201, description = "The copy", body = FileResponse)),
    security(("bearer_auth" = []))
)]
pub async fn copy_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
    Json(req): Json<FileDestinationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let copy = state
        .files()
        .copy(&user.actor(), file_id, req.folder_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(copy.into()))))
}

/// PUT /api/files/:id/content - Replace a file's content (multipart, one `file` part).
#[utoipa::path(
    put,
    path = "/api/files/{id}/content",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "Updated file", body = FileResponse),
        (status = 422, description = "Missing, empty or oversized content")
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let upload = read_upload_form(multipart, state.max_upload_size)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::unprocessable("No file was uploaded"))?;

    let file = state
        .files()
        .replace(&user.actor(), file_id, upload)
        .await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// PUT /api/files/:id/visibility - Make a file public or private.
#[utoipa::path(
    put,
    path = "/api/files/{id}/visibility",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = VisibilityRequest,
    responses((status = 200, description = "Updated file", body = FileResponse)),
    security(("bearer_auth" = []))
)]
pub async fn set_file_visibility(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
    Json(req): Json<VisibilityRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state
        .files()
        .set_visibility(&user.actor(), file_id, req.is_public)
        .await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// DELETE /api/files/:id - Delete a file.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.files().delete(&user.actor(), file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
