//! HTTP client for the cabinet API.

use reqwest::{multipart, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::db::Role;
use crate::stats::Statistics;
use crate::web::dto::{
    ApiResponse, BatchDeleteResponse, DeletedFilesResponse, FileResponse, FolderDetailResponse,
    FolderResponse, FolderTreeResponse, FolderUserResponse, LoginResponse, MeResponse,
    MessageResponse, PaginatedResponse, RefreshResponse, UserInfo,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TOTAL_TIMEOUT_SECS: u64 = 120;
const USER_AGENT: &str = concat!("cabinet-client/", env!("CARGO_PKG_VERSION"));

/// Errors returned by [`ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or undecodable body.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("{status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A call needing a token was made before logging in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The call was rejected before reaching the server.
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type of client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

/// A file to send in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name sent to the server.
    pub name: String,
    /// Raw bytes.
    pub content: Vec<u8>,
}

impl UploadFile {
    /// Create an upload from a name and its bytes.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    fn into_part(self) -> ClientResult<multipart::Part> {
        let mime = mime_guess::from_path(&self.name).first_or_octet_stream();
        Ok(multipart::Part::bytes(self.content)
            .file_name(self.name)
            .mime_str(mime.as_ref())?)
    }
}

/// Fields of a user update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    /// New username.
    pub username: Option<String>,
    /// New password; empty keeps the current one.
    pub password: Option<String>,
    /// New role.
    pub role: Option<Role>,
}

/// Read-only calls available without an account.
#[allow(async_fn_in_trait)]
pub trait PublicApi {
    /// Publicly reachable folders with their public files.
    async fn public_tree(&self) -> ClientResult<Vec<FolderTreeResponse>>;

    /// Content of a public file.
    async fn public_download_file(&self, file_id: i64) -> ClientResult<Vec<u8>>;
}

/// Calls behind the admin explorer.
#[allow(async_fn_in_trait)]
pub trait AdminApi {
    /// Root folders visible to the caller.
    async fn root_folders(&self) -> ClientResult<Vec<FolderResponse>>;

    /// A folder with its breadcrumb, subfolders and files.
    async fn folder_detail(&self, folder_id: i64) -> ClientResult<FolderDetailResponse>;

    /// Create a folder under `parent_id` (or at the root) granted to `user_ids`.
    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<i64>,
        user_ids: &[i64],
        is_public: bool,
    ) -> ClientResult<FolderResponse>;

    /// Rename a folder.
    async fn rename_folder(&self, folder_id: i64, name: &str) -> ClientResult<FolderResponse>;

    /// Delete a folder and everything below it.
    async fn delete_folder(&self, folder_id: i64) -> ClientResult<()>;

    /// Rename a file.
    async fn rename_file(&self, file_id: i64, name: &str) -> ClientResult<FileResponse>;

    /// Delete a file.
    async fn delete_file(&self, file_id: i64) -> ClientResult<()>;

    /// Upload files into a folder.
    async fn upload_files(
        &self,
        folder_id: i64,
        files: Vec<UploadFile>,
        is_public: bool,
    ) -> ClientResult<Vec<FileResponse>>;

    /// Raw content of a file.
    async fn download_file(&self, file_id: i64) -> ClientResult<Vec<u8>>;

    /// A page of users, optionally filtered by username.
    async fn list_users(
        &self,
        page: u32,
        per_page: u32,
        username: Option<&str>,
    ) -> ClientResult<PaginatedResponse<UserInfo>>;
}

/// HTTP client for the cabinet API.
///
/// Holds the access and refresh tokens obtained by [`ApiClient::login`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl ApiClient {
    /// Create a client for a server such as `http://localhost:8082`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ClientError::Invalid(format!("invalid base URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            http,
            access_token: None,
            refresh_token: None,
        })
    }

    /// Use an access token obtained elsewhere.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Current access token, if logged in.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Whether an access token is held.
    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    fn authed(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.access_token.as_deref().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    /// Turn a non-success response into [`ClientError::Api`].
    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (
                status
                    .canonical_reason()
                    .unwrap_or("UNKNOWN")
                    .to_ascii_uppercase()
                    .replace(' ', "_"),
                body,
            ),
        };
        tracing::debug!(status = status.as_u16(), code = %code, "API call failed");

        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn send_data<T: DeserializeOwned>(builder: RequestBuilder) -> ClientResult<T> {
        let response = Self::check(builder.send().await?).await?;
        let body: ApiResponse<T> = response.json().await?;
        Ok(body.data)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> ClientResult<T> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(builder: RequestBuilder) -> ClientResult<()> {
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    async fn send_bytes(builder: RequestBuilder) -> ClientResult<Vec<u8>> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    /// `GET /health`.
    pub async fn health(&self) -> ClientResult<bool> {
        let response = self.request(Method::GET, "/health").send().await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Log in and keep the issued tokens.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<LoginResponse> {
        let login: LoginResponse = Self::send_data(
            self.request(Method::POST, "/api/auth/login")
                .json(&json!({ "username": username, "password": password })),
        )
        .await?;

        self.access_token = Some(login.access_token.clone());
        self.refresh_token = Some(login.refresh_token.clone());
        Ok(login)
    }

    /// Exchange the stored refresh token for a new pair.
    pub async fn refresh(&mut self) -> ClientResult<RefreshResponse> {
        let token = self.refresh_token.clone().ok_or(ClientError::NotLoggedIn)?;
        let refreshed: RefreshResponse = Self::send_data(
            self.request(Method::POST, "/api/auth/refresh")
                .json(&json!({ "refresh_token": token })),
        )
        .await?;

        self.access_token = Some(refreshed.access_token.clone());
        self.refresh_token = Some(refreshed.refresh_token.clone());
        Ok(refreshed)
    }

    /// Revoke the refresh token and forget both tokens.
    pub async fn logout(&mut self) -> ClientResult<()> {
        if let Some(token) = self.refresh_token.take() {
            let _: MessageResponse = Self::send_data(
                self.request(Method::POST, "/api/auth/logout")
                    .json(&json!({ "refresh_token": token })),
            )
            .await?;
        }
        self.access_token = None;
        Ok(())
    }

    /// `GET /api/auth/me`.
    pub async fn me(&self) -> ClientResult<MeResponse> {
        Self::send_data(self.authed(Method::GET, "/api/auth/me")?).await
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Create a user (admin).
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> ClientResult<UserInfo> {
        Self::send_data(self.authed(Method::POST, "/api/users")?.json(&json!({
            "username": username,
            "password": password,
            "role": role,
        })))
        .await
    }

    /// Get a user (admin).
    pub async fn get_user(&self, user_id: i64) -> ClientResult<UserInfo> {
        Self::send_data(self.authed(Method::GET, &format!("/api/users/{user_id}"))?).await
    }

    /// Apply `changes` to a user (admin).
    pub async fn update_user(&self, user_id: i64, changes: &UserChanges) -> ClientResult<UserInfo> {
        Self::send_data(
            self.authed(Method::PATCH, &format!("/api/users/{user_id}"))?
                .json(&json!({
                    "username": changes.username,
                    "password": changes.password,
                    "role": changes.role,
                })),
        )
        .await
    }

    /// Delete a user (admin).
    pub async fn delete_user(&self, user_id: i64) -> ClientResult<()> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/users/{user_id}"))?).await
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Folder hierarchy visible to the user, optionally with files.
    pub async fn folder_tree(&self, with_files: bool) -> ClientResult<Vec<FolderTreeResponse>> {
        Self::send_data(
            self.authed(Method::GET, "/api/folders/tree")?
                .query(&[("files", with_files)]),
        )
        .await
    }

    /// Every folder the caller can view, flat.
    pub async fn accessible_folders(&self) -> ClientResult<Vec<FolderResponse>> {
        Self::send_data(self.authed(Method::GET, "/api/folders/accessible")?).await
    }

    /// Change a folder's name and/or public flag.
    pub async fn update_folder(
        &self,
        folder_id: i64,
        name: Option<&str>,
        is_public: Option<bool>,
    ) -> ClientResult<FolderResponse> {
        Self::send_data(
            self.authed(Method::PATCH, &format!("/api/folders/{folder_id}"))?
                .json(&json!({ "name": name, "is_public": is_public })),
        )
        .await
    }

    /// Delete several folders; non-empty ones only with `delete_contents`.
    pub async fn batch_delete_folders(
        &self,
        ids: &[i64],
        delete_contents: bool,
    ) -> ClientResult<usize> {
        let result: BatchDeleteResponse = Self::send_data(
            self.authed(Method::POST, "/api/folders/batch-delete")?
                .json(&json!({ "ids": ids, "delete_contents": delete_contents })),
        )
        .await?;
        Ok(result.deleted)
    }

    /// Move a folder under `parent_id`, or to the root.
    pub async fn move_folder(
        &self,
        folder_id: i64,
        parent_id: Option<i64>,
    ) -> ClientResult<FolderResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/folders/{folder_id}/move"))?
                .json(&json!({ "parent_id": parent_id })),
        )
        .await
    }

    /// Deep-copy a folder under `destination_id`, or to the root.
    pub async fn copy_folder(
        &self,
        folder_id: i64,
        destination_id: Option<i64>,
    ) -> ClientResult<FolderResponse> {
        Self::send_data(
            self.authed(Method::POST, &format!("/api/folders/{folder_id}/copy"))?
                .json(&json!({ "destination_id": destination_id })),
        )
        .await
    }

    /// Replace a folder's contents with a copy of another folder's.
    pub async fn replace_folder_contents(
        &self,
        target_id: i64,
        source_id: i64,
    ) -> ClientResult<FolderResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/folders/{target_id}/replace"))?
                .json(&json!({ "source_id": source_id })),
        )
        .await
    }

    /// Users granted on a folder.
    pub async fn folder_users(&self, folder_id: i64) -> ClientResult<Vec<FolderUserResponse>> {
        Self::send_data(self.authed(Method::GET, &format!("/api/folders/{folder_id}/users"))?)
            .await
    }

    /// Add and remove grants on a folder.
    pub async fn update_folder_permissions(
        &self,
        folder_id: i64,
        add: &[i64],
        remove: &[i64],
    ) -> ClientResult<()> {
        let _: MessageResponse = Self::send_data(
            self.authed(Method::PUT, &format!("/api/folders/{folder_id}/permissions"))?
                .json(&json!({ "add": add, "remove": remove })),
        )
        .await?;
        Ok(())
    }

    /// ZIP archive of a folder subtree.
    pub async fn download_folder(&self, folder_id: i64) -> ClientResult<Vec<u8>> {
        Self::send_bytes(self.authed(Method::GET, &format!("/api/folders/{folder_id}/download"))?)
            .await
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// A page of a folder's files.
    pub async fn list_files(
        &self,
        folder_id: i64,
        page: u32,
        per_page: u32,
    ) -> ClientResult<PaginatedResponse<FileResponse>> {
        Self::send_json(
            self.authed(Method::GET, &format!("/api/folders/{folder_id}/files"))?
                .query(&[("page", page), ("per_page", per_page)]),
        )
        .await
    }

    /// Delete the given files of a folder, or all of them when `ids` is `None`.
    pub async fn delete_folder_files(
        &self,
        folder_id: i64,
        ids: Option<&[i64]>,
    ) -> ClientResult<Vec<i64>> {
        let mut builder = self.authed(Method::DELETE, &format!("/api/folders/{folder_id}/files"))?;
        if let Some(ids) = ids {
            builder = builder.json(&json!({ "ids": ids }));
        }
        let result: DeletedFilesResponse = Self::send_data(builder).await?;
        Ok(result.deleted)
    }

    /// File metadata.
    pub async fn get_file(&self, file_id: i64) -> ClientResult<FileResponse> {
        Self::send_data(self.authed(Method::GET, &format!("/api/files/{file_id}"))?).await
    }

    /// Move a file to another folder.
    pub async fn move_file(&self, file_id: i64, folder_id: i64) -> ClientResult<FileResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/files/{file_id}/move"))?
                .json(&json!({ "folder_id": folder_id })),
        )
        .await
    }

    /// Copy a file into a folder.
    pub async fn copy_file(&self, file_id: i64, folder_id: i64) -> ClientResult<FileResponse> {
        Self::send_data(
            self.authed(Method::POST, &format!("/api/files/{file_id}/copy"))?
                .json(&json!({ "folder_id": folder_id })),
        )
        .await
    }

    /// Replace a file's content, keeping its name.
    pub async fn replace_file(&self, file_id: i64, file: UploadFile) -> ClientResult<FileResponse> {
        let form = multipart::Form::new().part("file", file.into_part()?);
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/files/{file_id}/content"))?
                .multipart(form),
        )
        .await
    }

    /// Make a file public or private.
    pub async fn set_file_visibility(
        &self,
        file_id: i64,
        is_public: bool,
    ) -> ClientResult<FileResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/files/{file_id}/visibility"))?
                .json(&json!({ "is_public": is_public })),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Public and stats
    // ------------------------------------------------------------------

    /// Public files of a public folder.
    pub async fn public_folder_files(&self, folder_id: i64) -> ClientResult<Vec<FileResponse>> {
        Self::send_data(self.request(Method::GET, &format!("/api/public/folders/{folder_id}/files")))
            .await
    }

    /// ZIP of the public part of a folder.
    pub async fn public_download_folder(&self, folder_id: i64) -> ClientResult<Vec<u8>> {
        Self::send_bytes(
            self.request(Method::GET, &format!("/api/public/folders/{folder_id}/download")),
        )
        .await
    }

    /// Dashboard statistics, optionally restricted to an upload date range.
    pub async fn stats(
        &self,
        from: Option<chrono::NaiveDate>,
        to: Option<chrono::NaiveDate>,
    ) -> ClientResult<Statistics> {
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_string()));
        }
        Self::send_data(self.authed(Method::GET, "/api/stats")?.query(&query)).await
    }
}

impl PublicApi for ApiClient {
    async fn public_tree(&self) -> ClientResult<Vec<FolderTreeResponse>> {
        Self::send_data(self.request(Method::GET, "/api/public/folders")).await
    }

    async fn public_download_file(&self, file_id: i64) -> ClientResult<Vec<u8>> {
        Self::send_bytes(self.request(Method::GET, &format!("/api/public/files/{file_id}/download")))
            .await
    }
}

impl AdminApi for ApiClient {
    async fn root_folders(&self) -> ClientResult<Vec<FolderResponse>> {
        Self::send_data(self.authed(Method::GET, "/api/folders")?).await
    }

    async fn folder_detail(&self, folder_id: i64) -> ClientResult<FolderDetailResponse> {
        Self::send_data(self.authed(Method::GET, &format!("/api/folders/{folder_id}"))?).await
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<i64>,
        user_ids: &[i64],
        is_public: bool,
    ) -> ClientResult<FolderResponse> {
        Self::send_data(self.authed(Method::POST, "/api/folders")?.json(&json!({
            "name": name,
            "parent_id": parent_id,
            "user_ids": user_ids,
            "is_public": is_public,
        })))
        .await
    }

    async fn rename_folder(&self, folder_id: i64, name: &str) -> ClientResult<FolderResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/folders/{folder_id}/rename"))?
                .json(&json!({ "name": name })),
        )
        .await
    }

    async fn delete_folder(&self, folder_id: i64) -> ClientResult<()> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/folders/{folder_id}"))?).await
    }

    async fn rename_file(&self, file_id: i64, name: &str) -> ClientResult<FileResponse> {
        Self::send_data(
            self.authed(Method::PUT, &format!("/api/files/{file_id}/rename"))?
                .json(&json!({ "name": name })),
        )
        .await
    }

    async fn delete_file(&self, file_id: i64) -> ClientResult<()> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/files/{file_id}"))?).await
    }

    async fn upload_files(
        &self,
        folder_id: i64,
        files: Vec<UploadFile>,
        is_public: bool,
    ) -> ClientResult<Vec<FileResponse>> {
        if files.is_empty() {
            return Err(ClientError::Invalid("no files to upload".to_string()));
        }
        let mut form = multipart::Form::new().text("is_public", is_public.to_string());
        for file in files {
            form = form.part("files", file.into_part()?);
        }
        Self::send_data(
            self.authed(Method::POST, &format!("/api/folders/{folder_id}/files"))?
                .multipart(form),
        )
        .await
    }

    async fn download_file(&self, file_id: i64) -> ClientResult<Vec<u8>> {
        Self::send_bytes(self.authed(Method::GET, &format!("/api/files/{file_id}/download"))?).await
    }

    async fn list_users(
        &self,
        page: u32,
        per_page: u32,
        username: Option<&str>,
    ) -> ClientResult<PaginatedResponse<UserInfo>> {
        let mut query = vec![("page", page.to_string()), ("per_page", per_page.to_string())];
        if let Some(username) = username {
            query.push(("username", username.to_string()));
        }
        Self::send_json(self.authed(Method::GET, "/api/users")?.query(&query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let client = ApiClient::new("http://localhost:8082/").unwrap();
        assert_eq!(client.url("/health"), "http://localhost:8082/health");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_authed_call_without_login() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(client.me().await, Err(ClientError::NotLoggedIn)));
    }

    #[test]
    fn test_api_error_status() {
        let err = ClientError::Api {
            status: 404,
            code: "NOT_FOUND".to_string(),
            message: "Folder not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "404 NOT_FOUND: Folder not found");
        assert_eq!(ClientError::NotLoggedIn.status(), None);
    }
}
