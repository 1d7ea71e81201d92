//! Authentication handlers and the shared application state.

use axum::{extract::State, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

use crate::datetime::SQL_DATETIME_FORMAT;
use crate::db::{NewRefreshToken, RefreshTokenRepository, User, UserRepository};
use crate::file::{FileService, FileStorage, FolderRepository, FolderService, DEFAULT_MAX_UPLOAD_SIZE};
use crate::web::dto::{
    ApiResponse, LoginRequest, LoginResponse, LogoutRequest, MeResponse, MessageResponse,
    RefreshRequest, RefreshResponse, UserInfo, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{CurrentUser, JwtClaims};
use crate::Database;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database pool.
    pub db: Arc<Database>,
    /// Blob store for file content.
    pub storage: FileStorage,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Refresh token expiry in days.
    pub refresh_token_expiry: u64,
    /// Largest accepted upload in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        db: Arc<Database>,
        storage: FileStorage,
        jwt_secret: &str,
        access_expiry: u64,
        refresh_expiry: u64,
    ) -> Self {
        Self {
            db,
            storage,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Set the upload limit in bytes.
    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Folder operations bound to this state.
    pub fn folders(&self) -> FolderService<'_> {
        FolderService::new(&self.db, &self.storage)
    }

    /// File operations bound to this state.
    pub fn files(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.storage).with_max_upload_size(self.max_upload_size)
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// Generate a refresh token.
    pub fn generate_refresh_token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Issue an access token and a stored refresh token.
    async fn issue_tokens(&self, user: &User) -> Result<(String, String), ApiError> {
        let access_token = self.generate_access_token(user)?;
        let refresh_token = self.generate_refresh_token();

        let expires_at =
            chrono::Utc::now() + chrono::Duration::days(self.refresh_token_expiry as i64);
        RefreshTokenRepository::new(self.db.pool())
            .create(&NewRefreshToken {
                user_id: user.id,
                token: refresh_token.clone(),
                expires_at: expires_at.format(SQL_DATETIME_FORMAT).to_string(),
            })
            .await?;

        Ok((access_token, refresh_token))
    }
}

/// POST /api/auth/login - User login.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 429, description = "Too many login attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid username or password");

    let users = UserRepository::new(state.db.pool());
    let user = users
        .get_by_username(req.username.trim())
        .await?
        .ok_or_else(invalid)?;

    crate::verify_password(&req.password, &user.password).map_err(|_| {
        tracing::info!(username = %user.username, "Failed login attempt");
        invalid()
    })?;

    let (access_token, refresh_token) = state.issue_tokens(&user).await?;

    if let Err(e) = users.update_last_login(user.id).await {
        tracing::warn!(user_id = user.id, "Failed to record last login: {}", e);
    }
    tracing::info!(user_id = user.id, username = %user.username, "User logged in");

    Ok(Json(ApiResponse::new(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.access_token_expiry,
        user: UserInfo::from(&user),
    })))
}

/// POST /api/auth/logout - Revoke a refresh token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    RefreshTokenRepository::new(state.db.pool())
        .revoke(&req.refresh_token)
        .await?;

    Ok(Json(ApiResponse::new(MessageResponse::new("Logged out"))))
}

/// POST /api/auth/refresh - Exchange a refresh token for new tokens.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let tokens = RefreshTokenRepository::new(state.db.pool());
    let stored = tokens
        .get_valid_token(&req.refresh_token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let user = UserRepository::new(state.db.pool())
        .get_by_id(stored.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    tokens.revoke(&req.refresh_token).await?;
    let (access_token, refresh_token) = state.issue_tokens(&user).await?;

    Ok(Json(ApiResponse::new(RefreshResponse {
        access_token,
        refresh_token,
        expires_in: state.access_token_expiry,
    })))
}

/// GET /api/auth/me - Current user with granted folders.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let folder_ids = FolderRepository::new(state.db.pool())
        .granted_ids(user.id)
        .await?;

    Ok(Json(ApiResponse::new(MeResponse {
        user: UserInfo::from(&user),
        folder_ids,
    })))
}
