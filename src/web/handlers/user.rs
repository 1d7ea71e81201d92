//! User administration handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::PasswordError;
use crate::db::{NewUser, RefreshTokenRepository, UserFilter, UserRepository, UserUpdate};
use crate::web::dto::{
    ApiResponse, CreateUserRequest, MessageResponse, PaginatedResponse, UpdateUserRequest,
    UserInfo, UserListQuery, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AdminUser;

fn password_error(e: PasswordError) -> ApiError {
    match e {
        PasswordError::HashError(msg) => {
            tracing::error!("Password hashing failed: {}", msg);
            ApiError::internal("Failed to hash password")
        }
        other => ApiError::unprocessable(format!("Password error: {}", other)),
    }
}

/// GET /api/users - List users.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users ordered by username", body = Vec<UserInfo>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<PaginatedResponse<UserInfo>>, ApiError> {
    let pagination = query.pagination();
    let (page, per_page) = pagination.normalized();
    let (offset, limit) = pagination.to_offset_limit();
    let filter = UserFilter {
        username: query.username.clone(),
    };

    let repo = UserRepository::new(state.db.pool());
    let users = repo.list(&filter, offset, limit).await?;
    let total = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.iter().map(UserInfo::from).collect(),
        page,
        per_page,
        total as u64,
    )))
}

/// POST /api/users - Create a user.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserInfo),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Invalid username or weak password")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    let hash = crate::hash_password(&req.password).map_err(password_error)?;
    let new_user = NewUser::new(req.username.trim(), hash).with_role(req.role);

    let user = UserRepository::new(state.db.pool()).create(&new_user).await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, role = %user.role, "User created");

    Ok((StatusCode::CREATED, Json(ApiResponse::new(UserInfo::from(&user)))))
}

/// GET /api/users/:id - Get a user.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserInfo),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}

/// PATCH /api/users/:id - Update a user.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserInfo),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let mut update = UserUpdate::new();
    if let Some(username) = req.username.as_deref() {
        update = update.username(username.trim());
    }
    if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        update = update.password(crate::hash_password(password).map_err(password_error)?);
    }
    if let Some(role) = req.role {
        update = update.role(role);
    }
    let sessions_invalidated = update.password.is_some() || update.role.is_some();

    let user = UserRepository::new(state.db.pool())
        .update(user_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!(admin_id = admin.id, user_id, "User updated");

    // Password or role changes end existing sessions at their next refresh.
    if sessions_invalidated {
        let revoked = RefreshTokenRepository::new(state.db.pool())
            .revoke_all_for_user(user_id)
            .await?;
        tracing::info!(user_id, revoked, "Refresh tokens revoked");
    }

    Ok(Json(ApiResponse::new(UserInfo::from(&user))))
}

/// DELETE /api/users/:id - Delete a user.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Cannot delete your own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if admin.id == user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let deleted = UserRepository::new(state.db.pool()).delete(user_id).await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!(admin_id = admin.id, user_id, "User deleted");

    Ok(Json(ApiResponse::new(MessageResponse::new("User deleted"))))
}
