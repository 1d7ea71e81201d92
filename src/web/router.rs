//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use super::handlers::*;
use super::middleware::{create_cors_layer, jwt_auth, login_rate_limit, JwtState, RateLimitState};

/// Headroom for multipart boundaries and form fields on top of the file limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Files one multi-file upload may carry at full size.
const MAX_UPLOAD_PARTS: usize = 20;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limit: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let login_route = Router::new().route("/login", post(login)).layer(
        middleware::from_fn(move |req, next| {
            let state = rate_limit.clone();
            login_rate_limit(state, req, next)
        }),
    );

    let auth_routes = Router::new()
        .merge(login_route)
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me));

    let user_routes = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user));

    let file_limit = usize::try_from(app_state.max_upload_size).unwrap_or(usize::MAX);
    let body_limit = file_limit.saturating_add(MULTIPART_OVERHEAD);
    // The per-file limit is checked while reading each part.
    let batch_body_limit = file_limit
        .saturating_mul(MAX_UPLOAD_PARTS)
        .saturating_add(MULTIPART_OVERHEAD);
    let upload_route = post(upload_files).layer(DefaultBodyLimit::max(batch_body_limit));

    let folder_routes = Router::new()
        .route("/", get(list_root_folders).post(create_folder))
        .route("/tree", get(folder_tree))
        .route("/accessible", get(accessible_folders))
        .route("/batch-delete", post(batch_delete_folders))
        .route(
            "/:id",
            get(get_folder).patch(update_folder).delete(delete_folder),
        )
        .route("/:id/rename", put(rename_folder))
        .route("/:id/move", put(move_folder))
        .route("/:id/copy", post(copy_folder))
        .route("/:id/replace", put(replace_folder_contents))
        .route("/:id/users", get(folder_users))
        .route("/:id/permissions", put(update_folder_permissions))
        .route(
            "/:id/files",
            get(list_files)
                .delete(delete_folder_files)
                .merge(upload_route),
        )
        .route("/:id/download", get(download_folder));

    let file_routes = Router::new()
        .route("/:id", get(get_file).delete(delete_file))
        .route("/:id/download", get(download_file))
        .route("/:id/rename", put(rename_file))
        .route("/:id/move", put(move_file))
        .route("/:id/copy", post(copy_file))
        .route("/:id/content", put(replace_file))
        .route("/:id/visibility", put(set_file_visibility));

    let public_routes = Router::new()
        .route("/folders", get(public_tree))
        .route("/folders/:id/files", get(public_folder_files))
        .route("/folders/:id/download", get(public_download_folder))
        .route("/files/:id/download", get(public_download_file));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/folders", folder_routes)
        .nest("/files", file_routes)
        .nest("/public", public_routes)
        .route("/stats", get(get_stats))
        .route("/openapi.json", get(openapi_json));

    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileStorage;
    use crate::Database;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn test_router(dir: &tempfile::TempDir) -> Router {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let storage = FileStorage::new(dir.path()).unwrap();
        let state = Arc::new(AppState::new(db, storage, "router-secret", 900, 7));
        create_router(
            state,
            Arc::new(JwtState::new("router-secret")),
            Arc::new(RateLimitState::new(2)),
            &[],
        )
        .merge(create_health_router())
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir).await;

        let resp = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir).await;

        let resp = router
            .oneshot(Request::get("/api/folders").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_tree_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir).await;

        let resp = router
            .oneshot(
                Request::get("/api/public/folders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir).await;

        let mut last = StatusCode::OK;
        for _ in 0..3 {
            let resp = router
                .clone()
                .oneshot(
                    Request::post("/api/auth/login")
                        .header("content-type", "application/json")
                        .header("X-Forwarded-For", "198.51.100.9")
                        .body(Body::from(r#"{"username":"nobody","password":"x"}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            last = resp.status();
        }
        assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
    }
}
