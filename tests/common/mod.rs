//! Shared helpers for the API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use cabinet::config::WebConfig;
use cabinet::db::{NewUser, Role, User, UserRepository};
use cabinet::file::FileStorage;
use cabinet::web::handlers::AppState;
use cabinet::web::middleware::{JwtState, RateLimitState};
use cabinet::web::router::{create_health_router, create_router};
use cabinet::Database;

pub const PASSWORD: &str = "password123";

/// Create a test configuration.
pub fn create_test_config() -> WebConfig {
    WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
        jwt_secret: "test-secret-key-for-testing-only".to_string(),
        jwt_access_token_expiry_secs: 900,
        jwt_refresh_token_expiry_days: 7,
        login_rate_limit: 100,
    }
}

/// A router over an in-memory database and a temporary blob store.
pub struct TestApp {
    pub server: TestServer,
    pub db: Arc<Database>,
    pub storage: FileStorage,
    _dir: TempDir,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(create_test_config()).await
}

pub async fn create_test_app_with(config: WebConfig) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create storage dir");
    let storage = FileStorage::new(dir.path()).expect("Failed to create storage");
    let db = Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to create test database"),
    );

    let app_state = Arc::new(
        AppState::new(
            db.clone(),
            storage.clone(),
            &config.jwt_secret,
            config.jwt_access_token_expiry_secs,
            config.jwt_refresh_token_expiry_days,
        )
        .with_max_upload_size(1024 * 1024),
    );
    let jwt_state = Arc::new(JwtState::new(&config.jwt_secret));
    let rate_limit = Arc::new(RateLimitState::new(config.login_rate_limit));

    let router = create_router(app_state, jwt_state, rate_limit, &config.cors_origins)
        .merge(create_health_router());
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        storage,
        _dir: dir,
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

impl TestApp {
    /// Insert a user directly with [`PASSWORD`].
    pub async fn create_user(&self, username: &str, role: Role) -> User {
        let hash = cabinet::hash_password(PASSWORD).expect("hash");
        UserRepository::new(self.db.pool())
            .create(&NewUser::new(username, hash).with_role(role))
            .await
            .expect("Failed to create user")
    }

    /// Log in and return the whole `data` object.
    pub async fn login_body(&self, username: &str, password: &str) -> Value {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "username": username, "password": password }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }

    /// Log in and return the access token.
    pub async fn login(&self, username: &str) -> String {
        self.login_body(username, PASSWORD).await["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    /// Create a user with `role` and return it with an access token.
    pub async fn user_with_token(&self, username: &str, role: Role) -> (User, String) {
        let user = self.create_user(username, role).await;
        let token = self.login(username).await;
        (user, token)
    }

    pub async fn admin_token(&self) -> String {
        self.user_with_token("admin", Role::Admin).await.1
    }

    /// Create a folder through the API and return its `data`.
    pub async fn create_folder(
        &self,
        token: &str,
        name: &str,
        parent_id: Option<i64>,
        user_ids: &[i64],
        is_public: bool,
    ) -> Value {
        let response = self
            .server
            .post("/api/folders")
            .add_header(AUTHORIZATION, bearer(token))
            .json(&json!({
                "name": name,
                "parent_id": parent_id,
                "user_ids": user_ids,
                "is_public": is_public
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }

    /// Upload one file and return its `data`.
    pub async fn upload(
        &self,
        token: &str,
        folder_id: i64,
        name: &str,
        content: &[u8],
        is_public: bool,
    ) -> Value {
        let form = MultipartForm::new()
            .add_text("is_public", is_public.to_string())
            .add_part(
                "files",
                Part::bytes(content.to_vec())
                    .file_name(name)
                    .mime_type("text/plain"),
            );
        let response = self
            .server
            .post(&format!("/api/folders/{}/files", folder_id))
            .add_header(AUTHORIZATION, bearer(token))
            .multipart(form)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"][0].clone()
    }
}

/// `id` field of a JSON object.
pub fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("id")
}
