//! Web API Statistics Tests

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use cabinet::db::Role;
use common::{bearer, create_test_app, id_of};
use serde_json::Value;

#[tokio::test]
async fn test_stats_totals_and_rankings() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let (mgr, manager) = app.user_with_token("mgr", Role::Manager).await;
    let docs = app.create_folder(&admin, "Docs", None, &[mgr.id], false).await;
    app.create_folder(&admin, "Empty", None, &[], false).await;

    app.upload(&admin, id_of(&docs), "a.txt", b"aaaa", false).await;
    app.upload(&manager, id_of(&docs), "b.txt", b"bb", false).await;
    app.upload(&manager, id_of(&docs), "c.txt", b"c", false).await;

    let response = app
        .server
        .get("/api/stats")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    let stats = response.json::<Value>()["data"].clone();

    assert_eq!(stats["total_files"], 3);
    assert_eq!(stats["total_folders"], 2);
    assert_eq!(stats["total_bytes"], 7);
    assert_eq!(stats["top_users_by_uploads"][0]["key"], "mgr");
    assert_eq!(stats["top_users_by_uploads"][0]["value"], 2);
    assert_eq!(stats["top_users_by_space"][0]["key"], "admin");
    assert_eq!(stats["files_by_type"][0]["key"], "text/plain");
    assert_eq!(stats["files_by_type"][0]["value"], 3);
    assert_eq!(stats["uploads_per_day"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_date_range() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    app.upload(&admin, id_of(&docs), "a.txt", b"a", false).await;

    let body: Value = app
        .server
        .get("/api/stats?from=2000-01-01&to=2000-12-31")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(body["data"]["total_files"], 0);
    assert!(body["data"]["uploads_per_day"].as_array().unwrap().is_empty());

    app.server
        .get("/api/stats?from=yesterday")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_admin_only() {
    let app = create_test_app().await;
    let (_, manager) = app.user_with_token("mgr", Role::Manager).await;

    app.server
        .get("/api/stats")
        .add_header(AUTHORIZATION, bearer(&manager))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
