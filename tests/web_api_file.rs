//! Web API File Tests

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use cabinet::db::Role;
use common::{bearer, create_test_app, id_of};
use serde_json::{json, Value};

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_upload_and_metadata() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;

    let file = app
        .upload(&admin, id_of(&docs), "notes.txt", b"hello world", true)
        .await;
    assert_eq!(file["name"], "notes.txt");
    assert_eq!(file["size"], 11);
    assert_eq!(file["size_label"], "11 B");
    assert_eq!(file["mime_type"], "text/plain");
    assert_eq!(file["is_public"], true);
    assert_eq!(file["folder_id"], docs["id"]);
    assert_eq!(
        file["url"],
        format!("/api/files/{}/download", id_of(&file))
    );

    let response = app
        .server
        .get(&format!("/api/files/{}", id_of(&file)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["name"], "notes.txt");
}

#[tokio::test]
async fn test_upload_many_with_name_clash() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    app.upload(&admin, id_of(&docs), "report.pdf", b"v1", false).await;

    let form = MultipartForm::new()
        .add_part("files", Part::bytes(b"v2".to_vec()).file_name("report.pdf"))
        .add_part("files", Part::bytes(b"x".to_vec()).file_name("my notes.txt"));
    let response = app
        .server
        .post(&format!("/api/folders/{}/files", id_of(&docs)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(names(&body["data"]), ["report (1).pdf", "my_notes.txt"]);
    assert_eq!(body["data"][0]["mime_type"], "application/pdf");
}

#[tokio::test]
async fn test_upload_rejects_empty_and_oversized() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let url = format!("/api/folders/{}/files", id_of(&docs));

    let form = MultipartForm::new().add_part("files", Part::bytes(Vec::new()).file_name("a.txt"));
    app.server
        .post(&url)
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let big = vec![b'x'; 1024 * 1024 + 1];
    let form = MultipartForm::new().add_part("files", Part::bytes(big).file_name("big.bin"));
    app.server
        .post(&url)
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_upload_many_limits_each_file_not_the_batch() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;

    // Each part is under the 1 MiB file limit; together they are well over it.
    let mut form = MultipartForm::new();
    for name in ["one.bin", "two.bin", "three.bin"] {
        form = form.add_part("files", Part::bytes(vec![b'x'; 900 * 1024]).file_name(name));
    }
    let response = app
        .server
        .post(&format!("/api/folders/{}/files", id_of(&docs)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(names(&body["data"]), ["one.bin", "two.bin", "three.bin"]);
    assert_eq!(body["data"][2]["size"], 900 * 1024);

    let form = MultipartForm::new()
        .add_part("files", Part::bytes(b"fine".to_vec()).file_name("small.txt"))
        .add_part("files", Part::bytes(vec![b'x'; 1024 * 1024 + 1]).file_name("big.bin"));
    let response = app
        .server
        .post(&format!("/api/folders/{}/files", id_of(&docs)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().contains("big.bin"));
}

#[tokio::test]
async fn test_basic_user_cannot_upload() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let (alice, basic) = app.user_with_token("alice", Role::Basic).await;
    let docs = app.create_folder(&admin, "Docs", None, &[alice.id], false).await;

    let form = MultipartForm::new().add_part("files", Part::bytes(b"x".to_vec()).file_name("a.txt"));
    app.server
        .post(&format!("/api/folders/{}/files", id_of(&docs)))
        .add_header(AUTHORIZATION, bearer(&basic))
        .multipart(form)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_files_sorted_paginated_filtered() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let id = id_of(&docs);
    app.upload(&admin, id, "b.txt", b"bbbb", false).await;
    app.upload(&admin, id, "A.pdf", b"a", false).await;
    app.upload(&admin, id, "c.txt", b"cc", false).await;

    let body: Value = app
        .server
        .get(&format!("/api/folders/{id}/files?page=1&per_page=2"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(names(&body["data"]), ["A.pdf", "b.txt"]);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["page"], 1);

    let body: Value = app
        .server
        .get(&format!("/api/folders/{id}/files?sort=size&direction=desc"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(names(&body["data"]), ["b.txt", "c.txt", "A.pdf"]);

    let body: Value = app
        .server
        .get(&format!("/api/folders/{id}/files?extension=txt"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(body["meta"]["total"], 2);
}

#[tokio::test]
async fn test_download_headers() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let file = app.upload(&admin, id_of(&docs), "notes.txt", b"hello", false).await;

    let response = app
        .server
        .get(&format!("/api/files/{}/download", id_of(&file)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"hello");
    assert_eq!(
        response.header("content-disposition").to_str().unwrap(),
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(response.header("content-type").to_str().unwrap(), "text/plain");
}

#[tokio::test]
async fn test_download_requires_view() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let (_, outsider) = app.user_with_token("eve", Role::Manager).await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let file = app.upload(&admin, id_of(&docs), "secret.txt", b"s", false).await;

    app.server
        .get(&format!("/api/files/{}/download", id_of(&file)))
        .add_header(AUTHORIZATION, bearer(&outsider))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .get(&format!("/api/files/{}/download", id_of(&file)))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rename_move_copy() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let a = app.create_folder(&admin, "A", None, &[], false).await;
    let b = app.create_folder(&admin, "B", None, &[], false).await;
    let file = app.upload(&admin, id_of(&a), "one.txt", b"1", false).await;
    app.upload(&admin, id_of(&a), "two.txt", b"2", false).await;
    let fid = id_of(&file);

    app.server
        .put(&format!("/api/files/{fid}/rename"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "two.txt" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let response = app
        .server
        .put(&format!("/api/files/{fid}/rename"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "name": "first.txt" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["name"], "first.txt");

    let response = app
        .server
        .post(&format!("/api/files/{fid}/copy"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "folder_id": id_of(&a) }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let copy = response.json::<Value>()["data"].clone();
    assert_eq!(copy["name"], "first (1).txt");

    let response = app
        .server
        .put(&format!("/api/files/{fid}/move"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "folder_id": id_of(&b) }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["folder_id"], b["id"]);

    // The copy has its own blob.
    app.server
        .delete(&format!("/api/files/{fid}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let response = app
        .server
        .get(&format!("/api/files/{}/download", id_of(&copy)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"1");
}

#[tokio::test]
async fn test_replace_content_and_visibility() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let file = app.upload(&admin, id_of(&docs), "draft.txt", b"old", false).await;
    let fid = id_of(&file);

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"brand new".to_vec())
            .file_name("final.txt")
            .mime_type("text/plain"),
    );
    let response = app
        .server
        .put(&format!("/api/files/{fid}/content"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(form)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "final.txt");
    assert_eq!(body["data"]["size"], 9);

    let response = app
        .server
        .put(&format!("/api/files/{fid}/content"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .multipart(MultipartForm::new().add_text("is_public", "true"))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .server
        .put(&format!("/api/files/{fid}/visibility"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "is_public": true }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["is_public"], true);
}

#[tokio::test]
async fn test_delete_folder_files() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let docs = app.create_folder(&admin, "Docs", None, &[], false).await;
    let other = app.create_folder(&admin, "Other", None, &[], false).await;
    let id = id_of(&docs);
    let one = app.upload(&admin, id, "one.txt", b"1", false).await;
    app.upload(&admin, id, "two.txt", b"2", false).await;
    app.upload(&admin, id, "three.txt", b"3", false).await;
    let foreign = app.upload(&admin, id_of(&other), "x.txt", b"x", false).await;

    let response = app
        .server
        .delete(&format!("/api/folders/{id}/files"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({ "ids": [id_of(&one), id_of(&foreign)] }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["deleted"], json!([id_of(&one)]));

    let response = app
        .server
        .delete(&format!("/api/folders/{id}/files"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["data"]["deleted"]
            .as_array()
            .unwrap()
            .len(),
        2
    );

    app.server
        .get(&format!("/api/files/{}", id_of(&foreign)))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_ok();
}
