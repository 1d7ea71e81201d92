//! Web API Public Access Tests

mod common;

use std::io::Cursor;

use axum::http::StatusCode;
use common::{create_test_app, id_of};
use serde_json::Value;

#[tokio::test]
async fn test_public_tree_hides_private_parts() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let manuals = app.create_folder(&admin, "Manuals", None, &[], true).await;
    let printers = app
        .create_folder(&admin, "Printers", Some(id_of(&manuals)), &[], true)
        .await;
    let internal = app
        .create_folder(&admin, "Internal", Some(id_of(&manuals)), &[], false)
        .await;
    let private_root = app.create_folder(&admin, "HR", None, &[], false).await;
    // Public flag, but under a private ancestor.
    app.create_folder(&admin, "Leaked", Some(id_of(&private_root)), &[], true)
        .await;

    app.upload(&admin, id_of(&manuals), "intro.pdf", b"i", true).await;
    app.upload(&admin, id_of(&manuals), "draft.pdf", b"d", false).await;
    app.upload(&admin, id_of(&printers), "setup.pdf", b"s", true).await;
    app.upload(&admin, id_of(&internal), "keys.txt", b"k", true).await;

    let response = app.server.get("/api/public/folders").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let roots = body["data"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], "Manuals");
    assert_eq!(roots[0]["files"].as_array().unwrap().len(), 1);
    assert_eq!(roots[0]["files"][0]["name"], "intro.pdf");
    let children = roots[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["name"], "Printers");
}

#[tokio::test]
async fn test_public_files_and_downloads() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let manuals = app.create_folder(&admin, "Manuals", None, &[], true).await;
    let hidden = app.create_folder(&admin, "Hidden", None, &[], false).await;
    let public_file = app.upload(&admin, id_of(&manuals), "intro.txt", b"intro", true).await;
    let private_file = app.upload(&admin, id_of(&manuals), "draft.txt", b"draft", false).await;
    let hidden_file = app.upload(&admin, id_of(&hidden), "h.txt", b"h", true).await;

    let body: Value = app
        .server
        .get(&format!("/api/public/folders/{}/files", id_of(&manuals)))
        .await
        .json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = app
        .server
        .get(&format!("/api/public/files/{}/download", id_of(&public_file)))
        .await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"intro");

    for id in [id_of(&private_file), id_of(&hidden_file)] {
        app.server
            .get(&format!("/api/public/files/{id}/download"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    app.server
        .get(&format!("/api/public/folders/{}/files", id_of(&hidden)))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_folder_zip() {
    let app = create_test_app().await;
    let admin = app.admin_token().await;
    let manuals = app.create_folder(&admin, "Manuals", None, &[], true).await;
    let internal = app
        .create_folder(&admin, "Internal", Some(id_of(&manuals)), &[], false)
        .await;
    app.upload(&admin, id_of(&manuals), "intro.txt", b"i", true).await;
    app.upload(&admin, id_of(&manuals), "draft.txt", b"d", false).await;
    app.upload(&admin, id_of(&internal), "keys.txt", b"k", true).await;

    let response = app
        .server
        .get(&format!("/api/public/folders/{}/download", id_of(&manuals)))
        .await;
    response.assert_status_ok();

    let zip = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    let entries: Vec<&str> = zip.file_names().collect();
    assert_eq!(entries, ["intro.txt"]);

    app.server
        .get(&format!("/api/public/folders/{}/download", id_of(&internal)))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
