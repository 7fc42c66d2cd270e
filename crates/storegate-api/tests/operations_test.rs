//! Operation endpoint integration tests.
//!
//! Run with: `cargo test -p storegate-api --test operations_test`

mod helpers;

use helpers::{
    basic_auth, setup_test_app, LOCAL_TENANT, OTHER_TENANT, PASSWORD, TENANT, USER,
};
use serde_json::Value;

#[tokio::test]
async fn test_anonymous_post_is_forbidden() {
    let app = setup_test_app().await;

    let response = app
        .anonymous_operation(TENANT, "fileExists")
        .add_query_param("location", "a.txt")
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .anonymous_operation(TENANT, "fileExists")
        .add_query_param("location", "a.txt")
        .add_header("Authorization", basic_auth(USER, "wrong"))
        .await;
    assert_eq!(response.status_code(), 403);

    // Credentials of one tenant are not valid for a host that does not list them.
    let response = app
        .anonymous_operation("unknown.test", "fileExists")
        .add_query_param("location", "a.txt")
        .add_header("Authorization", basic_auth(USER, PASSWORD))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_malformed_authorization_is_anonymous() {
    let app = setup_test_app().await;

    let response = app
        .anonymous_operation(TENANT, "fileExists")
        .add_query_param("location", "a.txt")
        .add_header("Authorization", "Basic !!!")
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_missing_parameters_are_client_errors() {
    let app = setup_test_app().await;

    let response = app
        .server
        .post("/")
        .add_header("Host", TENANT)
        .add_header("Authorization", basic_auth(USER, PASSWORD))
        .add_query_param("location", "a.txt")
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app.operation(TENANT, "read").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_OPERATION");

    // move reads its location from `source`
    let response = app
        .operation(TENANT, "move")
        .add_query_param("location", "a.txt")
        .add_query_param("destination", "b.txt")
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .operation(TENANT, "copy")
        .add_query_param("source", "a.txt")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_unknown_operation_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .operation(TENANT, "explode")
        .add_query_param("location", "a.txt")
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNKNOWN_OPERATION");
}

#[tokio::test]
async fn test_unrouted_method_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .server
        .put("/a.txt")
        .add_header("Host", TENANT)
        .add_header("Authorization", basic_auth(USER, PASSWORD))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_write_read_and_metadata() {
    let app = setup_test_app().await;
    app.write(TENANT, "docs/readme.txt", b"hello world", None).await;

    let response = app
        .operation(TENANT, "fileExists")
        .add_query_param("location", "docs/readme.txt")
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["fileExists"], true);

    let response = app
        .operation(TENANT, "directoryExists")
        .add_query_param("location", "docs")
        .await;
    let body: Value = response.json();
    assert_eq!(body["directoryExists"], true);

    let response = app
        .operation(TENANT, "read")
        .add_query_param("location", "/docs/readme.txt")
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/octet-stream"
    );
    assert_eq!(response.as_bytes().as_ref(), b"hello world");

    let response = app
        .operation(TENANT, "fileSize")
        .add_query_param("location", "docs/readme.txt")
        .await;
    let body: Value = response.json();
    assert_eq!(body["fileSize"], 11);

    let response = app
        .operation(TENANT, "mimeType")
        .add_query_param("location", "docs/readme.txt")
        .await;
    let body: Value = response.json();
    assert_eq!(body["mimeType"], "text/plain");

    let response = app
        .operation(TENANT, "lastModified")
        .add_query_param("location", "docs/readme.txt")
        .await;
    let body: Value = response.json();
    assert!(body["lastModified"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_write_defaults_to_private_and_coerces_visibility() {
    let app = setup_test_app().await;

    app.write(TENANT, "a.txt", b"a", None).await;
    assert_eq!(app.visibility(TENANT, "a.txt").await, "private");

    app.write(TENANT, "b.txt", b"b", Some("public")).await;
    assert_eq!(app.visibility(TENANT, "b.txt").await, "public");

    // Only the exact literal is public.
    app.write(TENANT, "c.txt", b"c", Some("PUBLIC")).await;
    assert_eq!(app.visibility(TENANT, "c.txt").await, "private");
}

#[tokio::test]
async fn test_set_visibility_roundtrip_is_idempotent() {
    let app = setup_test_app().await;
    app.write(TENANT, "a.txt", b"a", None).await;

    for _ in 0..2 {
        let response = app
            .operation(TENANT, "setVisibility")
            .add_query_param("location", "a.txt")
            .add_query_param("visibility", "public")
            .await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(app.visibility(TENANT, "a.txt").await, "public");
    }

    for _ in 0..2 {
        let response = app
            .operation(TENANT, "setVisibility")
            .add_query_param("location", "a.txt")
            .add_query_param("visibility", "private")
            .await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(app.visibility(TENANT, "a.txt").await, "private");
    }
}

#[tokio::test]
async fn test_delete_and_delete_directory() {
    let app = setup_test_app().await;
    app.write(TENANT, "dir/a.txt", b"a", None).await;
    app.write(TENANT, "b.txt", b"b", None).await;

    let response = app
        .operation(TENANT, "delete")
        .add_query_param("location", "b.txt")
        .await;
    assert_eq!(response.status_code(), 204);

    let response = app
        .operation(TENANT, "deleteDirectory")
        .add_query_param("location", "dir")
        .await;
    assert_eq!(response.status_code(), 204);

    for location in ["b.txt", "dir/a.txt"] {
        let response = app
            .operation(TENANT, "fileExists")
            .add_query_param("location", location)
            .await;
        let body: Value = response.json();
        assert_eq!(body["fileExists"], false, "{} still exists", location);
    }
}

#[tokio::test]
async fn test_create_directory_uses_directory_visibility() {
    let app = setup_test_app().await;

    let response = app
        .operation(TENANT, "createDirectory")
        .add_query_param("location", "shared")
        .add_query_param("directory_visibility", "public")
        .await;
    assert_eq!(response.status_code(), 201);
    assert_eq!(app.visibility(TENANT, "shared").await, "public");

    let response = app
        .operation(TENANT, "createDirectory")
        .add_query_param("location", "secret")
        .add_query_param("visibility", "public")
        .await;
    assert_eq!(response.status_code(), 201);
    assert_eq!(app.visibility(TENANT, "secret").await, "private");
}

#[tokio::test]
async fn test_move_resets_source_visibility() {
    let app = setup_test_app().await;
    app.write(TENANT, "a.txt", b"moving", None).await;
    assert_eq!(app.visibility(TENANT, "a.txt").await, "private");

    let response = app
        .operation(TENANT, "move")
        .add_query_param("source", "a.txt")
        .add_query_param("destination", "b.txt")
        .add_query_param("visibility", "public")
        .await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(app.visibility(TENANT, "b.txt").await, "public");
    assert_eq!(app.visibility(TENANT, "a.txt").await, "public");

    // A new object at the vacated path is not hidden by a stale marker.
    app.write(TENANT, "a.txt", b"new", Some("public")).await;
    let response = app.get(TENANT, "/a.txt").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_copy_keeps_source() {
    let app = setup_test_app().await;
    app.write(TENANT, "a.txt", b"copy me", Some("public")).await;

    let response = app
        .operation(TENANT, "copy")
        .add_query_param("source", "a.txt")
        .add_query_param("destination", "b.txt")
        .await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(app.visibility(TENANT, "a.txt").await, "public");
    assert_eq!(app.visibility(TENANT, "b.txt").await, "private");

    let response = app
        .operation(TENANT, "read")
        .add_query_param("location", "b.txt")
        .await;
    assert_eq!(response.as_bytes().as_ref(), b"copy me");
}

#[tokio::test]
async fn test_list_contents_reports_computed_visibility() {
    let app = setup_test_app().await;
    app.write(TENANT, "public.txt", b"hello", Some("public")).await;
    let response = app
        .operation(TENANT, "createDirectory")
        .add_query_param("location", "secret")
        .await;
    assert_eq!(response.status_code(), 201);
    app.write(TENANT, "secret/inner.txt", b"x", None).await;

    let response = app
        .operation(TENANT, "listContents")
        .add_query_param("location", "")
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["content-type"], "text/csv");

    let text = response.text();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 2, "unexpected listing: {}", text);
    assert!(rows
        .iter()
        .any(|r| r.starts_with("file,public.txt,public,") && r.contains(",5,text/plain,")));
    assert!(rows.iter().any(|r| *r == "dir,secret,private,,,,"));

    let response = app
        .operation(TENANT, "listContents")
        .add_query_param("location", "")
        .add_query_param("deep", "true")
        .await;
    let text = response.text();
    assert!(text
        .lines()
        .any(|r| r.starts_with("file,secret/inner.txt,private,")));
    assert!(!text.contains(".keep"));
}

#[tokio::test]
async fn test_backend_failure_is_structured() {
    let app = setup_test_app().await;

    let response = app
        .operation(TENANT, "read")
        .add_query_param("location", "missing.txt")
        .await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["error"], "UnableToReadFile");
    assert!(body["code"].is_i64());
    assert!(body["message"].as_str().unwrap().contains("missing.txt"));

    let response = app
        .operation(TENANT, "read")
        .add_query_param("location", "../../etc/passwd")
        .await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["error"], "PathTraversalDetected");
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let app = setup_test_app().await;
    app.write(TENANT, "shared.txt", b"mine", Some("public")).await;

    let response = app
        .operation(OTHER_TENANT, "fileExists")
        .add_query_param("location", "shared.txt")
        .await;
    let body: Value = response.json();
    assert_eq!(body["fileExists"], false);

    let response = app.get(OTHER_TENANT, "/shared.txt").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_oversized_write_is_rejected() {
    let app = setup_test_app().await;
    let limit = app.state.max_upload_size_bytes;

    let response = app
        .operation(LOCAL_TENANT, "write")
        .add_query_param("location", "big.bin")
        .bytes(bytes::Bytes::from(vec![b'x'; limit + 1]))
        .await;
    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(!app.root().join("var/files/big.bin").exists());

    // Exactly at the limit is accepted.
    let response = app
        .operation(LOCAL_TENANT, "write")
        .add_query_param("location", "big.bin")
        .bytes(bytes::Bytes::from(vec![b'x'; limit]))
        .await;
    assert_eq!(response.status_code(), 201);
}
