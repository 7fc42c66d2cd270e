//! Test helpers: build the application and router for integration tests.
//!
//! Run from workspace root: `cargo test -p storegate-api`. Each test app owns a
//! temporary directory holding its SQLite database and local storage roots.

#![allow(dead_code)]

use axum::http::Method;
use axum_test::{TestRequest, TestServer};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::sync::Arc;
use storegate_api::setup;
use storegate_api::state::AppState;
use storegate_core::{BaseConfig, Config, GatewayConfig, TenantDirectory};
use tempfile::TempDir;

/// Tenant backed by an in-memory store.
pub const TENANT: &str = "files.test";
/// Second tenant with its own in-memory store.
pub const OTHER_TENANT: &str = "other.test";
/// Tenant backed by a local directory below the app root.
pub const LOCAL_TENANT: &str = "local.test";
/// Tenant without a storage locator.
pub const NO_STORAGE_TENANT: &str = "nostore.test";

pub const USER: &str = "alice";
pub const PASSWORD: &str = "correct horse";

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn root(&self) -> &std::path::Path {
        self._temp_dir.path()
    }

    /// Authenticated operation request against `tenant`.
    pub fn operation(&self, tenant: &str, method: &str) -> TestRequest {
        self.anonymous_operation(tenant, method)
            .add_header("Authorization", basic_auth(USER, PASSWORD))
    }

    pub fn anonymous_operation(&self, tenant: &str, method: &str) -> TestRequest {
        self.server
            .post("/")
            .add_header("Host", tenant)
            .add_query_param("method", method)
    }

    pub fn get(&self, tenant: &str, path: &str) -> TestRequest {
        self.server.get(path).add_header("Host", tenant)
    }

    pub fn head(&self, tenant: &str, path: &str) -> TestRequest {
        self.server
            .method(Method::HEAD, path)
            .add_header("Host", tenant)
    }

    /// Write `contents` to `location` with the given visibility parameter.
    pub async fn write(
        &self,
        tenant: &str,
        location: &str,
        contents: &'static [u8],
        visibility: Option<&str>,
    ) {
        let mut request = self
            .operation(tenant, "write")
            .add_query_param("location", location);
        if let Some(visibility) = visibility {
            request = request.add_query_param("visibility", visibility);
        }
        let response = request.bytes(bytes::Bytes::from_static(contents)).await;
        assert_eq!(response.status_code(), 201, "write {} failed", location);
    }

    pub async fn visibility(&self, tenant: &str, location: &str) -> String {
        let response = self
            .operation(tenant, "visibility")
            .add_query_param("location", location)
            .await;
        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        body["visibility"]
            .as_str()
            .expect("visibility is a string")
            .to_string()
    }
}

pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Setup test app with an isolated database and in-memory/local backends.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

    // Cost 4 keeps hashing fast in tests.
    let hash = bcrypt::hash(PASSWORD, 4).expect("Failed to hash password");
    let tenants = TenantDirectory::from_value(json!({
        "files.test": { "storage": "memory://files", "users": { "alice": hash } },
        "other.test": { "storage": "memory://other", "users": { "alice": hash } },
        "local.test": { "storage": "file://var/files", "users": { "alice": hash } },
        "nostore.test": { "users": { "alice": hash } }
    }))
    .expect("Invalid test tenants");

    let config = Config::new(GatewayConfig {
        base: BaseConfig {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            environment: "test".to_string(),
            debug: false,
        },
        app_root: temp_dir.path().to_path_buf(),
        database_url: format!(
            "sqlite://{}?mode=rwc",
            temp_dir.path().join("var").join("visibility.sqlite").display()
        ),
        db_ping_interval_secs: 10,
        tenants_config_path: temp_dir.path().join("config").join("tenants.json"),
        max_upload_size_bytes: 1024 * 1024,
        tenants,
    });

    let (state, router) = setup::initialize_app(config)
        .await
        .expect("Failed to initialize app");

    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
