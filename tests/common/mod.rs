#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use runsdb_api::auth::{create_user, ADMIN_ROLE};
use runsdb_api::config::AppConfig;
use runsdb_api::store::users::MemoryUserStore;
use runsdb_api::store::MemoryRunStore;
use runsdb_api::{app, AppState};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const VIEWER_USER: &str = "viewer";
pub const VIEWER_PASSWORD: &str = "viewer-password";

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/runs.json")
}

/// Router over the fixture runs, with one admin and one plain user
pub async fn test_app() -> (Router, AppState) {
    let runs = MemoryRunStore::from_json_file(fixture_path())
        .await
        .expect("fixture should load");

    let config = AppConfig::default();
    let cost = config.auth.password_hash_cost;

    let users = MemoryUserStore::new();
    create_user(&users, ADMIN_USER, ADMIN_PASSWORD, vec![ADMIN_ROLE.to_string()], cost)
        .await
        .expect("admin user");
    create_user(&users, VIEWER_USER, VIEWER_PASSWORD, vec![], cost)
        .await
        .expect("viewer user");

    let state = AppState::new(config, Arc::new(runs), Arc::new(users));
    (app(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::json!({ "raw": String::from_utf8_lossy(&bytes).to_string() })
        })
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_with_token(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = post_json(
        app,
        "/login",
        &serde_json::json!({ "username": username, "password": password }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"].as_str().expect("access_token").to_string()
}

/// The real binary, serving the fixture runs on a free port
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_runsdb-api"));
        cmd.arg("--port")
            .arg(port.to_string())
            .arg("--fixture")
            .arg(fixture_path())
            .env("APP_ENV", "development")
            .env("RUNSDB_API_HOST", "127.0.0.1")
            .env("RUNSDB_URL", "")
            .env("USERDB_URL", "")
            .env("RUNSDB_ADMIN_USER", ADMIN_USER)
            .env("RUNSDB_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Start the binary and wait for `/health`; the process is killed when the handle drops
pub async fn spawn_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}
