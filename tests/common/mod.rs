#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{header::COOKIE, Method, StatusCode};
use serde_json::Value;

use config_service::config::AppConfig;
use config_service::database::MemoryStore;
use config_service::server;

pub const ADMIN_TENANT: &str = "admin-tenant";
/// Not listed as an admin; admin only through its cookie flag.
pub const OPERATOR_TENANT: &str = "operator";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    http: reqwest::Client,
}

impl TestServer {
    /// Development config with one listed admin tenant.
    pub fn config() -> AppConfig {
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        config.security.admin_users = vec![ADMIN_TENANT.to_string()];
        config
    }

    pub async fn start() -> Result<Self> {
        Self::start_with(Self::config()).await
    }

    /// Serves a fresh in-memory instance on its own runtime thread.
    pub async fn start_with(config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("failed to build server runtime");
            runtime.block_on(async move {
                let app = server::app(Arc::new(MemoryStore::new()), config)
                    .await
                    .expect("failed to build app");
                let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
                    .await
                    .expect("failed to bind test port");
                axum::serve(listener, app).await.expect("server error");
            });
        });

        let server = Self {
            port,
            base_url,
            http: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = self.http.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// Client acting as `tenant`.
    pub fn tenant(&self, tenant: &str) -> TestClient {
        self.client(Some(format!("customerGUID={}", tenant)))
    }

    /// Client whose cookie grants admin access: the `adminAccess` flag is
    /// encoded into the `customerGUID` value after the tenant.
    pub fn admin(&self) -> TestClient {
        self.client(Some(format!("customerGUID={}%3BadminAccess", OPERATOR_TENANT)))
    }

    /// Client sending `cookie` verbatim.
    pub fn with_cookie(&self, cookie: &str) -> TestClient {
        self.client(Some(cookie.to_string()))
    }

    pub fn anonymous(&self) -> TestClient {
        self.client(None)
    }

    fn client(&self, cookie: Option<String>) -> TestClient {
        TestClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            cookie,
        }
    }
}

pub struct TestClient {
    http: reqwest::Client,
    base_url: String,
    cookie: Option<String>,
}

impl TestClient {
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(cookie) = &self.cookie {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, path))?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("non-JSON response from {}: {}", path, text))?
        };
        Ok((status, body))
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, None).await
    }

    pub async fn delete_with(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, path, Some(body)).await
    }
}

/// Length of a JSON array response, zero for anything else.
pub fn len(value: &Value) -> usize {
    value.as_array().map(Vec::len).unwrap_or(0)
}

/// `name` fields of an array response, sorted.
pub fn names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|doc| doc.get("name").and_then(Value::as_str).map(str::to_string))
        .collect();
    names.sort();
    names
}
