//! Thin HTTP client over the arca API.
//!
//! Set `ARCA_API_URL` (default `http://127.0.0.1:8081`).

use anyhow::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("ARCA_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string());
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error", url))?;
        response.json().await.context("Invalid JSON response")
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?
            .error_for_status()
            .with_context(|| format!("POST {} returned an error", url))?;
        response.json().await.context("Invalid JSON response")
    }

    pub async fn status(&self) -> Result<Value> {
        self.get("/api/status").await
    }

    pub async fn list_downloads(&self) -> Result<Value> {
        self.get("/api/download").await
    }

    pub async fn create_downloads(
        &self,
        urls: &[String],
        downloader: Option<&str>,
        frequency: Option<i64>,
        destination: Option<&str>,
    ) -> Result<Value> {
        self.post(
            "/api/download",
            serde_json::json!({
                "urls": urls,
                "downloader": downloader,
                "frequency": frequency,
                "destination": destination,
            }),
        )
        .await
    }

    pub async fn kill_download(&self, id: Uuid) -> Result<Value> {
        self.post(&format!("/api/download/{}/kill", id), Value::Null)
            .await
    }

    pub async fn retry_failed(&self) -> Result<Value> {
        self.post("/api/download/retry_failed", Value::Null).await
    }

    pub async fn refresh(&self, paths: &[String]) -> Result<Value> {
        self.post("/api/files/refresh", serde_json::json!({ "paths": paths }))
            .await
    }

    pub async fn list_collections(&self, kind: Option<&str>) -> Result<Value> {
        match kind {
            Some(kind) => self.get(&format!("/api/collections?kind={}", kind)).await,
            None => self.get("/api/collections").await,
        }
    }

    pub async fn events(&self) -> Result<Value> {
        self.get("/api/events/feed").await
    }
}
