use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDownloadRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub downloader: Option<String>,
    /// Seconds between runs; omitted means one-shot.
    #[serde(default)]
    pub frequency: Option<i64>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub tag_names: Vec<String>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    #[serde(default)]
    pub collection_id: Option<Uuid>,
}

/// Create downloads for one or more URLs. Idempotent per active URL.
#[tracing::instrument(skip(state, request))]
pub async fn create_downloads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateDownloadRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    if state.flags.is_wrol_mode() || state.config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Downloads cannot be created while WROL mode is enabled".to_string(),
        )
        .into());
    }
    if request.urls.is_empty() {
        return Err(AppError::Validation("No URLs provided".to_string()).into());
    }

    let mut download_ids = Vec::with_capacity(request.urls.len());
    for url in &request.urls {
        let download = match request.frequency {
            Some(frequency) => {
                state
                    .manager
                    .recurring_download(
                        url,
                        request.downloader.as_deref(),
                        frequency,
                        request.destination.as_deref(),
                        &request.tag_names,
                        request.settings.clone(),
                        request.collection_id,
                    )
                    .await?
            }
            None => {
                state
                    .manager
                    .create_download(
                        url,
                        request.downloader.as_deref(),
                        None,
                        request.destination.as_deref(),
                        &request.tag_names,
                        request.settings.clone(),
                        request.collection_id,
                    )
                    .await?
            }
        };
        download_ids.push(download.id);
    }

    Ok(Json(serde_json::json!({ "download_ids": download_ids })))
}

/// List downloads, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let downloads = state.downloads.list(None).await?;
    let count = downloads.len();
    Ok(Json(serde_json::json!({
        "downloads": downloads,
        "count": count,
        "disabled": state.flags.downloads_disabled(),
        "stopped": state.flags.downloads_stopped(),
    })))
}

#[tracing::instrument(skip(state))]
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let download = state.downloads.find(id).await?;
    Ok(Json(serde_json::json!({ "download": download })))
}

/// Kill a queued or in-flight download.
#[tracing::instrument(skip(state))]
pub async fn kill_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    state.manager.kill(id).await?;
    Ok(Json(serde_json::json!({ "killed": id })))
}

#[tracing::instrument(skip(state))]
pub async fn restart_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let download = state.manager.restart(id).await?;
    Ok(Json(serde_json::json!({ "download": download })))
}

/// Requeue every failed download.
#[tracing::instrument(skip(state))]
pub async fn retry_failed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let retried = state.manager.retry_failed().await?;
    Ok(Json(serde_json::json!({ "retried": retried })))
}

#[tracing::instrument(skip(state))]
pub async fn delete_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let deleted = state.manager.delete(&[id]).await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Cannot find download with id {}", id)).into());
    }
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
