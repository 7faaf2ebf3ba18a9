use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use arca_core::models::{CollectionKind, Download};
use arca_core::AppError;
use arca_downloads::plugins::archive::format_archive_path;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ArchiveUploadRequest {
    pub url: String,
    /// The SingleFile snapshot contents.
    pub singlefile: String,
    #[serde(default)]
    pub readability: Option<String>,
    #[serde(default)]
    pub readability_txt: Option<String>,
    #[serde(default)]
    pub readability_json: Option<serde_json::Value>,
}

/// Accept a SingleFile snapshot uploaded by the browser extension. The
/// files land in the domain directory and are modeled by a refresh; an
/// outstanding failed or deferred download of the URL is completed.
#[tracing::instrument(skip(state, request), fields(url = %request.url))]
pub async fn upload_archive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArchiveUploadRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let domain = Download::domain_of(&request.url)
        .ok_or_else(|| AppError::Validation(format!("Invalid URL: {}", request.url)))?;

    let directory = state.config.archive_directory().join(&domain);
    let file_format = state
        .collections
        .get_by_name(&domain, CollectionKind::Domain)
        .await?
        .and_then(|c| c.file_format)
        .unwrap_or_else(|| state.config.archive_file_format.clone());

    let title = request
        .readability_json
        .as_ref()
        .and_then(|v| v.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or("upload")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect::<String>();
    let now = chrono::Utc::now();

    let mut pending: Vec<(String, String)> = vec![(
        format_archive_path(&file_format, now, &title, "html"),
        request.singlefile,
    )];
    if let Some(contents) = request.readability {
        pending.push((
            format_archive_path(&file_format, now, &title, "readability.html"),
            contents,
        ));
    }
    if let Some(contents) = request.readability_txt {
        pending.push((
            format_archive_path(&file_format, now, &title, "readability.txt"),
            contents,
        ));
    }
    if let Some(value) = request.readability_json {
        pending.push((
            format_archive_path(&file_format, now, &title, "readability.json"),
            serde_json::to_string(&value).map_err(AppError::from)?,
        ));
    }

    for (relative, contents) in pending {
        let path = directory.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(AppError::from)?;
        }
        tokio::fs::write(&path, contents).await.map_err(AppError::from)?;
    }

    if let Err(e) = state.refresher.refresh(vec![directory]).await {
        tracing::error!(error = %e, "Refresh after archive upload failed");
    }

    let archive = state.archives.latest_by_url(&request.url).await?;
    if let Some(archive) = &archive {
        let location = format!("/archive/{}", archive.id);
        let completed = state
            .manager
            .complete_for_upload(&request.url, &location)
            .await?;
        if completed > 0 {
            tracing::info!(url = %request.url, completed, "Completed downloads via upload");
        }
    }

    Ok(Json(serde_json::json!({
        "archive_id": archive.map(|a| a.id),
    })))
}
