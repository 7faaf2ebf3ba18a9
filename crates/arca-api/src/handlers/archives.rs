use axum::extract::{Path, State};
use axum::response::Json;
use std::sync::Arc;
use uuid::Uuid;

use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state))]
pub async fn get_archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let archive = state.archives.find(id).await?;
    let file_group = state.file_groups.get(archive.file_group_id).await?;
    Ok(Json(serde_json::json!({
        "archive": archive,
        "file_group": file_group,
    })))
}

/// Other archives of the same URL, oldest first.
#[tracing::instrument(skip(state))]
pub async fn get_archive_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let archive = state.archives.find(id).await?;
    let history = match &archive.url {
        Some(url) => state.archives.history(archive.id, url).await?,
        None => Vec::new(),
    };
    Ok(Json(serde_json::json!({ "history": history })))
}

/// Delete an archive with its files. The FileGroup owns the filenames, so
/// deleting it is what removes the bytes; the archive row cascades.
#[tracing::instrument(skip(state))]
pub async fn delete_archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let archive = state.archives.find(id).await?;
    let file_group = state
        .file_groups
        .get(archive.file_group_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Archive {} has no file group", archive.id))
        })?;

    let paths = file_group.my_paths();
    tokio::task::spawn_blocking(move || {
        for path in paths {
            // Files may have been removed manually already.
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot remove file");
                }
            }
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Delete task panicked: {}", e)))?;

    state.file_groups.delete_ids(&[file_group.id]).await?;
    state
        .events
        .send_deleted(&format!("Deleted archive {}", archive.id));
    Ok(Json(serde_json::json!({ "deleted": archive.id })))
}
