use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use arca_core::pagination::create_pagination;
use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Paths relative to the media root; empty means the whole root.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Kick off a refresh in the background. A refresh already in progress
/// makes this a no-op.
#[tracing::instrument(skip(state, request))]
pub async fn refresh_files(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let mut paths = Vec::with_capacity(request.paths.len());
    for path in &request.paths {
        paths.push(state.config.resolve_media_path(path)?);
    }

    let already_refreshing = state.flags.is_refreshing();
    let refresher = state.refresher.clone();
    tokio::spawn(async move {
        if let Err(e) = refresher.refresh(paths).await {
            tracing::error!(error = %e, "Refresh failed");
        }
    });

    Ok(Json(serde_json::json!({
        "refreshing": true,
        "already_in_progress": already_refreshing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct FileGroupsQuery {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// A page of file groups with the pagination window.
#[tracing::instrument(skip(state))]
pub async fn list_file_groups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileGroupsQuery>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let offset = query.offset.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 500);

    let total = state.file_groups.count().await?;
    let file_groups = state.file_groups.list_page(offset, limit).await?;
    let pagination = create_pagination(offset as u64, limit as u64, total as u64);

    Ok(Json(serde_json::json!({
        "file_groups": file_groups,
        "pagination": pagination,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagFileGroupRequest {
    pub tag_name: String,
}

/// Attach a tag to a file group, creating the tag when missing.
#[tracing::instrument(skip(state, request))]
pub async fn tag_file_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TagFileGroupRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let file_group = state
        .file_groups
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cannot find file group with id {}", id)))?;
    let tag = state.tags.find_or_create(&request.tag_name, None).await?;
    state.tags.tag_file_group(tag.id, file_group.id).await?;
    state.switches.activate_switch("save_tags_config");
    Ok(Json(serde_json::json!({ "tagged": file_group.id })))
}

/// Detach a tag from a file group.
#[tracing::instrument(skip(state, request))]
pub async fn untag_file_group(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TagFileGroupRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let tag = state
        .tags
        .get_by_name(&request.tag_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cannot find tag {}", request.tag_name)))?;
    let removed = state.tags.untag_file_group(tag.id, id).await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "File group {} does not have tag {}",
            id, request.tag_name
        ))
        .into());
    }
    Ok(Json(serde_json::json!({ "untagged": id })))
}

/// Refresh progress summary for dashboards.
#[tracing::instrument(skip(state))]
pub async fn files_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let total = state.file_groups.count().await?;
    let archives = state.archives.count().await?;
    let videos = state.videos.count().await?;
    Ok(Json(serde_json::json!({
        "refreshing": state.flags.is_refreshing(),
        "file_groups": total,
        "archives": archives,
        "videos": videos,
    })))
}
