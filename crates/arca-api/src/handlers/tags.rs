use axum::extract::{Path, State};
use axum::response::Json;
use std::sync::Arc;

use arca_core::models::tag::{CreateTagRequest, TagResponse};
use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state))]
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let tags: Vec<TagResponse> = state
        .tags
        .list()
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect();
    Ok(Json(serde_json::json!({ "tags": tags })))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTagRequest>,
) -> Result<Json<TagResponse>, HttpAppError> {
    if state.flags.is_wrol_mode() || state.config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Tags cannot be modified while WROL mode is enabled".to_string(),
        )
        .into());
    }
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Tag name cannot be empty".to_string()).into());
    }

    let tag = state
        .tags
        .upsert(request.name.trim(), request.color.as_deref())
        .await?;
    state.switches.activate_switch("save_tags_config");
    Ok(Json(TagResponse::from(tag)))
}

#[tracing::instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    if state.flags.is_wrol_mode() || state.config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Tags cannot be modified while WROL mode is enabled".to_string(),
        )
        .into());
    }

    let deleted = state.tags.delete_by_name(&name).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Cannot find tag {}", name)).into());
    }
    state.switches.activate_switch("save_tags_config");
    Ok(Json(serde_json::json!({ "deleted": name })))
}
