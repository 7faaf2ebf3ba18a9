use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use arca_core::models::CollectionKind;
use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state))]
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let channels = state.channels.list().await?;
    let count = channels.len();
    Ok(Json(serde_json::json!({
        "channels": channels,
        "count": count,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Directory relative to the media root; defaults to
    /// `videos/<name>`.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub tag_name: Option<String>,
}

/// Create a channel together with its collection; their lifecycles are
/// coupled.
#[tracing::instrument(skip(state, request))]
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChannelRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    if state.flags.is_wrol_mode() || state.config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Channels cannot be created while WROL mode is enabled".to_string(),
        )
        .into());
    }
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Channel name cannot be empty".to_string()).into());
    }
    if state.channels.get_by_name(name).await?.is_some() {
        return Err(AppError::Conflict(format!("Channel {} already exists", name)).into());
    }

    let directory = match &request.directory {
        Some(directory) => state.config.resolve_media_path(directory)?,
        None => state.config.videos_directory().join(name),
    };
    let directory = directory.to_string_lossy().into_owned();

    let collection = state
        .collections
        .find_or_create(name, CollectionKind::Channel, Some(&directory))
        .await?;
    if let Some(tag_name) = &request.tag_name {
        let tag = state.tags.find_or_create(tag_name, None).await?;
        state
            .collections
            .set_tag_and_directory(collection.id, Some(tag.id), Some(&directory))
            .await?;
    }

    let channel = state
        .channels
        .create(name, request.url.as_deref(), Some(&directory), collection.id)
        .await?;

    state.switches.activate_switch("save_channels_config");
    state
        .events
        .send_created(&format!("Created channel {}", channel.name));
    Ok(Json(serde_json::json!({ "channel": channel })))
}

#[tracing::instrument(skip(state))]
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let channel = state
        .channels
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cannot find channel with id {}", id)))?;
    let collection = state.collections.get(channel.collection_id).await?;
    Ok(Json(serde_json::json!({
        "channel": channel,
        "collection": collection,
    })))
}

/// Delete a channel and its coupled collection. Videos survive as orphans;
/// files stay on disk.
#[tracing::instrument(skip(state))]
pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    if state.flags.is_wrol_mode() || state.config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Channels cannot be deleted while WROL mode is enabled".to_string(),
        )
        .into());
    }
    let channel = state
        .channels
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cannot find channel with id {}", id)))?;

    // The channel row cascades from its collection.
    state.collections.delete(channel.collection_id).await?;
    state.switches.activate_switch("save_channels_config");
    state
        .events
        .send_deleted(&format!("Deleted channel {}", channel.name));
    Ok(Json(serde_json::json!({ "deleted": channel.id })))
}
