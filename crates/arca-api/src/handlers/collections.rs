use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use arca_core::models::CollectionKind;
use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    /// Comma-separated tag names.
    #[serde(default)]
    pub tag_names: Option<String>,
}

fn parse_kind(kind: Option<&str>) -> Result<Option<CollectionKind>, AppError> {
    match kind {
        Some(kind) => kind
            .parse::<CollectionKind>()
            .map(Some)
            .map_err(|e| AppError::Validation(e.to_string())),
        None => Ok(None),
    }
}

#[tracing::instrument(skip(state))]
pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let tag_names: Option<Vec<String>> = query
        .tag_names
        .as_deref()
        .map(|names| names.split(',').map(str::to_string).collect());

    let views = if query.search.is_some() || tag_names.is_some() {
        state
            .collection_service
            .search(kind, tag_names.as_deref(), query.search.as_deref())
            .await?
    } else {
        state.collection_service.list(kind).await?
    };

    let count = views.len();
    Ok(Json(serde_json::json!({
        "collections": views,
        "count": count,
    })))
}

#[tracing::instrument(skip(state))]
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let view = state.collection_service.get_with_stats(id).await?;
    Ok(Json(serde_json::json!({ "collection": view })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCollectionRequest {
    /// New directory relative to the media root; empty string clears it.
    #[serde(default)]
    pub directory: Option<String>,
    /// New tag name; empty string clears the tag.
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[tracing::instrument(skip(state, request))]
pub async fn update_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCollectionRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let collection = state
        .collection_service
        .update_collection(id, request.directory, request.tag_name, request.description)
        .await?;
    Ok(Json(serde_json::json!({ "collection": collection })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TagCollectionRequest {
    /// Tag to apply; omitted removes the current tag.
    #[serde(default)]
    pub tag_name: Option<String>,
    /// Target directory relative to the media root.
    #[serde(default)]
    pub directory: Option<String>,
}

/// Tag (or untag) a collection, moving its files when the directory changes.
#[tracing::instrument(skip(state, request))]
pub async fn tag_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<TagCollectionRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let outcome = state
        .collection_service
        .tag_collection(id, request.tag_name, request.directory)
        .await?;
    Ok(Json(serde_json::to_value(outcome).map_err(AppError::from)?))
}

#[derive(Debug, Deserialize)]
pub struct TagInfoQuery {
    #[serde(default)]
    pub tag_name: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn get_tag_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<TagInfoQuery>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let info = state
        .collection_service
        .get_tag_info(id, query.tag_name.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(info).map_err(AppError::from)?))
}

#[tracing::instrument(skip(state))]
pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let collection = state.collection_service.delete_collection(id).await?;
    Ok(Json(serde_json::json!({
        "id": collection.id,
        "name": collection.name,
        "kind": collection.kind,
    })))
}

/// Refresh every file under the collection's directory.
#[tracing::instrument(skip(state))]
pub async fn refresh_collection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    state.collection_service.refresh_collection(id).await?;
    Ok(Json(serde_json::json!({ "refreshing": true })))
}
