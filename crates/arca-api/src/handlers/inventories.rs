use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[tracing::instrument(skip(state))]
pub async fn list_inventories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let inventories = state.inventories.list().await?;
    Ok(Json(serde_json::json!({ "inventories": inventories })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInventoryRequest {
    pub name: String,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_inventory(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateInventoryRequest>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Inventory name cannot be empty".to_string()).into());
    }
    let inventory = state.inventories.create(&request.name).await?;
    state.switches.activate_switch("save_inventories_config");
    Ok(Json(serde_json::json!({ "inventory": inventory })))
}

#[tracing::instrument(skip(state))]
pub async fn get_inventory_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let inventory = state
        .inventories
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cannot find inventory with id {}", id)))?;
    let items = state.inventories.items(inventory.id).await?;
    Ok(Json(serde_json::json!({
        "inventory": inventory,
        "items": items,
    })))
}

#[tracing::instrument(skip(state))]
pub async fn delete_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let deleted = state.inventories.soft_delete(id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Cannot find inventory with id {}", id)).into());
    }
    state.switches.activate_switch("save_inventories_config");
    Ok(Json(serde_json::json!({ "deleted": id })))
}
