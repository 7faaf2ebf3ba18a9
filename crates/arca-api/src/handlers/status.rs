use axum::extract::State;
use axum::response::Json;
use std::sync::Arc;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Runtime flags and entity counts for the dashboard.
#[tracing::instrument(skip(state))]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let file_groups = state.file_groups.count().await?;
    let archives = state.archives.count().await?;
    let videos = state.videos.count().await?;

    Ok(Json(serde_json::json!({
        "wrol_mode": state.flags.is_wrol_mode() || state.config.is_wrol_mode(),
        "refreshing": state.flags.is_refreshing(),
        "downloads_disabled": state.flags.downloads_disabled(),
        "downloads_stopped": state.flags.downloads_stopped(),
        "counts": {
            "file_groups": file_groups,
            "archives": archives,
            "videos": videos,
        },
    })))
}
