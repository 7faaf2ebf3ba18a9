//! Route table

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // Downloads
        .route(
            "/download",
            post(handlers::downloads::create_downloads).get(handlers::downloads::list_downloads),
        )
        .route("/download/retry_failed", post(handlers::downloads::retry_failed))
        .route(
            "/download/{id}",
            get(handlers::downloads::get_download).delete(handlers::downloads::delete_download),
        )
        .route("/download/{id}/kill", post(handlers::downloads::kill_download))
        .route(
            "/download/{id}/restart",
            post(handlers::downloads::restart_download),
        )
        // Collections
        .route("/collections", get(handlers::collections::list_collections))
        .route(
            "/collections/{id}",
            get(handlers::collections::get_collection)
                .post(handlers::collections::update_collection)
                .delete(handlers::collections::delete_collection),
        )
        .route(
            "/collections/{id}/tag",
            post(handlers::collections::tag_collection),
        )
        .route(
            "/collections/{id}/tag_info",
            get(handlers::collections::get_tag_info),
        )
        .route(
            "/collections/{id}/refresh",
            post(handlers::collections::refresh_collection),
        )
        // Tags
        .route(
            "/tags",
            get(handlers::tags::list_tags).post(handlers::tags::create_tag),
        )
        .route("/tags/{name}", delete(handlers::tags::delete_tag))
        // Files
        .route("/files/refresh", post(handlers::files::refresh_files))
        .route("/files/file_groups", get(handlers::files::list_file_groups))
        .route(
            "/files/file_groups/{id}/tag",
            post(handlers::files::tag_file_group).delete(handlers::files::untag_file_group),
        )
        .route("/files/status", get(handlers::files::files_status))
        // Events
        .route("/events/feed", get(handlers::events::events_feed))
        // Archives
        .route("/archive/upload", post(handlers::archive_upload::upload_archive))
        .route(
            "/archive/{id}",
            get(handlers::archives::get_archive).delete(handlers::archives::delete_archive),
        )
        .route(
            "/archive/{id}/history",
            get(handlers::archives::get_archive_history),
        )
        // Channels
        .route(
            "/channels",
            get(handlers::channels::list_channels).post(handlers::channels::create_channel),
        )
        .route(
            "/channels/{id}",
            get(handlers::channels::get_channel).delete(handlers::channels::delete_channel),
        )
        // Status
        .route("/status", get(handlers::status::get_status))
        // Inventories
        .route(
            "/inventories",
            get(handlers::inventories::list_inventories)
                .post(handlers::inventories::create_inventory),
        )
        .route(
            "/inventories/{id}",
            get(handlers::inventories::get_inventory_items)
                .delete(handlers::inventories::delete_inventory),
        )
        // Health
        .route("/health", get(health));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
