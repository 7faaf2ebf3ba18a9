use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use arca_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// ISO 8601; only events after this instant are returned.
    #[serde(default)]
    pub after: Option<String>,
}

/// The bounded event feed, most recent first.
#[tracing::instrument(skip(state))]
pub async fn events_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<serde_json::Value>, HttpAppError> {
    let after: Option<DateTime<Utc>> = match query.after.as_deref() {
        Some(after) => Some(
            after
                .parse()
                .map_err(|_| AppError::Validation(format!("Cannot parse datetime: {}", after)))?,
        ),
        None => None,
    };

    let events = state.events.events_since(after);
    Ok(Json(serde_json::json!({ "events": events })))
}
