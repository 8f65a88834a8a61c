//! Metric feeds and the force-refresh action.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::headers::conditional_json;
use super::{not_found, ApiError, AppState};
use crate::feed::{build_feed, MetricFeed};

pub async fn list_feeds(State(state): State<AppState>) -> Json<Vec<MetricFeed>> {
    let now = Utc::now();
    let registry = state.registry.read().await;
    Json(
        registry
            .iter()
            .map(|instance| build_feed(&instance.coordinator, now))
            .collect(),
    )
}

pub async fn get_feed(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let instance = state
        .registry
        .read()
        .await
        .get(&instance_id)
        .ok_or_else(|| not_found(&instance_id))?;

    let feed = build_feed(&instance.coordinator, Utc::now());
    let body = serde_json::to_vec(&feed).map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to serialize feed: {}", err) })),
        )
    })?;

    Ok(conditional_json(
        &request_headers,
        feed.version.as_bytes(),
        body,
        feed.data_as_of,
    ))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub instance_id: String,
    pub last_update_success: bool,
    pub fetched_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn force_refresh(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let instance = state
        .registry
        .read()
        .await
        .get(&instance_id)
        .ok_or_else(|| not_found(&instance_id))?;

    tracing::info!("[{}] Force refresh requested", instance_id);
    let outcome = instance.trigger.force_refresh().await;
    let coordinator = &instance.coordinator;

    Ok(Json(RefreshResponse {
        instance_id,
        last_update_success: coordinator.last_update_success(),
        fetched_at: coordinator.snapshot().and_then(|s| s.fetched_at.clone()),
        error: outcome.err().map(|err| err.to_string()),
    }))
}
