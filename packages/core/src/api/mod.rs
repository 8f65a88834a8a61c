//! HTTP adapter exposing instance feeds and actions to the host.

pub mod headers;
pub mod health;
pub mod instances;
pub mod providers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::metrics::AppMetrics;
use crate::registry::InstanceRegistry;
use crate::services::RatesClient;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<InstanceRegistry>>,
    pub metrics: Arc<AppMetrics>,
    /// Client used for provider discovery.
    pub catalog_client: RatesClient,
}

pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn not_found(instance_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Unknown instance '{}'", instance_id) })),
    )
}

/// Assemble the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(render_metrics))
        .route("/instances", get(instances::list_feeds))
        .route("/instances/:id", get(instances::get_feed))
        .route("/instances/:id/refresh", post(instances::force_refresh))
        .route("/providers", get(providers::list_providers))
        .layer(middleware::from_fn_with_state(state.clone(), track_http))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    let built = match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body)),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("metrics error"))
        }
    };
    built.unwrap_or_else(|_| Response::new(Body::empty()))
}

async fn track_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    state
        .metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    state
        .metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());
    response
}
