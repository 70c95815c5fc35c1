//! HTTP API for the shopping assistant.
//!
//! This module provides the endpoints for:
//! - Running dialogue turns and managing the conversation history
//! - Reading and updating the user profile
//! - Listing products and serving product images
//! - Health and metrics monitoring

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::ollama::ChatModel;
use crate::service::AssistantService;

pub mod chat;
pub mod products;
pub mod profiles;
use chat::{chat_handler, history_handler, reset_handler};
use products::{product_image_handler, products_handler};
use profiles::{get_profile_handler, list_profiles_handler, update_profile_handler};

/// Application state
pub struct AppState<M> {
    pub service: Arc<AssistantService<M>>,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router
pub fn router<M: ChatModel>(
    service: Arc<AssistantService<M>>,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let cors = cors_layer(&service.config().server.cors_origins);
    let state = Arc::new(AppState { service, metrics });

    Router::new()
        .route("/chat", post(chat_handler::<M>))
        .route("/reset", post(reset_handler::<M>))
        .route("/history", get(history_handler::<M>))
        .route(
            "/user-profile",
            get(get_profile_handler::<M>).post(update_profile_handler::<M>),
        )
        .route("/user-profiles", get(list_profiles_handler::<M>))
        .route("/products", get(products_handler::<M>))
        .route(
            "/api/product-images/{product_type}/{product_id}",
            get(product_image_handler::<M>),
        )
        .route("/health", get(health_handler::<M>))
        .route("/metrics", get(metrics_handler::<M>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured frontend origins; unparseable origins are skipped
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

// === Health & Metrics ===

async fn health_handler<M: ChatModel>(State(state): State<Arc<AppState<M>>>) -> Json<HealthResponse> {
    let model_available = state.service.model_available().await;

    let status = if model_available {
        "healthy".to_string()
    } else {
        "degraded: model backend unavailable".to_string()
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.service.uptime_secs(),
        model_available,
        product_type: state.service.product_type().to_string(),
        products: state.service.catalog().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    model_available: bool,
    product_type: String,
    products: usize,
}

async fn metrics_handler<M: ChatModel>(State(state): State<Arc<AppState<M>>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics recorder not installed\n".to_string(),
        ),
    }
}
