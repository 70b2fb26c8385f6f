//! Server — router assembly, HTTP handlers, and tracing setup.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use serde_json::json;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::warn;

use crate::config::{HubConfig, LogFormat};
use crate::state::AppState;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.server.enable_cors {
        // Use the actual origins from config
        let origins = state
            .config
            .server
            .cors_origins
            .iter()
            .filter_map(|s| s.parse::<axum::http::HeaderValue>().ok())
            .collect::<Vec<_>>();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    } else {
        // When CORS is disabled, use a restrictive layer (same-origin only)
        CorsLayer::new()
    };

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    // Request timeout applies to the control-plane routes only. The SSE
    // stream is long-lived and must never be cut by a request timeout.
    let ban_router = Router::new()
        .route("/api/bans", post(crate::bans::ban_ip))
        .route("/api/bans/{ip}", delete(crate::bans::unban_ip))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state.clone());

    Router::new()
        // Health endpoints (no body limit needed)
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        // Live event stream
        .route("/api/events/stream", get(crate::events::stream_events))
        // Root endpoint
        .route("/", get(root_handler))
        .with_state(state)
        // Ban control plane
        .merge(ban_router)
        .layer(
            ServiceBuilder::new()
                // Limit request body size to 1MB to prevent abuse
                .layer(DefaultBodyLimit::max(1024 * 1024))
                .layer(cors),
        )
}

/// Root handler - shows API info
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Evetail Hub",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "events": "/api/events/stream",
            "bans": "/api/bans",
            "health": "/health",
            "ready": "/ready",
            "metrics": "/metrics"
        }
    }))
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "viewers": state.fanout.viewer_count(),
        })),
    )
}

/// Readiness check handler - not ready once shutdown has begun
async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    let shutting_down = *state.shutdown_tx.borrow();
    let status = if shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "ready": !shutting_down,
            "durable": state.config.broker.durable_name,
        })),
    )
}

/// Metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.metrics;

    Json(json!({
        "viewers": {
            "active": metrics.active_viewers(),
            "total_connected": metrics.total_viewers(),
        },
        "fanout": {
            "delivered": metrics.delivered_count(),
            "dropped": metrics.dropped_count(),
        },
        "consumer": {
            "acked": metrics.acked_count(),
            "nacked": metrics.nacked_count(),
            "poison_payloads": metrics.poison_count(),
        }
    }))
}

/// Phase 1: Basic tracing so we can log during config loading.
/// Uses set_default (thread-local) so it can be replaced by Phase 2's
/// global subscriber.
pub fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hub=debug"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Phase 2: Re-initialize tracing with configuration values.
/// This replaces the global subscriber with one that respects config.
pub fn init_tracing_from_config(config: &HubConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Prefer RUST_LOG env var, fall back to config level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
