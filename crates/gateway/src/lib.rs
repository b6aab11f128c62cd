//! HTTP gateway for Agora.
//!
//! Exposes a health check and the persona chat API under `/api`, with
//! buffered JSON and paced SSE delivery.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod delivery;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use agora_config::{AppConfig, GatewayConfig};
use agora_providers::CompletionGateway;

pub use api::{AppState, SharedState};
pub use delivery::{ResponseDeliverer, StreamFrame};

/// Request bodies larger than this are rejected with 413.
const BODY_LIMIT: usize = 1024 * 1024;

/// Build the full router.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Shared state for a configuration: one provider handle for the process.
pub fn state_from_config(config: &AppConfig) -> Result<SharedState, agora_core::ProviderError> {
    let provider = agora_providers::build_from_config(config)?;
    let gateway = CompletionGateway::from_config(provider, config);
    let deliverer = ResponseDeliverer::from_config(gateway, &config.streaming);
    Ok(Arc::new(AppState::new(deliverer)))
}

/// Start the gateway HTTP server and run until Ctrl+C / SIGTERM.
pub async fn start(config: AppConfig) -> agora_core::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = state_from_config(&config)?;
    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        model = %config.model,
        frame_delay_ms = config.streaming.frame_delay_ms,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
