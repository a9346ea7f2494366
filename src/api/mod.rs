//! 🌐 HTTP + websocket surface

pub mod analysis;
pub mod metrics;
pub mod ws;

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::jobs::{AnalysisOrchestrator, OrchestratorError};
use crate::metrics::ServiceMetrics;
use crate::notify::BroadcastNotifier;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: AnalysisOrchestrator,
    pub metrics: Arc<ServiceMetrics>,
    pub notifier: Arc<BroadcastNotifier>,
}

/// Error body is `{"detail": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidAddress(_) => {
                ApiError::BadRequest("Invalid Solana address format".to_string())
            }
            OrchestratorError::NotFound(_) => ApiError::NotFound("Job not found".to_string()),
            OrchestratorError::NotCompleted(_) => ApiError::BadRequest(
                "Analysis not completed or no results available".to_string(),
            ),
            OrchestratorError::ExportUnavailable(_) => {
                ApiError::NotFound("Export file not found".to_string())
            }
            OrchestratorError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(detail) => {
                error!("❌ Request failed: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze/token", post(analysis::analyze_token))
        .route("/analysis", get(analysis::list_analyses))
        .route("/analysis/:job_id", get(analysis::get_analysis))
        .route("/analysis/:job_id/csv", get(analysis::export_csv))
        .route("/analysis/:job_id/axiom", get(analysis::export_wallet_tracker))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/metrics/health", get(metrics::health_handler))
        .route("/ws", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Counts requests and error responses per matched route
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    state.metrics.http_request(&endpoint);
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.metrics.http_error(&endpoint);
    }
    response
}

pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("✓ API listening on http://{}", addr);
        info!("  • Metrics endpoint: http://{}/metrics", addr);
        info!("  • Notifications:    ws://{}/ws", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received, draining connections");
}
