use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use forge_core::pipeline::{
    PipelineError, PipelineOutcome, PlanRequest, PlanningPipeline, RejectReason,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyBrief => Self::bad_request(err.to_string()),
            PipelineError::Cancelled => Self::unavailable(err.to_string()),
            other => Self::internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// HTTP status for a planning outcome.
fn outcome_status(outcome: &PipelineOutcome) -> StatusCode {
    match outcome {
        PipelineOutcome::Success { .. } => StatusCode::OK,
        PipelineOutcome::Rejected { reason, .. } => match reason {
            RejectReason::NoContent | RejectReason::LowConfidence => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RejectReason::GenerationFailed => StatusCode::BAD_GATEWAY,
        },
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pipeline: Arc<PlanningPipeline>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/plans", post(create_plan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pipeline: Arc<PlanningPipeline>, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pipeline);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("forge serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("forge serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run the pipeline on its own task. If the client goes away, axum drops
/// this future, the drop guard fires and the pipeline stops at its next
/// await point.
async fn create_plan(
    State(pipeline): State<Arc<PlanningPipeline>>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let task = tokio::spawn(async move { pipeline.plan_product(&request, &cancel).await });
    let joined = task.await;
    guard.disarm();

    let outcome = joined
        .map_err(|e| AppError::internal(anyhow::anyhow!("planning task failed: {e}")))??;
    Ok((outcome_status(&outcome), Json(outcome)).into_response())
}
