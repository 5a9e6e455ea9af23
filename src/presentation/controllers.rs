//! HTTP controllers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::application::{EngineError, WorkflowEngine};
use crate::config::Config;
use crate::presentation::models::{
    AcceptedResponse, ErrorResponse, HealthResponse, ResultsResponse, StartWorkflowRequest,
    StatusResponse, StopResponse,
};

/// Shared state for all workflow endpoints.
#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine,
    pub config: Arc<Config>,
}

/// Engine errors mapped onto HTTP responses.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND"),
            EngineError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_WORKFLOW_STATE"),
            EngineError::NotReady(_) => (StatusCode::CONFLICT, "RESULTS_NOT_READY"),
            EngineError::Transition(_) => (StatusCode::CONFLICT, "INVALID_WORKFLOW_STATE"),
            EngineError::Store(err) => {
                error!(error = %err, "Persistence failure surfaced to API");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: self.0.to_string(),
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/v1/workflows/recon-to-web2 - Launch a workflow
#[utoipa::path(
    post,
    path = "/api/v1/workflows/recon-to-web2",
    request_body = StartWorkflowRequest,
    responses(
        (status = 202, description = "Workflow accepted", body = AcceptedResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn start_workflow(
    State(state): State<AppState>,
    Json(request): Json<StartWorkflowRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let options = request
        .options
        .unwrap_or_default()
        .resolve(&state.config.engine);
    let workflow_id = state.engine.start(&request.domain, options).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            workflow_id,
            status: "pending".to_string(),
            message: "Workflow accepted".to_string(),
        }),
    ))
}

/// GET /api/v1/workflows/{id}/status - Poll workflow progress
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Workflow ID")
    ),
    responses(
        (status = 200, description = "Current workflow state", body = StatusResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let workflow = state.engine.status(id).await?;
    Ok(Json(StatusResponse::from(workflow)))
}

/// GET /api/v1/workflows/{id}/results - Fetch correlated results
#[utoipa::path(
    get,
    path = "/api/v1/workflows/{id}/results",
    params(
        ("id" = Uuid, Path, description = "Workflow ID")
    ),
    responses(
        (status = 200, description = "Correlated results", body = ResultsResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Workflow has not completed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn get_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let result = state.engine.results(id).await?;
    Ok(Json(ResultsResponse::from_result(id, result)))
}

/// POST /api/v1/workflows/{id}/stop - Request a cooperative stop
#[utoipa::path(
    post,
    path = "/api/v1/workflows/{id}/stop",
    params(
        ("id" = Uuid, Path, description = "Workflow ID")
    ),
    responses(
        (status = 202, description = "Stop accepted", body = StopResponse),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
        (status = 409, description = "Workflow already terminal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "workflows"
)]
pub async fn stop_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<StopResponse>), ApiError> {
    state.engine.stop(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StopResponse {
            workflow_id: id,
            status: "stopping".to_string(),
            message: "Stop requested; the workflow halts at its next checkpoint".to_string(),
        }),
    ))
}

/// GET /health - Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}
