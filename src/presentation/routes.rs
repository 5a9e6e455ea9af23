//! Route definitions and router assembly

use axum::http::StatusCode;
use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::presentation::{
    controllers::{
        AppState, get_results, get_status, health_check, start_workflow, stop_workflow,
    },
    models::*,
};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::start_workflow,
        crate::presentation::controllers::get_status,
        crate::presentation::controllers::get_results,
        crate::presentation::controllers::stop_workflow,
        crate::presentation::controllers::health_check
    ),
    components(
        schemas(
            StartWorkflowRequest,
            WorkflowOptionsDto,
            AcceptedResponse,
            StatusResponse,
            PhaseDto,
            ResultsResponse,
            SummaryDto,
            SeverityBreakdownDto,
            HighRiskTargetDto,
            CorrelationDto,
            StopResponse,
            ErrorResponse,
            HealthResponse
        )
    ),
    tags(
        (name = "workflows", description = "Recon-to-web2 workflow orchestration endpoints"),
        (name = "health", description = "Service health monitoring endpoints")
    ),
    info(
        title = "Reconflow API",
        version = "0.3.1",
        description = "Workflow orchestration for the reconnaissance → target extraction → web2 scanning → correlation pipeline."
    )
)]
pub struct ApiDoc;

/// Create the application router with the middleware stack.
pub fn create_router(state: AppState, config: Arc<Config>) -> Router {
    let api_routes = Router::new()
        .route("/workflows/recon-to-web2", post(start_workflow))
        .route("/workflows/{id}/status", get(get_status))
        .route("/workflows/{id}/results", get(get_results))
        .route("/workflows/{id}/stop", post(stop_workflow));

    async fn root_handler() -> Response {
        axum::Json(serde_json::json!({
            "name": "Reconflow API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Recon-to-web2 workflow orchestration API",
            "endpoints": {
                "health": "/health",
                "api": "/api/v1",
                "docs": "/docs"
            }
        }))
        .into_response()
    }

    // CORS for dashboard polling clients; wildcard is fine here since the
    // API carries no cookie credentials.
    let cors_layer = if config.server.allowed_origins.len() == 1
        && config.server.allowed_origins[0] == "*"
    {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::any())
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .server
            .allowed_origins
            .iter()
            .filter_map(|origin| {
                axum::http::HeaderValue::from_str(origin)
                    .map_err(|_| {
                        tracing::warn!(origin, "Invalid CORS origin in config; skipping");
                    })
                    .ok()
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    };

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/", get(root_handler))
        .route("/health", get(health_check));

    // Swagger UI is configurable off for hardened deployments.
    if config.server.enable_docs {
        router =
            router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(config.server.request_timeout_seconds),
                )),
        )
        .with_state(state)
}
