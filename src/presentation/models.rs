//! API request and response models
//!
//! The wire contract is camelCase; domain types stay snake_case and are
//! mapped here at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::entities::{CorrelatedResult, Workflow, WorkflowOptions};

/// Request model for launching a recon-to-web2 workflow
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowRequest {
    /// Root domain to run the pipeline against
    #[schema(example = "example.com")]
    pub domain: String,

    /// Optional per-run overrides; unset fields fall back to server defaults
    #[serde(default)]
    pub options: Option<WorkflowOptionsDto>,
}

/// Per-run workflow options
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptionsDto {
    /// Reconnaissance profile forwarded to the recon provider
    #[schema(example = "standard")]
    pub recon_profile: Option<String>,

    /// Scan types to request, e.g. ["sqli", "xss"]
    pub scan_types: Option<Vec<String>>,

    /// Upper bound on concurrent scans within this workflow
    #[schema(example = 5)]
    pub max_concurrent: Option<usize>,

    /// Per-target scan timeout in seconds
    #[schema(example = 60)]
    pub target_timeout_seconds: Option<u64>,
}

impl WorkflowOptionsDto {
    /// Resolve request overrides against configured defaults.
    pub fn resolve(self, defaults: &EngineConfig) -> WorkflowOptions {
        WorkflowOptions {
            recon_profile: self
                .recon_profile
                .unwrap_or_else(|| defaults.default_recon_profile.clone()),
            scan_types: self
                .scan_types
                .unwrap_or_else(|| defaults.default_scan_types.clone()),
            max_concurrent: self
                .max_concurrent
                .unwrap_or(defaults.default_max_concurrent_scans),
            target_timeout_seconds: self
                .target_timeout_seconds
                .unwrap_or(defaults.default_target_timeout_seconds),
        }
    }
}

/// Response model for workflow acceptance
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    /// Workflow ID for status polling
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub workflow_id: Uuid,

    /// Workflow status at acceptance
    #[schema(example = "pending")]
    pub status: String,

    #[schema(example = "Workflow accepted")]
    pub message: String,
}

/// Per-phase progress entry
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDto {
    #[schema(example = "reconnaissance")]
    pub name: String,

    #[schema(example = "running")]
    pub status: String,

    /// Completion percentage, 0-100
    #[schema(example = 40)]
    pub progress: u8,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Workflow status response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub workflow_id: Uuid,
    pub domain: String,

    #[schema(example = "running")]
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// The four pipeline phases in execution order
    pub phases: Vec<PhaseDto>,

    /// Workflow-level error, set when status is failed
    pub error: Option<String>,

    /// True when a process restart interrupted the run
    pub interrupted: bool,
}

impl From<Workflow> for StatusResponse {
    fn from(workflow: Workflow) -> Self {
        Self {
            workflow_id: workflow.id,
            domain: workflow.domain,
            status: workflow.status.to_string(),
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
            phases: workflow
                .phases
                .into_iter()
                .map(|phase| PhaseDto {
                    name: phase.name.to_string(),
                    status: phase.status.to_string(),
                    progress: phase.progress,
                    started_at: phase.started_at,
                    finished_at: phase.finished_at,
                    error: phase.error,
                })
                .collect(),
            error: workflow.error,
            interrupted: workflow.interrupted,
        }
    }
}

/// Workflow-level totals
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub total_subdomains: usize,
    pub targets_scanned: usize,
    pub total_vulnerabilities: usize,
    pub by_severity: SeverityBreakdownDto,
}

/// Finding counts per severity
#[derive(Debug, Serialize, ToSchema)]
pub struct SeverityBreakdownDto {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

/// A target whose aggregate risk crossed the reporting threshold
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskTargetDto {
    #[schema(example = "api.example.com")]
    pub target: String,

    /// Weighted severity sum, capped at 100
    #[schema(example = 85)]
    pub risk_score: u32,

    pub vulnerabilities: usize,
}

/// Cross-phase correlation note
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationDto {
    #[schema(example = "ct_auth_exposure")]
    pub rule: String,

    pub target: String,
    pub description: String,
}

/// Final correlated results response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub workflow_id: Uuid,
    pub summary: SummaryDto,
    pub high_risk_targets: Vec<HighRiskTargetDto>,
    pub correlations: Vec<CorrelationDto>,
    pub generated_at: DateTime<Utc>,
}

impl ResultsResponse {
    pub fn from_result(workflow_id: Uuid, result: CorrelatedResult) -> Self {
        Self {
            workflow_id,
            summary: SummaryDto {
                total_subdomains: result.summary.total_subdomains,
                targets_scanned: result.summary.targets_scanned,
                total_vulnerabilities: result.summary.total_vulnerabilities,
                by_severity: SeverityBreakdownDto {
                    critical: result.summary.by_severity.critical,
                    high: result.summary.by_severity.high,
                    medium: result.summary.by_severity.medium,
                    low: result.summary.by_severity.low,
                    info: result.summary.by_severity.info,
                },
            },
            high_risk_targets: result
                .high_risk_targets
                .into_iter()
                .map(|t| HighRiskTargetDto {
                    target: t.target,
                    risk_score: t.risk_score,
                    vulnerabilities: t.vulnerabilities,
                })
                .collect(),
            correlations: result
                .correlations
                .into_iter()
                .map(|c| CorrelationDto {
                    rule: c.rule,
                    target: c.target,
                    description: c.description,
                })
                .collect(),
            generated_at: result.generated_at,
        }
    }
}

/// Response model for a stop request
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub workflow_id: Uuid,

    #[schema(example = "stopping")]
    pub status: String,

    #[schema(example = "Stop requested; the workflow halts at its next checkpoint")]
    pub message: String,
}

/// Standard error response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "WORKFLOW_NOT_FOUND")]
    pub code: String,

    /// Human-readable error message
    #[schema(example = "workflow 550e8400-e29b-41d4-a716-446655440000 not found")]
    pub message: String,

    /// Unique request identifier for tracking and support
    pub request_id: Uuid,

    /// Error occurrence timestamp
    #[schema(example = "2024-01-15T10:30:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service health status
    #[schema(example = "healthy")]
    pub status: String,

    /// Current service version
    #[schema(example = "0.3.1")]
    pub version: String,

    /// Health check timestamp
    pub timestamp: DateTime<Utc>,
}
