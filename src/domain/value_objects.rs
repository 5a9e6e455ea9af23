//! Orchestrator value objects

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Overall workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow created, pipeline not yet started
    Pending,
    /// Pipeline is executing phases
    Running,
    /// All four phases finished and the correlated result is available
    Completed,
    /// A phase failed and the workflow was aborted
    Failed,
    /// Cooperative stop was observed at a checkpoint
    Stopped,
}

impl WorkflowStatus {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Pending ──► Running ──► Completed
    ///   │           │
    ///   │           ├──► Failed
    ///   └───────────┴──► Stopped
    /// ```
    ///
    /// `Pending → Failed` exists for the restart-recovery sweep, which marks
    /// workflows it cannot resume as failed regardless of how far they got.
    pub fn valid_transitions(&self) -> &[WorkflowStatus] {
        match self {
            Self::Pending => &[Self::Running, Self::Stopped, Self::Failed],
            Self::Running => &[Self::Completed, Self::Failed, Self::Stopped],
            Self::Completed | Self::Failed | Self::Stopped => &[],
        }
    }

    /// Check whether transitioning to `target` is allowed from the current state.
    pub fn can_transition_to(&self, target: &WorkflowStatus) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Whether this status represents a terminal (final) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Recorded state transition for a workflow (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Human-readable reason or context for the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid workflow transition from {from} to {to}")]
pub struct TransitionError {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
}

/// Status of a single pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Halted by a cooperative stop; outcomes drained before the stop are
    /// kept on the phase.
    Stopped,
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Fixed pipeline phase identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Reconnaissance,
    TargetExtraction,
    Web2Scanning,
    Correlation,
}

impl PhaseName {
    /// Every phase in mandated execution order.
    pub const ALL: [PhaseName; 4] = [
        Self::Reconnaissance,
        Self::TargetExtraction,
        Self::Web2Scanning,
        Self::Correlation,
    ];
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reconnaissance => write!(f, "reconnaissance"),
            Self::TargetExtraction => write!(f, "target_extraction"),
            Self::Web2Scanning => write!(f, "web2_scanning"),
            Self::Correlation => write!(f, "correlation"),
        }
    }
}

/// Reconnaissance technique that discovered a host (provenance).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ReconTechnique {
    SubdomainEnumeration,
    CertificateTransparency,
    DnsBruteforce,
    WebCrawl,
}

impl std::fmt::Display for ReconTechnique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubdomainEnumeration => write!(f, "subdomain_enumeration"),
            Self::CertificateTransparency => write!(f, "certificate_transparency"),
            Self::DnsBruteforce => write!(f, "dns_bruteforce"),
            Self::WebCrawl => write!(f, "web_crawl"),
        }
    }
}

/// Inferred kind of a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Web,
    Api,
}

/// Per-target scan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    Failed,
    Timeout,
}

/// Severity of a vulnerability finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Contribution of one finding of this severity to a target's risk score.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Critical => 40,
            Self::High => 25,
            Self::Medium => 10,
            Self::Low => 3,
            Self::Info => 0,
        }
    }

    /// Whether this severity is at least as severe as `other`.
    pub fn at_least(&self, other: Severity) -> bool {
        self.weight() >= other.weight()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Info => write!(f, "info"),
        }
    }
}
