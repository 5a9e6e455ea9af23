//! Orchestrator domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{
    PhaseName, PhaseStatus, ReconTechnique, ScanStatus, Severity, TargetKind, TransitionError,
    WorkflowStatus, WorkflowTransition,
};

/// Immutable configuration of a workflow run, fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Reconnaissance profile forwarded to the recon provider.
    pub recon_profile: String,
    /// Scan types requested from the scan provider (e.g. "sqli", "xss").
    pub scan_types: Vec<String>,
    /// Upper bound on concurrent scans within this workflow.
    pub max_concurrent: usize,
    /// Per-target scan timeout in seconds.
    pub target_timeout_seconds: u64,
}

/// A single orchestration run of the recon → extraction → scanning → correlation pipeline.
///
/// Configuration is immutable after creation; only `status`, `phases`,
/// `result` and the error fields mutate, and every status change goes through
/// [`Workflow::transition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub domain: String,
    pub options: WorkflowOptions,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The four pipeline phases, in execution order.
    pub phases: Vec<Phase>,
    /// Workflow-level aggregate, set once when the correlation phase completes.
    pub result: Option<CorrelatedResult>,
    /// Error that failed the workflow, with the causing phase preserved in `phases`.
    pub error: Option<String>,
    /// Set when a process restart interrupted the run; the failure is
    /// recoverable by starting a new workflow for the same domain.
    #[serde(default)]
    pub interrupted: bool,
    /// Ordered history of status transitions (audit trail).
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

impl Workflow {
    pub fn new(domain: String, options: WorkflowOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            domain,
            options,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            phases: PhaseName::ALL.into_iter().map(Phase::new).collect(),
            result: None,
            error: None,
            interrupted: false,
            transitions: Vec::new(),
        }
    }

    /// Validated status transition; records an audit-trail entry on success.
    pub fn transition(
        &mut self,
        to: WorkflowStatus,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(&to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.transitions.push(WorkflowTransition {
            from: self.status,
            to,
            timestamp: Utc::now(),
            reason,
        });
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn phase(&self, name: PhaseName) -> &Phase {
        // Workflows always carry all four phases, seeded in `new`.
        self.phases
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| unreachable!("workflow is missing phase {name}"))
    }

    pub fn phase_mut(&mut self, name: PhaseName) -> &mut Phase {
        self.updated_at = Utc::now();
        self.phases
            .iter_mut()
            .find(|p| p.name == name)
            .unwrap_or_else(|| unreachable!("workflow is missing phase {name}"))
    }

    /// Marks an in-flight workflow as failed after a process restart. Any
    /// phase caught mid-run fails with it; completed phase results stay.
    pub fn mark_interrupted(&mut self) -> Result<(), TransitionError> {
        const REASON: &str = "workflow interrupted by process restart";
        self.transition(WorkflowStatus::Failed, Some(REASON.to_string()))?;
        self.error = Some(REASON.to_string());
        self.interrupted = true;
        for phase in &mut self.phases {
            if phase.status == PhaseStatus::Running {
                phase.fail(REASON.to_string());
            }
        }
        Ok(())
    }
}

/// One sequential stage of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub name: PhaseName,
    pub status: PhaseStatus,
    /// 0–100; monotonically non-decreasing while running.
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Phase-specific result payload; the only input the next phase may consume.
    pub output: Option<PhaseOutput>,
}

impl Phase {
    pub fn new(name: PhaseName) -> Self {
        Self {
            name,
            status: PhaseStatus::Pending,
            progress: 0,
            started_at: None,
            finished_at: None,
            error: None,
            output: None,
        }
    }

    pub fn start(&mut self) {
        self.status = PhaseStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress = 0;
    }

    pub fn complete(&mut self, output: PhaseOutput) {
        self.status = PhaseStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.progress = 100;
        self.output = Some(output);
    }

    pub fn fail(&mut self, error: String) {
        self.status = PhaseStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Freezes the phase at a cooperative stop. Progress stays where the
    /// last update left it; outcomes drained before the stop are retained.
    pub fn stop(&mut self, output: Option<PhaseOutput>) {
        self.status = PhaseStatus::Stopped;
        self.finished_at = Some(Utc::now());
        if output.is_some() {
            self.output = output;
        }
    }

    /// Progress never moves backwards; late or out-of-order updates clamp.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }
}

/// Typed per-phase result payload, persisted with the workflow snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutput {
    Reconnaissance(ReconOutput),
    TargetExtraction { targets: Vec<Target> },
    Web2Scanning { outcomes: Vec<ScanOutcome> },
    Correlation(CorrelatedResult),
}

/// Raw output of the reconnaissance provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconOutput {
    pub domain: String,
    pub hosts: Vec<DiscoveredHost>,
}

/// One host discovered during reconnaissance, with its technique provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub host: String,
    pub technique: ReconTechnique,
}

/// Normalized, deduplicated scan unit produced by the target extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Normalized URL; the dedup and outcome-join key.
    pub url: String,
    pub host: String,
    pub kind: TargetKind,
    /// Reconnaissance techniques that discovered this host, merged on dedup.
    pub discovered_by: Vec<ReconTechnique>,
}

/// A single vulnerability finding reported by the scan provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Provider-defined type, e.g. "sql_injection" or "auth_bypass".
    pub vuln_type: String,
    pub severity: Severity,
    /// Where on the target the finding was observed (path, parameter, header).
    pub location: String,
    pub description: String,
}

/// Per-target result of invoking the scan provider; produced exactly once
/// per target per workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Normalized target URL (join key against [`Target::url`]).
    pub target: String,
    pub status: ScanStatus,
    pub findings: Vec<Finding>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl ScanOutcome {
    pub fn completed(target: String, findings: Vec<Finding>, duration_ms: u64) -> Self {
        Self {
            target,
            status: ScanStatus::Completed,
            findings,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(target: String, error: String, duration_ms: u64) -> Self {
        Self {
            target,
            status: ScanStatus::Failed,
            findings: Vec::new(),
            duration_ms,
            error: Some(error),
        }
    }

    pub fn timeout(target: String, duration_ms: u64) -> Self {
        Self {
            target,
            status: ScanStatus::Timeout,
            findings: Vec::new(),
            duration_ms,
            error: Some("scan exceeded per-target timeout".to_string()),
        }
    }
}

/// Workflow-level aggregate joining reconnaissance provenance with scan
/// findings. Computed once at the end of the correlation phase; derived data,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedResult {
    pub summary: WorkflowSummary,
    pub high_risk_targets: Vec<HighRiskTarget>,
    pub correlations: Vec<Correlation>,
    pub generated_at: DateTime<Utc>,
}

/// Workflow-level totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_subdomains: usize,
    pub targets_scanned: usize,
    pub total_vulnerabilities: usize,
    pub by_severity: SeverityBreakdown,
}

/// Finding counts per severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

/// A target whose aggregate risk crossed the reporting threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighRiskTarget {
    /// Host of the target (matches the client's high-risk list contract).
    pub target: String,
    /// Weighted severity sum, capped at 100.
    pub risk_score: u32,
    /// Number of vulnerabilities found on the target.
    pub vulnerabilities: usize,
}

/// Structured note linking reconnaissance provenance to a scan finding,
/// produced by a correlation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    /// Type tag of the rule that produced this entry.
    pub rule: String,
    /// Host the correlation applies to.
    pub target: String,
    pub description: String,
}
