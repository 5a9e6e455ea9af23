//! Workflow engine — owns the lifecycle of workflow runs: phase sequencing,
//! status transitions, error capture, and cooperative cancellation.
//!
//! Every status transition is validated against the state machine on
//! [`WorkflowStatus`], persisted as a snapshot, and recorded on the
//! workflow's audit trail. One tokio task drives each run and is the only
//! writer of its in-memory [`Workflow`]; polling reads clone a snapshot and
//! never block the pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::correlation::{self, CorrelationRule};
use super::dispatcher::{DispatchConfig, DispatchError, DispatchRun, ScanDispatcher};
use super::executor::{PhaseError, PhaseExecutor, SharedWorkflow};
use super::extractor;
use crate::domain::entities::{
    CorrelatedResult, PhaseOutput, ReconOutput, Target, Workflow, WorkflowOptions,
};
use crate::domain::services::ReconProvider;
use crate::domain::value_objects::{PhaseName, WorkflowStatus};
use crate::infrastructure::store::{StoreError, WorkflowStore};

/// Engine-level tunables, sourced from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Global cap on concurrently running workflows (distinct from the
    /// per-workflow scan fan-out bound).
    pub max_concurrent_workflows: usize,
    /// Fraction of failed/timed-out scans above which the scanning phase
    /// fails. Strictly compared, so the default 1.0 disables the check:
    /// individual scan failures are always outcome data.
    pub failure_threshold: f64,
    /// Risk score above which a target is reported as high-risk.
    pub high_risk_threshold: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: 8,
            failure_threshold: 1.0,
            high_risk_threshold: correlation::DEFAULT_HIGH_RISK_THRESHOLD,
        }
    }
}

/// Errors surfaced at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("workflow {0} not found")]
    NotFound(Uuid),

    #[error("workflow is already {0}")]
    InvalidState(WorkflowStatus),

    #[error("results not ready: workflow is {0}")]
    NotReady(WorkflowStatus),

    #[error("invalid state transition: {0}")]
    Transition(#[from] crate::domain::value_objects::TransitionError),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

struct RunHandle {
    workflow: SharedWorkflow,
    cancel: CancellationToken,
}

/// Central workflow lifecycle controller.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    recon: Arc<dyn ReconProvider>,
    executor: Arc<PhaseExecutor>,
    dispatcher: Arc<ScanDispatcher>,
    rules: Arc<Vec<CorrelationRule>>,
    settings: EngineSettings,
    run_permits: Arc<Semaphore>,
    running: Arc<RwLock<HashMap<Uuid, RunHandle>>>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        recon: Arc<dyn ReconProvider>,
        scanner: Arc<dyn crate::domain::services::ScanProvider>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            executor: Arc::new(PhaseExecutor::new(store.clone())),
            dispatcher: Arc::new(ScanDispatcher::new(scanner)),
            rules: Arc::new(correlation::default_rules()),
            run_permits: Arc::new(Semaphore::new(settings.max_concurrent_workflows.max(1))),
            running: Arc::new(RwLock::new(HashMap::new())),
            store,
            recon,
            settings,
        }
    }

    /// Validates the request, persists a `pending` workflow, and spawns the
    /// pipeline task. Returns immediately; callers poll for progress.
    pub async fn start(
        &self,
        domain: &str,
        options: WorkflowOptions,
    ) -> Result<Uuid, EngineError> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(EngineError::Validation("domain must not be empty".into()));
        }
        if options.max_concurrent < 1 {
            return Err(EngineError::Validation(
                "maxConcurrent must be at least 1".into(),
            ));
        }
        if options.scan_types.is_empty() {
            return Err(EngineError::Validation(
                "at least one scan type is required".into(),
            ));
        }

        let workflow = Workflow::new(domain.to_string(), options);
        let id = workflow.id;
        let shared: SharedWorkflow = Arc::new(RwLock::new(workflow));
        self.executor.persist(&shared).await?;

        let cancel = CancellationToken::new();
        self.running.write().await.insert(
            id,
            RunHandle {
                workflow: shared.clone(),
                cancel: cancel.clone(),
            },
        );

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_pipeline(shared, cancel).await;
        });

        info!(workflow_id = %id, domain, "Workflow accepted");
        Ok(id)
    }

    /// Read-only snapshot of the current workflow state, live view preferred.
    pub async fn status(&self, id: Uuid) -> Result<Workflow, EngineError> {
        if let Some(handle) = self.running.read().await.get(&id) {
            return Ok(handle.workflow.read().await.clone());
        }
        match self.store.load(id).await? {
            Some(record) => Ok(record.workflow),
            None => Err(EngineError::NotFound(id)),
        }
    }

    /// Requests a cooperative stop. The pipeline observes the signal at its
    /// next checkpoint; in-flight scans are allowed to drain.
    pub async fn stop(&self, id: Uuid) -> Result<(), EngineError> {
        if let Some(handle) = self.running.read().await.get(&id) {
            let status = handle.workflow.read().await.status;
            if status.is_terminal() {
                return Err(EngineError::InvalidState(status));
            }
            handle.cancel.cancel();
            info!(workflow_id = %id, "Stop requested");
            return Ok(());
        }
        match self.store.load(id).await? {
            Some(record) => Err(EngineError::InvalidState(record.workflow.status)),
            None => Err(EngineError::NotFound(id)),
        }
    }

    /// Final correlated result; only available once the workflow completed.
    pub async fn results(&self, id: Uuid) -> Result<CorrelatedResult, EngineError> {
        let workflow = self.status(id).await?;
        match (workflow.status, workflow.result) {
            (WorkflowStatus::Completed, Some(result)) => Ok(result),
            (status, _) => Err(EngineError::NotReady(status)),
        }
    }

    /// Restart-recovery sweep: workflows left non-terminal by a previous
    /// process are marked failed with the recoverable `interrupted` flag.
    /// Their ids stay pollable and completed-phase results are retained.
    pub async fn recover_interrupted(&self) -> Result<usize, StoreError> {
        let mut recovered = 0;
        for mut record in self.store.list().await? {
            if record.workflow.status.is_terminal() {
                continue;
            }
            if let Err(err) = record.workflow.mark_interrupted() {
                error!(workflow_id = %record.workflow.id, error = %err, "Recovery transition rejected");
                continue;
            }
            self.store.save(&record).await?;
            warn!(workflow_id = %record.workflow.id, "Marked interrupted workflow as failed");
            recovered += 1;
        }
        Ok(recovered)
    }

    // ── Pipeline ─────────────────────────────────────────────────────

    async fn run_pipeline(self, workflow: SharedWorkflow, cancel: CancellationToken) {
        let (id, domain, options) = {
            let wf = workflow.read().await;
            (wf.id, wf.domain.clone(), wf.options.clone())
        };

        // Global bound on simultaneously running workflows.
        let _permit = match self.run_permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish_failed(&workflow, "engine shutting down").await;
                return;
            }
        };

        if self.stopped_at_checkpoint(&workflow, &cancel).await {
            return;
        }
        if let Err(err) = self
            .apply_transition(&workflow, WorkflowStatus::Running, "pipeline started")
            .await
        {
            error!(workflow_id = %id, error = %err, "Failed to start pipeline");
            return;
        }

        // ── Phase 1: reconnaissance ──────────────────────────────────
        let recon_output = {
            let recon = self.recon.clone();
            let domain = domain.clone();
            let profile = options.recon_profile.clone();
            let run = self
                .executor
                .run(&workflow, PhaseName::Reconnaissance, |_progress| async move {
                    recon
                        .discover(&domain, &profile)
                        .await
                        .map(PhaseOutput::Reconnaissance)
                        .map_err(|e| PhaseError::Provider(e.to_string()))
                })
                .await;
            match self.expect_recon(run, &workflow, PhaseName::Reconnaissance).await {
                Some(output) => output,
                None => return,
            }
        };
        if self.stopped_at_checkpoint(&workflow, &cancel).await {
            return;
        }

        // ── Phase 2: target extraction (pure transform, 0→100) ───────
        let targets = {
            let run = self
                .executor
                .run(&workflow, PhaseName::TargetExtraction, |_progress| {
                    let targets = extractor::extract(&recon_output);
                    async move { Ok(PhaseOutput::TargetExtraction { targets }) }
                })
                .await;
            match self.expect_targets(run, &workflow, PhaseName::TargetExtraction).await {
                Some(targets) => targets,
                None => return,
            }
        };
        if self.stopped_at_checkpoint(&workflow, &cancel).await {
            return;
        }

        // ── Phase 3: web2 scanning ───────────────────────────────────
        let outcomes = {
            let dispatcher = self.dispatcher.clone();
            let dispatch_config = DispatchConfig {
                scan_types: options.scan_types.clone(),
                max_concurrent: options.max_concurrent,
                target_timeout: Duration::from_secs(options.target_timeout_seconds),
                failure_threshold: self.settings.failure_threshold,
            };
            let cancel_scan = cancel.clone();
            let scan_targets = targets.clone();
            let run = self
                .executor
                .run(&workflow, PhaseName::Web2Scanning, |progress| async move {
                    match dispatcher
                        .dispatch(&scan_targets, &dispatch_config, &cancel_scan, &progress)
                        .await
                    {
                        Ok(DispatchRun::Finished(outcomes)) => {
                            Ok(PhaseOutput::Web2Scanning { outcomes })
                        }
                        Ok(DispatchRun::Cancelled(partial)) => Err(PhaseError::Cancelled(Some(
                            PhaseOutput::Web2Scanning { outcomes: partial },
                        ))),
                        Err(DispatchError::TooManyFailures { failed, total }) => {
                            Err(PhaseError::TooManyFailures { failed, total })
                        }
                        Err(err) => Err(PhaseError::Provider(err.to_string())),
                    }
                })
                .await;
            match self.expect_outcomes(run, &workflow, PhaseName::Web2Scanning).await {
                Some(outcomes) => outcomes,
                None => return,
            }
        };
        if self.stopped_at_checkpoint(&workflow, &cancel).await {
            return;
        }

        // ── Phase 4: correlation ─────────────────────────────────────
        let result = {
            let rules = self.rules.clone();
            let threshold = self.settings.high_risk_threshold;
            let run = self
                .executor
                .run(&workflow, PhaseName::Correlation, |_progress| {
                    let result = correlation::correlate(&targets, &outcomes, &rules, threshold);
                    async move { Ok(PhaseOutput::Correlation(result)) }
                })
                .await;
            match run {
                Ok(PhaseOutput::Correlation(result)) => result,
                Ok(_) => {
                    self.finish_failed(&workflow, "correlation produced wrong payload")
                        .await;
                    return;
                }
                Err(PhaseError::Cancelled(_)) => {
                    self.finish_stopped(&workflow).await;
                    return;
                }
                Err(err) => {
                    self.fail_from_phase(&workflow, PhaseName::Correlation, &err)
                        .await;
                    return;
                }
            }
        };

        self.finish_completed(&workflow, result).await;
    }

    // ── Phase result plumbing ────────────────────────────────────────

    async fn expect_recon(
        &self,
        run: Result<PhaseOutput, PhaseError>,
        workflow: &SharedWorkflow,
        phase: PhaseName,
    ) -> Option<ReconOutput> {
        match self.unwrap_phase(run, workflow, phase).await? {
            PhaseOutput::Reconnaissance(output) => Some(output),
            _ => self.wrong_payload(workflow, phase).await,
        }
    }

    async fn expect_targets(
        &self,
        run: Result<PhaseOutput, PhaseError>,
        workflow: &SharedWorkflow,
        phase: PhaseName,
    ) -> Option<Vec<Target>> {
        match self.unwrap_phase(run, workflow, phase).await? {
            PhaseOutput::TargetExtraction { targets } => Some(targets),
            _ => self.wrong_payload(workflow, phase).await,
        }
    }

    async fn expect_outcomes(
        &self,
        run: Result<PhaseOutput, PhaseError>,
        workflow: &SharedWorkflow,
        phase: PhaseName,
    ) -> Option<Vec<crate::domain::entities::ScanOutcome>> {
        match self.unwrap_phase(run, workflow, phase).await? {
            PhaseOutput::Web2Scanning { outcomes } => Some(outcomes),
            _ => self.wrong_payload(workflow, phase).await,
        }
    }

    async fn unwrap_phase(
        &self,
        run: Result<PhaseOutput, PhaseError>,
        workflow: &SharedWorkflow,
        phase: PhaseName,
    ) -> Option<PhaseOutput> {
        match run {
            Ok(output) => Some(output),
            Err(PhaseError::Cancelled(_)) => {
                self.finish_stopped(workflow).await;
                None
            }
            Err(err) => {
                self.fail_from_phase(workflow, phase, &err).await;
                None
            }
        }
    }

    async fn wrong_payload<T>(&self, workflow: &SharedWorkflow, phase: PhaseName) -> Option<T> {
        self.finish_failed(workflow, &format!("phase {phase} produced wrong payload"))
            .await;
        None
    }

    // ── Terminal transitions ─────────────────────────────────────────

    async fn apply_transition(
        &self,
        workflow: &SharedWorkflow,
        to: WorkflowStatus,
        reason: &str,
    ) -> Result<(), EngineError> {
        {
            let mut wf = workflow.write().await;
            wf.transition(to, Some(reason.to_string()))?;
        }
        self.executor.persist(workflow).await?;
        Ok(())
    }

    /// Checks the stop signal at a phase boundary; completed-phase results
    /// are already persisted and stay retrievable.
    async fn stopped_at_checkpoint(
        &self,
        workflow: &SharedWorkflow,
        cancel: &CancellationToken,
    ) -> bool {
        if cancel.is_cancelled() {
            self.finish_stopped(workflow).await;
            return true;
        }
        false
    }

    async fn finish_stopped(&self, workflow: &SharedWorkflow) {
        let id = workflow.read().await.id;
        if let Err(err) = self
            .apply_transition(workflow, WorkflowStatus::Stopped, "stop requested")
            .await
        {
            error!(workflow_id = %id, error = %err, "Failed to record stop");
        }
        self.running.write().await.remove(&id);
        info!(workflow_id = %id, "Workflow stopped");
    }

    async fn fail_from_phase(&self, workflow: &SharedWorkflow, phase: PhaseName, err: &PhaseError) {
        self.finish_failed(workflow, &format!("phase {phase} failed: {err}"))
            .await;
    }

    async fn finish_failed(&self, workflow: &SharedWorkflow, message: &str) {
        let id = {
            let mut wf = workflow.write().await;
            wf.error = Some(message.to_string());
            wf.id
        };
        if let Err(err) = self
            .apply_transition(workflow, WorkflowStatus::Failed, message)
            .await
        {
            error!(workflow_id = %id, error = %err, "Failed to record workflow failure");
        }
        self.running.write().await.remove(&id);
        warn!(workflow_id = %id, error = message, "Workflow failed");
    }

    async fn finish_completed(&self, workflow: &SharedWorkflow, result: CorrelatedResult) {
        let id = {
            let mut wf = workflow.write().await;
            wf.result = Some(result);
            wf.id
        };
        if let Err(err) = self
            .apply_transition(workflow, WorkflowStatus::Completed, "pipeline finished")
            .await
        {
            error!(workflow_id = %id, error = %err, "Failed to record completion");
        }
        self.running.write().await.remove(&id);
        info!(workflow_id = %id, "Workflow completed");
    }
}
