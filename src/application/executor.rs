//! Phase executor — generic driver that runs one pipeline phase to
//! completion or failure, persisting a snapshot on every status change.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::entities::{PhaseOutput, Workflow};
use crate::domain::value_objects::PhaseName;
use crate::infrastructure::store::{StoreError, WorkflowRecord, WorkflowStore};

/// In-memory workflow view shared between the driving task and status reads.
pub type SharedWorkflow = Arc<RwLock<Workflow>>;

/// Errors that fail a phase (and with it, the workflow).
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{0}")]
    Provider(String),

    #[error("{failed} of {total} scans failed, above the configured failure threshold")]
    TooManyFailures { failed: usize, total: usize },

    /// Cooperative stop observed mid-phase; not a failure. Carries any
    /// output drained before the stop so it can be recorded on the phase.
    #[error("stop requested")]
    Cancelled(Option<PhaseOutput>),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

/// Incremental progress reporter handed to a phase's unit of work.
///
/// Progress updates mutate only the in-memory view; snapshots are persisted
/// at phase transitions, so a polling read between writes sees the freshest
/// progress without any store round-trip.
#[derive(Clone)]
pub struct PhaseProgress {
    workflow: SharedWorkflow,
    name: PhaseName,
}

impl PhaseProgress {
    pub async fn set(&self, percent: u8) {
        self.workflow
            .write()
            .await
            .phase_mut(self.name)
            .set_progress(percent);
    }

    pub async fn fraction(&self, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            ((done * 100) / total).min(100) as u8
        };
        self.set(percent).await;
    }
}

/// Runs phases one at a time: marks the phase running, awaits its unit of
/// work, and records completion or failure. No automatic retry; a failed
/// phase fails the workflow.
pub struct PhaseExecutor {
    store: Arc<dyn WorkflowStore>,
}

impl PhaseExecutor {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Drives one phase. Single-shot work jumps 0→100 on completion; fan-out
    /// work reports fractional progress through the [`PhaseProgress`] handle.
    pub async fn run<F, Fut>(
        &self,
        workflow: &SharedWorkflow,
        name: PhaseName,
        work: F,
    ) -> Result<PhaseOutput, PhaseError>
    where
        F: FnOnce(PhaseProgress) -> Fut,
        Fut: Future<Output = Result<PhaseOutput, PhaseError>>,
    {
        let workflow_id = {
            let mut wf = workflow.write().await;
            wf.phase_mut(name).start();
            wf.id
        };
        self.persist(workflow).await?;
        info!(workflow_id = %workflow_id, phase = %name, "Phase started");

        let progress = PhaseProgress {
            workflow: workflow.clone(),
            name,
        };

        match work(progress).await {
            Ok(output) => {
                workflow
                    .write()
                    .await
                    .phase_mut(name)
                    .complete(output.clone());
                self.persist(workflow).await?;
                info!(workflow_id = %workflow_id, phase = %name, "Phase completed");
                Ok(output)
            }
            Err(PhaseError::Cancelled(partial)) => {
                // Freeze the phase with whatever it drained; the driver
                // records the workflow-level stop.
                workflow.write().await.phase_mut(name).stop(partial);
                self.persist(workflow).await?;
                info!(workflow_id = %workflow_id, phase = %name, "Phase halted by stop request");
                Err(PhaseError::Cancelled(None))
            }
            Err(err) => {
                workflow
                    .write()
                    .await
                    .phase_mut(name)
                    .fail(err.to_string());
                self.persist(workflow).await?;
                warn!(workflow_id = %workflow_id, phase = %name, error = %err, "Phase failed");
                Err(err)
            }
        }
    }

    /// Write-through snapshot of the current in-memory state.
    pub async fn persist(&self, workflow: &SharedWorkflow) -> Result<(), StoreError> {
        let snapshot = workflow.read().await.clone();
        self.store.save(&WorkflowRecord::new(snapshot)).await
    }
}
