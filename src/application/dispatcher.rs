//! Scan dispatcher — fans scan targets out to the vulnerability scan
//! provider under a concurrency cap, collecting partial results as they
//! arrive.
//!
//! One slow target never stalls the others: each provider call runs under a
//! per-target timeout and an unresponsive scan is recorded as a `timeout`
//! outcome. Individual failures are data; only a provider outage (or a
//! failed fraction above the configured threshold) fails the phase.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::executor::PhaseProgress;
use crate::domain::entities::{ScanOutcome, Target};
use crate::domain::services::{ScanProvider, ScanProviderError};
use crate::domain::value_objects::ScanStatus;

/// Per-phase dispatch parameters, derived from workflow options and engine config.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub scan_types: Vec<String>,
    pub max_concurrent: usize,
    pub target_timeout: Duration,
    /// Fraction of failed/timed-out targets above which the phase fails.
    /// The comparison is strict, so 1.0 disables the check entirely: the
    /// failed fraction can never exceed it, and even a 100% failure rate is
    /// recorded as outcome data rather than aborting the phase.
    pub failure_threshold: f64,
}

/// Phase-fatal dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("scan provider unavailable: {0}")]
    Unavailable(String),

    #[error("{failed} of {total} scans failed, above the configured failure threshold")]
    TooManyFailures { failed: usize, total: usize },

    #[error("scan worker panicked: {0}")]
    Worker(String),
}

/// Outcome of a dispatch run. `Cancelled` carries the outcomes that finished
/// before the stop request was observed.
#[derive(Debug)]
pub enum DispatchRun {
    Finished(Vec<ScanOutcome>),
    Cancelled(Vec<ScanOutcome>),
}

enum WorkerResult {
    Outcome(ScanOutcome),
    /// Worker observed the stop request before scanning its target.
    Skipped,
    Unavailable(String),
}

pub struct ScanDispatcher {
    provider: Arc<dyn ScanProvider>,
}

impl ScanDispatcher {
    pub fn new(provider: Arc<dyn ScanProvider>) -> Self {
        Self { provider }
    }

    /// Scans every target with at most `max_concurrent` provider calls in
    /// flight, reporting `done/total` progress after each completion.
    ///
    /// Cancellation is cooperative: it is checked after a worker acquires a
    /// permit and before it calls the provider, so in-flight scans drain
    /// rather than being hard-killed.
    pub async fn dispatch(
        &self,
        targets: &[Target],
        config: &DispatchConfig,
        cancel: &CancellationToken,
        progress: &PhaseProgress,
    ) -> Result<DispatchRun, DispatchError> {
        let total = targets.len();
        if total == 0 {
            progress.set(100).await;
            return Ok(DispatchRun::Finished(Vec::new()));
        }

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();

        for target in targets.iter().cloned() {
            let provider = self.provider.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let scan_types = config.scan_types.clone();
            let timeout = config.target_timeout;

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return WorkerResult::Skipped;
                };
                if cancel.is_cancelled() {
                    return WorkerResult::Skipped;
                }

                let started = Instant::now();
                let result =
                    tokio::time::timeout(timeout, provider.scan(&target, &scan_types)).await;
                let elapsed = started.elapsed().as_millis() as u64;

                match result {
                    Err(_) => {
                        debug!(target = %target.url, "Scan hit per-target timeout");
                        WorkerResult::Outcome(ScanOutcome::timeout(target.url, elapsed))
                    }
                    Ok(Ok(findings)) => {
                        WorkerResult::Outcome(ScanOutcome::completed(target.url, findings, elapsed))
                    }
                    Ok(Err(ScanProviderError::ScanFailed(message))) => {
                        WorkerResult::Outcome(ScanOutcome::failed(target.url, message, elapsed))
                    }
                    Ok(Err(ScanProviderError::Unavailable(message))) => {
                        WorkerResult::Unavailable(message)
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut skipped = 0usize;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(WorkerResult::Outcome(outcome)) => {
                    outcomes.push(outcome);
                    progress.fraction(outcomes.len(), total).await;
                }
                Ok(WorkerResult::Skipped) => skipped += 1,
                Ok(WorkerResult::Unavailable(message)) => {
                    workers.abort_all();
                    return Err(DispatchError::Unavailable(message));
                }
                Err(join_error) => {
                    workers.abort_all();
                    return Err(DispatchError::Worker(join_error.to_string()));
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, total, "Dispatch halted before scanning every target");
            return Ok(DispatchRun::Cancelled(outcomes));
        }

        let failed = outcomes
            .iter()
            .filter(|o| o.status != ScanStatus::Completed)
            .count();
        if (failed as f64) / (total as f64) > config.failure_threshold {
            return Err(DispatchError::TooManyFailures { failed, total });
        }

        Ok(DispatchRun::Finished(outcomes))
    }
}
