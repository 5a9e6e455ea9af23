//! External provider interfaces consumed by the orchestrator

use async_trait::async_trait;

use super::entities::{Finding, ReconOutput, Target};

/// Reconnaissance provider (subdomain enumeration, certificate-transparency
/// lookups, ...). May be slow; the orchestrator imposes no timeout beyond the
/// configured phase timeout.
#[async_trait]
pub trait ReconProvider: Send + Sync {
    async fn discover(&self, domain: &str, profile: &str)
    -> Result<ReconOutput, ReconProviderError>;
}

/// Vulnerability scan provider. Must be safely callable concurrently by
/// multiple dispatcher workers.
#[async_trait]
pub trait ScanProvider: Send + Sync {
    async fn scan(
        &self,
        target: &Target,
        scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError>;
}

/// Reconnaissance provider error
#[derive(Debug, thiserror::Error)]
pub enum ReconProviderError {
    /// Provider unreachable or returned garbage; fails the phase and the workflow.
    #[error("recon provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid reconnaissance request: {0}")]
    InvalidRequest(String),
}

/// Scan provider error
#[derive(Debug, thiserror::Error)]
pub enum ScanProviderError {
    /// Provider unreachable; fails the whole scanning phase.
    #[error("scan provider unavailable: {0}")]
    Unavailable(String),

    /// The scan of one target failed; recorded as outcome data, not a phase failure.
    #[error("scan failed: {0}")]
    ScanFailed(String),
}
