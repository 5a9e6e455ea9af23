//! HTTP clients for the external reconnaissance and vulnerability scan
//! providers. Both speak plain JSON over POST; connection-level failures map
//! to `Unavailable`, which fails the running phase.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Finding, ReconOutput, Target};
use crate::domain::services::{
    ReconProvider, ReconProviderError, ScanProvider, ScanProviderError,
};

/// Shared client settings for both providers.
#[derive(Debug, Clone)]
pub struct ProviderClientConfig {
    pub base_url: String,
    /// Outer HTTP timeout. Reconnaissance may legitimately take minutes, so
    /// this is generous; the dispatcher applies the tighter per-target bound.
    pub request_timeout: Duration,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderInitError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderInitError(e.to_string()))
}

/// Error constructing a provider client.
#[derive(Debug, thiserror::Error)]
#[error("failed to build provider HTTP client: {0}")]
pub struct ProviderInitError(String);

// ── Reconnaissance ───────────────────────────────────────────────────

#[derive(Serialize)]
struct DiscoverRequest<'a> {
    domain: &'a str,
    profile: &'a str,
}

pub struct HttpReconProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReconProvider {
    pub fn new(config: &ProviderClientConfig) -> Result<Self, ProviderInitError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReconProvider for HttpReconProvider {
    async fn discover(
        &self,
        domain: &str,
        profile: &str,
    ) -> Result<ReconOutput, ReconProviderError> {
        let response = self
            .client
            .post(format!("{}/discover", self.base_url))
            .json(&DiscoverRequest { domain, profile })
            .send()
            .await
            .map_err(|e| ReconProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ReconProviderError::InvalidRequest(body));
        }
        if !status.is_success() {
            return Err(ReconProviderError::Unavailable(format!(
                "recon provider returned {status}"
            )));
        }

        response
            .json::<ReconOutput>()
            .await
            .map_err(|e| ReconProviderError::Unavailable(format!("malformed recon response: {e}")))
    }
}

// ── Vulnerability scanning ───────────────────────────────────────────

#[derive(Serialize)]
struct ScanRequest<'a> {
    target: &'a str,
    scan_types: &'a [String],
}

#[derive(Deserialize)]
struct ScanResponse {
    status: String,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpScanProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScanProvider {
    pub fn new(config: &ProviderClientConfig) -> Result<Self, ProviderInitError> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ScanProvider for HttpScanProvider {
    async fn scan(
        &self,
        target: &Target,
        scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        let response = self
            .client
            .post(format!("{}/scan", self.base_url))
            .json(&ScanRequest {
                target: &target.url,
                scan_types,
            })
            .send()
            .await
            .map_err(|e| ScanProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanProviderError::Unavailable(format!(
                "scan provider returned {status}"
            )));
        }

        let body = response
            .json::<ScanResponse>()
            .await
            .map_err(|e| ScanProviderError::Unavailable(format!("malformed scan response: {e}")))?;

        match body.status.as_str() {
            "completed" => Ok(body.findings),
            other => Err(ScanProviderError::ScanFailed(
                body.error
                    .unwrap_or_else(|| format!("provider reported status {other}")),
            )),
        }
    }
}
