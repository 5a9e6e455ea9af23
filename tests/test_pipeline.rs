//! End-to-end pipeline tests: mock providers, in-memory store, real engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use reconflow::application::{EngineError, EngineSettings, WorkflowEngine};
use reconflow::domain::entities::{
    DiscoveredHost, Finding, PhaseOutput, ReconOutput, Target, Workflow, WorkflowOptions,
};
use reconflow::domain::services::{
    ReconProvider, ReconProviderError, ScanProvider, ScanProviderError,
};
use reconflow::domain::value_objects::{
    PhaseName, PhaseStatus, ReconTechnique, ScanStatus, Severity, WorkflowStatus,
};
use reconflow::infrastructure::{InMemoryWorkflowStore, WorkflowRecord, WorkflowStore};

// ── Mock providers ───────────────────────────────────────────────────────────

struct StaticRecon {
    hosts: Vec<DiscoveredHost>,
}

impl StaticRecon {
    fn with_hosts(hosts: &[(&str, ReconTechnique)]) -> Self {
        Self {
            hosts: hosts
                .iter()
                .map(|(host, technique)| DiscoveredHost {
                    host: host.to_string(),
                    technique: *technique,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ReconProvider for StaticRecon {
    async fn discover(
        &self,
        domain: &str,
        _profile: &str,
    ) -> Result<ReconOutput, ReconProviderError> {
        Ok(ReconOutput {
            domain: domain.to_string(),
            hosts: self.hosts.clone(),
        })
    }
}

struct FailingRecon;

#[async_trait]
impl ReconProvider for FailingRecon {
    async fn discover(
        &self,
        _domain: &str,
        _profile: &str,
    ) -> Result<ReconOutput, ReconProviderError> {
        Err(ReconProviderError::Unavailable("connection refused".into()))
    }
}

/// Returns canned findings per host; hosts without an entry scan clean.
#[derive(Default)]
struct TableScanner {
    findings: HashMap<String, Vec<Finding>>,
}

impl TableScanner {
    fn with_finding(mut self, host: &str, vuln_type: &str, severity: Severity) -> Self {
        self.findings
            .entry(host.to_string())
            .or_default()
            .push(Finding {
                vuln_type: vuln_type.to_string(),
                severity,
                location: "/".to_string(),
                description: format!("{vuln_type} on {host}"),
            });
        self
    }
}

#[async_trait]
impl ScanProvider for TableScanner {
    async fn scan(
        &self,
        target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        Ok(self.findings.get(&target.host).cloned().unwrap_or_default())
    }
}

/// Fails every scan as outcome data (provider reachable, scans unsuccessful).
struct BrokenScanner;

#[async_trait]
impl ScanProvider for BrokenScanner {
    async fn scan(
        &self,
        _target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        Err(ScanProviderError::ScanFailed("target unreachable".into()))
    }
}

struct UnavailableScanner;

#[async_trait]
impl ScanProvider for UnavailableScanner {
    async fn scan(
        &self,
        _target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        Err(ScanProviderError::Unavailable("connection refused".into()))
    }
}

/// Blocks every scan until the test opens the gate.
struct GatedScanner {
    gate: watch::Receiver<bool>,
    entered: Arc<AtomicUsize>,
}

#[async_trait]
impl ScanProvider for GatedScanner {
    async fn scan(
        &self,
        _target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.clone();
        while !*gate.borrow() {
            if gate.changed().await.is_err() {
                break;
            }
        }
        Ok(Vec::new())
    }
}

/// Never finishes a scan; used to exercise the per-target timeout.
struct HangingScanner;

#[async_trait]
impl ScanProvider for HangingScanner {
    async fn scan(
        &self,
        _target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// Records the peak number of simultaneously running scans.
struct CountingScanner {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingScanner {
    fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScanProvider for CountingScanner {
    async fn scan(
        &self,
        _target: &Target,
        _scan_types: &[String],
    ) -> Result<Vec<Finding>, ScanProviderError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn default_options() -> WorkflowOptions {
    WorkflowOptions {
        recon_profile: "standard".into(),
        scan_types: vec!["sqli".into(), "xss".into()],
        max_concurrent: 5,
        target_timeout_seconds: 60,
    }
}

fn build_engine(
    recon: Arc<dyn ReconProvider>,
    scanner: Arc<dyn ScanProvider>,
    settings: EngineSettings,
) -> (Arc<InMemoryWorkflowStore>, WorkflowEngine) {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let engine = WorkflowEngine::new(store.clone(), recon, scanner, settings);
    (store, engine)
}

async fn wait_terminal(engine: &WorkflowEngine, id: Uuid) -> Workflow {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let workflow = engine.status(id).await.expect("status must resolve");
            if workflow.status.is_terminal() {
                return workflow;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("workflow did not reach a terminal status in time")
}

fn scan_outcomes(workflow: &Workflow) -> Vec<reconflow::domain::entities::ScanOutcome> {
    match workflow.phase(PhaseName::Web2Scanning).output.clone() {
        Some(PhaseOutput::Web2Scanning { outcomes }) => outcomes,
        other => panic!("expected scan outcomes, got {other:?}"),
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_happy_path_end_to_end() {
    let recon = Arc::new(StaticRecon::with_hosts(&[
        ("www.example.com", ReconTechnique::SubdomainEnumeration),
        // Duplicate host via a second technique; must merge, not double-scan.
        ("WWW.example.com.", ReconTechnique::CertificateTransparency),
        ("api.example.com", ReconTechnique::SubdomainEnumeration),
        ("admin.example.com", ReconTechnique::CertificateTransparency),
    ]));
    let scanner = Arc::new(
        TableScanner::default()
            .with_finding("admin.example.com", "auth_bypass", Severity::Critical)
            .with_finding("api.example.com", "sql_injection", Severity::High)
            .with_finding("api.example.com", "open_redirect", Severity::Low),
    );
    let (store, engine) = build_engine(recon, scanner, EngineSettings::default());

    let id = engine
        .start("example.com", default_options())
        .await
        .expect("start must accept");
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(
        workflow
            .phases
            .iter()
            .all(|p| p.status == PhaseStatus::Completed && p.progress == 100)
    );

    // Dedup: 4 discovered entries collapse to 3 targets.
    let outcomes = scan_outcomes(&workflow);
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.status == ScanStatus::Completed));

    let result = engine.results(id).await.expect("results must be ready");
    assert_eq!(result.summary.total_subdomains, 3);
    assert_eq!(result.summary.targets_scanned, 3);
    assert_eq!(result.summary.total_vulnerabilities, 3);
    assert_eq!(result.summary.by_severity.critical, 1);
    assert_eq!(result.summary.by_severity.high, 1);
    assert_eq!(result.summary.by_severity.low, 1);

    // Any critical finding makes its target high-risk.
    assert!(
        result
            .high_risk_targets
            .iter()
            .any(|t| t.target == "admin.example.com")
    );

    // Terminal snapshot persisted.
    let record = store
        .load(id)
        .await
        .expect("store read")
        .expect("record must exist");
    assert_eq!(record.workflow.status, WorkflowStatus::Completed);
    assert!(record.workflow.result.is_some());
}

#[tokio::test]
async fn test_zero_hosts_completes_with_empty_report() {
    let recon = Arc::new(StaticRecon::with_hosts(&[]));
    let scanner = Arc::new(TableScanner::default());
    let (_store, engine) = build_engine(recon, scanner, EngineSettings::default());

    let id = engine.start("example.com", default_options()).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let result = engine.results(id).await.expect("empty report is still a report");
    assert_eq!(result.summary.total_subdomains, 0);
    assert_eq!(result.summary.total_vulnerabilities, 0);
    assert!(result.high_risk_targets.is_empty());
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_recon_provider_failure_fails_workflow() {
    let (_store, engine) = build_engine(
        Arc::new(FailingRecon),
        Arc::new(TableScanner::default()),
        EngineSettings::default(),
    );

    let id = engine.start("example.com", default_options()).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert!(workflow.error.as_deref().is_some_and(|e| e.contains("reconnaissance")));
    assert_eq!(
        workflow.phase(PhaseName::Reconnaissance).status,
        PhaseStatus::Failed
    );
    // Later phases were never reached.
    assert_eq!(
        workflow.phase(PhaseName::Web2Scanning).status,
        PhaseStatus::Pending
    );
    assert!(matches!(
        engine.results(id).await,
        Err(EngineError::NotReady(WorkflowStatus::Failed))
    ));
}

#[tokio::test]
async fn test_individual_scan_failures_are_data_not_fatal() {
    let recon = Arc::new(StaticRecon::with_hosts(&[
        ("a.example.com", ReconTechnique::SubdomainEnumeration),
        ("b.example.com", ReconTechnique::SubdomainEnumeration),
    ]));
    let (_store, engine) = build_engine(
        recon,
        Arc::new(BrokenScanner),
        EngineSettings::default(), // failure_threshold 1.0
    );

    let id = engine.start("example.com", default_options()).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let outcomes = scan_outcomes(&workflow);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status == ScanStatus::Failed));
    assert!(outcomes.iter().all(|o| o.error.is_some()));

    let result = engine.results(id).await.unwrap();
    assert_eq!(result.summary.total_vulnerabilities, 0);
}

#[tokio::test]
async fn test_failure_threshold_fails_scanning_phase() {
    let recon = Arc::new(StaticRecon::with_hosts(&[
        ("a.example.com", ReconTechnique::SubdomainEnumeration),
        ("b.example.com", ReconTechnique::SubdomainEnumeration),
    ]));
    let settings = EngineSettings {
        failure_threshold: 0.5,
        ..EngineSettings::default()
    };
    let (_store, engine) = build_engine(recon, Arc::new(BrokenScanner), settings);

    let id = engine.start("example.com", default_options()).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert_eq!(
        workflow.phase(PhaseName::Web2Scanning).status,
        PhaseStatus::Failed
    );
    // Earlier phases keep their completed results.
    assert_eq!(
        workflow.phase(PhaseName::Reconnaissance).status,
        PhaseStatus::Completed
    );
    assert_eq!(
        workflow.phase(PhaseName::TargetExtraction).status,
        PhaseStatus::Completed
    );
}

#[tokio::test]
async fn test_scan_provider_outage_fails_workflow() {
    let recon = Arc::new(StaticRecon::with_hosts(&[(
        "a.example.com",
        ReconTechnique::SubdomainEnumeration,
    )]));
    let (_store, engine) = build_engine(
        recon,
        Arc::new(UnavailableScanner),
        EngineSettings::default(),
    );

    let id = engine.start("example.com", default_options()).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert!(
        workflow
            .error
            .as_deref()
            .is_some_and(|e| e.contains("web2_scanning"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_target_records_timeout_outcome() {
    let recon = Arc::new(StaticRecon::with_hosts(&[(
        "slow.example.com",
        ReconTechnique::SubdomainEnumeration,
    )]));
    let (_store, engine) = build_engine(
        recon,
        Arc::new(HangingScanner),
        EngineSettings::default(),
    );

    let mut options = default_options();
    options.target_timeout_seconds = 1;
    let id = engine.start("example.com", options).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    // One timed-out target under the default threshold still completes.
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let outcomes = scan_outcomes(&workflow);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, ScanStatus::Timeout);
    assert!(outcomes[0].error.is_some());
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_scan_concurrency_never_exceeds_cap() {
    let hosts: Vec<String> = (0..12).map(|i| format!("h{i}.example.com")).collect();
    let discovered: Vec<(&str, ReconTechnique)> = hosts
        .iter()
        .map(|h| (h.as_str(), ReconTechnique::SubdomainEnumeration))
        .collect();
    let recon = Arc::new(StaticRecon::with_hosts(&discovered));
    let scanner = Arc::new(CountingScanner::new());
    let (_store, engine) = build_engine(recon, scanner.clone(), EngineSettings::default());

    let mut options = default_options();
    options.max_concurrent = 3;
    let id = engine.start("example.com", options).await.unwrap();
    let workflow = wait_terminal(&engine, id).await;

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(scan_outcomes(&workflow).len(), 12);
    let peak = scanner.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded the cap of 3");
    assert!(peak >= 1);
}

// ── Stop ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_mid_scan_halts_and_retains_completed_phases() {
    let recon = Arc::new(StaticRecon::with_hosts(&[
        ("a.example.com", ReconTechnique::SubdomainEnumeration),
        ("b.example.com", ReconTechnique::SubdomainEnumeration),
        ("c.example.com", ReconTechnique::SubdomainEnumeration),
        ("d.example.com", ReconTechnique::SubdomainEnumeration),
    ]));
    let (gate_tx, gate_rx) = watch::channel(false);
    let entered = Arc::new(AtomicUsize::new(0));
    let scanner = Arc::new(GatedScanner {
        gate: gate_rx,
        entered: entered.clone(),
    });
    let (_store, engine) = build_engine(recon, scanner, EngineSettings::default());

    let mut options = default_options();
    options.max_concurrent = 2;
    let id = engine.start("example.com", options).await.unwrap();

    // Wait until at least one scan is in flight before requesting the stop.
    tokio::time::timeout(Duration::from_secs(10), async {
        while entered.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scanning never started");

    engine.stop(id).await.expect("stop on a running workflow");
    gate_tx.send(true).ok();

    let workflow = wait_terminal(&engine, id).await;
    assert_eq!(workflow.status, WorkflowStatus::Stopped);

    // Phases completed before the stop keep their results.
    assert_eq!(
        workflow.phase(PhaseName::Reconnaissance).status,
        PhaseStatus::Completed
    );
    assert_eq!(
        workflow.phase(PhaseName::TargetExtraction).status,
        PhaseStatus::Completed
    );
    // The interrupted phase is frozen as stopped, keeping the outcomes that
    // drained before the stop was observed; correlation never runs.
    let scanning = workflow.phase(PhaseName::Web2Scanning);
    assert_eq!(scanning.status, PhaseStatus::Stopped);
    let outcomes = scan_outcomes(&workflow);
    assert!(
        !outcomes.is_empty() && outcomes.len() < 4,
        "expected only the drained subset of outcomes, got {}",
        outcomes.len()
    );
    assert!(outcomes.iter().all(|o| o.status == ScanStatus::Completed));
    assert_eq!(
        workflow.phase(PhaseName::Correlation).status,
        PhaseStatus::Pending
    );

    assert!(matches!(
        engine.results(id).await,
        Err(EngineError::NotReady(WorkflowStatus::Stopped))
    ));
    // A second stop hits a terminal workflow.
    assert!(matches!(
        engine.stop(id).await,
        Err(EngineError::InvalidState(WorkflowStatus::Stopped))
    ));
}

#[tokio::test]
async fn test_stop_unknown_workflow() {
    let (_store, engine) = build_engine(
        Arc::new(StaticRecon::with_hosts(&[])),
        Arc::new(TableScanner::default()),
        EngineSettings::default(),
    );
    assert!(matches!(
        engine.stop(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_rejects_invalid_requests() {
    let (_store, engine) = build_engine(
        Arc::new(StaticRecon::with_hosts(&[])),
        Arc::new(TableScanner::default()),
        EngineSettings::default(),
    );

    assert!(matches!(
        engine.start("  ", default_options()).await,
        Err(EngineError::Validation(_))
    ));

    let mut no_concurrency = default_options();
    no_concurrency.max_concurrent = 0;
    assert!(matches!(
        engine.start("example.com", no_concurrency).await,
        Err(EngineError::Validation(_))
    ));

    let mut no_scans = default_options();
    no_scans.scan_types.clear();
    assert!(matches!(
        engine.start("example.com", no_scans).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn test_status_of_unknown_workflow_is_not_found() {
    let (_store, engine) = build_engine(
        Arc::new(StaticRecon::with_hosts(&[])),
        Arc::new(TableScanner::default()),
        EngineSettings::default(),
    );
    assert!(matches!(
        engine.status(Uuid::new_v4()).await,
        Err(EngineError::NotFound(_))
    ));
}

// ── Restart recovery ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_recovery_sweep_marks_interrupted_workflows() {
    let store = Arc::new(InMemoryWorkflowStore::new());

    // Simulate a workflow left mid-run by a crashed process.
    let mut abandoned = Workflow::new("example.com".into(), default_options());
    abandoned
        .transition(WorkflowStatus::Running, Some("pipeline started".into()))
        .unwrap();
    abandoned.phase_mut(PhaseName::Reconnaissance).start();
    abandoned
        .phase_mut(PhaseName::Reconnaissance)
        .complete(PhaseOutput::Reconnaissance(ReconOutput {
            domain: "example.com".into(),
            hosts: Vec::new(),
        }));
    abandoned.phase_mut(PhaseName::TargetExtraction).start();
    let abandoned_id = abandoned.id;

    // A terminal workflow must be left untouched by the sweep.
    let mut done = Workflow::new("other.com".into(), default_options());
    done.transition(WorkflowStatus::Running, None).unwrap();
    done.transition(WorkflowStatus::Completed, None).unwrap();
    let done_id = done.id;

    store.save(&WorkflowRecord::new(abandoned)).await.unwrap();
    store.save(&WorkflowRecord::new(done)).await.unwrap();

    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(StaticRecon::with_hosts(&[])),
        Arc::new(TableScanner::default()),
        EngineSettings::default(),
    );
    let recovered = engine.recover_interrupted().await.expect("sweep must run");
    assert_eq!(recovered, 1);

    let swept = engine.status(abandoned_id).await.unwrap();
    assert_eq!(swept.status, WorkflowStatus::Failed);
    assert!(swept.interrupted);
    assert_eq!(
        swept.phase(PhaseName::Reconnaissance).status,
        PhaseStatus::Completed
    );
    assert_eq!(
        swept.phase(PhaseName::TargetExtraction).status,
        PhaseStatus::Failed
    );

    let untouched = engine.status(done_id).await.unwrap();
    assert_eq!(untouched.status, WorkflowStatus::Completed);
    assert!(!untouched.interrupted);
}
