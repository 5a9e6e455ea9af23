//! Integration tests for the workflow status state machine and audit trail.

use reconflow::domain::entities::{Phase, PhaseOutput, ReconOutput, Workflow, WorkflowOptions};
use reconflow::domain::value_objects::{PhaseName, PhaseStatus, WorkflowStatus};

fn test_options() -> WorkflowOptions {
    WorkflowOptions {
        recon_profile: "standard".into(),
        scan_types: vec!["sqli".into(), "xss".into()],
        max_concurrent: 5,
        target_timeout_seconds: 60,
    }
}

fn test_workflow() -> Workflow {
    Workflow::new("example.com".into(), test_options())
}

// ── Transition matrix ────────────────────────────────────────────────────────

#[test]
fn test_new_workflow_is_pending_with_all_phases() {
    let workflow = test_workflow();
    assert_eq!(workflow.status, WorkflowStatus::Pending);
    assert_eq!(workflow.phases.len(), 4);
    assert_eq!(workflow.phases[0].name, PhaseName::Reconnaissance);
    assert_eq!(workflow.phases[3].name, PhaseName::Correlation);
    assert!(
        workflow
            .phases
            .iter()
            .all(|p| p.status == PhaseStatus::Pending && p.progress == 0)
    );
    assert!(workflow.transitions.is_empty());
}

#[test]
fn test_happy_path_lifecycle() {
    let mut workflow = test_workflow();

    workflow
        .transition(WorkflowStatus::Running, Some("pipeline started".into()))
        .expect("pending -> running");
    assert_eq!(workflow.status, WorkflowStatus::Running);

    workflow
        .transition(WorkflowStatus::Completed, Some("pipeline finished".into()))
        .expect("running -> completed");
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(workflow.status.is_terminal());

    assert_eq!(workflow.transitions.len(), 2);
    assert_eq!(workflow.transitions[0].from, WorkflowStatus::Pending);
    assert_eq!(workflow.transitions[0].to, WorkflowStatus::Running);
    assert_eq!(
        workflow.transitions[0].reason.as_deref(),
        Some("pipeline started")
    );
    assert_eq!(workflow.transitions[1].to, WorkflowStatus::Completed);
}

#[test]
fn test_stop_from_pending_and_running() {
    let mut pending = test_workflow();
    pending
        .transition(WorkflowStatus::Stopped, Some("stop requested".into()))
        .expect("pending -> stopped");
    assert!(pending.status.is_terminal());

    let mut running = test_workflow();
    running.transition(WorkflowStatus::Running, None).unwrap();
    running
        .transition(WorkflowStatus::Stopped, Some("stop requested".into()))
        .expect("running -> stopped");
    assert_eq!(running.status, WorkflowStatus::Stopped);
}

#[test]
fn test_invalid_transitions_rejected() {
    let mut pending = test_workflow();
    let err = pending
        .transition(WorkflowStatus::Completed, None)
        .expect_err("pending -> completed must be rejected");
    assert_eq!(err.from, WorkflowStatus::Pending);
    assert_eq!(err.to, WorkflowStatus::Completed);
    // Rejected transitions leave no trace.
    assert_eq!(pending.status, WorkflowStatus::Pending);
    assert!(pending.transitions.is_empty());

    for terminal in [
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::Stopped,
    ] {
        assert!(terminal.is_terminal());
        assert!(terminal.valid_transitions().is_empty());
    }
}

#[test]
fn test_status_display_is_lowercase() {
    assert_eq!(WorkflowStatus::Pending.to_string(), "pending");
    assert_eq!(WorkflowStatus::Running.to_string(), "running");
    assert_eq!(WorkflowStatus::Completed.to_string(), "completed");
    assert_eq!(WorkflowStatus::Failed.to_string(), "failed");
    assert_eq!(WorkflowStatus::Stopped.to_string(), "stopped");
}

#[test]
fn test_phase_names_display() {
    assert_eq!(PhaseName::Reconnaissance.to_string(), "reconnaissance");
    assert_eq!(PhaseName::TargetExtraction.to_string(), "target_extraction");
    assert_eq!(PhaseName::Web2Scanning.to_string(), "web2_scanning");
    assert_eq!(PhaseName::Correlation.to_string(), "correlation");
}

// ── Phase progress ───────────────────────────────────────────────────────────

#[test]
fn test_phase_progress_is_monotonic_and_clamped() {
    let mut phase = Phase::new(PhaseName::Web2Scanning);
    phase.start();
    assert_eq!(phase.status, PhaseStatus::Running);

    phase.set_progress(40);
    assert_eq!(phase.progress, 40);

    // Late updates never move progress backwards.
    phase.set_progress(20);
    assert_eq!(phase.progress, 40);

    phase.set_progress(250);
    assert_eq!(phase.progress, 100);
}

#[test]
fn test_phase_stop_retains_partial_output() {
    let mut phase = Phase::new(PhaseName::Web2Scanning);
    phase.start();
    phase.set_progress(50);
    phase.stop(Some(PhaseOutput::Web2Scanning {
        outcomes: Vec::new(),
    }));

    assert_eq!(phase.status, PhaseStatus::Stopped);
    assert!(phase.output.is_some());
    assert!(phase.error.is_none());
    // Progress freezes where the stop caught it.
    assert_eq!(phase.progress, 50);
    assert!(phase.finished_at.is_some());
}

#[test]
fn test_phase_stop_without_output() {
    let mut phase = Phase::new(PhaseName::Correlation);
    phase.start();
    phase.stop(None);
    assert_eq!(phase.status, PhaseStatus::Stopped);
    assert!(phase.output.is_none());
}

#[test]
fn test_phase_complete_pins_progress() {
    let mut phase = Phase::new(PhaseName::Reconnaissance);
    phase.start();
    phase.set_progress(30);
    phase.complete(PhaseOutput::Reconnaissance(ReconOutput {
        domain: "example.com".into(),
        hosts: Vec::new(),
    }));
    assert_eq!(phase.status, PhaseStatus::Completed);
    assert_eq!(phase.progress, 100);
    assert!(phase.finished_at.is_some());
}

// ── Restart recovery ─────────────────────────────────────────────────────────

#[test]
fn test_mark_interrupted_fails_running_phases_only() {
    let mut workflow = test_workflow();
    workflow.transition(WorkflowStatus::Running, None).unwrap();

    workflow.phase_mut(PhaseName::Reconnaissance).start();
    workflow
        .phase_mut(PhaseName::Reconnaissance)
        .complete(PhaseOutput::Reconnaissance(ReconOutput {
            domain: "example.com".into(),
            hosts: Vec::new(),
        }));
    workflow.phase_mut(PhaseName::TargetExtraction).start();

    workflow.mark_interrupted().expect("running -> failed");

    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert!(workflow.interrupted);
    assert!(workflow.error.is_some());

    // The completed phase keeps its result; the in-flight one fails with it.
    assert_eq!(
        workflow.phase(PhaseName::Reconnaissance).status,
        PhaseStatus::Completed
    );
    assert!(workflow.phase(PhaseName::Reconnaissance).output.is_some());
    assert_eq!(
        workflow.phase(PhaseName::TargetExtraction).status,
        PhaseStatus::Failed
    );
    assert_eq!(
        workflow.phase(PhaseName::Web2Scanning).status,
        PhaseStatus::Pending
    );
}

#[test]
fn test_mark_interrupted_from_pending() {
    // A workflow accepted but never started can also be caught by a restart.
    let mut workflow = test_workflow();
    workflow.mark_interrupted().expect("pending -> failed");
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert!(workflow.interrupted);
}
