//! Correlation engine — joins scan outcomes back against reconnaissance
//! provenance, computes per-target risk scores, and derives the
//! workflow-level aggregate.

use std::collections::HashMap;

use chrono::Utc;

use crate::domain::entities::{
    Correlation, CorrelatedResult, Finding, HighRiskTarget, ScanOutcome, SeverityBreakdown,
    Target, WorkflowSummary,
};
use crate::domain::value_objects::{ReconTechnique, Severity, TargetKind};

/// Risk score above which a target is reported as high-risk.
pub const DEFAULT_HIGH_RISK_THRESHOLD: u32 = 70;

/// Per-target risk scores are capped here; a handful of criticals already
/// tells the full story.
const RISK_SCORE_CAP: u32 = 100;

/// Declarative correlation rule: a predicate over (provenance, finding) pairs
/// plus a description template. Adding a heuristic means adding a rule here,
/// never touching dispatch or correlation plumbing.
#[derive(Debug, Clone)]
pub struct CorrelationRule {
    /// Type tag carried on every produced correlation entry.
    pub tag: &'static str,
    /// Required discovery technique, if any.
    pub technique: Option<ReconTechnique>,
    /// Required target kind, if any.
    pub target_kind: Option<TargetKind>,
    /// Substrings matched against the finding's `vuln_type`; empty matches all.
    pub finding_keywords: &'static [&'static str],
    /// Minimum finding severity, if any.
    pub min_severity: Option<Severity>,
    /// Template with `{host}`, `{technique}` and `{finding}` placeholders.
    pub description: &'static str,
}

impl CorrelationRule {
    fn matches(&self, target: &Target, finding: &Finding) -> bool {
        if let Some(technique) = self.technique
            && !target.discovered_by.contains(&technique)
        {
            return false;
        }
        if let Some(kind) = self.target_kind
            && target.kind != kind
        {
            return false;
        }
        if let Some(min) = self.min_severity
            && !finding.severity.at_least(min)
        {
            return false;
        }
        self.finding_keywords.is_empty()
            || self
                .finding_keywords
                .iter()
                .any(|keyword| finding.vuln_type.contains(keyword))
    }

    fn describe(&self, target: &Target, finding: &Finding) -> String {
        let technique = self
            .technique
            .or_else(|| target.discovered_by.first().copied())
            .map(|t| t.to_string())
            .unwrap_or_else(|| "reconnaissance".to_string());
        self.description
            .replace("{host}", &target.host)
            .replace("{technique}", &technique)
            .replace("{finding}", &finding.vuln_type)
    }
}

/// Built-in correlation heuristics.
pub fn default_rules() -> Vec<CorrelationRule> {
    vec![
        CorrelationRule {
            tag: "ct_auth_exposure",
            technique: Some(ReconTechnique::CertificateTransparency),
            target_kind: None,
            finding_keywords: &["auth", "login", "admin", "panel"],
            min_severity: None,
            description: "Host {host} surfaced through certificate transparency logs and carries \
                          an authentication-related weakness ({finding})",
        },
        CorrelationRule {
            tag: "critical_on_enumerated_host",
            technique: None,
            target_kind: None,
            finding_keywords: &[],
            min_severity: Some(Severity::Critical),
            description: "Host {host}, discovered via {technique}, has a critical finding \
                          ({finding}) reachable from the public internet",
        },
        CorrelationRule {
            tag: "api_injection_surface",
            technique: None,
            target_kind: Some(TargetKind::Api),
            finding_keywords: &["injection", "sqli", "sql_injection"],
            min_severity: None,
            description: "API endpoint {host} accepts injected input ({finding}); upstream \
                          consumers of this API inherit the exposure",
        },
        CorrelationRule {
            tag: "crawl_discovered_xss",
            technique: Some(ReconTechnique::WebCrawl),
            target_kind: None,
            finding_keywords: &["xss", "cross_site"],
            min_severity: None,
            description: "Host {host} was reachable by crawling alone and reflects script input \
                          ({finding})",
        },
    ]
}

/// Aggregates scan outcomes against target provenance. Outcome order is not
/// assumed; outcomes join to targets by normalized URL.
pub fn correlate(
    targets: &[Target],
    outcomes: &[ScanOutcome],
    rules: &[CorrelationRule],
    high_risk_threshold: u32,
) -> CorrelatedResult {
    let by_url: HashMap<&str, &Target> =
        targets.iter().map(|t| (t.url.as_str(), t)).collect();

    let mut by_severity = SeverityBreakdown::default();
    let mut total_vulnerabilities = 0;
    let mut high_risk_targets = Vec::new();
    let mut correlations = Vec::new();

    for outcome in outcomes {
        let Some(target) = by_url.get(outcome.target.as_str()) else {
            // Outcome for an unknown target; dispatcher only scans extracted
            // targets, so this indicates a provider echoing back a rewritten URL.
            tracing::warn!(target = %outcome.target, "scan outcome does not join to any target");
            continue;
        };

        total_vulnerabilities += outcome.findings.len();
        for finding in &outcome.findings {
            match finding.severity {
                Severity::Critical => by_severity.critical += 1,
                Severity::High => by_severity.high += 1,
                Severity::Medium => by_severity.medium += 1,
                Severity::Low => by_severity.low += 1,
                Severity::Info => by_severity.info += 1,
            }

            for rule in rules {
                if rule.matches(target, finding) {
                    correlations.push(Correlation {
                        rule: rule.tag.to_string(),
                        target: target.host.clone(),
                        description: rule.describe(target, finding),
                    });
                }
            }
        }

        let score = risk_score(&outcome.findings);
        let has_critical = outcome
            .findings
            .iter()
            .any(|f| f.severity == Severity::Critical);
        if score > high_risk_threshold || has_critical {
            high_risk_targets.push(HighRiskTarget {
                target: target.host.clone(),
                risk_score: score,
                vulnerabilities: outcome.findings.len(),
            });
        }
    }

    // Deterministic output regardless of outcome completion order.
    high_risk_targets.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then(a.target.cmp(&b.target)));
    correlations.sort_by(|a, b| a.target.cmp(&b.target).then(a.rule.cmp(&b.rule)));

    CorrelatedResult {
        summary: WorkflowSummary {
            total_subdomains: targets.len(),
            targets_scanned: outcomes.len(),
            total_vulnerabilities,
            by_severity,
        },
        high_risk_targets,
        correlations,
        generated_at: Utc::now(),
    }
}

/// Weighted severity sum, capped at [`RISK_SCORE_CAP`]. Monotonic: adding a
/// finding never decreases the score.
pub fn risk_score(findings: &[Finding]) -> u32 {
    findings
        .iter()
        .map(|f| f.severity.weight())
        .sum::<u32>()
        .min(RISK_SCORE_CAP)
}
