//! Target extraction — pure transformation of reconnaissance output into a
//! deduplicated, normalized list of scan targets.
//!
//! Deterministic by construction: identical recon output yields an identical,
//! identically-ordered target list (sorted by host), which makes the phase
//! trivially retryable.

use std::collections::BTreeMap;

use crate::domain::entities::{ReconOutput, Target};
use crate::domain::value_objects::TargetKind;

/// Turns raw reconnaissance output into sorted, deduplicated scan targets.
/// Duplicate hosts from different techniques collapse into one target with
/// merged provenance.
pub fn extract(recon: &ReconOutput) -> Vec<Target> {
    let mut by_host: BTreeMap<String, Target> = BTreeMap::new();

    for discovered in &recon.hosts {
        let Some(host) = normalize_host(&discovered.host) else {
            continue;
        };
        let entry = by_host.entry(host.clone()).or_insert_with(|| Target {
            url: format!("https://{host}"),
            kind: infer_kind(&host),
            host,
            discovered_by: Vec::new(),
        });
        if !entry.discovered_by.contains(&discovered.technique) {
            entry.discovered_by.push(discovered.technique);
        }
    }

    let mut targets: Vec<Target> = by_host.into_values().collect();
    for target in &mut targets {
        target.discovered_by.sort();
    }
    targets
}

/// Lower-cases, strips any scheme and path, and trims trailing dots.
/// Returns `None` for entries that normalize to nothing.
fn normalize_host(raw: &str) -> Option<String> {
    let mut host = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            host = rest.to_string();
            break;
        }
    }
    if let Some((authority, _path)) = host.split_once('/') {
        host = authority.to_string();
    }
    let host = host.trim_end_matches('.').to_string();
    if host.is_empty() { None } else { Some(host) }
}

fn infer_kind(host: &str) -> TargetKind {
    if host.starts_with("api.") || host.contains(".api.") {
        TargetKind::Api
    } else {
        TargetKind::Web
    }
}
