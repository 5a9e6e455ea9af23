use serde::{Deserialize, Serialize};

use crate::domain::entities::Workflow;

/// Current snapshot schema version. Bump when the persisted workflow shape
/// changes incompatibly.
pub const RECORD_VERSION: u32 = 1;

/// Versioned persistence envelope around a workflow snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub version: u32,
    pub workflow: Workflow,
}

impl WorkflowRecord {
    pub fn new(workflow: Workflow) -> Self {
        Self {
            version: RECORD_VERSION,
            workflow,
        }
    }
}
