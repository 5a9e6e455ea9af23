//! Workflow persistence — single source of truth for state that crosses
//! process boundaries.

mod file;
mod memory;
mod record;

pub use file::FileWorkflowStore;
pub use memory::InMemoryWorkflowStore;
pub use record::{RECORD_VERSION, WorkflowRecord};

use async_trait::async_trait;
use uuid::Uuid;

/// Workflow persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),
}

/// Workflow storage interface. Records are full versioned-JSON snapshots of
/// a workflow, keyed by its id; `save` overwrites atomically.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn save(&self, record: &WorkflowRecord) -> Result<(), StoreError>;
    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, StoreError>;
    async fn list(&self) -> Result<Vec<WorkflowRecord>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
