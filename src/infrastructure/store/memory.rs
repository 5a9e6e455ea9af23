//! In-memory workflow store for tests and ephemeral deployments. State does
//! not survive a restart, so every boot starts with an empty history.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record::WorkflowRecord;
use super::{StoreError, WorkflowStore};

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    records: RwLock<HashMap<Uuid, WorkflowRecord>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save(&self, record: &WorkflowRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.workflow.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<WorkflowRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records.write().await.remove(&id);
        Ok(())
    }
}
