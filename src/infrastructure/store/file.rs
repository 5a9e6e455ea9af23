//! Filesystem-backed workflow store: one JSON document per workflow id,
//! written atomically (tmp file + rename) so a crash never leaves a
//! half-written snapshot behind.

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

use super::record::{RECORD_VERSION, WorkflowRecord};
use super::{StoreError, WorkflowStore};

pub struct FileWorkflowStore {
    dir: PathBuf,
}

impl FileWorkflowStore {
    /// Opens (and creates if needed) the data directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn decode(bytes: &[u8]) -> Result<WorkflowRecord, StoreError> {
        let record: WorkflowRecord =
            serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if record.version > RECORD_VERSION {
            return Err(StoreError::UnsupportedVersion(record.version));
        }
        Ok(record)
    }
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn save(&self, record: &WorkflowRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = self.path_for(record.workflow.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(workflow_id = %record.workflow.id, "Workflow snapshot saved");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<WorkflowRecord>, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(Self::decode(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<WorkflowRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match Self::decode(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => {
                    // A corrupt snapshot should not block recovery of the rest.
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable workflow snapshot");
                }
            }
        }
        Ok(records)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
