//! Infrastructure layer — persistence and provider clients

pub mod providers;
pub mod store;

pub use providers::{HttpReconProvider, HttpScanProvider};
pub use store::{
    FileWorkflowStore, InMemoryWorkflowStore, StoreError, WorkflowRecord, WorkflowStore,
};
