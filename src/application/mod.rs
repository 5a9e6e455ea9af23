//! Application layer — pipeline use cases and the workflow engine

pub mod correlation;
pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod extractor;

pub use engine::{EngineError, EngineSettings, WorkflowEngine};
