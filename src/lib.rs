//! Reconflow — workflow orchestration for automated security assessments
//!
//! Drives a fixed four-phase pipeline per target domain:
//!
//! 1. **Reconnaissance** — subdomain discovery via the external recon provider
//! 2. **Target extraction** — normalization and deduplication into scan units
//! 3. **Web2 scanning** — bounded-concurrency vulnerability scans per target
//! 4. **Correlation** — joining recon provenance with scan findings into a
//!    risk-scored report
//!
//! Workflows are launched asynchronously over HTTP, polled for per-phase
//! progress, stopped cooperatively, and persisted as snapshots so state
//! survives restarts.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

mod app;

pub use app::{AppHandle, AppInitError, create_app};
pub use config::Config;
pub use logging::init_tracing;
