//! AuditRun Task Execution Engine
//!
//! Wraps arbitrary task bodies in a managed lifecycle (status tracking,
//! dependency gating, output validation, violation reporting) and drives
//! them sequentially under a per-task deadline. Task code is registered
//! explicitly by an external loader; the engine never inspects the
//! filesystem for it.

pub mod config;
pub mod context;
pub mod controls;
pub mod reporter;
pub mod runner;
pub mod wrapper;

// Re-export commonly used types
pub use config::EngineConfig;
pub use context::{RunContext, TaskHandle};
pub use controls::{ControlMapError, ControlResolver};
pub use reporter::{HttpReporter, NullReporter, ReportError, ReportSink, ViolationPayload};
pub use runner::{RunOptions, RunReport, Runner};
pub use wrapper::{run_managed, TaskBody, TaskFuture};
