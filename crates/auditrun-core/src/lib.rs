//! AuditRun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime specifics
//!
//! All types here represent the core business domain of AuditRun:
//! task descriptors, run state, validated task output, and the
//! externally visible result records.

pub mod descriptor;
pub mod error;
pub mod ids;
pub mod output;
pub mod record;
pub mod status;

// Re-export commonly used types
pub use descriptor::{Severity, TaskDescriptor, TaskKind};
pub use error::CoreError;
pub use ids::RunId;
pub use output::{OutputError, TaskOutput, ValidatedOutput};
pub use record::{ControlRef, ResultRecord, TaskRun};
pub use status::TaskStatus;
