//! Per-task run state and the externally visible result record.

use crate::output::TaskOutput;
use crate::status::TaskStatus;
use crate::TaskKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A compliance-framework control associated with an insight task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlRef {
    /// Framework name (e.g. "cis", "soc2").
    pub framework: String,

    /// Control identifier within the framework.
    pub control_id: String,
}

impl ControlRef {
    /// Create a new control reference.
    pub fn new(framework: impl Into<String>, control_id: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            control_id: control_id.into(),
        }
    }
}

/// Mutable execution record for one task within one run.
///
/// Owned exclusively by the run context; destroyed with it when the run
/// ends. The formatted [`ResultRecord`] is always derived from this
/// state, never stored alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    /// Current lifecycle status.
    pub status: TaskStatus,

    /// When the wrapper marked the task in-progress.
    pub start_time: Option<DateTime<Utc>>,

    /// When the task reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,

    /// Validated output, present only after a successful invocation.
    pub output: Option<TaskOutput>,

    /// Errors recorded against the task, in order of occurrence.
    pub errors: Vec<String>,

    /// Full diagnostic trace of an uncaught failure, when captured.
    pub traceback: Option<String>,

    /// Timestamped log lines appended by the task body.
    pub logs: Vec<String>,

    /// Violation flag from the task's validated output.
    pub violation: bool,
}

impl TaskRun {
    /// Mark the task started.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.start_time = Some(Utc::now());
    }

    /// Mark the task finished (successfully or not).
    pub fn finish(&mut self) {
        self.status = TaskStatus::Done;
        self.end_time = Some(Utc::now());
    }

    /// Mark the task skipped by the dependency gate.
    pub fn skip(&mut self) {
        self.status = TaskStatus::Skipped;
        self.end_time = Some(Utc::now());
    }

    /// Whole-second duration between start and end, if both are known.
    pub fn duration_secs(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                let millis = (end - start).num_milliseconds();
                Some((millis as f64 / 1000.0).round() as i64)
            }
            _ => None,
        }
    }
}

/// The externally visible, formatted view of one task's run.
///
/// Derived on demand from [`TaskRun`] plus descriptor metadata; requesting
/// it mid-run reflects whatever state exists at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Whether the task completed successfully.
    pub success: bool,

    /// The task's validated output (`data` plus optional `message`).
    pub output: TaskOutput,

    /// Errors recorded against the task.
    pub errors: Vec<String>,

    /// Diagnostic trace, present only on uncaught failure.
    pub traceback: Option<String>,

    /// Timestamped log lines.
    pub logs: Vec<String>,

    /// Whether the task flagged a violation.
    pub is_violation: bool,

    /// Lifecycle status at format time.
    pub status: TaskStatus,

    /// Collector or insight.
    #[serde(rename = "type")]
    pub kind: TaskKind,

    /// Controls mapped to this task (empty for collectors).
    pub controls: Vec<ControlRef>,

    /// When the task started.
    pub start_time: Option<DateTime<Utc>>,

    /// When the task finished.
    pub end_time: Option<DateTime<Utc>>,

    /// Whole-second duration, when both timestamps are known.
    pub duration: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_run_lifecycle() {
        let mut run = TaskRun::default();
        assert_eq!(run.status, TaskStatus::Queued);
        run.start();
        assert_eq!(run.status, TaskStatus::InProgress);
        assert!(run.start_time.is_some());
        run.finish();
        assert_eq!(run.status, TaskStatus::Done);
        assert!(run.end_time.is_some());
        assert_eq!(run.duration_secs(), Some(0));
    }

    #[test]
    fn test_skip_leaves_no_start_requirement() {
        let mut run = TaskRun::default();
        run.start();
        run.skip();
        assert_eq!(run.status, TaskStatus::Skipped);
        assert!(run.status.is_terminal());
    }

    #[test]
    fn test_record_serializes_kind_as_type() {
        let record = ResultRecord {
            success: true,
            output: TaskOutput::default(),
            errors: vec![],
            traceback: None,
            logs: vec![],
            is_violation: false,
            status: TaskStatus::Done,
            kind: TaskKind::Insight,
            controls: vec![ControlRef::new("cis", "1.2")],
            start_time: None,
            end_time: None,
            duration: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "insight");
        assert_eq!(json["controls"][0]["framework"], "cis");
    }
}
