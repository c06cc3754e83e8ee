//! Per-run state store and the task-scoped view handed to task bodies.
//!
//! All accessors take an explicit task name; there is no ambient
//! "current task" pointer. A [`TaskHandle`] carries the name for the
//! body it was built for, so task code stays terse without hidden
//! mutable state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use auditrun_core::{
    ControlRef, ResultRecord, RunId, Severity, TaskDescriptor, TaskKind, TaskOutput, TaskRun,
    TaskStatus,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::EngineConfig;
use crate::controls::ControlResolver;
use crate::reporter::{ReportError, ReportSink, ResourceIdFn, ViolationPayload};

/// Mutable per-run task state behind the context lock.
#[derive(Default)]
struct RunState {
    /// Live execution records, one per started task.
    runs: HashMap<String, TaskRun>,

    /// Final result records, written exactly once per attempted task.
    results: HashMap<String, ResultRecord>,

    /// Task names in the order their final results were recorded.
    completion_order: Vec<String>,
}

/// Single source of truth for all per-run state.
///
/// Created once per run and discarded when the run ends. Shared behind an
/// `Arc` with the managed executions the orchestrator spawns; a body
/// abandoned on deadline expiry may still hold a clone, so interior state
/// sits behind a mutex even though scheduling is sequential.
pub struct RunContext {
    run_id: RunId,
    base: HashMap<String, Value>,
    config: Arc<EngineConfig>,
    controls: Arc<ControlResolver>,
    reporter: Arc<dyn ReportSink>,
    resource_id_fn: ResourceIdFn,
    descriptors: HashMap<String, TaskDescriptor>,
    state: Mutex<RunState>,
}

impl RunContext {
    pub(crate) fn new(
        run_id: RunId,
        base: HashMap<String, Value>,
        config: Arc<EngineConfig>,
        controls: Arc<ControlResolver>,
        reporter: Arc<dyn ReportSink>,
        resource_id_fn: ResourceIdFn,
        descriptors: HashMap<String, TaskDescriptor>,
    ) -> Self {
        Self {
            run_id,
            base,
            config,
            controls,
            reporter,
            resource_id_fn,
            descriptors,
            state: Mutex::new(RunState::default()),
        }
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Read a value from the immutable base context.
    pub fn base(&self, key: &str) -> Option<Value> {
        self.base.get(key).cloned()
    }

    /// Read a value from the base context with a fallback.
    pub fn base_or(&self, key: &str, default: Value) -> Value {
        self.base.get(key).cloned().unwrap_or(default)
    }

    /// Descriptor for a registered task name.
    pub fn descriptor(&self, task_name: &str) -> Option<&TaskDescriptor> {
        self.descriptors.get(task_name)
    }

    /// Whether verbose failure diagnostics are enabled.
    pub fn debug(&self) -> bool {
        self.config.debug
    }

    /// Current status of a task; `Queued` if it has not started.
    pub fn status(&self, task_name: &str) -> TaskStatus {
        let state = self.state.lock().unwrap();
        state
            .runs
            .get(task_name)
            .map(|run| run.status)
            .unwrap_or_default()
    }

    /// Mark a task in-progress and stamp its start time.
    pub(crate) fn begin_task(&self, task_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.runs.entry(task_name.to_string()).or_default().start();
    }

    /// Mark a task done and stamp its end time.
    pub(crate) fn finish_task(&self, task_name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .runs
            .entry(task_name.to_string())
            .or_default()
            .finish();
    }

    /// Mark a task skipped and stamp its end time.
    pub(crate) fn skip_task(&self, task_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.runs.entry(task_name.to_string()).or_default().skip();
    }

    /// Record an error against a task.
    pub fn add_error(&self, task_name: &str, error: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .runs
            .entry(task_name.to_string())
            .or_default()
            .errors
            .push(error.into());
    }

    /// Errors recorded against a task so far.
    pub fn errors(&self, task_name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .runs
            .get(task_name)
            .map(|run| run.errors.clone())
            .unwrap_or_default()
    }

    /// Append a timestamped log line to a task's log.
    ///
    /// Timestamps are UTC, second precision with a millisecond suffix.
    pub fn add_log(&self, task_name: &str, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let line = format!("[{timestamp}] {message}");
        let mut state = self.state.lock().unwrap();
        state
            .runs
            .entry(task_name.to_string())
            .or_default()
            .logs
            .push(line);
    }

    /// Log lines appended for a task so far.
    pub fn logs(&self, task_name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .runs
            .get(task_name)
            .map(|run| run.logs.clone())
            .unwrap_or_default()
    }

    /// Record the diagnostic trace of an uncaught failure.
    pub(crate) fn set_traceback(&self, task_name: &str, traceback: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .runs
            .entry(task_name.to_string())
            .or_default()
            .traceback = Some(traceback.into());
    }

    /// Diagnostic trace for a task, if one was captured.
    pub fn traceback(&self, task_name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.runs.get(task_name).and_then(|run| run.traceback.clone())
    }

    /// Store a task's validated output and violation flag.
    pub(crate) fn set_output(&self, task_name: &str, output: TaskOutput, violation: bool) {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.entry(task_name.to_string()).or_default();
        run.output = Some(output);
        run.violation = violation;
    }

    /// Violation flag for a task; false until its output stores one.
    pub fn violation(&self, task_name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .runs
            .get(task_name)
            .map(|run| run.violation)
            .unwrap_or(false)
    }

    /// Whether a final result has been recorded for the task.
    ///
    /// Distinguishes "never ran" (false) from "ran and failed" (true, with
    /// `success == false`); the dependency gate relies on this.
    pub fn has_result(&self, task_name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.results.contains_key(task_name)
    }

    /// Success flag of a task's final result; false if none was recorded.
    pub fn result_succeeded(&self, task_name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .results
            .get(task_name)
            .map(|record| record.success)
            .unwrap_or(false)
    }

    /// The final result record for a task, if one was recorded.
    pub fn result(&self, task_name: &str) -> Option<ResultRecord> {
        let state = self.state.lock().unwrap();
        state.results.get(task_name).cloned()
    }

    /// Record a task's final result. First write wins: a circuit-failed
    /// record claims the slot before an abandoned body can finalize.
    pub(crate) fn record_result(&self, task_name: &str, record: ResultRecord) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.results.contains_key(task_name) {
            return false;
        }
        state.results.insert(task_name.to_string(), record);
        state.completion_order.push(task_name.to_string());
        true
    }

    /// Compute the formatted view of a task's state at this moment.
    ///
    /// Pure projection: callable repeatedly, before or after the task
    /// finishes, with no side effects. Until a final result is recorded,
    /// `success` defaults to true.
    pub fn format_result(&self, task_name: &str) -> ResultRecord {
        let state = self.state.lock().unwrap();
        let run = state.runs.get(task_name).cloned().unwrap_or_default();
        let success = state
            .results
            .get(task_name)
            .map(|record| record.success)
            .unwrap_or(true);
        let kind = self
            .descriptors
            .get(task_name)
            .map(|d| d.kind)
            .unwrap_or_default();
        ResultRecord {
            success,
            output: run.output.unwrap_or_default(),
            errors: run.errors,
            traceback: run.traceback,
            logs: run.logs,
            is_violation: run.violation,
            status: run.status,
            kind,
            controls: self.controls.controls_for(task_name),
            start_time: run.start_time,
            end_time: run.end_time,
            duration: match (run.start_time, run.end_time) {
                (Some(start), Some(end)) => {
                    Some(((end - start).num_milliseconds() as f64 / 1000.0).round() as i64)
                }
                _ => None,
            },
        }
    }

    /// Controls mapped to a task name.
    pub fn controls_for(&self, task_name: &str) -> Vec<ControlRef> {
        self.controls.controls_for(task_name)
    }

    /// Final results in the order they were recorded.
    pub(crate) fn ordered_results(&self) -> Vec<(String, ResultRecord)> {
        let state = self.state.lock().unwrap();
        state
            .completion_order
            .iter()
            .filter_map(|name| {
                state
                    .results
                    .get(name)
                    .map(|record| (name.clone(), record.clone()))
            })
            .collect()
    }

    /// Create a violation record on the job service for the given task.
    ///
    /// Builds the enriched payload (output, controls, severity, meta,
    /// timestamp), merges any caller-supplied overrides on top, and posts
    /// it. Errors surface to the caller; only the wrapper's auto-report
    /// path absorbs them.
    pub async fn create_violation(
        &self,
        task_name: &str,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Value, ReportError> {
        let record = self.format_result(task_name);
        let severity = self
            .descriptors
            .get(task_name)
            .and_then(|d| d.severity)
            .unwrap_or(Severity::Medium);
        let resource_id = (self.resource_id_fn)(&record.output.data);

        let payload = ViolationPayload {
            task_name: task_name.to_string(),
            control_references: record.controls.clone(),
            output: record.output,
            severity,
            description: None,
            violation_type: None,
            environment: None,
            meta: json!({
                "integration": self.config.integration,
                "job_id": self.config.job_id,
                "resource_id": resource_id,
            }),
            timestamp: Utc::now().to_rfc3339(),
        };

        let mut body = serde_json::to_value(&payload)?;
        if let (Value::Object(base), Some(extra)) = (&mut body, overrides) {
            for (key, value) in extra {
                base.insert(key, value);
            }
        }

        let response = self.reporter.send(&body).await?;
        info!(task = %task_name, "Violation created successfully");
        Ok(response)
    }
}

/// Narrow per-task view of the run context, handed to each task body.
///
/// Carries its task's name so accessor calls don't need to repeat it;
/// cross-task reads name the other task explicitly.
#[derive(Clone)]
pub struct TaskHandle {
    ctx: Arc<RunContext>,
    task: String,
}

impl TaskHandle {
    pub(crate) fn new(ctx: Arc<RunContext>, task: impl Into<String>) -> Self {
        Self {
            ctx,
            task: task.into(),
        }
    }

    /// Name of the task this handle belongs to.
    pub fn name(&self) -> &str {
        &self.task
    }

    /// Read a value from the base context.
    pub fn base(&self, key: &str) -> Option<Value> {
        self.ctx.base(key)
    }

    /// Read a value from the base context with a fallback.
    pub fn base_or(&self, key: &str, default: Value) -> Value {
        self.ctx.base_or(key, default)
    }

    /// Append a timestamped log line to this task's log.
    pub fn log(&self, message: &str) {
        self.ctx.add_log(&self.task, message);
    }

    /// Record a non-fatal error against this task.
    pub fn add_error(&self, error: impl Into<String>) {
        self.ctx.add_error(&self.task, error);
    }

    /// The `data` payload of another task's result.
    ///
    /// The most common cross-task read. Returns an empty object when the
    /// task has no stored output.
    pub fn data_of(&self, task_name: &str) -> Value {
        let record = self.ctx.format_result(task_name);
        match record.output.data {
            Value::Null => json!({}),
            data => data,
        }
    }

    /// The `message` of another task's result, if any.
    pub fn message_of(&self, task_name: &str) -> Option<String> {
        self.ctx.format_result(task_name).output.message
    }

    /// Whether another task ran and succeeded.
    pub fn succeeded(&self, task_name: &str) -> bool {
        self.ctx.result_succeeded(task_name)
    }

    /// The full formatted result of another task as it stands now.
    pub fn result_of(&self, task_name: &str) -> ResultRecord {
        self.ctx.format_result(task_name)
    }

    /// Kind of this handle's task.
    pub fn kind(&self) -> TaskKind {
        self.ctx
            .descriptor(&self.task)
            .map(|d| d.kind)
            .unwrap_or_default()
    }

    /// Report a violation for this task directly, outside the auto-report
    /// path. Failures propagate to the caller.
    pub async fn report_violation(
        &self,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Value, ReportError> {
        self.ctx.create_violation(&self.task, overrides).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{default_resource_id, NullReporter};

    fn test_context() -> Arc<RunContext> {
        let mut base = HashMap::new();
        base.insert("token".to_string(), json!("secret"));
        let mut descriptors = HashMap::new();
        descriptors.insert(
            "check_public_buckets".to_string(),
            TaskDescriptor::insight("check_public_buckets", "Check public buckets"),
        );
        Arc::new(RunContext::new(
            RunId::generate(),
            base,
            Arc::new(EngineConfig::default()),
            Arc::new(ControlResolver::default()),
            Arc::new(NullReporter),
            Arc::new(default_resource_id),
            descriptors,
        ))
    }

    #[test]
    fn test_base_lookup_with_default() {
        let ctx = test_context();
        assert_eq!(ctx.base("token"), Some(json!("secret")));
        assert_eq!(ctx.base("missing"), None);
        assert_eq!(ctx.base_or("missing", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_log_lines_are_timestamped() {
        let ctx = test_context();
        ctx.add_log("t", "hello");
        let logs = ctx.logs("t");
        assert_eq!(logs.len(), 1);
        // "[YYYY-mm-dd HH:MM:SS.mmm] hello"
        assert!(logs[0].starts_with('['));
        assert!(logs[0].ends_with("] hello"));
        let stamp = &logs[0][1..logs[0].find(']').unwrap()];
        assert_eq!(stamp.len(), "2026-01-01 00:00:00.000".len());
    }

    #[test]
    fn test_format_result_reflects_state_at_call_time() {
        let ctx = test_context();
        ctx.begin_task("t");
        let before = ctx.format_result("t");
        assert_eq!(before.status, TaskStatus::InProgress);
        assert!(before.success);

        ctx.add_error("t", "boom");
        ctx.finish_task("t");
        let mut record = ctx.format_result("t");
        record.success = false;
        ctx.record_result("t", record);

        let after = ctx.format_result("t");
        assert_eq!(after.status, TaskStatus::Done);
        assert!(!after.success);
        assert_eq!(after.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_has_result_distinguishes_never_ran_from_failed() {
        let ctx = test_context();
        assert!(!ctx.has_result("t"));
        ctx.begin_task("t");
        assert!(!ctx.has_result("t"), "in progress is not a recorded result");
        ctx.finish_task("t");
        let mut record = ctx.format_result("t");
        record.success = false;
        ctx.record_result("t", record);
        assert!(ctx.has_result("t"));
        assert!(!ctx.result_succeeded("t"));
    }

    #[test]
    fn test_record_result_first_write_wins() {
        let ctx = test_context();
        ctx.begin_task("t");
        let mut first = ctx.format_result("t");
        first.success = false;
        assert!(ctx.record_result("t", first));
        let mut second = ctx.format_result("t");
        second.success = true;
        assert!(!ctx.record_result("t", second));
        assert!(!ctx.result_succeeded("t"));
        assert_eq!(ctx.ordered_results().len(), 1);
    }
}
