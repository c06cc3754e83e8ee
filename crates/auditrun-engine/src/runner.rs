//! The orchestrator: selects, orders, and drives registered tasks.
//!
//! Tasks execute strictly one at a time, in ascending `order` (stable on
//! ties), each inside its own spawned unit so a wall-clock deadline can
//! be imposed. A task that outlives its deadline is abandoned, not
//! cancelled: the spawned body may keep running on the runtime until it
//! returns on its own. Known resource-leak risk, accepted for now.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use auditrun_core::{CoreError, ResultRecord, RunId, TaskDescriptor};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::context::{RunContext, TaskHandle};
use crate::controls::ControlResolver;
use crate::reporter::{default_resource_id, HttpReporter, ReportSink, ResourceIdFn};
use crate::wrapper::{run_managed, TaskBody, TaskFuture};

/// One registered task: descriptor plus body.
struct RegisteredTask {
    descriptor: TaskDescriptor,
    body: TaskBody,
}

/// Per-run inputs: an optional subset of task names and an optional
/// deadline override.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// When non-empty, only these tasks run; everything else is left out
    /// of the result map entirely (distinct from "skipped").
    pub tasks: Vec<String>,

    /// Per-run override of the configured task deadline.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    /// Restrict the run to the given task names.
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Override the task deadline for this run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The run's output: task name -> final result record, in execution
/// order.
#[derive(Debug, Clone)]
pub struct RunReport {
    run_id: RunId,
    entries: Vec<(String, ResultRecord)>,
}

impl RunReport {
    /// Identifier of the run that produced this report.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// The record for a task, if it was selected and attempted.
    pub fn get(&self, task_name: &str) -> Option<&ResultRecord> {
        self.entries
            .iter()
            .find(|(name, _)| name == task_name)
            .map(|(_, record)| record)
    }

    /// Like `get`, but a task that was never part of the run is an
    /// explicit error, distinct from a skipped task, which has a record.
    pub fn require(&self, task_name: &str) -> Result<&ResultRecord, CoreError> {
        self.get(task_name)
            .ok_or_else(|| CoreError::TaskNotFound(task_name.to_string()))
    }

    /// Iterate records in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultRecord)> {
        self.entries
            .iter()
            .map(|(name, record)| (name.as_str(), record))
    }

    /// Number of attempted tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RunReport {
    /// Serializes as a map in execution order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, record) in &self.entries {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

/// Orchestrator for one task set.
///
/// An external loader registers tasks before a run starts; the runner
/// never discovers task code itself.
pub struct Runner {
    config: Arc<EngineConfig>,
    controls: Arc<ControlResolver>,
    reporter: Arc<dyn ReportSink>,
    resource_id_fn: ResourceIdFn,
    tasks: Vec<RegisteredTask>,
}

impl Runner {
    /// Create a runner with the HTTP violation reporter.
    pub fn new(config: EngineConfig) -> Self {
        let reporter = Arc::new(HttpReporter::new(&config));
        Self {
            config: Arc::new(config),
            controls: Arc::new(ControlResolver::default()),
            reporter,
            resource_id_fn: Arc::new(default_resource_id),
            tasks: Vec::new(),
        }
    }

    /// Builder method to install a control resolver.
    pub fn with_controls(mut self, controls: ControlResolver) -> Self {
        self.controls = Arc::new(controls);
        self
    }

    /// Builder method to replace the violation report transport.
    pub fn with_reporter(mut self, reporter: Arc<dyn ReportSink>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Builder method to replace the resource-id heuristic used in
    /// violation payloads.
    pub fn with_resource_id_fn(
        mut self,
        f: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.resource_id_fn = Arc::new(f);
        self
    }

    /// Register a task. Rejects duplicate names.
    pub fn register<F, Fut>(
        &mut self,
        descriptor: TaskDescriptor,
        body: F,
    ) -> Result<(), CoreError>
    where
        F: Fn(TaskHandle) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        if self
            .tasks
            .iter()
            .any(|task| task.descriptor.name == descriptor.name)
        {
            return Err(CoreError::DuplicateTask(descriptor.name));
        }
        let body: TaskBody = Arc::new(move |handle| -> TaskFuture { Box::pin(body(handle)) });
        self.tasks.push(RegisteredTask { descriptor, body });
        Ok(())
    }

    /// Names of all registered tasks, in registration order.
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .map(|task| task.descriptor.name.as_str())
            .collect()
    }

    /// Execute the selected tasks against the given base context and
    /// return the accumulated result map.
    ///
    /// Always completes: every selected, enabled task ends up in the
    /// report as executed, skipped, or circuit-failed.
    pub async fn run(&self, base: HashMap<String, Value>, options: RunOptions) -> RunReport {
        let run_id = RunId::generate();
        let deadline = options.timeout.unwrap_or(self.config.task_timeout);

        let descriptors: HashMap<String, TaskDescriptor> = self
            .tasks
            .iter()
            .map(|task| (task.descriptor.name.clone(), task.descriptor.clone()))
            .collect();

        let ctx = Arc::new(RunContext::new(
            run_id.clone(),
            base,
            self.config.clone(),
            self.controls.clone(),
            self.reporter.clone(),
            self.resource_id_fn.clone(),
            descriptors,
        ));

        let mut selected: Vec<&RegisteredTask> = self
            .tasks
            .iter()
            .filter(|task| task.descriptor.enabled)
            .filter(|task| {
                options.tasks.is_empty()
                    || options.tasks.iter().any(|name| *name == task.descriptor.name)
            })
            .collect();
        // Stable sort: ties keep registration order, so collectors run
        // before insights by default.
        selected.sort_by_key(|task| task.descriptor.order);

        info!(
            run_id = %run_id,
            selected = selected.len(),
            deadline_secs = deadline.as_secs(),
            "Starting run"
        );

        for task in selected {
            let name = task.descriptor.name.clone();
            info!(run_id = %run_id, task = %name, "Executing task");

            let unit = {
                let descriptor = task.descriptor.clone();
                let body = task.body.clone();
                let ctx = ctx.clone();
                async move { run_managed(&descriptor, &body, &ctx).await }
            };

            match timeout(deadline, tokio::spawn(unit)).await {
                Ok(Ok(record)) => {
                    info!(
                        run_id = %run_id,
                        task = %name,
                        success = record.success,
                        status = record.status.as_str(),
                        "Task finished"
                    );
                }
                Ok(Err(join_err)) => {
                    // The wrapper absorbs body failures; reaching this
                    // means the wrapper itself panicked or was aborted.
                    self.circuit_failure(&ctx, &name, format!("{join_err}"));
                }
                Err(_elapsed) => {
                    // Deadline exceeded. The spawned body is abandoned and
                    // may keep running; only the wait stops here.
                    self.circuit_failure(
                        &ctx,
                        &name,
                        format!("task did not finish within {}s", deadline.as_secs()),
                    );
                }
            }
        }

        RunReport {
            run_id,
            entries: ctx.ordered_results(),
        }
    }

    /// Record a synthetic failed result for a task whose managed
    /// execution did not return. Partial task state is not trusted.
    fn circuit_failure(&self, ctx: &Arc<RunContext>, name: &str, reason: String) {
        error!(task = %name, reason = %reason, "Circuit catch: managed execution did not return");
        ctx.add_error(
            name,
            format!("Circuit catch. Error while trying to execute the task: {name}"),
        );
        ctx.add_error(name, reason);
        let mut record = ctx.format_result(name);
        record.success = false;
        ctx.record_result(name, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrun_core::TaskKind;
    use serde_json::json;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut runner = Runner::new(EngineConfig::default());
        runner
            .register(TaskDescriptor::collector("a", "A"), |_ctx| async {
                Ok(json!({"data": {}}))
            })
            .unwrap();
        let err = runner
            .register(TaskDescriptor::insight("a", "A again"), |_ctx| async {
                Ok(json!({"data": {}}))
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateTask(name) if name == "a"));
    }

    #[tokio::test]
    async fn test_report_serializes_in_execution_order() {
        let mut runner = Runner::new(EngineConfig::default());
        runner
            .register(
                TaskDescriptor::new("late", "Late", TaskKind::Collector).with_order(200),
                |_ctx| async { Ok(json!({"data": {}})) },
            )
            .unwrap();
        runner
            .register(TaskDescriptor::collector("early", "Early"), |_ctx| async {
                Ok(json!({"data": {}}))
            })
            .unwrap();

        let report = runner.run(HashMap::new(), RunOptions::default()).await;
        let names: Vec<&str> = report.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["early", "late"]);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.find("early").unwrap() < json.find("late").unwrap());
    }
}
