//! The managed execution envelope applied to every task body.
//!
//! `run_managed` is plain higher-order composition: it takes a descriptor
//! and a body and drives the full lifecycle of status transitions,
//! dependency gating, invocation, output validation, violation
//! auto-reporting, and final result recording. Failures are absorbed
//! here; nothing a task body does can abort the run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use auditrun_core::{ResultRecord, TaskDescriptor, TaskKind, ValidatedOutput};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::context::{RunContext, TaskHandle};

/// The future a task body produces.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// A registered task body: async fn of the task-scoped handle.
pub type TaskBody = Arc<dyn Fn(TaskHandle) -> TaskFuture + Send + Sync>;

/// Run one task under the managed lifecycle and return its final record.
pub async fn run_managed(
    descriptor: &TaskDescriptor,
    body: &TaskBody,
    ctx: &Arc<RunContext>,
) -> ResultRecord {
    let name = descriptor.name.as_str();
    ctx.begin_task(name);

    // Dependency gate: checked in declared order, first failure decides.
    for dep in &descriptor.depends_on {
        if !ctx.has_result(dep) {
            let message = format!("Dependency '{dep}' was not executed");
            error!(task = %name, "{message}");
            return gate_failure(ctx, name, message);
        }
        if !ctx.result_succeeded(dep) {
            let message = format!("Dependency '{dep}' failed - skipping task");
            warn!(task = %name, "{message}");
            return gate_failure(ctx, name, message);
        }
    }

    let handle = TaskHandle::new(ctx.clone(), name);
    let success = match (body)(handle).await {
        Ok(returned) => match ValidatedOutput::validate(returned) {
            Ok(validated) => {
                for warning in &validated.warnings {
                    warn!(task = %name, "{warning}");
                }
                ctx.set_output(name, validated.output, validated.violation);
                true
            }
            Err(invalid) => {
                record_failure(ctx, name, &anyhow::Error::new(invalid));
                false
            }
        },
        Err(failure) => {
            record_failure(ctx, name, &failure);
            false
        }
    };

    ctx.finish_task(name);

    // Violation auto-report: insights only, on success with the flag set.
    // A reporting failure is an extra error, never a success flip.
    if descriptor.kind == TaskKind::Insight && success && ctx.violation(name) {
        info!(task = %name, "Auto-creating violation");
        if let Err(report_err) = ctx.create_violation(name, None).await {
            error!(task = %name, error = %report_err, "Failed to create violation");
            ctx.add_error(name, format!("Failed to create violation: {report_err}"));
        }
    }

    finalize(ctx, name, success)
}

/// Skip a task at the dependency gate and record its failed result.
fn gate_failure(ctx: &Arc<RunContext>, name: &str, message: String) -> ResultRecord {
    ctx.add_error(name, message);
    ctx.skip_task(name);
    finalize(ctx, name, false)
}

/// Record an uncaught body or validation failure against the task.
fn record_failure(ctx: &Arc<RunContext>, name: &str, failure: &anyhow::Error) {
    if ctx.debug() {
        let trace = format!("{failure:?}");
        error!(task = %name, "{trace}");
        ctx.set_traceback(name, trace);
    } else {
        error!(task = %name, "{failure}");
    }
    ctx.add_error(name, failure.to_string());
}

/// Produce the final record with the decided success flag and store it
/// as the task's entry in the run's result map.
fn finalize(ctx: &Arc<RunContext>, name: &str, success: bool) -> ResultRecord {
    let mut record = ctx.format_result(name);
    record.success = success;
    ctx.record_result(name, record.clone());
    record
}
