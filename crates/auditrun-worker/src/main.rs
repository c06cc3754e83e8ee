//! AuditRun worker binary.
//!
//! Wires the hello_world integration to the engine: sets up tracing,
//! loads config and the controls map, runs the setup phase to build the
//! base context, registers the integration's tasks, and prints the run's
//! result map as JSON.

use auditrun_engine::{ControlResolver, EngineConfig, RunOptions, Runner};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod setup;
mod tasks;

const INTEGRATION_NAME: &str = "hello_world";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load config
    let config = EngineConfig::from_env().with_integration(INTEGRATION_NAME);
    let controls = ControlResolver::from_json(include_str!("../controls.json"))?;

    let mut runner = Runner::new(config).with_controls(controls);
    tasks::register_all(&mut runner)?;

    info!(
        integration = INTEGRATION_NAME,
        tasks = runner.task_names().len(),
        "Starting AuditRun worker"
    );

    // Setup phase: produce the base context shared by every task.
    let base = setup::authenticate();

    let report = runner.run(base, run_options_from_env()).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Per-run selection from the environment: `AUDIT_TASKS` restricts the
/// run to a comma-separated subset of task names.
fn run_options_from_env() -> RunOptions {
    let mut options = RunOptions::default();
    if let Ok(names) = std::env::var("AUDIT_TASKS") {
        let tasks: Vec<String> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if !tasks.is_empty() {
            options = options.with_tasks(tasks);
        }
    }
    options
}
