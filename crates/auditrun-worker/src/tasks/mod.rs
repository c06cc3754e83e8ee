//! Task set for the hello_world integration.

pub mod collectors;
pub mod insights;

use auditrun_core::{CoreError, Severity, TaskDescriptor};
use auditrun_engine::Runner;

/// Register every hello_world task on the runner.
pub fn register_all(runner: &mut Runner) -> Result<(), CoreError> {
    runner.register(
        TaskDescriptor::collector("list_buckets", "List all buckets")
            .with_description("Fetch all storage buckets from the provider"),
        collectors::list_buckets,
    )?;

    runner.register(
        TaskDescriptor::insight("check_public_buckets", "Check for public buckets")
            .with_description("Flag buckets that allow public access")
            .with_severity(Severity::High)
            .depends_on("list_buckets"),
        insights::check_public_buckets,
    )?;

    runner.register(
        TaskDescriptor::insight("check_bucket_encryption", "Check bucket encryption")
            .with_description("Flag buckets stored without encryption at rest")
            .with_severity(Severity::Medium)
            .depends_on("list_buckets"),
        insights::check_bucket_encryption,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditrun_engine::EngineConfig;

    #[test]
    fn test_all_tasks_register_cleanly() {
        let mut runner = Runner::new(EngineConfig::default());
        register_all(&mut runner).unwrap();
        assert_eq!(
            runner.task_names(),
            vec![
                "list_buckets",
                "check_public_buckets",
                "check_bucket_encryption"
            ]
        );
    }
}
