//! Engine configuration.

use std::env;
use std::time::Duration;

/// Engine configuration.
///
/// Defaults mirror a local development setup; `from_env` overrides them
/// from `AUDIT_*` environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the job service that receives violation reports.
    pub base_url: String,

    /// Bearer token for the job service.
    pub api_token: String,

    /// Job identifier for this run, used in the violation endpoint path.
    pub job_id: String,

    /// Name of the integration driving this engine (e.g. "hello_world").
    pub integration: String,

    /// Wall-clock deadline for a single task's managed execution.
    pub task_timeout: Duration,

    /// When true, uncaught task failures record a full diagnostic trace
    /// instead of only the error message.
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: "changeme".to_string(),
            job_id: "local".to_string(),
            integration: "unknown".to_string(),
            task_timeout: Duration::from_secs(180),
            debug: true,
        }
    }
}

impl EngineConfig {
    /// Build a config from `AUDIT_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("AUDIT_BASE_URL").unwrap_or(defaults.base_url),
            api_token: env::var("AUDIT_TOKEN").unwrap_or(defaults.api_token),
            job_id: env::var("AUDIT_JOB_ID").unwrap_or(defaults.job_id),
            integration: env::var("AUDIT_INTEGRATION").unwrap_or(defaults.integration),
            task_timeout: env::var("AUDIT_TASK_TIMEOUT")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.task_timeout),
            debug: env::var("AUDIT_DEBUG")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(defaults.debug),
        }
    }

    /// Builder method to set the integration name.
    pub fn with_integration(mut self, name: impl Into<String>) -> Self {
        self.integration = name.into();
        self
    }

    /// Builder method to set the task deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.task_timeout, Duration::from_secs(180));
        assert!(config.debug);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_integration("hello_world")
            .with_task_timeout(Duration::from_secs(5));
        assert_eq!(config.integration, "hello_world");
        assert_eq!(config.task_timeout, Duration::from_secs(5));
    }
}
