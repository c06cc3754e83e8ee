//! Violation reporting to the job service.
//!
//! The wrapper's auto-report path and direct in-task calls both go
//! through a [`ReportSink`], so tests (and alternative transports) can
//! swap out the HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use auditrun_core::{ControlRef, Severity, TaskOutput};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;

/// Fixed request timeout for violation posts, independent of the task
/// deadline.
const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors reporting a violation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Network failure or request timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The job service answered with a non-2xx status.
    #[error("violation rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pluggable extractor deriving a resource identifier from a task's
/// `data` payload for the violation's metadata.
pub type ResourceIdFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Default resource-id heuristic.
///
/// Probes the data fields the stock insights populate: non-empty
/// `public_buckets`/`unencrypted_buckets` lists (joining element names),
/// a non-empty `affected_users` string list, or a literal `resource_id`.
pub fn default_resource_id(data: &Value) -> Option<String> {
    for key in ["public_buckets", "unencrypted_buckets"] {
        if let Some(items) = data.get(key).and_then(Value::as_array) {
            if !items.is_empty() {
                let names: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("name").and_then(Value::as_str) {
                        Some(name) => name.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                return Some(names.join(","));
            }
        }
    }
    if let Some(users) = data.get("affected_users").and_then(Value::as_array) {
        if !users.is_empty() {
            let names: Vec<String> = users
                .iter()
                .map(|user| match user.as_str() {
                    Some(name) => name.to_string(),
                    None => user.to_string(),
                })
                .collect();
            return Some(names.join(","));
        }
    }
    data.get("resource_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The enriched violation payload posted to the job service.
///
/// Callers may override any field by passing a JSON object that is
/// merged over the serialized form before send.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationPayload {
    pub task_name: String,
    pub control_references: Vec<ControlRef>,
    pub output: TaskOutput,
    pub severity: Severity,
    pub description: Option<String>,
    pub violation_type: Option<String>,
    pub environment: Option<String>,
    pub meta: Value,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
}

/// Transport for violation payloads.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one violation payload, returning the created violation as
    /// represented by the receiving service.
    async fn send(&self, payload: &Value) -> Result<Value, ReportError>;
}

/// HTTP transport: POST `{base_url}/jobs/{job_id}/violations`.
pub struct HttpReporter {
    client: reqwest::Client,
    base_url: String,
    job_id: String,
    api_token: String,
}

impl HttpReporter {
    /// Build a reporter from the engine config.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            job_id: config.job_id.clone(),
            api_token: config.api_token.clone(),
        }
    }
}

#[async_trait]
impl ReportSink for HttpReporter {
    async fn send(&self, payload: &Value) -> Result<Value, ReportError> {
        let url = format!("{}/jobs/{}/violations", self.base_url, self.job_id);
        debug!(url = %url, "Posting violation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .timeout(REPORT_TIMEOUT)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Sink that drops every payload; used when no job service is configured.
pub struct NullReporter;

#[async_trait]
impl ReportSink for NullReporter {
    async fn send(&self, _payload: &Value) -> Result<Value, ReportError> {
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_id_from_named_buckets() {
        let data = json!({
            "public_buckets": [{"name": "b1"}, {"name": "b2"}]
        });
        assert_eq!(default_resource_id(&data), Some("b1,b2".to_string()));
    }

    #[test]
    fn test_resource_id_from_affected_users() {
        let data = json!({"affected_users": ["alice", "bob"]});
        assert_eq!(default_resource_id(&data), Some("alice,bob".to_string()));
    }

    #[test]
    fn test_resource_id_literal_field() {
        let data = json!({"resource_id": "vm-42"});
        assert_eq!(default_resource_id(&data), Some("vm-42".to_string()));
    }

    #[test]
    fn test_resource_id_absent() {
        assert_eq!(default_resource_id(&json!({"buckets": []})), None);
        assert_eq!(default_resource_id(&json!({"public_buckets": []})), None);
    }

    #[test]
    fn test_payload_serializes_expected_fields() {
        let payload = ViolationPayload {
            task_name: "check_public_buckets".to_string(),
            control_references: vec![ControlRef::new("cis", "2.1.5")],
            output: TaskOutput::default(),
            severity: Severity::High,
            description: None,
            violation_type: None,
            environment: None,
            meta: json!({"job_id": "j1"}),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["severity"], "high");
        assert_eq!(value["control_references"][0]["control_id"], "2.1.5");
        assert_eq!(value["meta"]["job_id"], "j1");
        assert!(value["description"].is_null());
    }
}
