//! Validation of task return values.
//!
//! Task bodies return arbitrary JSON. The wrapper accepts only a mapping
//! of the shape `{data, violation?, message?}` and rejects anything else
//! with a descriptive error, so downstream consumers can rely on the
//! stored output structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reasons a task return value fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("task must return a mapping, got {0}")]
    NotAMapping(&'static str),

    #[error("task return must include 'data' key")]
    MissingData,

    #[error("'data' must be a mapping or a sequence, got {0}")]
    BadDataType(&'static str),

    #[error("'violation' must be a bool, got {0}")]
    BadViolationType(&'static str),

    #[error("'message' must be a string, got {0}")]
    BadMessageType(&'static str),
}

/// The validated output of a successful task, as stored in its run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// The task's declared data: always a JSON object or array.
    pub data: Value,

    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for TaskOutput {
    /// An empty output: tasks that never stored one (failed, skipped,
    /// still queued) format as an empty data object, not null.
    fn default() -> Self {
        Self {
            data: Value::Object(serde_json::Map::new()),
            message: None,
        }
    }
}

/// Result of validating a raw task return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOutput {
    /// The data/message payload to store as the task's output.
    pub output: TaskOutput,

    /// Violation flag; defaults to false when absent.
    pub violation: bool,

    /// Non-fatal findings, e.g. unrecognized keys in the return value.
    pub warnings: Vec<String>,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ValidatedOutput {
    /// Validate a raw task return value.
    ///
    /// Requirements:
    /// - the value is a mapping
    /// - `data` is present and is a mapping or a sequence
    /// - `violation`, if present, is a bool (default false)
    /// - `message`, if present, is a string
    ///
    /// Unrecognized keys are allowed but reported as warnings.
    pub fn validate(value: Value) -> Result<Self, OutputError> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(OutputError::NotAMapping(json_type_name(&other))),
        };

        let data = map.get("data").ok_or(OutputError::MissingData)?;
        if !matches!(data, Value::Object(_) | Value::Array(_)) {
            return Err(OutputError::BadDataType(json_type_name(data)));
        }

        let violation = match map.get("violation") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => return Err(OutputError::BadViolationType(json_type_name(other))),
        };

        let message = match map.get("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => return Err(OutputError::BadMessageType(json_type_name(other))),
        };

        let mut warnings = Vec::new();
        for key in map.keys() {
            if !matches!(key.as_str(), "data" | "violation" | "message") {
                warnings.push(format!("unexpected key in return value: '{key}'"));
            }
        }

        Ok(Self {
            output: TaskOutput {
                data: map.get("data").cloned().unwrap_or(Value::Null),
                message,
            },
            violation,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_valid_return() {
        let v = ValidatedOutput::validate(json!({"data": {"x": 1}})).unwrap();
        assert_eq!(v.output.data, json!({"x": 1}));
        assert!(!v.violation);
        assert!(v.output.message.is_none());
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_sequence_data_and_violation() {
        let v = ValidatedOutput::validate(json!({"data": [], "violation": true})).unwrap();
        assert_eq!(v.output.data, json!([]));
        assert!(v.violation);
    }

    #[test]
    fn test_missing_data_rejected() {
        let err = ValidatedOutput::validate(json!({"violation": true})).unwrap_err();
        assert_eq!(err, OutputError::MissingData);
        assert!(err.to_string().contains("'data'"));
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = ValidatedOutput::validate(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, OutputError::NotAMapping("array"));
    }

    #[test]
    fn test_scalar_data_rejected() {
        let err = ValidatedOutput::validate(json!({"data": 7})).unwrap_err();
        assert_eq!(err, OutputError::BadDataType("number"));
    }

    #[test]
    fn test_wrong_violation_type_rejected() {
        let err = ValidatedOutput::validate(json!({"data": {}, "violation": "yes"})).unwrap_err();
        assert_eq!(err, OutputError::BadViolationType("string"));
    }

    #[test]
    fn test_wrong_message_type_rejected() {
        let err = ValidatedOutput::validate(json!({"data": {}, "message": 5})).unwrap_err();
        assert_eq!(err, OutputError::BadMessageType("number"));
    }

    #[test]
    fn test_default_output_is_an_empty_object() {
        let output = TaskOutput::default();
        assert_eq!(output.data, json!({}));
        assert_eq!(serde_json::to_value(&output).unwrap(), json!({"data": {}}));
    }

    #[test]
    fn test_unknown_keys_warn_but_pass() {
        let v = ValidatedOutput::validate(json!({"data": {}, "extra": 1})).unwrap();
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("extra"));
    }
}
