//! Control resolver: maps insight task names to compliance controls.
//!
//! The on-disk shape is framework -> control id -> list of insight task
//! names. The resolver inverts it once at construction so lookups by
//! task name are O(1). Read-only after load.

use auditrun_core::ControlRef;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors loading a controls map.
#[derive(Debug, Error)]
pub enum ControlMapError {
    #[error("failed to read controls map: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse controls map: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Answers "which controls does this insight map to?".
///
/// A task name with no mapping resolves to an empty list, never an error.
#[derive(Debug, Clone, Default)]
pub struct ControlResolver {
    by_insight: HashMap<String, Vec<ControlRef>>,
}

impl ControlResolver {
    /// Build a resolver from an already-deserialized framework map.
    pub fn from_map(framework_map: HashMap<String, HashMap<String, Vec<String>>>) -> Self {
        let mut by_insight: HashMap<String, Vec<ControlRef>> = HashMap::new();
        for (framework, controls) in &framework_map {
            for (control_id, insights) in controls {
                for insight in insights {
                    by_insight
                        .entry(insight.clone())
                        .or_default()
                        .push(ControlRef::new(framework, control_id));
                }
            }
        }
        // Map iteration order is unspecified; sort for stable output.
        for refs in by_insight.values_mut() {
            refs.sort_by(|a, b| {
                (a.framework.as_str(), a.control_id.as_str())
                    .cmp(&(b.framework.as_str(), b.control_id.as_str()))
            });
        }
        Self { by_insight }
    }

    /// Parse a resolver from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ControlMapError> {
        let framework_map = serde_json::from_str(json)?;
        Ok(Self::from_map(framework_map))
    }

    /// Load a resolver from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ControlMapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Controls mapped to the given task name; empty if unmapped.
    pub fn controls_for(&self, task_name: &str) -> Vec<ControlRef> {
        self.by_insight.get(task_name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"{
        "cis": {
            "2.1.1": ["check_bucket_encryption"],
            "2.1.5": ["check_public_buckets"]
        },
        "soc2": {
            "CC6.1": ["check_public_buckets"]
        }
    }"#;

    #[test]
    fn test_inversion() {
        let resolver = ControlResolver::from_json(MAP).unwrap();
        let controls = resolver.controls_for("check_public_buckets");
        assert_eq!(
            controls,
            vec![
                ControlRef::new("cis", "2.1.5"),
                ControlRef::new("soc2", "CC6.1"),
            ]
        );
        assert_eq!(
            resolver.controls_for("check_bucket_encryption"),
            vec![ControlRef::new("cis", "2.1.1")]
        );
    }

    #[test]
    fn test_unknown_task_is_empty() {
        let resolver = ControlResolver::from_json(MAP).unwrap();
        assert!(resolver.controls_for("list_buckets").is_empty());
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(matches!(
            ControlResolver::from_json("not json"),
            Err(ControlMapError::Parse(_))
        ));
    }
}
