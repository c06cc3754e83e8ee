//! Status enum for a task within one run.

use serde::{Deserialize, Serialize};

/// Status of a task within a single run.
///
/// Transitions are one-directional: `Queued -> InProgress -> Done` or
/// `Queued -> InProgress -> Skipped`. The dependency gate is the only
/// path that produces `Skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task selected for the run but not yet started.
    #[default]
    Queued,
    /// Task body (or its dependency gate) is currently executing.
    InProgress,
    /// Task finished, successfully or not.
    Done,
    /// Task was skipped by the dependency gate.
    Skipped,
}

impl TaskStatus {
    /// Returns true if the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            serde_json::to_string(&TaskStatus::Skipped).unwrap(),
            "\"skipped\""
        );
    }
}
