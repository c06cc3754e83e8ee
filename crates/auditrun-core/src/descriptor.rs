//! Task descriptors: immutable per-task metadata fixed at registration time.

use serde::{Deserialize, Serialize};

/// Default execution order for collector tasks.
pub const COLLECTOR_ORDER: i32 = 100;
/// Default execution order for insight tasks. Insights run after
/// collectors unless a descriptor overrides `order`.
pub const INSIGHT_ORDER: i32 = 500;

/// What kind of work a task performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Gathers facts from the target environment, no violation judgement.
    #[default]
    Collector,
    /// Evaluates previously gathered facts and may flag a violation.
    Insight,
}

impl TaskKind {
    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Insight => "insight",
        }
    }

    /// Default execution order for this kind.
    pub fn default_order(&self) -> i32 {
        match self {
            Self::Collector => COLLECTOR_ORDER,
            Self::Insight => INSIGHT_ORDER,
        }
    }
}

/// Severity attached to insight tasks, carried into violation reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Identity and policy for one registered task.
///
/// A descriptor is fixed at registration time and never mutated by the
/// engine. `name` must be unique across all tasks registered for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Unique task identifier within a run.
    pub name: String,

    /// Human-readable title.
    pub title: String,

    /// Longer description of what the task checks or gathers.
    pub description: Option<String>,

    /// Disabled tasks are never selected for execution.
    pub enabled: bool,

    /// Collector or insight.
    pub kind: TaskKind,

    /// Execution order, ascending. Defaults to 100 for collectors and
    /// 500 for insights.
    pub order: i32,

    /// Severity for insight tasks; used when reporting violations.
    pub severity: Option<Severity>,

    /// Names of tasks that must have run (and succeeded) first.
    pub depends_on: Vec<String>,
}

impl TaskDescriptor {
    /// Create a descriptor with defaults for the given kind.
    pub fn new(name: impl Into<String>, title: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
            enabled: true,
            kind,
            order: kind.default_order(),
            severity: None,
            depends_on: Vec::new(),
        }
    }

    /// Shorthand for a collector descriptor.
    pub fn collector(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(name, title, TaskKind::Collector)
    }

    /// Shorthand for an insight descriptor.
    pub fn insight(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(name, title, TaskKind::Insight)
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder method to override the execution order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Builder method to set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Builder method to declare a dependency on another task.
    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    /// Builder method to disable the task.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orders() {
        let c = TaskDescriptor::collector("list_buckets", "List buckets");
        let i = TaskDescriptor::insight("check_public", "Check public buckets");
        assert_eq!(c.order, 100);
        assert_eq!(i.order, 500);
    }

    #[test]
    fn test_builder() {
        let d = TaskDescriptor::insight("check_public", "Check public buckets")
            .with_severity(Severity::High)
            .with_order(50)
            .depends_on("list_buckets");
        assert_eq!(d.order, 50);
        assert_eq!(d.severity, Some(Severity::High));
        assert_eq!(d.depends_on, vec!["list_buckets".to_string()]);
        assert!(d.enabled);
    }
}
