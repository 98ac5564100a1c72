//! Task plan tracked alongside the project files.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of a single plan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Pending,
    /// Currently being worked on
    InProgress,
    /// Done
    Completed,
}

impl TaskStatus {
    /// Checkbox-style marker used when rendering a plan.
    pub fn marker(self) -> &'static str {
        match self {
            TaskStatus::Pending => "[ ]",
            TaskStatus::InProgress => "[~]",
            TaskStatus::Completed => "[x]",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    /// Identifier, unique within its plan
    pub id: String,
    /// What the task is about
    pub description: String,
    /// Current progress
    pub status: TaskStatus,
}

impl PlanTask {
    /// Create a pending task.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
        }
    }
}

/// An ordered list of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Tasks in execution order
    pub tasks: Vec<PlanTask>,
    /// When the plan was set
    pub created_at: DateTime<Utc>,
}

impl Plan {
    /// Number of completed tasks.
    pub fn completed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }

    /// Render the plan as a checklist with a progress footer.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .tasks
            .iter()
            .map(|t| format!("{} {}: {}", t.status.marker(), t.id, t.description))
            .collect();
        lines.push(format!(
            "{}/{} tasks completed",
            self.completed(),
            self.tasks.len()
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plan() {
        let mut done = PlanTask::new("1", "scaffold app");
        done.status = TaskStatus::Completed;
        let mut active = PlanTask::new("2", "add login screen");
        active.status = TaskStatus::InProgress;

        let plan = Plan {
            tasks: vec![done, active, PlanTask::new("3", "write tests")],
            created_at: Utc::now(),
        };

        let rendered = plan.render();
        assert!(rendered.contains("[x] 1: scaffold app"));
        assert!(rendered.contains("[~] 2: add login screen"));
        assert!(rendered.contains("[ ] 3: write tests"));
        assert!(rendered.ends_with("1/3 tasks completed"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap_or_default();
        assert_eq!(json, "\"in_progress\"");
    }
}
