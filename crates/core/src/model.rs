use serde::{Deserialize, Serialize};

use crate::ids::{SubjectId, TaskId, TaskKey};

/// One checklist item. `order` defines the checklist sequence within a department.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub key: TaskKey,
    pub department: String,
    pub title: String,
    pub description: String,
    pub order: i32,
}

/// A (task, subject) completion. At most one exists per pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub subject_id: SubjectId,
    pub completed_at_ms: i64,
}

/// Employee record used to personalise the agent greeting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// First name, lower-case.
    pub name: String,
    pub full_name: String,
    /// Department name, lower-case.
    pub department: String,
    pub manager: Option<String>,
    pub team: Option<String>,
    /// ISO date, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    pub office: Option<String>,
}
