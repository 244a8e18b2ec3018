//! Response and request bodies exchanged with the agent connector.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::{CallerIdentity, TrustLevel};
use crate::ids::TaskId;
use crate::model::{Employee, Task};
use crate::progress;
use crate::util::title_case;

/// A task as shown to one caller, with that caller's completion flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub completed: bool,
}

impl TaskView {
    pub fn from_task(task: &Task, completed: &BTreeSet<TaskId>) -> Self {
        Self {
            id: task.key.as_str().to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            order: task.order,
            completed: completed.contains(&task.id),
        }
    }
}

/// `GET /onboarding/{department}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistResponse {
    pub department: String,
    pub tasks: Vec<TaskView>,
    pub total_tasks: usize,
    pub completion_percentage: u8,
    pub next_task: Option<TaskView>,
}

impl ChecklistResponse {
    /// Builds the checklist view; `tasks` is presented in ascending `order`.
    pub fn build(department: &str, tasks: &[Task], completed: &BTreeSet<TaskId>) -> Self {
        let mut sorted: Vec<&Task> = tasks.iter().collect();
        sorted.sort_by_key(|t| (t.order, t.id));
        Self {
            department: title_case(department),
            tasks: sorted
                .into_iter()
                .map(|t| TaskView::from_task(t, completed))
                .collect(),
            total_tasks: tasks.len(),
            completion_percentage: progress::percentage(tasks, completed),
            next_task: progress::next_pending(tasks, completed)
                .map(|t| TaskView::from_task(t, completed)),
        }
    }
}

/// `POST /complete-task` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub department: String,
}

/// `POST /complete-task` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub task_id: String,
    pub completed: bool,
    pub department: String,
    pub completion_percentage: u8,
    pub remaining_tasks: usize,
    pub all_complete: bool,
    pub next_task: Option<TaskView>,
}

impl CompleteTaskResponse {
    pub fn build(
        task_key: &str,
        department: &str,
        tasks: &[Task],
        completed: &BTreeSet<TaskId>,
    ) -> Self {
        let pct = progress::percentage(tasks, completed);
        Self {
            task_id: task_key.to_string(),
            completed: true,
            department: title_case(department),
            completion_percentage: pct,
            remaining_tasks: progress::remaining(tasks, completed),
            all_complete: pct == 100,
            next_task: progress::next_pending(tasks, completed)
                .map(|t| TaskView::from_task(t, completed)),
        }
    }
}

/// `GET /employee/{name}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeView {
    pub name: String,
    pub full_name: String,
    pub department: String,
    pub manager: Option<String>,
    pub team: Option<String>,
    pub start_date: Option<String>,
    pub office: Option<String>,
}

impl From<Employee> for EmployeeView {
    fn from(e: Employee) -> Self {
        Self {
            name: title_case(&e.name),
            full_name: e.full_name,
            department: title_case(&e.department),
            manager: e.manager,
            team: e.team,
            start_date: e.start_date,
            office: e.office,
        }
    }
}

/// `GET /me` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub subject_id: String,
    pub display_name: String,
    pub principal_name: Option<String>,
    pub trust_level: TrustLevel,
}

impl From<&CallerIdentity> for WhoAmIResponse {
    fn from(id: &CallerIdentity) -> Self {
        Self {
            subject_id: id.subject_id.as_str().to_string(),
            display_name: id.display_name.clone(),
            principal_name: id.principal_name.clone(),
            trust_level: id.trust_level,
        }
    }
}

/// Structured error envelope: `{"error": {"code", "message", "details"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Body of [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
