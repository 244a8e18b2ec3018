use std::collections::BTreeSet;

use onboarding_core::{CompletionRecord, Employee, SubjectId, Task, TaskId, TaskKey};

use crate::catalog::{Catalog, SeedReport};

/// Read-only access to checklist content.
pub trait TaskRepository: Send + Sync {
    /// Known department names, lower-case, sorted.
    fn departments(&self) -> anyhow::Result<Vec<String>>;

    /// Tasks for a department in ascending `order`. `None` if the department is unknown.
    fn list_tasks(&self, department: &str) -> anyhow::Result<Option<Vec<Task>>>;

    fn task_by_key(&self, department: &str, key: &TaskKey) -> anyhow::Result<Option<Task>>;

    /// Case-insensitive lookup by first name.
    fn employee(&self, name: &str) -> anyhow::Result<Option<Employee>>;
}

/// Outcome of [`CompletionLedger::mark_complete`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    Recorded,
    AlreadyComplete,
}

/// Per-subject record of completed tasks.
///
/// Every method is scoped by `subject`; state for one subject is never read or written
/// through another.
pub trait CompletionLedger: Send + Sync {
    /// Idempotent. A second call for the same pair neither errors, duplicates, nor
    /// touches the original timestamp.
    fn mark_complete(&self, task_id: TaskId, subject: &SubjectId, now_ms: i64) -> anyhow::Result<MarkOutcome>;

    /// The subset of `task_ids` already completed by `subject`, in one lookup.
    fn completed_task_ids(&self, task_ids: &BTreeSet<TaskId>, subject: &SubjectId) -> anyhow::Result<BTreeSet<TaskId>>;

    fn completion(&self, task_id: TaskId, subject: &SubjectId) -> anyhow::Result<Option<CompletionRecord>>;

    /// Administrative reset: all subjects when `subject` is `None`. Returns rows removed.
    fn reset_completions(&self, subject: Option<&SubjectId>) -> anyhow::Result<usize>;
}

pub trait Storage: TaskRepository + CompletionLedger {
    /// Inserts catalog rows that are not present yet. Safe to re-run.
    fn seed(&self, catalog: &Catalog) -> anyhow::Result<SeedReport>;
}
