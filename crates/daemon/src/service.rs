use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use onboarding_core::api::{ChecklistResponse, CompleteTaskResponse};
use onboarding_core::{now_ms, title_case, Employee, SubjectId, TaskId, TaskKey};
use onboarding_storage::{Catalog, MarkOutcome, SeedReport, Storage};
use tracing::info;

/// Result of a completion request that passed validation far enough to look up the task.
#[derive(Debug)]
pub enum CompleteOutcome {
    Completed {
        response: CompleteTaskResponse,
        mark: MarkOutcome,
    },
    UnknownDepartment {
        valid: Vec<String>,
    },
    UnknownTask {
        valid: Vec<String>,
    },
}

/// Checklist and completion logic over a [`Storage`] backend.
///
/// Storage calls are synchronous, so each runs on the blocking pool.
#[derive(Clone)]
pub struct OnboardingService {
    storage: Arc<dyn Storage>,
}

impl OnboardingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn employee(&self, name: String) -> anyhow::Result<Option<Employee>> {
        self.blocking(move |s| s.employee(&name)).await
    }

    /// Department names for error messages, title-cased.
    pub async fn department_names(&self) -> anyhow::Result<Vec<String>> {
        let names = self.blocking(|s| s.departments()).await?;
        Ok(names.iter().map(|d| title_case(d)).collect())
    }

    /// The department checklist as seen by `subject`. `None` if the department is unknown.
    pub async fn checklist(
        &self,
        department: String,
        subject: SubjectId,
    ) -> anyhow::Result<Option<ChecklistResponse>> {
        self.blocking(move |s| {
            let Some(tasks) = s.list_tasks(&department)? else {
                return Ok(None);
            };
            let ids: BTreeSet<TaskId> = tasks.iter().map(|t| t.id).collect();
            let completed = s.completed_task_ids(&ids, &subject)?;
            Ok(Some(ChecklistResponse::build(&department, &tasks, &completed)))
        })
        .await
    }

    /// Records completion of `key` for `subject` and returns the updated progress.
    pub async fn complete_task(
        &self,
        department: String,
        key: TaskKey,
        subject: SubjectId,
    ) -> anyhow::Result<CompleteOutcome> {
        self.blocking(move |s| {
            let Some(tasks) = s.list_tasks(&department)? else {
                let valid = s.departments()?.iter().map(|d| title_case(d)).collect();
                return Ok(CompleteOutcome::UnknownDepartment { valid });
            };
            let Some(task) = s.task_by_key(&department, &key)? else {
                let valid = tasks.iter().map(|t| t.key.as_str().to_string()).collect();
                return Ok(CompleteOutcome::UnknownTask { valid });
            };

            let mark = s.mark_complete(task.id, &subject, now_ms())?;
            if mark == MarkOutcome::Recorded {
                info!(task = %task.key, department = %task.department, subject_id = %subject, "task completed");
            }

            let ids: BTreeSet<TaskId> = tasks.iter().map(|t| t.id).collect();
            let completed = s.completed_task_ids(&ids, &subject)?;
            let response = CompleteTaskResponse::build(key.as_str(), &department, &tasks, &completed);
            Ok(CompleteOutcome::Completed { response, mark })
        })
        .await
    }

    pub async fn seed(&self, catalog: Catalog) -> anyhow::Result<SeedReport> {
        self.blocking(move |s| s.seed(&catalog)).await
    }

    pub async fn reset_completions(&self, subject: Option<SubjectId>) -> anyhow::Result<usize> {
        self.blocking(move |s| s.reset_completions(subject.as_ref())).await
    }

    async fn blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Storage) -> anyhow::Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || f(storage.as_ref()))
            .await
            .context("storage task panicked")?
    }
}
