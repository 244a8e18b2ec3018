use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use onboarding_core::{CompletionRecord, Employee, SubjectId, Task, TaskId, TaskKey};

use crate::catalog::{Catalog, SeedReport};
use crate::traits::{CompletionLedger, MarkOutcome, Storage, TaskRepository};

/// In-memory storage for tests and local demos. Not durable.
///
/// Completions are keyed by `(TaskId, SubjectId)` under a single lock, so the
/// check-then-insert in `mark_complete` cannot interleave.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    departments: BTreeSet<String>,
    tasks: BTreeMap<TaskId, Task>,
    employees: HashMap<String, Employee>,
    completions: HashMap<(TaskId, SubjectId), CompletionRecord>,
    next_task_id: i64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: &Catalog) -> anyhow::Result<Self> {
        let storage = Self::new();
        storage.seed(catalog)?;
        Ok(storage)
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory storage lock poisoned"))
    }
}

impl TaskRepository for InMemoryStorage {
    fn departments(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.lock()?.departments.iter().cloned().collect())
    }

    fn list_tasks(&self, department: &str) -> anyhow::Result<Option<Vec<Task>>> {
        let inner = self.lock()?;
        let department = department.to_lowercase();
        if !inner.departments.contains(&department) {
            return Ok(None);
        }
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.department == department)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.order, t.id));
        Ok(Some(tasks))
    }

    fn task_by_key(&self, department: &str, key: &TaskKey) -> anyhow::Result<Option<Task>> {
        let inner = self.lock()?;
        let department = department.to_lowercase();
        Ok(inner
            .tasks
            .values()
            .find(|t| t.department == department && &t.key == key)
            .cloned())
    }

    fn employee(&self, name: &str) -> anyhow::Result<Option<Employee>> {
        Ok(self.lock()?.employees.get(&name.to_lowercase()).cloned())
    }
}

impl CompletionLedger for InMemoryStorage {
    fn mark_complete(&self, task_id: TaskId, subject: &SubjectId, now_ms: i64) -> anyhow::Result<MarkOutcome> {
        let mut inner = self.lock()?;
        if !inner.tasks.contains_key(&task_id) {
            anyhow::bail!("unknown task id {task_id}");
        }
        let key = (task_id, subject.clone());
        if inner.completions.contains_key(&key) {
            return Ok(MarkOutcome::AlreadyComplete);
        }
        inner.completions.insert(
            key,
            CompletionRecord {
                task_id,
                subject_id: subject.clone(),
                completed_at_ms: now_ms,
            },
        );
        Ok(MarkOutcome::Recorded)
    }

    fn completed_task_ids(&self, task_ids: &BTreeSet<TaskId>, subject: &SubjectId) -> anyhow::Result<BTreeSet<TaskId>> {
        if task_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let inner = self.lock()?;
        Ok(task_ids
            .iter()
            .copied()
            .filter(|id| inner.completions.contains_key(&(*id, subject.clone())))
            .collect())
    }

    fn completion(&self, task_id: TaskId, subject: &SubjectId) -> anyhow::Result<Option<CompletionRecord>> {
        Ok(self.lock()?.completions.get(&(task_id, subject.clone())).cloned())
    }

    fn reset_completions(&self, subject: Option<&SubjectId>) -> anyhow::Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.completions.len();
        match subject {
            Some(s) => inner.completions.retain(|(_, sid), _| sid != s),
            None => inner.completions.clear(),
        }
        Ok(before - inner.completions.len())
    }
}

impl Storage for InMemoryStorage {
    fn seed(&self, catalog: &Catalog) -> anyhow::Result<SeedReport> {
        let mut inner = self.lock()?;
        let mut report = SeedReport::default();

        for d in &catalog.departments {
            if inner.departments.insert(d.to_lowercase()) {
                report.departments += 1;
            }
        }

        for t in &catalog.tasks {
            let key = TaskKey::new(t.key.clone())?;
            if inner.tasks.values().any(|existing| existing.key == key) {
                continue;
            }
            inner.next_task_id += 1;
            let id = TaskId(inner.next_task_id);
            inner.tasks.insert(
                id,
                Task {
                    id,
                    key,
                    department: t.department.to_lowercase(),
                    title: t.title.clone(),
                    description: t.description.clone(),
                    order: t.order,
                },
            );
            report.tasks += 1;
        }

        for e in &catalog.employees {
            let name = e.name.to_lowercase();
            if inner.employees.contains_key(&name) {
                continue;
            }
            let mut e = e.clone();
            e.name = name.clone();
            e.department = e.department.to_lowercase();
            inner.employees.insert(name, e);
            report.employees += 1;
        }

        Ok(report)
    }
}
