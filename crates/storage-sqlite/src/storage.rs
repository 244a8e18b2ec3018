use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use onboarding_core::{CompletionRecord, Employee, SubjectId, Task, TaskId, TaskKey};
use onboarding_storage::{Catalog, CompletionLedger, MarkOutcome, SeedReport, Storage, TaskRepository};
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).with_context(|| format!("open sqlite db {}", db_path.display()))?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        debug!(journal_mode = %mode, "opened sqlite storage");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql).context("apply schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))
    }

    fn row_to_task(r: &Row<'_>) -> rusqlite::Result<Task> {
        let key: String = r.get(1)?;
        Ok(Task {
            id: TaskId(r.get(0)?),
            key: TaskKey::new(key).map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
            department: r.get(2)?,
            title: r.get(3)?,
            description: r.get(4)?,
            order: r.get(5)?,
        })
    }

    fn row_to_subject(r: &Row<'_>, idx: usize) -> rusqlite::Result<SubjectId> {
        let s: String = r.get(idx)?;
        SubjectId::new(s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }
}

const TASK_COLUMNS: &str = "t.id, t.task_key, d.name, t.title, t.description, t.sort_order";

impl TaskRepository for SqliteStorage {
    fn departments(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM departments ORDER BY name")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = vec![];
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn list_tasks(&self, department: &str) -> Result<Option<Vec<Task>>> {
        let conn = self.lock()?;
        let department = department.to_lowercase();
        let dept_id: Option<i64> = conn
            .query_row("SELECT id FROM departments WHERE name = ?1", [&department], |r| r.get(0))
            .optional()?;
        let Some(dept_id) = dept_id else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t JOIN departments d ON d.id = t.department_id
             WHERE t.department_id = ?1 ORDER BY t.sort_order, t.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([dept_id], Self::row_to_task)?;
        let mut tasks = vec![];
        for row in rows {
            tasks.push(row?);
        }
        Ok(Some(tasks))
    }

    fn task_by_key(&self, department: &str, key: &TaskKey) -> Result<Option<Task>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t JOIN departments d ON d.id = t.department_id
             WHERE d.name = ?1 AND t.task_key = ?2"
        );
        let task = conn
            .query_row(&sql, params![department.to_lowercase(), key.as_str()], Self::row_to_task)
            .optional()?;
        Ok(task)
    }

    fn employee(&self, name: &str) -> Result<Option<Employee>> {
        let conn = self.lock()?;
        let employee = conn
            .query_row(
                "SELECT e.name, e.full_name, d.name, e.manager, e.team, e.start_date, e.office
                 FROM employees e JOIN departments d ON d.id = e.department_id
                 WHERE e.name = ?1",
                [name.to_lowercase()],
                |r| {
                    Ok(Employee {
                        name: r.get(0)?,
                        full_name: r.get(1)?,
                        department: r.get(2)?,
                        manager: r.get(3)?,
                        team: r.get(4)?,
                        start_date: r.get(5)?,
                        office: r.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(employee)
    }
}

impl CompletionLedger for SqliteStorage {
    fn mark_complete(&self, task_id: TaskId, subject: &SubjectId, now_ms: i64) -> Result<MarkOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT INTO task_completions(task_id, subject_id, completed_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(task_id, subject_id) DO NOTHING",
            params![task_id.0, subject.as_str(), now_ms],
        )?;
        tx.commit()?;
        if inserted == 0 {
            debug!(task_id = task_id.0, subject_id = %subject, "completion already recorded");
            return Ok(MarkOutcome::AlreadyComplete);
        }
        Ok(MarkOutcome::Recorded)
    }

    fn completed_task_ids(&self, task_ids: &BTreeSet<TaskId>, subject: &SubjectId) -> Result<BTreeSet<TaskId>> {
        if task_ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let conn = self.lock()?;
        let placeholders = (0..task_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT task_id FROM task_completions WHERE subject_id = ?1 AND task_id IN ({placeholders})"
        );
        let values = std::iter::once(Value::Text(subject.as_str().to_string()))
            .chain(task_ids.iter().map(|id| Value::Integer(id.0)));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |r| r.get::<_, i64>(0))?;
        let mut out = BTreeSet::new();
        for row in rows {
            out.insert(TaskId(row?));
        }
        Ok(out)
    }

    fn completion(&self, task_id: TaskId, subject: &SubjectId) -> Result<Option<CompletionRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT task_id, subject_id, completed_at FROM task_completions
                 WHERE task_id = ?1 AND subject_id = ?2",
                params![task_id.0, subject.as_str()],
                |r| {
                    Ok(CompletionRecord {
                        task_id: TaskId(r.get(0)?),
                        subject_id: Self::row_to_subject(r, 1)?,
                        completed_at_ms: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn reset_completions(&self, subject: Option<&SubjectId>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = match subject {
            Some(s) => conn.execute("DELETE FROM task_completions WHERE subject_id = ?1", [s.as_str()])?,
            None => conn.execute("DELETE FROM task_completions", [])?,
        };
        Ok(removed)
    }
}

impl Storage for SqliteStorage {
    fn seed(&self, catalog: &Catalog) -> Result<SeedReport> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut report = SeedReport::default();

        for d in &catalog.departments {
            report.departments += tx.execute(
                "INSERT INTO departments(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                [d.to_lowercase()],
            )?;
        }

        for t in &catalog.tasks {
            report.tasks += tx.execute(
                "INSERT INTO tasks(task_key, title, description, sort_order, department_id)
                 SELECT ?1, ?2, ?3, ?4, id FROM departments WHERE name = ?5
                 ON CONFLICT(task_key) DO NOTHING",
                params![t.key, t.title, t.description, t.order, t.department.to_lowercase()],
            )?;
        }

        for e in &catalog.employees {
            report.employees += tx.execute(
                "INSERT INTO employees(name, full_name, department_id, manager, team, start_date, office)
                 SELECT ?1, ?2, id, ?4, ?5, ?6, ?7 FROM departments WHERE name = ?3
                 ON CONFLICT(name) DO NOTHING",
                params![
                    e.name.to_lowercase(),
                    e.full_name,
                    e.department.to_lowercase(),
                    e.manager,
                    e.team,
                    e.start_date,
                    e.office
                ],
            )?;
        }

        tx.commit()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboarding_storage::CatalogTask;

    fn catalog() -> Catalog {
        let task = |dept: &str, key: &str, order| CatalogTask {
            department: dept.into(),
            key: key.into(),
            title: format!("title {key}"),
            description: format!("description {key}"),
            order,
        };
        Catalog {
            departments: vec!["engineering".into(), "Sales".into()],
            tasks: vec![
                task("engineering", "eng_003", 3),
                task("engineering", "eng_001", 1),
                task("engineering", "eng_002", 2),
                task("sales", "sal_001", 1),
            ],
            employees: vec![Employee {
                name: "Alex".into(),
                full_name: "Alex Rivera".into(),
                department: "Sales".into(),
                manager: Some("Marcus Webb".into()),
                team: Some("Enterprise Accounts".into()),
                start_date: Some("2026-03-01".into()),
                office: Some("Remote".into()),
            }],
        }
    }

    fn seeded() -> SqliteStorage {
        let s = SqliteStorage::open_in_memory().unwrap();
        s.seed(&catalog()).unwrap();
        s
    }

    #[test]
    fn seed_twice_inserts_once() {
        let s = SqliteStorage::open_in_memory().unwrap();
        let first = s.seed(&catalog()).unwrap();
        assert_eq!(first, SeedReport { departments: 2, tasks: 4, employees: 1 });
        assert_eq!(s.seed(&catalog()).unwrap(), SeedReport::default());
        assert_eq!(s.departments().unwrap(), vec!["engineering", "sales"]);
    }

    #[test]
    fn tasks_come_back_in_order() {
        let s = seeded();
        let tasks = s.list_tasks("Engineering").unwrap().unwrap();
        let keys: Vec<&str> = tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["eng_001", "eng_002", "eng_003"]);
        assert!(s.list_tasks("finance").unwrap().is_none());
    }

    #[test]
    fn task_lookup_is_scoped_to_department() {
        let s = seeded();
        let key = TaskKey::new("sal_001").unwrap();
        assert!(s.task_by_key("sales", &key).unwrap().is_some());
        assert!(s.task_by_key("engineering", &key).unwrap().is_none());
    }

    #[test]
    fn employee_lookup_is_case_insensitive() {
        let s = seeded();
        let e = s.employee("ALEX").unwrap().unwrap();
        assert_eq!(e.full_name, "Alex Rivera");
        assert_eq!(e.department, "sales");
        assert!(s.employee("nobody").unwrap().is_none());
    }

    #[test]
    fn unknown_task_id_is_a_storage_fault() {
        let s = seeded();
        let subject = SubjectId::new("a").unwrap();
        assert!(s.mark_complete(TaskId(4242), &subject, 1).is_err());
    }

    #[test]
    fn repeat_mark_keeps_first_timestamp() {
        let s = seeded();
        let id = s.task_by_key("engineering", &TaskKey::new("eng_001").unwrap()).unwrap().unwrap().id;
        let subject = SubjectId::new("a").unwrap();
        assert_eq!(s.mark_complete(id, &subject, 10).unwrap(), MarkOutcome::Recorded);
        assert_eq!(s.mark_complete(id, &subject, 20).unwrap(), MarkOutcome::AlreadyComplete);
        assert_eq!(s.completion(id, &subject).unwrap().unwrap().completed_at_ms, 10);
    }
}
