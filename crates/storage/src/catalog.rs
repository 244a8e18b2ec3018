use std::path::Path;

use anyhow::{Context, Result};
use onboarding_core::Employee;
use serde::{Deserialize, Serialize};

/// Seed content: departments, their ordered tasks, and employee records.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub departments: Vec<String>,
    pub tasks: Vec<CatalogTask>,
    #[serde(default)]
    pub employees: Vec<Employee>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogTask {
    pub department: String,
    pub key: String,
    pub title: String,
    pub description: String,
    pub order: i32,
}

/// Rows inserted by a seed run. Rows that already existed are not counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub departments: usize,
    pub tasks: usize,
    pub employees: usize,
}

impl Catalog {
    pub fn from_json(s: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(s).context("parse catalog json")?;
        catalog.check()?;
        Ok(catalog)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&s)
    }

    /// Every task and employee must reference a listed department; task keys are unique.
    fn check(&self) -> Result<()> {
        let mut keys = std::collections::BTreeSet::new();
        for t in &self.tasks {
            if !self.has_department(&t.department) {
                anyhow::bail!("task {} references unknown department {}", t.key, t.department);
            }
            if t.key.trim().is_empty() {
                anyhow::bail!("task in {} has an empty key", t.department);
            }
            if !keys.insert(t.key.as_str()) {
                anyhow::bail!("duplicate task key {}", t.key);
            }
        }
        for e in &self.employees {
            if !self.has_department(&e.department) {
                anyhow::bail!("employee {} references unknown department {}", e.name, e.department);
            }
        }
        Ok(())
    }

    fn has_department(&self, name: &str) -> bool {
        self.departments.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_task_in_unknown_department() {
        let json = r#"{"departments":["sales"],"tasks":[
            {"department":"engineering","key":"eng_001","title":"t","description":"d","order":1}
        ]}"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[test]
    fn rejects_duplicate_keys() {
        let json = r#"{"departments":["sales"],"tasks":[
            {"department":"sales","key":"sal_001","title":"t","description":"d","order":1},
            {"department":"sales","key":"sal_001","title":"t2","description":"d","order":2}
        ]}"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[test]
    fn employees_are_optional() {
        let json = r#"{"departments":["hr"],"tasks":[]}"#;
        let c = Catalog::from_json(json).unwrap();
        assert!(c.employees.is_empty());
    }
}
