//! Progress derivation from a task list and a completed-id set. Pure; no state.

use std::collections::BTreeSet;

use crate::ids::TaskId;
use crate::model::Task;

/// `100 * |completed ∩ tasks| / |tasks|` rounded half to even, or 0 for an empty checklist.
pub fn percentage(tasks: &[Task], completed: &BTreeSet<TaskId>) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks.iter().filter(|t| completed.contains(&t.id)).count();
    let pct = (done as f64 / tasks.len() as f64 * 100.0).round_ties_even();
    pct.clamp(0.0, 100.0) as u8
}

/// The lowest-`order` task not yet completed, regardless of input ordering.
pub fn next_pending<'a>(tasks: &'a [Task], completed: &BTreeSet<TaskId>) -> Option<&'a Task> {
    tasks
        .iter()
        .filter(|t| !completed.contains(&t.id))
        .min_by_key(|t| (t.order, t.id))
}

/// Number of tasks not yet completed.
pub fn remaining(tasks: &[Task], completed: &BTreeSet<TaskId>) -> usize {
    tasks.iter().filter(|t| !completed.contains(&t.id)).count()
}
