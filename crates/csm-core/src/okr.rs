//! OKR progress per task category.
//!
//! Each category has a target (default [`DEFAULT_TARGET`]). Progress is
//! capped at the target: completed work fills the bar first, open work fills
//! what is left of it, and neither portion ever exceeds the target.

use crate::db::Store;
use crate::error::{CsmError, Result};
use crate::model::{Task, TaskType};
use rusqlite::params;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_TARGET: u32 = 4;

/// Per-category targets; categories without an explicit target use the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OkrTargets(BTreeMap<TaskType, u32>);

impl OkrTargets {
    #[must_use]
    pub fn get(&self, task_type: TaskType) -> u32 {
        self.0.get(&task_type).copied().unwrap_or(DEFAULT_TARGET)
    }

    pub fn set(&mut self, task_type: TaskType, target: u32) {
        self.0.insert(task_type, target);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OkrProgress {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub total: u32,
    pub completed: u32,
    pub target: u32,
    pub completed_portion: u32,
    pub incomplete_portion: u32,
    pub percent_complete: f64,
    pub percent_incomplete: f64,
}

impl OkrProgress {
    fn new(task_type: TaskType, total: u32, completed: u32, target: u32) -> Self {
        let completed_portion = completed.min(target);
        let incomplete_portion = total.min(target) - completed_portion;
        let percent = |portion: u32| {
            if target == 0 {
                0.0
            } else {
                f64::from(portion) / f64::from(target) * 100.0
            }
        };
        Self {
            task_type,
            total,
            completed,
            target,
            completed_portion,
            incomplete_portion,
            percent_complete: percent(completed_portion),
            percent_incomplete: percent(incomplete_portion),
        }
    }
}

/// Progress for every category, in [`TaskType::ALL`] order.
#[must_use]
pub fn aggregate(tasks: &[Task], targets: &OkrTargets) -> Vec<OkrProgress> {
    TaskType::ALL
        .iter()
        .map(|&task_type| {
            let (total, completed) = tasks
                .iter()
                .filter(|t| t.task_type == task_type)
                .fold((0_u32, 0_u32), |(total, done), t| {
                    (
                        total.saturating_add(1),
                        done.saturating_add(u32::from(t.completed)),
                    )
                });
            OkrProgress::new(task_type, total, completed, targets.get(task_type))
        })
        .collect()
}

/// Read the stored targets. Rows with an unknown category are ignored.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn load_targets(store: &Store) -> Result<OkrTargets> {
    let mut stmt = store
        .conn()
        .prepare("SELECT task_type, target FROM okr_targets")
        .map_err(|e| CsmError::storage("prepare okr target listing", e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| CsmError::storage("list okr targets", e))?;

    let mut targets = OkrTargets::default();
    for row in rows {
        let (raw_type, target) = row?;
        if let (Ok(task_type), Ok(target)) = (raw_type.parse::<TaskType>(), u32::try_from(target))
        {
            targets.set(task_type, target);
        }
    }
    Ok(targets)
}

/// Upsert the target for one category.
///
/// # Errors
///
/// Returns a validation error when `target` is zero, or a storage error if
/// the write fails.
pub fn set_target(store: &Store, task_type: TaskType, target: u32) -> Result<()> {
    if target < 1 {
        return Err(CsmError::validation(format!(
            "{task_type} target must be at least 1"
        )));
    }
    store
        .conn()
        .execute(
            "INSERT INTO okr_targets (task_type, target) VALUES (?1, ?2)
             ON CONFLICT(task_type) DO UPDATE SET target = excluded.target",
            params![task_type.as_str(), i64::from(target)],
        )
        .map_err(|e| CsmError::storage(format!("set {task_type} target"), e))?;
    info!(%task_type, target, "okr target updated");
    Ok(())
}
