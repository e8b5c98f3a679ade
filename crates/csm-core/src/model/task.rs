use super::{normalize, parse_optional_date};
use crate::error::{CsmError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four OKR categories a task can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Risk,
    Upsell,
    Story,
    #[serde(rename = "EBC")]
    Ebc,
}

impl TaskType {
    /// Every category, in dashboard order.
    pub const ALL: [Self; 4] = [Self::Risk, Self::Upsell, Self::Story, Self::Ebc];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Risk => "Risk",
            Self::Upsell => "Upsell",
            Self::Story => "Story",
            Self::Ebc => "EBC",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CsmError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "risk" => Ok(Self::Risk),
            "upsell" => Ok(Self::Upsell),
            "story" => Ok(Self::Story),
            "ebc" => Ok(Self::Ebc),
            _ => Err(CsmError::InvalidEnum {
                expected: "task type",
                got: s.to_string(),
            }),
        }
    }
}

/// A customer-success task.
///
/// `account_name` is a snapshot of the referenced account's name taken when
/// the task was last written. Renaming or deleting the account leaves it as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub due: Option<NaiveDate>,
    pub completed: bool,
    pub account_id: Option<i64>,
    pub account_name: Option<String>,
}

/// Raw task fields as submitted by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub name: String,
    pub task_type: String,
    pub due: Option<String>,
    pub completed: bool,
    pub account_id: Option<i64>,
}

impl TaskInput {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn due(mut self, due: impl Into<String>) -> Self {
        self.due = Some(due.into());
        self
    }

    #[must_use]
    pub const fn account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Validate the submitted fields and build an unsaved task.
    ///
    /// The account snapshot is left empty; the session resolves it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name, an unknown type, or an
    /// unparseable due date.
    pub fn validate(&self) -> Result<Task> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CsmError::validation("task name is required"));
        }
        if self.task_type.trim().is_empty() {
            return Err(CsmError::validation("task type is required"));
        }
        let task_type = self.task_type.parse::<TaskType>()?;
        let due = parse_optional_date("due date", self.due.as_deref())?;

        Ok(Task {
            id: None,
            name: name.to_string(),
            task_type,
            due,
            completed: self.completed,
            account_id: self.account_id,
            account_name: None,
        })
    }
}

impl From<&Task> for TaskInput {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            task_type: task.task_type.as_str().to_string(),
            due: task.due.map(|d| d.format(super::DATE_FORMAT).to_string()),
            completed: task.completed,
            account_id: task.account_id,
        }
    }
}
