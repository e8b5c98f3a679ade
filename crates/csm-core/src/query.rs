//! In-memory task filtering for the dashboard list and `csm task list`.

use crate::model::{Task, TaskType};

/// Name search plus an optional category restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    text: String,
    pub task_type: Option<TaskType>,
}

impl TaskQuery {
    /// Build a query; `text` is matched case-insensitively.
    pub fn new(text: impl AsRef<str>, task_type: Option<TaskType>) -> Self {
        Self {
            text: text.as_ref().to_lowercase(),
            task_type,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.task_type.is_none_or(|t| t == task.task_type)
            && (self.text.is_empty() || task.name.to_lowercase().contains(&self.text))
    }
}

/// Tasks matching `query`, in their original order.
#[must_use]
pub fn filter_tasks(tasks: &[Task], query: &TaskQuery) -> Vec<Task> {
    tasks.iter().filter(|t| query.matches(t)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskInput;

    fn tasks() -> Vec<Task> {
        [
            ("Renewal RISK review", "Risk"),
            ("Seat expansion", "Upsell"),
            ("Risky migration story", "Story"),
            ("Exec briefing", "EBC"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            let mut task = TaskInput::new(*name, *ty).validate().expect("valid");
            task.id = Some(i64::try_from(i).expect("small") + 1);
            task
        })
        .collect()
    }

    #[test]
    fn empty_query_keeps_everything_in_order() {
        let all = tasks();
        assert_eq!(filter_tasks(&all, &TaskQuery::default()), all);
    }

    #[test]
    fn text_is_case_insensitive_substring() {
        let hits = filter_tasks(&tasks(), &TaskQuery::new("Risk", None));
        let ids: Vec<_> = hits.iter().filter_map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn type_and_text_combine() {
        let hits = filter_tasks(&tasks(), &TaskQuery::new("risk", Some(TaskType::Story)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Risky migration story");

        let none = filter_tasks(&tasks(), &TaskQuery::new("seat", Some(TaskType::Risk)));
        assert!(none.is_empty());
    }
}
