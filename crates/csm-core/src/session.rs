//! The operation context for one process.
//!
//! A [`Session`] owns the store location and keys, and opens the
//! connection on first use. Deletes drop the cached connection so the next
//! read goes through a freshly opened one.

use crate::config::{EffectiveConfig, StorageKeys};
use crate::db::{self, Store};
use crate::error::{CsmError, Result};
use crate::model::{Account, AccountInput, RecordKind, Task, TaskInput, TaskType};
use crate::okr::{self, OkrProgress};
use crate::query::{TaskQuery, filter_tasks};
use crate::timing;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Session {
    db_path: PathBuf,
    keys: StorageKeys,
    store: Option<Store>,
}

impl Session {
    pub fn new(db_path: impl Into<PathBuf>, keys: StorageKeys) -> Self {
        Self {
            db_path: db_path.into(),
            keys,
            store: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &EffectiveConfig) -> Self {
        Self::new(config.db_path.clone(), config.keys.clone())
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[must_use]
    pub const fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// The open store, opening and migrating it on first use.
    ///
    /// # Errors
    ///
    /// Returns a storage or key-mismatch error if the store cannot be opened.
    pub fn store(&mut self) -> Result<&Store> {
        let store = match self.store.take() {
            Some(store) => store,
            None => {
                debug!(path = %self.db_path.display(), "opening record store");
                db::open_store(&self.db_path, &self.keys)?
            }
        };
        Ok(&*self.store.insert(store))
    }

    /// Drop the cached connection.
    pub fn invalidate(&mut self) {
        if self.store.take().is_some() {
            debug!("record store connection invalidated");
        }
    }

    // Tasks

    /// # Errors
    ///
    /// Returns a storage error if listing fails.
    pub fn list_tasks(&mut self) -> Result<Vec<Task>> {
        self.store()?.get_all()
    }

    /// # Errors
    ///
    /// Returns a storage or parse error if the lookup fails.
    pub fn get_task(&mut self, id: i64) -> Result<Option<Task>> {
        self.store()?.get(id)
    }

    /// Create a task. New tasks always start incomplete.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or an unknown account, and a
    /// storage error if the write fails.
    pub fn add_task(&mut self, input: &TaskInput) -> Result<Task> {
        let mut task = input.validate()?;
        task.completed = false;
        let store = self.store()?;
        task.account_name = match task.account_id {
            Some(account_id) => Some(require_account(store, account_id)?.name),
            None => None,
        };
        let id = store.put(&task)?;
        task.id = Some(id);
        info!(id, task_type = %task.task_type, "task added");
        Ok(task)
    }

    /// Replace every field of task `id` with `input`.
    ///
    /// The account name snapshot is refreshed from the referenced account.
    /// If that account has since been deleted and the reference is
    /// unchanged, the previous snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CsmError::NotFound`] if the task is gone, a validation error
    /// for bad input or a newly referenced unknown account, and a storage
    /// error if the write fails.
    pub fn update_task(&mut self, id: i64, input: &TaskInput) -> Result<Task> {
        let mut task = input.validate()?;
        let store = self.store()?;
        let existing: Task = store.get(id)?.ok_or(CsmError::NotFound {
            kind: RecordKind::Task,
            id,
        })?;

        task.id = Some(id);
        task.account_name = match task.account_id {
            None => None,
            Some(account_id) => match store.get::<Account>(account_id)? {
                Some(account) => Some(account.name),
                None if existing.account_id == Some(account_id) => existing.account_name,
                None => return Err(unknown_account(account_id)),
            },
        };
        store.put(&task)?;
        info!(id, completed = task.completed, "task updated");
        Ok(task)
    }

    /// Flip the completion state of task `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CsmError::NotFound`] if the task is gone.
    pub fn toggle_task(&mut self, id: i64) -> Result<Task> {
        let stored = self.get_task(id)?.ok_or(CsmError::NotFound {
            kind: RecordKind::Task,
            id,
        })?;
        let input = TaskInput::from(&stored).completed(!stored.completed);
        self.update_task(id, &input)
    }

    /// Delete task `id`. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn delete_task(&mut self, id: i64) -> Result<bool> {
        let removed = self.store()?.delete::<Task>(id)?;
        self.invalidate();
        if removed {
            info!(id, "task deleted");
        } else {
            debug!(id, "task delete matched nothing");
        }
        Ok(removed)
    }

    /// Tasks matching `query`, in store order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if listing fails.
    pub fn search(&mut self, query: &TaskQuery) -> Result<Vec<Task>> {
        let tasks = self.list_tasks()?;
        Ok(timing::timed("query.filter", || filter_tasks(&tasks, query)))
    }

    // Accounts

    /// # Errors
    ///
    /// Returns a storage error if listing fails.
    pub fn list_accounts(&mut self) -> Result<Vec<Account>> {
        self.store()?.get_all()
    }

    /// # Errors
    ///
    /// Returns a storage or parse error if the lookup fails.
    pub fn get_account(&mut self, id: i64) -> Result<Option<Account>> {
        self.store()?.get(id)
    }

    /// # Errors
    ///
    /// Returns a validation error for bad input, or a storage error.
    pub fn add_account(&mut self, input: &AccountInput) -> Result<Account> {
        let mut account = input.validate()?;
        let id = self.store()?.put(&account)?;
        account.id = Some(id);
        info!(id, "account added");
        Ok(account)
    }

    /// Replace every field of account `id`. Task snapshots are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`CsmError::NotFound`] if the account is gone, a validation
    /// error for bad input, or a storage error.
    pub fn update_account(&mut self, id: i64, input: &AccountInput) -> Result<Account> {
        let mut account = input.validate()?;
        let store = self.store()?;
        if store.get::<Account>(id)?.is_none() {
            return Err(CsmError::NotFound {
                kind: RecordKind::Account,
                id,
            });
        }
        account.id = Some(id);
        store.put(&account)?;
        info!(id, "account updated");
        Ok(account)
    }

    /// Delete account `id`. Tasks referencing it keep their reference and
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn delete_account(&mut self, id: i64) -> Result<bool> {
        let removed = self.store()?.delete::<Account>(id)?;
        self.invalidate();
        if removed {
            info!(id, "account deleted");
        }
        Ok(removed)
    }

    // OKR

    /// Progress over every stored task with the stored targets.
    ///
    /// # Errors
    ///
    /// Returns a storage error if reading fails.
    pub fn okr_progress(&mut self) -> Result<Vec<OkrProgress>> {
        let tasks = self.list_tasks()?;
        let targets = okr::load_targets(self.store()?)?;
        Ok(timing::timed("okr.aggregate", || okr::aggregate(&tasks, &targets)))
    }

    /// Persist a new target, then re-aggregate over `tasks` as given.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `target` is zero, or a storage error.
    pub fn set_okr_target(
        &mut self,
        task_type: TaskType,
        target: u32,
        tasks: &[Task],
    ) -> Result<Vec<OkrProgress>> {
        let store = self.store()?;
        okr::set_target(store, task_type, target)?;
        let targets = okr::load_targets(store)?;
        Ok(timing::timed("okr.aggregate", || okr::aggregate(tasks, &targets)))
    }
}

fn unknown_account(id: i64) -> CsmError {
    CsmError::validation(format!("account {id} does not exist"))
}

pub(crate) fn require_account(store: &Store, id: i64) -> Result<Account> {
    store.get::<Account>(id)?.ok_or_else(|| unknown_account(id))
}
