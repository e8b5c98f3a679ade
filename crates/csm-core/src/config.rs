//! Project and user configuration.
//!
//! - project: `.csm/config.toml` (storage key names)
//! - user: `<config dir>/csm/config.toml` (preferred output mode)
//! - env: `CSM_TASK_KEY` / `CSM_ACCOUNT_KEY` override the project storage keys

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the per-project directory.
pub const CSM_DIR: &str = ".csm";
/// Database file inside [`CSM_DIR`].
pub const DB_FILE: &str = "csm.sqlite3";
/// Project config file inside [`CSM_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_TASK_KEY: &str = "csm_tasks";
pub const DEFAULT_ACCOUNT_KEY: &str = "csm_accounts";

const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Names of the tables backing each record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_task_key")]
    pub task_key: String,
    #[serde(default = "default_account_key")]
    pub account_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            task_key: default_task_key(),
            account_key: default_account_key(),
        }
    }
}

/// Validated storage keys, safe to splice into SQL as identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageKeys {
    tasks: String,
    accounts: String,
}

impl StorageKeys {
    /// Validate a pair of storage keys.
    ///
    /// # Errors
    ///
    /// Returns an error if either key is not a plain SQL identifier or both
    /// keys name the same table.
    pub fn new(tasks: &str, accounts: &str) -> Result<Self> {
        validate_key("task_key", tasks)?;
        validate_key("account_key", accounts)?;
        if tasks.eq_ignore_ascii_case(accounts) {
            bail!("task_key and account_key must differ (both are '{tasks}')");
        }
        if tasks.eq_ignore_ascii_case("okr_targets")
            || tasks.eq_ignore_ascii_case("store_meta")
            || accounts.eq_ignore_ascii_case("okr_targets")
            || accounts.eq_ignore_ascii_case("store_meta")
        {
            bail!("storage keys may not reuse the reserved names okr_targets/store_meta");
        }
        Ok(Self {
            tasks: tasks.to_string(),
            accounts: accounts.to_string(),
        })
    }

    #[must_use]
    pub fn tasks(&self) -> &str {
        &self.tasks
    }

    #[must_use]
    pub fn accounts(&self) -> &str {
        &self.accounts
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            tasks: DEFAULT_TASK_KEY.to_string(),
            accounts: DEFAULT_ACCOUNT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub keys: StorageKeys,
    pub db_path: PathBuf,
}

/// Walk up from `start` looking for a `.csm/` directory.
#[must_use]
pub fn find_csm_dir(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CSM_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_project_config(csm_dir: &Path) -> Result<ProjectConfig> {
    let path = csm_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("csm/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load project + user config for the `.csm/` directory at `csm_dir`.
pub fn resolve_config(csm_dir: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(csm_dir)?;
    let user = load_user_config()?;
    let keys = resolve_keys(
        &project.storage,
        env::var("CSM_TASK_KEY").ok(),
        env::var("CSM_ACCOUNT_KEY").ok(),
    )?;

    Ok(EffectiveConfig {
        project,
        user,
        keys,
        db_path: csm_dir.join(DB_FILE),
    })
}

fn resolve_keys(
    storage: &StorageConfig,
    env_task_key: Option<String>,
    env_account_key: Option<String>,
) -> Result<StorageKeys> {
    let tasks = env_task_key
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| storage.task_key.clone());
    let accounts = env_account_key
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| storage.account_key.clone());
    StorageKeys::new(tasks.trim(), accounts.trim())
}

fn validate_key(field: &str, key: &str) -> Result<()> {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        bail!("{field} must not be empty");
    };
    if key.len() > MAX_KEY_LEN {
        bail!("{field} '{key}' is longer than {MAX_KEY_LEN} characters");
    }
    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!("{field} '{key}' must match [A-Za-z_][A-Za-z0-9_]*");
    }
    if key.to_ascii_lowercase().starts_with("sqlite_") {
        bail!("{field} '{key}' uses the reserved sqlite_ prefix");
    }
    Ok(())
}

/// Normalize an output mode name, accepting legacy aliases.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn default_task_key() -> String {
    DEFAULT_TASK_KEY.to_string()
}

fn default_account_key() -> String {
    DEFAULT_ACCOUNT_KEY.to_string()
}
