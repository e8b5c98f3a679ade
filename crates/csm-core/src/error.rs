use std::fmt;
use std::path::PathBuf;

use crate::model::RecordKind;

/// Result alias used by the record store and session operations.
pub type Result<T, E = CsmError> = std::result::Result<T, E>;

/// Machine-readable error codes for scripts and agents driving the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidInput,
    InvalidEnumValue,
    RecordNotFound,
    CorruptRecord,
    MalformedImport,
    StoreUnavailable,
    StorageKeyMismatch,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidInput => "E2001",
            Self::InvalidEnumValue => "E2002",
            Self::RecordNotFound => "E2003",
            Self::CorruptRecord => "E3001",
            Self::MalformedImport => "E3002",
            Self::StoreUnavailable => "E5001",
            Self::StorageKeyMismatch => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidInput => "Invalid input",
            Self::InvalidEnumValue => "Invalid type/vertical value",
            Self::RecordNotFound => "Record not found",
            Self::CorruptRecord => "Corrupt stored record",
            Self::MalformedImport => "Malformed import file",
            Self::StoreUnavailable => "Record store unavailable",
            Self::StorageKeyMismatch => "Storage keys changed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced next to the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `csm init` to create a .csm/ directory here."),
            Self::ConfigParseError => Some("Fix syntax in .csm/config.toml and retry."),
            Self::InvalidInput => None,
            Self::InvalidEnumValue => Some(
                "Task types are Risk, Upsell, Story, EBC; run `csm account verticals` for verticals.",
            ),
            Self::RecordNotFound => Some("Run `csm task list` or `csm account list` to see ids."),
            Self::CorruptRecord => Some("Export, fix the offending row, and re-import."),
            Self::MalformedImport => {
                Some("Check the CSV header row against the documented column names.")
            }
            Self::StoreUnavailable => Some("Check that .csm/csm.sqlite3 is readable and writable."),
            Self::StorageKeyMismatch => Some(
                "Restore the previous task_key/account_key or start a fresh store with `csm init --force`.",
            ),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure taxonomy shared by every store and session operation.
#[derive(Debug, thiserror::Error)]
pub enum CsmError {
    /// Bad user input. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// An enumerated field held a value outside its fixed set.
    #[error("invalid {expected}: '{got}'")]
    InvalidEnum { expected: &'static str, got: String },

    /// The referenced record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: i64 },

    /// The store could not be opened or a single read/write failed.
    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Configured storage keys differ from the ones the store was created with.
    #[error("storage keys changed: store uses {stored}, config asks for {configured}")]
    KeyMismatch { stored: String, configured: String },

    /// Persisted content could not be decoded.
    #[error("{0}")]
    Parse(String),

    /// An import file is unusable as a whole (missing headers, bad encoding).
    #[error("{0}")]
    MalformedImport(String),

    /// No `.csm/` directory above the working directory.
    #[error("no .csm directory found from {}", .0.display())]
    NotInitialized(PathBuf),
}

impl CsmError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn storage(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source: Some(source),
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidInput,
            Self::InvalidEnum { .. } => ErrorCode::InvalidEnumValue,
            Self::NotFound { .. } => ErrorCode::RecordNotFound,
            Self::Storage { .. } => ErrorCode::StoreUnavailable,
            Self::KeyMismatch { .. } => ErrorCode::StorageKeyMismatch,
            Self::Parse(_) => ErrorCode::CorruptRecord,
            Self::MalformedImport(_) => ErrorCode::MalformedImport,
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
        }
    }

    /// Remediation text, falling back to the code's generic message.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or_else(|| code.message()).to_string()
    }

    /// True for errors caused by user input rather than the environment.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidEnum { .. } | Self::NotFound { .. }
        )
    }
}

impl From<rusqlite::Error> for CsmError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Storage {
            context: format!("sqlite: {source}"),
            source: Some(source),
        }
    }
}
