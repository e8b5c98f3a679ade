//! Record types persisted by the store.

pub mod account;
pub mod task;

pub use account::{Account, AccountInput, Vertical};
pub use task::{Task, TaskInput, TaskType};

use crate::error::{CsmError, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used for storage, CSV, and display.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The record kinds the store knows how to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Task,
    Account,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an optional user-supplied date.
///
/// Blank input means "no date". Accepts `YYYY-MM-DD` and full RFC 3339
/// timestamps (truncated to their calendar date).
///
/// # Errors
///
/// Returns [`CsmError::Validation`] when the text is neither form.
pub fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(Some(date));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| Some(ts.date_naive()))
        .map_err(|_| CsmError::validation(format!("invalid {field} '{raw}': expected YYYY-MM-DD")))
}

/// Format an optional date the way it is stored.
#[must_use]
pub fn format_optional_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

pub(crate) fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_dates_are_absent() {
        assert_eq!(parse_optional_date("due date", None).ok(), Some(None));
        assert_eq!(parse_optional_date("due date", Some("  ")).ok(), Some(None));
    }

    #[test]
    fn iso_and_rfc3339_dates_parse() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 31);
        assert_eq!(
            parse_optional_date("due date", Some("2026-03-31")).ok(),
            Some(expected)
        );
        assert_eq!(
            parse_optional_date("due date", Some("2026-03-31T09:30:00Z")).ok(),
            Some(expected)
        );
    }

    #[test]
    fn garbage_dates_are_rejected() {
        let err = parse_optional_date("due date", Some("next tuesday"))
            .expect_err("free text is not a date");
        assert!(matches!(err, CsmError::Validation(_)));
        assert!(err.to_string().contains("next tuesday"));

        assert!(parse_optional_date("due date", Some("2026-02-30")).is_err());
    }

    #[test]
    fn dates_format_back_to_iso() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9);
        assert_eq!(format_optional_date(date), "2025-01-09");
        assert_eq!(format_optional_date(None), "");
    }
}
