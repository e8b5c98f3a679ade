use super::{normalize, parse_optional_date};
use crate::error::{CsmError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Top level of the fixed industry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Vertical {
    #[serde(rename = "FINS")]
    Fins,
    #[serde(rename = "HLS")]
    Hls,
    Retail,
    Manufacturing,
    #[serde(rename = "Public Sector")]
    PublicSector,
    Technology,
}

impl Vertical {
    pub const ALL: [Self; 6] = [
        Self::Fins,
        Self::Hls,
        Self::Retail,
        Self::Manufacturing,
        Self::PublicSector,
        Self::Technology,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fins => "FINS",
            Self::Hls => "HLS",
            Self::Retail => "Retail",
            Self::Manufacturing => "Manufacturing",
            Self::PublicSector => "Public Sector",
            Self::Technology => "Technology",
        }
    }

    /// The sub-verticals allowed under this vertical.
    #[must_use]
    pub const fn sub_verticals(self) -> &'static [&'static str] {
        match self {
            Self::Fins => &["Banking", "Insurance", "Capital Markets", "Payments"],
            Self::Hls => &["Provider", "Payer", "Life Sciences", "MedTech"],
            Self::Retail => &["Ecommerce", "Grocery", "Apparel", "Consumer Goods"],
            Self::Manufacturing => &["Automotive", "Industrial", "Energy", "Aerospace"],
            Self::PublicSector => &["Federal", "State & Local", "Education", "Nonprofit"],
            Self::Technology => &["Software", "Hardware", "Telecommunications", "Media"],
        }
    }

    /// Canonical spelling of `raw` if it belongs to this vertical.
    #[must_use]
    pub fn sub_vertical(self, raw: &str) -> Option<&'static str> {
        let wanted = normalize(raw);
        self.sub_verticals()
            .iter()
            .copied()
            .find(|candidate| candidate.to_ascii_lowercase() == wanted)
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vertical {
    type Err = CsmError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "fins" | "financial services" => Ok(Self::Fins),
            "hls" | "healthcare" | "healthcare & life sciences" => Ok(Self::Hls),
            "retail" => Ok(Self::Retail),
            "manufacturing" => Ok(Self::Manufacturing),
            "public sector" | "public-sector" | "public_sector" => Ok(Self::PublicSector),
            "technology" | "tech" => Ok(Self::Technology),
            _ => Err(CsmError::InvalidEnum {
                expected: "vertical",
                got: s.to_string(),
            }),
        }
    }
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<i64>,
    pub name: String,
    pub vertical: Option<Vertical>,
    pub sub_vertical: Option<String>,
    pub arr: Option<f64>,
    pub renewal_date: Option<NaiveDate>,
}

/// Raw account fields as submitted by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInput {
    pub name: String,
    pub vertical: Option<String>,
    pub sub_vertical: Option<String>,
    pub arr: Option<String>,
    pub renewal_date: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AccountInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn vertical(mut self, vertical: impl Into<String>, sub_vertical: Option<&str>) -> Self {
        self.vertical = Some(vertical.into());
        self.sub_vertical = sub_vertical.map(str::to_string);
        self
    }

    #[must_use]
    pub fn arr(mut self, arr: impl Into<String>) -> Self {
        self.arr = Some(arr.into());
        self
    }

    #[must_use]
    pub fn renewal_date(mut self, date: impl Into<String>) -> Self {
        self.renewal_date = Some(date.into());
        self
    }

    /// Validate the submitted fields and build an unsaved account.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name, an unknown vertical, a
    /// sub-vertical outside its vertical, a negative or non-numeric ARR, or
    /// an unparseable renewal date.
    pub fn validate(&self) -> Result<Account> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CsmError::validation("account name is required"));
        }

        let vertical = non_blank(self.vertical.as_deref())
            .map(str::parse::<Vertical>)
            .transpose()?;

        let sub_vertical = match (vertical, non_blank(self.sub_vertical.as_deref())) {
            (_, None) => None,
            (None, Some(sub)) => {
                return Err(CsmError::validation(format!(
                    "sub-vertical '{sub}' requires a vertical"
                )));
            }
            (Some(vertical), Some(sub)) => {
                let canonical = vertical.sub_vertical(sub).ok_or_else(|| {
                    CsmError::validation(format!(
                        "sub-vertical '{sub}' is not part of {vertical} (expected one of: {})",
                        vertical.sub_verticals().join(", ")
                    ))
                })?;
                Some(canonical.to_string())
            }
        };

        let arr = non_blank(self.arr.as_deref())
            .map(parse_arr)
            .transpose()?;

        let renewal_date = parse_optional_date("renewal date", self.renewal_date.as_deref())?;

        Ok(Account {
            id: None,
            name: name.to_string(),
            vertical,
            sub_vertical,
            arr,
            renewal_date,
        })
    }
}

impl From<&Account> for AccountInput {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            vertical: account.vertical.map(|v| v.as_str().to_string()),
            sub_vertical: account.sub_vertical.clone(),
            arr: account.arr.map(|arr| arr.to_string()),
            renewal_date: account
                .renewal_date
                .map(|d| d.format(super::DATE_FORMAT).to_string()),
        }
    }
}

/// Parse an ARR figure, tolerating `$` and thousands separators.
fn parse_arr(raw: &str) -> Result<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '_' | ' '))
        .collect();
    let value = cleaned
        .parse::<f64>()
        .map_err(|_| CsmError::validation(format!("invalid ARR '{raw}': expected a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(CsmError::validation(format!(
            "invalid ARR '{raw}': must be a non-negative number"
        )));
    }
    Ok(value)
}
