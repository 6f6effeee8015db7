//! Record types for support cases and customer accounts

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Storage format for every timestamp column in the record store
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Case status that marks a ticket as resolved
pub const CLOSED_STATUS: &str = "Closed";

/// Case severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Normal,
    Medium,
    High,
    Urgent,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }

    /// All severities, least severe first
    pub fn all() -> &'static [Severity] {
        &[
            Self::Low,
            Self::Normal,
            Self::Medium,
            Self::High,
            Self::Urgent,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!(
                "Unknown severity '{}'. Expected one of: Low, Normal, Medium, High, Urgent",
                other
            )),
        }
    }
}

/// A support ticket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Case {
    pub id: String,
    pub product: String,
    pub case_type: String,
    pub severity: Severity,
    pub status: String,
    pub created: NaiveDateTime,
    pub closed: Option<NaiveDateTime>,
    pub account_id: String,
}

impl Case {
    pub fn is_closed(&self) -> bool {
        self.status == CLOSED_STATUS
    }

    /// Check the closed-timestamp invariants
    pub fn validate(&self) -> Result<(), String> {
        match self.closed {
            Some(_) if !self.is_closed() => Err(format!(
                "case {} has a closed date but status '{}'",
                self.id, self.status
            )),
            Some(closed) if closed < self.created => Err(format!(
                "case {} was closed ({}) before it was created ({})",
                self.id, closed, self.created
            )),
            _ => Ok(()),
        }
    }
}

/// A customer account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: String,
    pub country: String,
    pub industry: String,
    pub created: NaiveDateTime,
}

/// Counts reported after a successful load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub cases: usize,
    pub accounts: usize,
    /// Case rows dropped for inconsistent closed dates
    pub skipped_cases: usize,
    pub cases_path: std::path::PathBuf,
    pub accounts_path: std::path::PathBuf,
}

/// Timestamp as it appears in a source file
///
/// JSON exports from dataframe tooling encode dates as epoch milliseconds;
/// hand-written files use ISO text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    /// Coerce to a naive UTC timestamp; empty text means "absent"
    pub fn parse(&self) -> Result<Option<NaiveDateTime>, String> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms)
                .map(|dt| Some(dt.naive_utc()))
                .ok_or_else(|| format!("timestamp {} out of range", ms)),
            Self::Text(s) => parse_timestamp(s),
        }
    }
}

/// Parse a textual timestamp in any of the accepted layouts
pub fn parse_timestamp(s: &str) -> Result<Option<NaiveDateTime>, String> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nat") {
        return Ok(None);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.naive_utc()));
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Some(dt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }

    Err(format!("unrecognized timestamp '{}'", s))
}
