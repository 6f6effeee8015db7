//! Record builders for store and report tests

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{Account, Case, Severity, CLOSED_STATUS};

/// Midnight on a `YYYY-MM-DD` date
pub fn day(date: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad fixture date {}: {}", date, e))
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// An open Normal-severity case of type "Question"
pub fn open_case(id: &str, product: &str, account_id: &str, created: &str) -> Case {
    Case {
        id: id.to_string(),
        product: product.to_string(),
        case_type: "Question".to_string(),
        severity: Severity::Normal,
        status: "Open".to_string(),
        created: day(created),
        closed: None,
        account_id: account_id.to_string(),
    }
}

/// A closed Normal-severity case of type "Question"
pub fn closed_case(id: &str, product: &str, account_id: &str, created: &str, closed: &str) -> Case {
    Case {
        status: CLOSED_STATUS.to_string(),
        closed: Some(day(closed)),
        ..open_case(id, product, account_id, created)
    }
}

pub fn account(id: &str, country: &str, industry: &str) -> Account {
    Account {
        id: id.to_string(),
        country: country.to_string(),
        industry: industry.to_string(),
        created: day("2020-01-01"),
    }
}

/// Builder-style tweaks for fixture cases
pub trait CaseExt {
    fn severity(self, severity: Severity) -> Self;
    fn of_type(self, case_type: &str) -> Self;
}

impl CaseExt for Case {
    fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    fn of_type(mut self, case_type: &str) -> Self {
        self.case_type = case_type.to_string();
        self
    }
}
