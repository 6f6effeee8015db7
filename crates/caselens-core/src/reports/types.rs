//! Report types: kinds, render-agnostic series and context packages

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The fixed set of reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    TopProducts,
    SeverityStack,
    CaseTypes,
    GlobalHotspots,
    TicketDensity,
    IndustryStruggles,
    VolumeTrend,
    ResolutionTime,
    BacklogGrowth,
}

impl ReportKind {
    /// All reports in catalog order
    pub fn all() -> &'static [ReportKind] {
        &[
            Self::TopProducts,
            Self::SeverityStack,
            Self::CaseTypes,
            Self::GlobalHotspots,
            Self::TicketDensity,
            Self::IndustryStruggles,
            Self::VolumeTrend,
            Self::ResolutionTime,
            Self::BacklogGrowth,
        ]
    }

    /// Display name, also accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopProducts => "Top Products",
            Self::SeverityStack => "Severity Stack",
            Self::CaseTypes => "Case Types",
            Self::GlobalHotspots => "Global Hotspots",
            Self::TicketDensity => "Ticket Density",
            Self::IndustryStruggles => "Industry Struggles",
            Self::VolumeTrend => "Volume Trend",
            Self::ResolutionTime => "Resolution Time",
            Self::BacklogGrowth => "Backlog Growth",
        }
    }

    /// Kebab-case name for command lines
    pub fn slug(&self) -> String {
        self.as_str().to_lowercase().replace(' ', "-")
    }

    /// Chart title
    pub fn title(&self) -> &'static str {
        match self {
            Self::TopProducts => "Top Products by Ticket Number",
            Self::SeverityStack => "Product Risk Profile: Severity Distribution",
            Self::CaseTypes => "Distribution of Case Types",
            Self::GlobalHotspots => "Top 10 Countries by Support Load",
            Self::TicketDensity => "Support Density (Tickets per Account)",
            Self::IndustryStruggles => "Total Cases by Client Industry",
            Self::VolumeTrend => "Weekly Ticket Volume Trend",
            Self::ResolutionTime => "Time to Resolution Distribution",
            Self::BacklogGrowth => "Backlog Growth (Received vs Resolved)",
        }
    }

    /// Label of the value axis
    pub fn value_label(&self) -> &'static str {
        match self {
            Self::TopProducts | Self::CaseTypes | Self::IndustryStruggles => "Number of Cases",
            Self::SeverityStack => "Percentage of Tickets (%)",
            Self::GlobalHotspots => "Total Cases",
            Self::TicketDensity => "Avg Tickets per Customer",
            Self::VolumeTrend => "New Cases (Weekly)",
            Self::ResolutionTime => "Days to Close",
            Self::BacklogGrowth => "Cumulative Cases",
        }
    }

    /// One sentence on what the report measures
    pub fn description(&self) -> &'static str {
        match self {
            Self::TopProducts => "Identifies which products generate the most support tickets.",
            Self::SeverityStack => {
                "Shows how ticket severity is distributed within each of the busiest products."
            }
            Self::CaseTypes => {
                "Breaks tickets down by category to reveal what customers need help with."
            }
            Self::GlobalHotspots => "Ranks customer countries by support ticket volume.",
            Self::TicketDensity => {
                "Compares tickets per customer account across countries with a meaningful customer base."
            }
            Self::IndustryStruggles => "Shows which client industries raise the most tickets.",
            Self::VolumeTrend => "Tracks weekly ticket intake to reveal growth or decline.",
            Self::ResolutionTime => "Measures how many days closed tickets took to resolve.",
            Self::BacklogGrowth => {
                "Compares cumulative received and resolved tickets to show whether the backlog is growing."
            }
        }
    }

    /// Whether the report joins cases to their accounts
    pub fn joins_accounts(&self) -> bool {
        matches!(
            self,
            Self::GlobalHotspots | Self::TicketDensity | Self::IndustryStruggles
        )
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    /// Accepts "Top Products", "top-products", "top_products" or a 1-based
    /// catalog position
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if let Ok(n) = wanted.parse::<usize>() {
            if let Some(kind) = n.checked_sub(1).and_then(|i| Self::all().get(i)) {
                return Ok(*kind);
            }
        }

        Self::all()
            .iter()
            .find(|k| k.as_str().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| {
                let names: Vec<String> = Self::all().iter().map(|k| k.slug()).collect();
                format!("Unknown report '{}'. Available: {}", s, names.join(", "))
            })
    }
}

/// What a report hands to the insight engine
///
/// `objective` is the interpretive instruction (role and decision rules);
/// `facts` are the computed statistics stated in plain sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPackage {
    pub objective: String,
    pub facts: String,
}

impl ContextPackage {
    pub fn new(objective: impl Into<String>, facts: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            facts: facts.into(),
        }
    }
}

/// A labelled value (bar or slice)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub label: String,
    pub value: f64,
}

/// One bar of a stacked chart: raw counts and their percentages per segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackedRow {
    pub label: String,
    pub counts: Vec<i64>,
    pub shares: Vec<f64>,
}

impl StackedRow {
    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// A named time-indexed line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub name: String,
    pub points: Vec<DatedValue>,
}

/// Histogram bin covering `[start, end)` (the last bin is closed)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Render-agnostic report data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Series {
    Categorical { points: Vec<Point> },
    Stacked {
        segments: Vec<String>,
        rows: Vec<StackedRow>,
    },
    TimeSeries { lines: Vec<Line> },
    Histogram { bins: Vec<Bin> },
}

impl Series {
    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Categorical { points } => points.is_empty(),
            Self::Stacked { rows, .. } => rows.is_empty(),
            Self::TimeSeries { lines } => lines.iter().all(|l| l.points.is_empty()),
            Self::Histogram { bins } => bins.iter().all(|b| b.count == 0),
        }
    }
}

/// Output of one report run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub title: &'static str,
    pub value_label: &'static str,
    pub series: Series,
    pub context: ContextPackage,
}

impl Report {
    pub fn new(kind: ReportKind, series: Series, context: ContextPackage) -> Self {
        Self {
            kind,
            title: kind.title(),
            value_label: kind.value_label(),
            series,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_kind_parse_variants() {
        for input in ["Top Products", "top-products", "top_products", " TOP  products ", "1"] {
            assert_eq!(
                input.parse::<ReportKind>().unwrap(),
                ReportKind::TopProducts,
                "{}",
                input
            );
        }
        assert_eq!("9".parse::<ReportKind>().unwrap(), ReportKind::BacklogGrowth);
        assert!("10".parse::<ReportKind>().is_err());
        assert!("0".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_report_kind_unknown_lists_names() {
        let err = "churn".parse::<ReportKind>().unwrap_err();
        assert!(err.contains("Unknown report 'churn'"));
        assert!(err.contains("backlog-growth"));
    }

    #[test]
    fn test_names_round_trip() {
        for kind in ReportKind::all() {
            assert_eq!(kind.as_str().parse::<ReportKind>().unwrap(), *kind);
            assert_eq!(kind.slug().parse::<ReportKind>().unwrap(), *kind);
        }
        assert_eq!(ReportKind::all().len(), 9);
    }

    #[test]
    fn test_series_serializes_with_kind_tag() {
        let series = Series::Categorical {
            points: vec![Point {
                label: "Verify".into(),
                value: 3.0,
            }],
        };
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["kind"], "categorical");
        assert_eq!(json["points"][0]["label"], "Verify");
    }

    #[test]
    fn test_series_is_empty() {
        assert!(Series::TimeSeries { lines: vec![] }.is_empty());
        assert!(Series::Histogram {
            bins: vec![Bin {
                start: 0.0,
                end: 1.0,
                count: 0
            }]
        }
        .is_empty());
        assert!(!Series::Categorical {
            points: vec![Point {
                label: "a".into(),
                value: 0.0
            }]
        }
        .is_empty());
    }
}
