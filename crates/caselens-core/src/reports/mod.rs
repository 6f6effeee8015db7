//! Report catalog
//!
//! Nine fixed reports, each a pure function of the record store. A report
//! yields a render-agnostic [`Series`] and a [`ContextPackage`] carrying the
//! interpretive instruction plus the computed facts for the insight engine.
//!
//! ## Reports
//!
//! - **Products** - Top Products, Severity Stack, Case Types
//! - **Accounts** - Global Hotspots, Ticket Density, Industry Struggles (joined)
//! - **Timeline** - Volume Trend, Backlog Growth
//! - **Resolution** - Resolution Time
//!
//! Rankings break ties by label ascending, so repeated runs are identical.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caselens_core::reports::{ReportCatalog, ReportKind};
//!
//! let catalog = ReportCatalog::new(store, config.reports.clone());
//! let report = catalog.generate(ReportKind::TopProducts)?;
//! println!("{}", report.context.facts);
//! ```

mod accounts;
mod products;
mod resolution;
mod timeline;
pub mod types;


pub use resolution::{histogram, ResolutionStats, HISTOGRAM_BINS};
pub use timeline::{growth_percent, TrendClass};
pub use types::{
    Bin, ContextPackage, DatedValue, Line, Point, Report, ReportKind, Series, StackedRow,
};

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::store::{RecordStore, Table, Value};

/// Rankings show at most this many entries
pub const TOP_N: usize = 10;

type Output = (Series, ContextPackage);
type Generator = fn(&RecordStore, &ReportSettings) -> Result<Output, ReportError>;

fn generator(kind: ReportKind) -> Generator {
    match kind {
        ReportKind::TopProducts => products::top_products,
        ReportKind::SeverityStack => products::severity_stack,
        ReportKind::CaseTypes => products::case_types,
        ReportKind::GlobalHotspots => accounts::global_hotspots,
        ReportKind::TicketDensity => accounts::ticket_density,
        ReportKind::IndustryStruggles => accounts::industry_struggles,
        ReportKind::VolumeTrend => timeline::volume_trend,
        ReportKind::ResolutionTime => resolution::resolution_time,
        ReportKind::BacklogGrowth => timeline::backlog_growth,
    }
}

/// Runs reports against a loaded store
#[derive(Clone)]
pub struct ReportCatalog {
    store: RecordStore,
    settings: ReportSettings,
}

impl ReportCatalog {
    pub fn new(store: RecordStore, settings: ReportSettings) -> Self {
        Self { store, settings }
    }

    pub fn kinds(&self) -> &'static [ReportKind] {
        ReportKind::all()
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Run a single report
    pub fn generate(&self, kind: ReportKind) -> Result<Report, ReportError> {
        let (series, context) = generator(kind)(&self.store, &self.settings)?;
        tracing::debug!(
            report = kind.as_str(),
            empty = series.is_empty(),
            "Report generated"
        );
        Ok(Report::new(kind, series, context))
    }

    /// Run every report; one failing report does not stop the others
    pub fn generate_all(&self) -> Vec<(ReportKind, Result<Report, ReportError>)> {
        ReportKind::all()
            .iter()
            .map(|&kind| {
                let result = self.generate(kind);
                if let Err(e) = &result {
                    tracing::warn!(report = kind.as_str(), error = %e, "Report failed");
                }
                (kind, result)
            })
            .collect()
    }
}

/// Query result with typed cell access that reports shape errors
pub(crate) struct Rows {
    report: &'static str,
    table: Table,
}

impl Rows {
    pub fn fetch(store: &RecordStore, kind: ReportKind, sql: &str) -> Result<Self, ReportError> {
        let report = kind.as_str();
        let table = store
            .query(sql)
            .map_err(|source| ReportError::Query { report, source })?;
        Ok(Self { report, table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn cell(&self, row: usize, col: usize) -> Result<&Value, ReportError> {
        self.table
            .rows
            .get(row)
            .and_then(|r| r.get(col))
            .ok_or_else(|| self.shape(format!("no cell at row {} column {}", row, col)))
    }

    pub fn text(&self, row: usize, col: usize) -> Result<String, ReportError> {
        match self.cell(row, col)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(self.shape(format!("expected text, got {}", other))),
        }
    }

    pub fn int(&self, row: usize, col: usize) -> Result<i64, ReportError> {
        let value = self.cell(row, col)?;
        value
            .as_i64()
            .ok_or_else(|| self.shape(format!("expected integer, got {}", value)))
    }

    pub fn real(&self, row: usize, col: usize) -> Result<f64, ReportError> {
        let value = self.cell(row, col)?;
        value
            .as_f64()
            .ok_or_else(|| self.shape(format!("expected number, got {}", value)))
    }

    /// Rows shaped `(label TEXT, count INTEGER, ...)`
    pub fn labelled_counts(&self) -> Result<Vec<(String, i64)>, ReportError> {
        (0..self.len())
            .map(|i| Ok((self.text(i, 0)?, self.int(i, 1)?)))
            .collect()
    }

    pub fn shape(&self, reason: String) -> ReportError {
        ReportError::Shape {
            report: self.report,
            reason,
        }
    }
}

/// `part` as a percentage of `whole` (0 when `whole` is 0)
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

pub(crate) fn categorical(rows: &[(String, i64)]) -> Series {
    Series::Categorical {
        points: rows
            .iter()
            .map(|(label, count)| Point {
                label: label.clone(),
                value: *count as f64,
            })
            .collect(),
    }
}
