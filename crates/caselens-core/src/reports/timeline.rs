//! Time-indexed reports: weekly intake trend and cumulative backlog

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::store::RecordStore;

use super::types::{ContextPackage, DatedValue, Line, ReportKind, Series};
use super::{Output, Rows};

/// Weeks averaged at each end of the range when measuring growth
const TREND_WINDOW: usize = 4;

/// Growth beyond this many percent either way is a trend
const TREND_BAND_PCT: f64 = 15.0;

/// Tickets one agent resolves per day, for staffing estimates
const TICKETS_PER_AGENT_DAY: u32 = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Direction of weekly intake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendClass {
    Surging,
    Stable,
    Dropping,
}

impl TrendClass {
    /// Classify a growth percentage; the band edges count as stable
    pub fn from_growth(growth_pct: f64) -> Self {
        if growth_pct > TREND_BAND_PCT {
            Self::Surging
        } else if growth_pct < -TREND_BAND_PCT {
            Self::Dropping
        } else {
            Self::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Surging => "Surging",
            Self::Stable => "Stable",
            Self::Dropping => "Dropping",
        }
    }
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percent change from `start` to `end`
///
/// A zero baseline counts as 100% growth when anything arrived later, else 0%.
pub fn growth_percent(start: f64, end: f64) -> f64 {
    if start > 0.0 {
        (end - start) / start * 100.0
    } else if end > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Sunday closing the week that contains `date`
fn week_end(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday();
    date + Duration::days(i64::from(days_to_sunday))
}

/// Sum daily counts into Sunday-ending weeks, filling empty weeks with zero
fn weekly(daily: &[(NaiveDate, i64)]) -> Vec<(NaiveDate, i64)> {
    let (Some(first), Some(last)) = (daily.first(), daily.last()) else {
        return Vec::new();
    };
    let mut weeks = Vec::new();
    let mut current = week_end(first.0);
    let end = week_end(last.0);
    while current <= end {
        weeks.push((current, 0));
        current += Duration::days(7);
    }
    for (date, count) in daily {
        let index = (week_end(*date) - week_end(first.0)).num_days() / 7;
        if let Some(week) = usize::try_from(index).ok().and_then(|i| weeks.get_mut(i)) {
            week.1 += count;
        }
    }
    weeks
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

fn parse_day(rows: &Rows, row: usize) -> Result<NaiveDate, ReportError> {
    let text = rows.text(row, 0)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rows.shape(format!("bad date '{}': {}", text, e)))
}

pub(super) fn volume_trend(store: &RecordStore, _: &ReportSettings) -> Result<Output, ReportError> {
    let rows = Rows::fetch(
        store,
        ReportKind::VolumeTrend,
        "SELECT date(case_created_date) AS day, COUNT(*) AS count
         FROM cases
         GROUP BY day
         ORDER BY day ASC",
    )?;
    let daily = (0..rows.len())
        .map(|i| Ok((parse_day(&rows, i)?, rows.int(i, 1)?)))
        .collect::<Result<Vec<_>, ReportError>>()?;
    let weeks = weekly(&daily);

    let objective = format!(
        "You are a Staffing Planner. Use the 'Net Change' percentage to decide. \
         If change is above +{band:.0}%, recommend 'Immediate Hiring'. \
         If change is between -{band:.0}% and +{band:.0}% inclusive, recommend 'Maintain Staff'. \
         If change is below -{band:.0}%, recommend 'Review Efficiency'.",
        band = TREND_BAND_PCT
    );

    let facts = if weeks.len() < 2 {
        "Insufficient time data to determine trend.".to_string()
    } else {
        let counts: Vec<i64> = weeks.iter().map(|(_, c)| *c).collect();
        let window = TREND_WINDOW.min(counts.len());
        let start_avg = mean(&counts[..window]);
        let end_avg = mean(&counts[counts.len() - window..]);
        let growth = growth_percent(start_avg, end_avg);
        format!(
            "Trend analysis ({} weeks observed): start average {:.1} cases/week. \
             Recent average: {:.1} cases/week. Net change: {:+.1}%. Classification: {}.",
            weeks.len(),
            start_avg,
            end_avg,
            growth,
            TrendClass::from_growth(growth)
        )
    };

    let line = Line {
        name: "New cases".to_string(),
        points: weeks
            .iter()
            .map(|(date, count)| DatedValue {
                date: *date,
                value: *count as f64,
            })
            .collect(),
    };
    Ok((
        Series::TimeSeries { lines: vec![line] },
        ContextPackage::new(objective, facts),
    ))
}

pub(super) fn backlog_growth(store: &RecordStore, _: &ReportSettings) -> Result<Output, ReportError> {
    let rows = Rows::fetch(
        store,
        ReportKind::BacklogGrowth,
        "WITH created AS (
             SELECT date(case_created_date) AS day, COUNT(*) AS n
             FROM cases
             GROUP BY day
         ),
         closed AS (
             SELECT date(case_closed_date) AS day, COUNT(*) AS n
             FROM cases
             WHERE case_closed_date IS NOT NULL
             GROUP BY day
         ),
         days AS (
             SELECT day FROM created
             UNION
             SELECT day FROM closed
         )
         SELECT d.day,
                SUM(COALESCE(cr.n, 0)) OVER (ORDER BY d.day) AS total_created,
                SUM(COALESCE(cl.n, 0)) OVER (ORDER BY d.day) AS total_closed
         FROM days d
         LEFT JOIN created cr ON cr.day = d.day
         LEFT JOIN closed cl ON cl.day = d.day
         ORDER BY d.day ASC",
    )?;

    let mut received = Vec::with_capacity(rows.len());
    let mut resolved = Vec::with_capacity(rows.len());
    for i in 0..rows.len() {
        let date = parse_day(&rows, i)?;
        received.push(DatedValue {
            date,
            value: rows.int(i, 1)? as f64,
        });
        resolved.push(DatedValue {
            date,
            value: rows.int(i, 2)? as f64,
        });
    }

    let objective = format!(
        "You are a Resource Planner. Analyze the net change in backlog. \
         If positive, estimate how many extra agents are needed \
         (assuming 1 agent handles {} tickets/day).",
        TICKETS_PER_AGENT_DAY
    );

    let backlog = |i: usize| (received[i].value - resolved[i].value) as i64;
    let facts = if rows.is_empty() {
        "No case data available.".to_string()
    } else {
        let last = rows.len() - 1;
        let (start, current) = (backlog(0), backlog(last));
        let change = current - start;
        let days = (received[last].date - received[0].date).num_days() + 1;
        format!(
            "Between {} and {} ({} days), the backlog started at {} and is now {}. \
             Net change: {}{} cases pending.",
            received[0].date,
            received[last].date,
            days,
            start,
            current,
            if change > 0 { "+" } else { "" },
            change
        )
    };

    let series = Series::TimeSeries {
        lines: vec![
            Line {
                name: "Total received".to_string(),
                points: received,
            },
            Line {
                name: "Total resolved".to_string(),
                points: resolved,
            },
        ],
    };
    Ok((series, ContextPackage::new(objective, facts)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_week_end_is_sunday() {
        // 2024-01-01 is a Monday
        assert_eq!(week_end(d("2024-01-01")), d("2024-01-07"));
        assert_eq!(week_end(d("2024-01-07")), d("2024-01-07"));
        assert_eq!(week_end(d("2024-01-08")), d("2024-01-14"));
    }

    #[test]
    fn test_weekly_fills_gaps() {
        let weeks = weekly(&[(d("2024-01-02"), 3), (d("2024-01-06"), 2), (d("2024-01-23"), 1)]);
        assert_eq!(
            weeks,
            vec![
                (d("2024-01-07"), 5),
                (d("2024-01-14"), 0),
                (d("2024-01-21"), 0),
                (d("2024-01-28"), 1),
            ]
        );
        assert!(weekly(&[]).is_empty());
    }

    #[test]
    fn test_growth_percent() {
        assert_eq!(growth_percent(100.0, 125.0), 25.0);
        assert_eq!(growth_percent(100.0, 80.0), -20.0);
        assert_eq!(growth_percent(0.0, 3.0), 100.0);
        assert_eq!(growth_percent(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_trend_bands() {
        assert_eq!(TrendClass::from_growth(25.0), TrendClass::Surging);
        assert_eq!(TrendClass::from_growth(5.0), TrendClass::Stable);
        assert_eq!(TrendClass::from_growth(-20.0), TrendClass::Dropping);
        // Edges and the gaps between bands are stable
        assert_eq!(TrendClass::from_growth(15.0), TrendClass::Stable);
        assert_eq!(TrendClass::from_growth(-15.0), TrendClass::Stable);
        assert_eq!(TrendClass::from_growth(12.0), TrendClass::Stable);
        assert_eq!(TrendClass::from_growth(-12.0), TrendClass::Stable);
    }
}
