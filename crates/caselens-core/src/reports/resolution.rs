//! Time-to-resolution distribution for closed cases

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::models::CLOSED_STATUS;
use crate::store::RecordStore;

use super::types::{Bin, ContextPackage, ReportKind, Series};
use super::{Output, Rows};

/// Equal-width bins in the resolution histogram
pub const HISTOGRAM_BINS: usize = 40;

/// Summary statistics over elapsed days
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    /// Sample standard deviation; 0 with fewer than two cases
    pub std_dev: f64,
}

impl ResolutionStats {
    /// Returns None for an empty slice
    pub fn from_days(days: &[f64]) -> Option<Self> {
        if days.is_empty() {
            return None;
        }
        let mut sorted = days.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let std_dev = if n < 2 {
            0.0
        } else {
            let sq: f64 = sorted.iter().map(|d| (d - mean).powi(2)).sum();
            (sq / (n - 1) as f64).sqrt()
        };

        Some(Self {
            count: n,
            mean,
            median,
            max: sorted[n - 1],
            std_dev,
        })
    }
}

/// Equal-width histogram over the value range
///
/// A degenerate range (all values equal) is widened to one unit centred on
/// the value.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: lo + width * i as f64,
            end: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for v in values {
        let index = (((v - lo) / width).floor() as usize).min(bins - 1);
        out[index].count += 1;
    }
    out
}

pub(super) fn resolution_time(
    store: &RecordStore,
    _: &ReportSettings,
) -> Result<Output, ReportError> {
    let sql = format!(
        "SELECT julianday(case_closed_date) - julianday(case_created_date) AS days
         FROM cases
         WHERE case_status = '{}' AND case_closed_date IS NOT NULL
         ORDER BY days ASC",
        CLOSED_STATUS
    );
    let rows = Rows::fetch(store, ReportKind::ResolutionTime, &sql)?;
    let days = (0..rows.len())
        .map(|i| rows.real(i, 0))
        .collect::<Result<Vec<_>, _>>()?;

    let objective = "You are an Operations Manager. Compare the Mean vs Median. \
                     If the Mean is much higher, we have a 'Long Tail' problem (old tickets stuck). \
                     If they are close, the process is consistent.";

    let facts = match ResolutionStats::from_days(&days) {
        None => "No closed cases.".to_string(),
        Some(stats) => format!(
            "Closed cases measured: {}. Average resolution: {:.1} days. \
             Median resolution: {:.1} days. Worst outlier: {:.1} days. \
             Standard deviation: {:.1}.",
            stats.count, stats.mean, stats.median, stats.max, stats.std_dev
        ),
    };

    Ok((
        Series::Histogram {
            bins: histogram(&days, HISTOGRAM_BINS),
        },
        ContextPackage::new(objective, facts),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_single_case() {
        let stats = ResolutionStats::from_days(&[10.0]).unwrap();
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.median, 10.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_stats_sample_std_dev() {
        let stats = ResolutionStats::from_days(&[4.0, 2.0, 6.0, 8.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 5.0);
        assert_eq!(stats.max, 8.0);
        // Sum of squares 20 over n-1 = 3
        assert!((stats.std_dev - (20.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty() {
        assert!(ResolutionStats::from_days(&[]).is_none());
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values = [0.0, 1.0, 2.5, 9.9, 10.0];
        let bins = histogram(&values, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[9].end, 10.0);
        // Max lands in the closed last bin
        assert_eq!(bins[9].count, 2);
    }

    #[test]
    fn test_histogram_degenerate_range() {
        let bins = histogram(&[3.0, 3.0], HISTOGRAM_BINS);
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins[0].start, 2.5);
        assert_eq!(bins[HISTOGRAM_BINS - 1].end, 3.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }
}
