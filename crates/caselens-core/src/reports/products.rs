//! Product and category reports (cases only, no account join)

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::models::Severity;
use crate::store::RecordStore;

use super::types::{ContextPackage, Point, ReportKind, Series, StackedRow};
use super::{categorical, percent, Output, Rows, TOP_N};

/// A single product above this share of the top volume is a stability risk
const STABILITY_RISK_PCT: f64 = 30.0;

/// Case types below this share of all cases fold into "Other"
const MINOR_TYPE_PCT: f64 = 3.0;

const OTHER: &str = "Other";

fn top_products_sql() -> String {
    format!(
        "SELECT case_product, COUNT(*) AS count
         FROM cases
         GROUP BY case_product
         ORDER BY count DESC, case_product ASC
         LIMIT {}",
        TOP_N
    )
}

pub(super) fn top_products(store: &RecordStore, _: &ReportSettings) -> Result<Output, ReportError> {
    let rows = Rows::fetch(store, ReportKind::TopProducts, &top_products_sql())?;
    let ranked = rows.labelled_counts()?;

    let objective = format!(
        "You are a Product Manager reviewing support load per product. \
         If one product represents over {:.0}% of the cases shown, declare it a 'Critical Stability Risk'. \
         Otherwise, describe the distribution as 'Balanced'.",
        STABILITY_RISK_PCT
    );

    let facts = match (ranked.first(), ranked.last()) {
        (Some((top, top_count)), Some((_, last_count))) => {
            let total: i64 = ranked.iter().map(|(_, c)| c).sum();
            format!(
                "The top product '{}' has {} cases, representing {:.1}% of the top {} volume. \
                 The product ranked #{} has {} cases.",
                top,
                top_count,
                percent(*top_count as f64, total as f64),
                ranked.len(),
                ranked.len(),
                last_count
            )
        }
        _ => "No case data available.".to_string(),
    };

    Ok((categorical(&ranked), ContextPackage::new(objective, facts)))
}

pub(super) fn severity_stack(
    store: &RecordStore,
    _: &ReportSettings,
) -> Result<Output, ReportError> {
    let kind = ReportKind::SeverityStack;
    let products = Rows::fetch(store, kind, &top_products_sql())?.labelled_counts()?;

    let sql = format!(
        "SELECT case_product, case_severity, COUNT(*) AS count
         FROM cases
         WHERE case_product IN (
             SELECT case_product FROM cases
             GROUP BY case_product
             ORDER BY COUNT(*) DESC, case_product ASC
             LIMIT {}
         )
         GROUP BY case_product, case_severity",
        TOP_N
    );
    let cells = Rows::fetch(store, kind, &sql)?;

    let severities = Severity::all();
    let mut rows: Vec<StackedRow> = products
        .iter()
        .map(|(label, _)| StackedRow {
            label: label.clone(),
            counts: vec![0; severities.len()],
            shares: vec![0.0; severities.len()],
        })
        .collect();

    for i in 0..cells.len() {
        let product = cells.text(i, 0)?;
        let severity: Severity = cells.text(i, 1)?.parse().map_err(|e| cells.shape(e))?;
        let count = cells.int(i, 2)?;

        let row = rows
            .iter_mut()
            .find(|r| r.label == product)
            .ok_or_else(|| cells.shape(format!("product '{}' not in ranking", product)))?;
        let slot = severities
            .iter()
            .position(|s| *s == severity)
            .ok_or_else(|| cells.shape(format!("severity {} not ordered", severity)))?;
        row.counts[slot] += count;
    }

    for row in &mut rows {
        let total = row.total() as f64;
        row.shares = row.counts.iter().map(|&c| percent(c as f64, total)).collect();
    }

    let urgent = severities.len() - 1;
    let worst = rows
        .iter()
        .filter(|r| r.counts[urgent] > 0)
        .max_by(|a, b| {
            a.shares[urgent]
                .total_cmp(&b.shares[urgent])
                .then_with(|| b.label.cmp(&a.label))
        });

    let facts = match worst {
        _ if rows.is_empty() => "No case data available.".to_string(),
        Some(row) => format!(
            "Analysis of the top {} products. Product with the highest Urgent ratio: {} ({:.1}% of its cases are Urgent).",
            rows.len(),
            row.label,
            row.shares[urgent]
        ),
        None => format!(
            "Analysis of the top {} products. Product with the highest Urgent ratio: N/A (no Urgent cases).",
            rows.len()
        ),
    };

    let objective = "You are a Risk Auditor. \
                     Identify which product has the most volatile severity distribution.";

    let series = Series::Stacked {
        segments: severities.iter().map(|s| s.as_str().to_string()).collect(),
        rows,
    };
    Ok((series, ContextPackage::new(objective, facts)))
}

pub(super) fn case_types(store: &RecordStore, _: &ReportSettings) -> Result<Output, ReportError> {
    let rows = Rows::fetch(
        store,
        ReportKind::CaseTypes,
        "SELECT case_type, COUNT(*) AS count
         FROM cases
         GROUP BY case_type
         ORDER BY count DESC, case_type ASC",
    )?;
    let ranked = rows.labelled_counts()?;
    let total: i64 = ranked.iter().map(|(_, c)| c).sum();

    let mut merged: Vec<Point> = Vec::new();
    let mut minor = 0;
    for (label, count) in &ranked {
        if percent(*count as f64, total as f64) < MINOR_TYPE_PCT {
            minor += count;
        } else {
            merged.push(Point {
                label: label.clone(),
                value: *count as f64,
            });
        }
    }
    if minor > 0 {
        match merged.iter_mut().find(|p| p.label == OTHER) {
            Some(other) => other.value += minor as f64,
            None => merged.push(Point {
                label: OTHER.to_string(),
                value: minor as f64,
            }),
        }
    }

    let objective = "You are a Support Team Lead. Look at the top 3 categories provided. \
                     If 'Bug' or 'Defect' is in the top 3, recommend 'Engineering Review'. \
                     If 'Question' or 'Training' is dominant, recommend 'Update Knowledge Base'.";

    let facts = if ranked.is_empty() {
        "No case data available.".to_string()
    } else {
        let top: Vec<String> = ranked
            .iter()
            .take(3)
            .map(|(label, count)| format!("{} ({:.1}%)", label, percent(*count as f64, total as f64)))
            .collect();
        format!(
            "Total cases analyzed: {}. The top {} categories are: {}.",
            total,
            top.len(),
            top.join(", ")
        )
    };

    Ok((
        Series::Categorical { points: merged },
        ContextPackage::new(objective, facts),
    ))
}
