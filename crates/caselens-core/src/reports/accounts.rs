//! Reports that join cases to their owning accounts
//!
//! Cases whose account is missing from the accounts collection drop out of
//! these joins.

use crate::config::ReportSettings;
use crate::error::ReportError;
use crate::store::RecordStore;

use super::types::{ContextPackage, Point, ReportKind, Series};
use super::{categorical, percent, Output, Rows, TOP_N};

/// Countries need more than this many accounts to get a density figure
const MIN_DENSITY_ACCOUNTS: i64 = 5;

/// Share of volume above which one industry is an over-dependency
const INDUSTRY_RISK_PCT: f64 = 40.0;

pub(super) fn global_hotspots(
    store: &RecordStore,
    settings: &ReportSettings,
) -> Result<Output, ReportError> {
    let rows = Rows::fetch(
        store,
        ReportKind::GlobalHotspots,
        "SELECT a.account_country, COUNT(c.case_sfid) AS count
         FROM cases c
         JOIN accounts a ON c.account_sfid = a.account_sfid
         GROUP BY a.account_country
         ORDER BY count DESC, a.account_country ASC",
    )?;
    let ranking = rows.labelled_counts()?;
    let shown = &ranking[..ranking.len().min(TOP_N)];
    let home = &settings.home_market;

    let objective = format!(
        "You are a Regional Operations Director for {company} (headquartered in {home}). \
         Expect {home} to have the highest volume (domestic market). Do not flag high {home} volume as an error. \
         Instead, focus on the #2 and #3 countries. Are they growing disproportionately? \
         Identify if we need language support for the biggest region outside {home}.",
        company = settings.company,
        home = home
    );

    let facts = match shown.first() {
        None => "No country data available.".to_string(),
        Some((top, top_count)) => {
            let shown_total: i64 = shown.iter().map(|(_, c)| c).sum();
            let home_line = match ranking.iter().position(|(country, _)| country == home) {
                Some(i) => format!(
                    "{} volume: {} cases (rank #{} of {} countries).",
                    home,
                    ranking[i].1,
                    i + 1,
                    ranking.len()
                ),
                None => format!("{} volume: 0 cases.", home),
            };
            format!(
                "{} HQ location: {}. Top country: {} ({} cases). {} \
                 The top country represents {:.1}% of the top {} volume.",
                settings.company,
                home,
                top,
                top_count,
                home_line,
                percent(*top_count as f64, shown_total as f64),
                shown.len()
            )
        }
    };

    Ok((categorical(shown), ContextPackage::new(objective, facts)))
}

pub(super) fn ticket_density(
    store: &RecordStore,
    settings: &ReportSettings,
) -> Result<Output, ReportError> {
    let sql = format!(
        "WITH case_counts AS (
             SELECT a.account_country AS country, COUNT(c.case_sfid) AS cases
             FROM accounts a
             LEFT JOIN cases c ON a.account_sfid = c.account_sfid
             GROUP BY a.account_country
         ),
         account_counts AS (
             SELECT account_country AS country, COUNT(DISTINCT account_sfid) AS accounts
             FROM accounts
             GROUP BY account_country
         )
         SELECT ac.country, CAST(cc.cases AS REAL) / ac.accounts AS density
         FROM account_counts ac
         JOIN case_counts cc ON ac.country = cc.country
         WHERE ac.accounts > {}
         ORDER BY density DESC, ac.country ASC",
        MIN_DENSITY_ACCOUNTS
    );
    let rows = Rows::fetch(store, ReportKind::TicketDensity, &sql)?;
    let eligible: Vec<(String, f64)> = (0..rows.len())
        .map(|i| Ok((rows.text(i, 0)?, rows.real(i, 1)?)))
        .collect::<Result<_, ReportError>>()?;
    let home = &settings.home_market;

    let objective = format!(
        "You are a CX Analyst. Analyze the 'Neediness' of regions. \
         Treat {home} as the baseline (standard behavior). \
         If a region has significantly HIGHER density than {home}, flag it as a 'Problem Area' (Training/Bugs). \
         If a region has much LOWER density, flag it as 'Low Engagement' or 'Silent Churn Risk'.",
        home = home
    );

    let facts = match eligible.first() {
        None => "No density data available.".to_string(),
        Some((top, top_density)) => {
            let average = eligible.iter().map(|(_, d)| d).sum::<f64>() / eligible.len() as f64;
            let home_line = match eligible.iter().find(|(country, _)| country == home) {
                Some((_, d)) => format!("Home market ({}) density: {:.2} tickets/account.", home, d),
                None => format!(
                    "Home market ({}) density: not available ({} or fewer accounts).",
                    home, MIN_DENSITY_ACCOUNTS
                ),
            };
            format!(
                "{} is headquartered in {}. Top density region: {} ({:.2} tickets/account). {} \
                 Average density across {} countries with more than {} accounts: {:.2}.",
                settings.company,
                home,
                top,
                top_density,
                home_line,
                eligible.len(),
                MIN_DENSITY_ACCOUNTS,
                average
            )
        }
    };

    let points = eligible
        .iter()
        .take(TOP_N)
        .map(|(label, value)| Point {
            label: label.clone(),
            value: *value,
        })
        .collect();
    Ok((
        Series::Categorical { points },
        ContextPackage::new(objective, facts),
    ))
}

pub(super) fn industry_struggles(
    store: &RecordStore,
    _: &ReportSettings,
) -> Result<Output, ReportError> {
    let sql = format!(
        "SELECT a.account_industry, COUNT(c.case_sfid) AS count
         FROM cases c
         JOIN accounts a ON c.account_sfid = a.account_sfid
         GROUP BY a.account_industry
         ORDER BY count DESC, a.account_industry ASC
         LIMIT {}",
        TOP_N
    );
    let ranked = Rows::fetch(store, ReportKind::IndustryStruggles, &sql)?.labelled_counts()?;

    let objective = "You are a Product Strategist. Analyze the provided status. \
                     If status is 'CRITICAL RISK', warn about over-dependency on one sector. \
                     If status is 'SAFE', commend the healthy diversification. \
                     Do not perform your own math comparison; trust the Status provided.";

    let facts = match ranked.first() {
        None => "No industry data available.".to_string(),
        Some((top, top_count)) => {
            let total: i64 = ranked.iter().map(|(_, c)| c).sum();
            let share = percent(*top_count as f64, total as f64);
            let at_risk = share > INDUSTRY_RISK_PCT;
            format!(
                "Top industry: '{}' ({:.1}% of volume). Risk threshold: {:.1}%. \
                 Current status: {} (the value {:.1}% {} {:.1}%).",
                top,
                share,
                INDUSTRY_RISK_PCT,
                if at_risk { "CRITICAL RISK" } else { "SAFE / DIVERSIFIED" },
                share,
                if at_risk { "is HIGHER than" } else { "does not exceed" },
                INDUSTRY_RISK_PCT
            )
        }
    };

    Ok((categorical(&ranked), ContextPackage::new(objective, facts)))
}
