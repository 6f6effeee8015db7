//! Report command implementations

use anyhow::Result;
use caselens_core::{InsightEngine, Report, ReportCatalog, ReportKind, Series};
use serde_json::json;

use super::truncate;

/// Time-series lines longer than this are shown as their most recent points
const SERIES_TAIL: usize = 12;

/// Widest histogram bar, in characters
const BAR_WIDTH: usize = 40;

pub fn cmd_reports() -> Result<()> {
    println!();
    println!("📊 Available Reports");
    println!("   ─────────────────────────────────────────────────────────────");
    for (i, kind) in ReportKind::all().iter().enumerate() {
        println!("   {:>2}. {:22} {}", i + 1, kind.slug(), kind.title());
        println!("       {}", kind.description());
    }
    println!();
    println!("Run one with: caselens report <name> [--json] [--insight]");
    Ok(())
}

/// Run one report by name, slug or number
pub async fn cmd_report(
    catalog: &ReportCatalog,
    name: &str,
    json: bool,
    engine: Option<&InsightEngine>,
) -> Result<()> {
    let kind: ReportKind = name.parse().map_err(anyhow::Error::msg)?;
    let report = catalog.generate(kind)?;

    let insight = match engine {
        Some(engine) => Some(
            engine
                .analyze(&report.context)
                .await
                .map_err(|e| e.to_string()),
        ),
        None => None,
    };

    if json {
        let mut value = json!({ "report": report });
        match insight {
            Some(Ok(text)) => value["insight"] = json!(text),
            Some(Err(reason)) => value["insight_error"] = json!(reason),
            None => {}
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_report(&report);
    if let Some(insight) = insight {
        print_insight(insight);
    }
    Ok(())
}

/// Run every report; failures are shown in place and do not stop the rest
pub async fn cmd_all(catalog: &ReportCatalog, engine: Option<&InsightEngine>) -> Result<()> {
    let results = catalog.generate_all();
    let mut failed = 0;

    for (kind, result) in results {
        match result {
            Ok(report) => {
                print_report(&report);
                if let Some(engine) = engine {
                    print_insight(engine.analyze(&report.context).await.map_err(|e| e.to_string()));
                }
            }
            Err(e) => {
                failed += 1;
                println!();
                println!("❌ {}", kind.title());
                println!("   Report could not be generated: {}", e);
            }
        }
    }

    println!();
    if failed > 0 {
        println!(
            "⚠️  {} of {} reports failed. Run with --verbose for details.",
            failed,
            ReportKind::all().len()
        );
    } else {
        println!("✅ {} reports generated.", ReportKind::all().len());
    }
    Ok(())
}

pub fn print_report(report: &Report) {
    println!();
    println!("📊 {}", report.title);
    println!("   ─────────────────────────────────────────────────────────────");

    if report.series.is_empty() {
        println!("   (no data to chart)");
    } else {
        print_series(&report.series, report.value_label);
    }

    println!();
    println!("   Facts:");
    for line in report.context.facts.lines() {
        println!("     {}", line);
    }
}

fn print_insight(insight: std::result::Result<String, String>) {
    println!();
    match insight {
        Ok(text) => {
            println!("   🤖 Insight:");
            for line in text.lines() {
                println!("     {}", line);
            }
        }
        Err(reason) => println!("   ⚠️  {}", reason),
    }
}

fn print_series(series: &Series, value_label: &str) {
    match series {
        Series::Categorical { points } => {
            println!("   {:30} │ {:>12}", "", value_label);
            println!("   ───────────────────────────────┼─────────────");
            for point in points {
                println!(
                    "   {:30} │ {:>12}",
                    truncate(&point.label, 30),
                    format_number(point.value)
                );
            }
        }
        Series::Stacked { segments, rows } => {
            print!("   {:20}", "");
            for segment in segments {
                print!(" │ {:>8}", truncate(segment, 8));
            }
            println!(" │ {:>6}", "Total");
            for row in rows {
                print!("   {:20}", truncate(&row.label, 20));
                for share in &row.shares {
                    print!(" │ {:>7.1}%", share);
                }
                println!(" │ {:>6}", row.total());
            }
        }
        Series::TimeSeries { lines } => {
            for line in lines {
                println!("   {} ({})", line.name, value_label);
                let skipped = line.points.len().saturating_sub(SERIES_TAIL);
                if skipped > 0 {
                    println!("     ... {} earlier points", skipped);
                }
                for point in &line.points[skipped..] {
                    println!("     {} │ {:>10}", point.date, format_number(point.value));
                }
            }
        }
        Series::Histogram { bins } => {
            let peak = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
            println!("   {} │ count", value_label);
            for bin in bins.iter().filter(|b| b.count > 0) {
                let width = (bin.count * BAR_WIDTH).div_ceil(peak);
                println!(
                    "   {:>7.1} - {:>7.1} │ {:>5} {}",
                    bin.start,
                    bin.end,
                    bin.count,
                    "█".repeat(width)
                );
            }
        }
    }
}

/// Integers without decimals, everything else to two places
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
