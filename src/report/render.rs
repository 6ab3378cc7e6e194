//! Rendering a ranked comparison for people (aligned text with bars) or for
//! scripts (JSON).

use std::fmt::Write as _;

use clap::ValueEnum;
use crossterm::style::Stylize;
use serde::Serialize;

use crate::error::{BenchError, Result};

use super::rank::{Ranking, RankedEntry};

const BAR_CELL: char = '█';
const BAR_CUT: char = '…';
const MIN_BAR_WIDTH: usize = 20;
/// Widest bar drawn in text output (ten times the baseline). JSON keeps the
/// true length.
const MAX_BAR_WIDTH: usize = 200;

/// Output format for the report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned table with bars.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// A finished comparison, ready to render.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Benchmark label.
    pub label: String,
    /// Ranked candidates.
    pub ranking: Ranking,
    /// Advisory messages to show after the table.
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    benchmark: &'a str,
    baseline: &'a str,
    fastest: &'a str,
    results: &'a [RankedEntry],
    warnings: &'a [String],
}

/// Render `report` in `format`. `color` only affects text output.
///
/// # Errors
/// Only if JSON serialization fails, which indicates a bug.
pub fn render(report: &Report, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, color)),
        OutputFormat::Json => render_json(report),
    }
}

fn label_of(ranking: &Ranking, index: usize) -> &str {
    ranking.entries.get(index).map_or("", |e| e.label.as_str())
}

fn render_json(report: &Report) -> Result<String> {
    let json = JsonReport {
        benchmark: &report.label,
        baseline: label_of(&report.ranking, 0),
        fastest: label_of(&report.ranking, report.ranking.fastest),
        results: &report.ranking.entries,
        warnings: &report.warnings,
    };
    let mut text = serde_json::to_string_pretty(&json)
        .map_err(|e| BenchError::internal(format!("serializing report: {e}")))?;
    text.push('\n');
    Ok(text)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded_ns(ns: f64) -> u64 {
    ns.round() as u64
}

fn bar_cells(len: usize) -> String {
    if len > MAX_BAR_WIDTH {
        let mut bar: String = std::iter::repeat_n(BAR_CELL, MAX_BAR_WIDTH - 1).collect();
        bar.push(BAR_CUT);
        bar
    } else {
        std::iter::repeat_n(BAR_CELL, len).collect()
    }
}

fn render_text(report: &Report, color: bool) -> String {
    let entries = &report.ranking.entries;
    let label_width = entries
        .iter()
        .map(|e| e.label.chars().count())
        .max()
        .unwrap_or(0);
    let bar_width = entries
        .iter()
        .map(|e| e.bar.min(MAX_BAR_WIDTH))
        .max()
        .unwrap_or(0)
        .max(MIN_BAR_WIDTH);
    let ns_width = entries
        .iter()
        .map(|e| rounded_ns(e.ns_per_run).to_string().len())
        .max()
        .unwrap_or(1);

    let mut out = String::new();
    let _ = writeln!(out, "{}", report.label);
    for entry in entries {
        let label = format!("{:<label_width$}", entry.label);
        let bar = bar_cells(entry.bar);
        let comparison = entry.comparison.to_string();
        let (label, comparison) = if color && entry.fastest {
            (
                label.bold().green().to_string(),
                comparison.bold().green().to_string(),
            )
        } else {
            (label, comparison)
        };
        let _ = writeln!(
            out,
            "  {label}  {bar:<bar_width$}  {:>ns_width$} ns/run  {comparison}",
            rounded_ns(entry.ns_per_run),
        );
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}
