//! Timing results: reading them from the benchmark's output, ranking them and
//! rendering the comparison.

pub mod rank;
pub mod render;

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::{BenchError, Result};
use crate::pipeline::Stage;

pub use rank::{Comparison, RankedEntry, Ranking, rank};
pub use render::{OutputFormat, Report, render};

/// Measured cost of one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingResult {
    /// Candidate display name.
    pub label: String,
    /// Nanoseconds per call; finite and non-negative.
    pub ns_per_run: f64,
}

/// Everything the benchmark reported, matched to the candidates.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchResults {
    /// One result per candidate, in candidate order.
    pub results: Vec<TimingResult>,
    /// Advisory message from the benchmark library, if any.
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    results: Vec<ArtifactResult>,
    #[serde(default)]
    warning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactResult {
    name: Vec<String>,
    ns_per_run: f64,
}

fn parse_failure(detail: impl Into<String>) -> BenchError {
    BenchError::Toolchain {
        stage: Stage::Parsed,
        detail: detail.into(),
    }
}

fn decode(stdout: &str) -> Result<Artifact> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(parse_failure("the benchmark printed nothing"));
    }
    match serde_json::from_str(trimmed) {
        Ok(artifact) => Ok(artifact),
        Err(whole) => {
            // Anything a candidate logs goes to stdout before the report, so
            // fall back to the final line.
            let last = trimmed.lines().next_back().unwrap_or(trimmed);
            serde_json::from_str(last).map_err(|_| {
                parse_failure(format!("benchmark output is not a timing report: {whole}"))
            })
        }
    }
}

/// Parse the benchmark's stdout and match each result to a candidate label.
///
/// The last element of a result's `name` is the candidate label. Every label
/// must appear exactly once and no other label may appear.
///
/// # Errors
/// [`BenchError::Toolchain`] at [`Stage::Parsed`] for unreadable output,
/// non-finite or negative timings, and missing, duplicate or unknown labels.
pub fn parse_results(stdout: &str, labels: &[String]) -> Result<BenchResults> {
    let artifact = decode(stdout)?;
    let warning = artifact.warning.filter(|w| !w.trim().is_empty());

    let mut by_label: BTreeMap<String, f64> = BTreeMap::new();
    for entry in artifact.results {
        let Some(label) = entry.name.last() else {
            return Err(parse_failure("a result has an empty name"));
        };
        if !entry.ns_per_run.is_finite() || entry.ns_per_run < 0.0 {
            return Err(parse_failure(format!(
                "result for '{label}' has invalid timing {}",
                entry.ns_per_run
            )));
        }
        if !labels.contains(label) {
            return Err(parse_failure(format!(
                "result for unknown candidate '{label}'"
            )));
        }
        if by_label.insert(label.clone(), entry.ns_per_run).is_some() {
            return Err(parse_failure(format!(
                "more than one result for candidate '{label}'"
            )));
        }
    }

    let mut results = Vec::with_capacity(labels.len());
    for label in labels {
        let Some(&ns_per_run) = by_label.get(label) else {
            let mut detail = format!("no result for candidate '{label}'");
            if let Some(w) = &warning {
                detail.push_str("\nbenchmark reported: ");
                detail.push_str(w);
            }
            return Err(parse_failure(detail));
        };
        results.push(TimingResult {
            label: label.clone(),
            ns_per_run,
        });
    }
    debug!(results = results.len(), warning = warning.is_some(), "parsed results");
    Ok(BenchResults { results, warning })
}
