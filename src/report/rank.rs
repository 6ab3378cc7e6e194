//! Ranking candidates against the baseline (the first candidate).

use std::fmt;

use serde::{Serialize, Serializer};

use super::TimingResult;

/// Bar length of the baseline; every other bar is scaled relative to it.
pub const BASELINE_BAR: f64 = 20.0;

/// How a candidate compares to the baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// This is the baseline.
    Baseline,
    /// Slower by the given whole percentage.
    Slower(u64),
    /// Faster by the given whole percentage.
    Faster(u64),
    /// Within half a percent of the baseline.
    SameSpeed,
    /// The baseline measured 0 ns, so no ratio exists.
    ZeroBaseline,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => f.write_str("baseline"),
            Self::Slower(n) => write!(f, "{n}% slower"),
            Self::Faster(n) => write!(f, "{n}% faster"),
            Self::SameSpeed => f.write_str("same speed"),
            Self::ZeroBaseline => f.write_str("baseline took 0 ns"),
        }
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `round(ns / baseline * 20)`. A zero baseline gives 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bar_length(ns_per_run: f64, baseline: f64) -> usize {
    if baseline <= 0.0 {
        return 0;
    }
    (ns_per_run / baseline * BASELINE_BAR).round().max(0.0) as usize
}

/// Compare the candidate at `index` against the baseline.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn comparison(index: usize, ns_per_run: f64, baseline: f64) -> Comparison {
    if index == 0 {
        return Comparison::Baseline;
    }
    if baseline <= 0.0 {
        return if ns_per_run <= 0.0 {
            Comparison::SameSpeed
        } else {
            Comparison::ZeroBaseline
        };
    }
    let percent = ((ns_per_run / baseline - 1.0) * 100.0).round();
    if percent > 0.0 {
        Comparison::Slower(percent as u64)
    } else if percent < 0.0 {
        Comparison::Faster((-percent) as u64)
    } else {
        Comparison::SameSpeed
    }
}

/// Index of the lowest `ns_per_run`; the first one wins ties.
#[must_use]
pub fn fastest(results: &[TimingResult]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, r) in results.iter().enumerate() {
        match best {
            Some(b) if results[b].ns_per_run <= r.ns_per_run => {}
            _ => best = Some(i),
        }
    }
    best
}

/// One line of the comparison.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// Candidate display name.
    pub label: String,
    /// Measured nanoseconds per call.
    pub ns_per_run: f64,
    /// Bar length in cells.
    pub bar: usize,
    /// Relation to the baseline.
    pub comparison: Comparison,
    /// Whether this is the fastest candidate.
    pub fastest: bool,
}

/// The full comparison, in candidate order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranking {
    /// Entries in candidate order; index 0 is the baseline.
    pub entries: Vec<RankedEntry>,
    /// Index of the fastest entry.
    pub fastest: usize,
}

/// Rank results against `results[0]`. `None` if there are no results.
#[must_use]
pub fn rank(results: &[TimingResult]) -> Option<Ranking> {
    let baseline = results.first()?.ns_per_run;
    let fastest = fastest(results)?;
    let entries = results
        .iter()
        .enumerate()
        .map(|(i, r)| RankedEntry {
            label: r.label.clone(),
            ns_per_run: r.ns_per_run,
            bar: bar_length(r.ns_per_run, baseline),
            comparison: comparison(i, r.ns_per_run, baseline),
            fastest: i == fastest,
        })
        .collect();
    Some(Ranking { entries, fastest })
}
