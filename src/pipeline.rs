//! The merge-and-harness pipeline.
//!
//! ```text
//! candidates ─┬─ isolate (namespaces, rewritten modules) ─┐
//!             └─ manifests (merged elm.json) ─────────────┼─ driver ─ compile ─ execute ─ parse ─ report
//!                                        workspace (staged skeleton) ─┘
//! ```
//!
//! Everything that can be checked without the toolchain is checked before the
//! workspace is created. The workspace is dropped on every exit path.

use std::fmt;

use tracing::{debug, info, info_span, instrument};

use crate::error::{BenchError, Result};
use crate::harness::{DriverBuilder, is_function_name};
use crate::isolate::{self, IsolatedCandidate};
use crate::manifest::{Manifest, merge_manifests};
use crate::model::{Candidate, ModulePath};
use crate::report::{self, Report};
use crate::toolchain::{Interrupt, Toolchain};
use crate::workspace::{self, RESERVED_MODULES, Workspace};

/// Pipeline stages past which a run can fail in the toolchain.
///
/// `Staged → Compiled → Executed → Parsed → Reported`; errors carry the stage
/// that was being entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The workspace is being populated.
    Staged,
    /// `elm make` is running.
    Compiled,
    /// The compiled benchmark is running.
    Executed,
    /// Its output is being parsed.
    Parsed,
    /// The comparison is being ranked and rendered.
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staged => "staging",
            Self::Compiled => "compile",
            Self::Executed => "execute",
            Self::Parsed => "parse",
            Self::Reported => "report",
        };
        f.write_str(name)
    }
}

/// What to benchmark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchRequest {
    /// Candidate directories, as given; the first is the baseline.
    pub candidates: Vec<String>,
    /// Function each entry module exposes.
    pub function: String,
    /// Benchmark label; defaults to the function name.
    pub label: Option<String>,
    /// Elm expressions passed to the function, in order.
    pub arguments: Vec<String>,
    /// Entry module name in each candidate.
    pub entry: String,
    /// Extra modules the argument expressions refer to.
    pub imports: Vec<String>,
}

impl BenchRequest {
    /// Check everything about the request that does not touch the disk.
    ///
    /// # Errors
    /// [`BenchError::InvalidArguments`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(BenchError::InvalidArguments { reason });
        if self.candidates.len() < 2 {
            return invalid(format!(
                "need at least two candidates to compare, got {}",
                self.candidates.len()
            ));
        }
        if self.arguments.is_empty() {
            return invalid("pass at least one argument expression after `--`".to_owned());
        }
        if !is_function_name(&self.function) {
            return invalid(format!(
                "'{}' is not an Elm function name",
                self.function
            ));
        }
        if ModulePath::parse(&self.entry).is_err() {
            return invalid(format!("'{}' is not an Elm module name", self.entry));
        }
        for import in &self.imports {
            if ModulePath::parse(import).is_err() {
                return invalid(format!("'{import}' is not an Elm module name"));
            }
        }
        for (i, arg) in self.arguments.iter().enumerate() {
            if arg.trim().is_empty() {
                return invalid(format!("argument {i} is empty"));
            }
        }
        Ok(())
    }
}

/// Everything known about the candidates before the workspace exists.
struct Plan {
    isolated: Vec<IsolatedCandidate>,
    merged: Manifest,
    driver: String,
    labels: Vec<String>,
}

#[instrument(name = "plan", skip_all)]
fn plan(request: &BenchRequest) -> Result<Plan> {
    let entry = ModulePath::parse(&request.entry).map_err(|e| BenchError::InvalidArguments {
        reason: e.to_string(),
    })?;

    let candidates = request
        .candidates
        .iter()
        .map(|name| Candidate::open(name))
        .collect::<Result<Vec<_>>>()?;
    let namespaces = isolate::assign_namespaces(&candidates, RESERVED_MODULES)?;
    let manifests = candidates
        .iter()
        .map(|c| Manifest::load(&c.manifest_path))
        .collect::<Result<Vec<_>>>()?;

    let mut isolated = Vec::with_capacity(candidates.len());
    for ((candidate, namespace), manifest) in candidates.iter().zip(&namespaces).zip(&manifests) {
        let sources = isolate::discover(candidate, &manifest.source_roots())?;
        isolated.push(isolate::plan(candidate, namespace, &entry, &sources)?);
    }
    isolate::check_cross_references(&isolated)?;

    let merged = merge_manifests(&workspace::skeleton_manifest()?, &manifests);

    let imports = request
        .imports
        .iter()
        .map(|m| ModulePath::parse(m))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BenchError::InvalidArguments {
            reason: e.to_string(),
        })?;
    let mut builder = DriverBuilder::new();
    builder
        .label(request.label.clone().unwrap_or_else(|| request.function.clone()))?
        .function(request.function.clone())?
        .imports(imports)?
        .candidates(
            isolated
                .iter()
                .map(|c| (c.display_name.clone(), c.entry.clone())),
        )?
        .arguments(request.arguments.iter().cloned())?;
    let driver = builder.build()?.render();

    let labels = isolated.iter().map(|c| c.display_name.clone()).collect();
    Ok(Plan {
        isolated,
        merged,
        driver,
        labels,
    })
}

fn populate(ws: &Workspace, plan: &Plan) -> Result<()> {
    let src = ws.src_dir();
    for candidate in &plan.isolated {
        isolate::write(candidate, &src)?;
    }
    ws.write_manifest(&plan.merged)?;
    ws.write_driver(&plan.driver)
}

fn advisory(source: &str, stderr: &str, warnings: &mut Vec<String>) {
    let text = stderr.trim();
    if !text.is_empty() {
        debug!(source, message = text, "toolchain wrote to stderr");
        warnings.push(format!("{source}: {text}"));
    }
}

fn interrupted(interrupt: &Interrupt, stage: Stage) -> Result<()> {
    if interrupt.is_set() {
        return Err(BenchError::Interrupted { stage });
    }
    Ok(())
}

/// Run the whole pipeline and return the ranked comparison.
///
/// # Errors
/// Any [`BenchError`]; the workspace is removed before this returns.
#[instrument(
    name = "pipeline",
    skip_all,
    fields(function = %request.function, candidates = request.candidates.len())
)]
pub fn run(
    request: &BenchRequest,
    toolchain: &dyn Toolchain,
    interrupt: &Interrupt,
) -> Result<Report> {
    request.validate()?;
    let plan = plan(request)?;
    interrupted(interrupt, Stage::Staged)?;

    let ws = Workspace::stage()?;
    populate(&ws, &plan)?;
    info!(root = %ws.root().display(), "workspace ready");

    let mut warnings = Vec::new();

    interrupted(interrupt, Stage::Compiled)?;
    let compiled = toolchain.compile(&ws, interrupt)?;
    advisory("elm make", &compiled.stderr, &mut warnings);

    interrupted(interrupt, Stage::Executed)?;
    let executed = toolchain.execute(&ws, interrupt)?;
    advisory("node", &executed.stderr, &mut warnings);
    drop(ws);

    let parsed = {
        let _span = info_span!("parse").entered();
        report::parse_results(&executed.stdout, &plan.labels)?
    };
    if let Some(w) = parsed.warning {
        debug!(message = %w, "benchmark warning");
        warnings.push(w);
    }

    let ranking = report::rank(&parsed.results).ok_or_else(|| BenchError::Internal {
        detail: format!("no results to rank at {} stage", Stage::Reported),
    })?;
    info!(
        fastest = %ranking.entries[ranking.fastest].label,
        "ranked"
    );

    Ok(Report {
        label: request.label.clone().unwrap_or_else(|| request.function.clone()),
        ranking,
        warnings,
    })
}
