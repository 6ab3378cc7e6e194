//! End-to-end pipeline tests with a substitute toolchain.
//!
//! The fake toolchain records what the pipeline staged, so these tests cover
//! isolation, manifest merging, driver synthesis, parsing, ranking, and
//! workspace cleanup without needing `elm` or `node` installed.

mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use common::{Fixture, bench_stdout};
use elm_bench::error::{BenchError, ErrorCategory, Result};
use elm_bench::pipeline::{self, BenchRequest, Stage};
use elm_bench::report::{Comparison, OutputFormat, render};
use elm_bench::toolchain::{Interrupt, StepOutput, Toolchain};
use elm_bench::workspace::Workspace;

// ---------------------------------------------------------------------------
// Fake toolchain
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeToolchain {
    fail_at: Option<Stage>,
    compile_stderr: String,
    stdout: String,
    root: RefCell<Option<PathBuf>>,
    staged: RefCell<BTreeMap<String, String>>,
    compiled: RefCell<bool>,
}

impl FakeToolchain {
    fn printing(stdout: String) -> Self {
        Self {
            stdout,
            ..Self::default()
        }
    }

    fn failing_at(stage: Stage, stdout: String) -> Self {
        Self {
            fail_at: Some(stage),
            stdout,
            ..Self::default()
        }
    }

    fn snapshot(&self, root: &Path) {
        let mut staged = self.staged.borrow_mut();
        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.expect("walk staged workspace");
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/");
                let text = std::fs::read_to_string(entry.path()).unwrap_or_default();
                staged.insert(rel, text);
            }
        }
    }

    fn staged(&self, rel: &str) -> String {
        self.staged
            .borrow()
            .get(rel)
            .cloned()
            .unwrap_or_else(|| panic!("{rel} was not staged; got {:?}", self.staged.borrow().keys()))
    }

    fn workspace_root(&self) -> PathBuf {
        self.root.borrow().clone().expect("toolchain was invoked")
    }
}

impl Toolchain for FakeToolchain {
    fn compile(&self, workspace: &Workspace, _interrupt: &Interrupt) -> Result<StepOutput> {
        *self.compiled.borrow_mut() = true;
        *self.root.borrow_mut() = Some(workspace.root().to_path_buf());
        self.snapshot(workspace.root());
        if self.fail_at == Some(Stage::Compiled) {
            return Err(BenchError::Toolchain {
                stage: Stage::Compiled,
                detail: "-- TYPE MISMATCH -- src/Main.elm".to_owned(),
            });
        }
        Ok(StepOutput {
            stdout: "Success! Compiled 4 modules.".to_owned(),
            stderr: self.compile_stderr.clone(),
        })
    }

    fn execute(&self, _workspace: &Workspace, interrupt: &Interrupt) -> Result<StepOutput> {
        if self.fail_at == Some(Stage::Executed) {
            return Err(BenchError::Toolchain {
                stage: Stage::Executed,
                detail: "`node runner.js` exited with status 1".to_owned(),
            });
        }
        if self.fail_at == Some(Stage::Reported) {
            interrupt.trigger();
        }
        Ok(StepOutput {
            stdout: self.stdout.clone(),
            stderr: String::new(),
        })
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn request(candidates: &[&str]) -> BenchRequest {
    BenchRequest {
        candidates: candidates.iter().map(|c| (*c).to_owned()).collect(),
        function: "sort".to_owned(),
        label: None,
        arguments: vec!["List.range 1 100 |> List.reverse".to_owned()],
        entry: "Main".to_owned(),
        imports: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[test]
fn ranks_candidates_against_baseline() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&old, 316.0), (&new, 254.0)]));

    let report = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap();

    assert_eq!(report.label, "sort");
    let entries = &report.ranking.entries;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].label, old);
    assert_eq!(entries[0].comparison, Comparison::Baseline);
    assert_eq!(entries[0].bar, 20);
    assert_eq!(entries[1].label, new);
    assert_eq!(entries[1].comparison, Comparison::Faster(20));
    assert_eq!(entries[1].bar, 16);
    assert_eq!(report.ranking.fastest, 1);
    assert!(report.warnings.is_empty());

    let text = render(&report, OutputFormat::Text, false).unwrap();
    assert!(text.contains("20% faster"), "got:\n{text}");
    assert!(text.contains("baseline"), "got:\n{text}");
}

#[test]
fn results_follow_candidate_order_not_output_order() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&new, 100.0), (&old, 200.0)]));

    let report = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap();

    assert_eq!(report.ranking.entries[0].label, old);
    assert_eq!(report.ranking.entries[1].comparison, Comparison::Faster(50));
}

#[test]
fn stages_isolated_candidates_and_driver() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&old, 1.0), (&new, 1.0)]));

    pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap();

    let entry = tc.staged("src/Old.elm");
    assert!(entry.starts_with("module Old exposing (sort)"), "got:\n{entry}");
    assert!(entry.contains("Old.Sort.Impl.sort"), "got:\n{entry}");
    assert!(tc.staged("src/Old/Utils.elm").starts_with("module Old.Utils"));
    assert!(tc.staged("src/New/Sort/Impl.elm").starts_with("module New.Sort.Impl"));

    let driver = tc.staged("src/Main.elm");
    assert!(driver.starts_with("module Main exposing (main)"), "got:\n{driver}");
    assert!(driver.contains("import Old\n"), "got:\n{driver}");
    assert!(driver.contains("import New\n"), "got:\n{driver}");
    assert!(driver.contains("Old.sort arg0"), "got:\n{driver}");
    assert!(driver.contains("New.sort arg0"), "got:\n{driver}");
    assert!(driver.contains("List.range 1 100 |> List.reverse"), "got:\n{driver}");

    assert!(tc.staged("src/BenchRunner.elm").contains("port module BenchRunner"));
    assert!(tc.staged("runner.js").contains("build/elm.js"));

    // Candidates themselves are never modified.
    let original = std::fs::read_to_string(Path::new(&old).join("src/Main.elm")).unwrap();
    assert!(original.starts_with("module Main exposing (sort)"));
}

#[test]
fn merged_manifest_tiers_are_disjoint() {
    let fx = Fixture::new();
    let old = fx.candidate(
        "old",
        &[("elm/core", "1.0.5"), ("elm/json", "1.1.3")],
        &[],
        &[("Main.elm", "module Main exposing (sort)\n\nsort x =\n    x\n")],
    );
    let new = fx.candidate(
        "new",
        &[("elm/core", "1.0.5"), ("elm/regex", "1.0.0")],
        &[("elm/json", "1.1.2"), ("elm/parser", "1.1.0")],
        &[("Main.elm", "module Main exposing (sort)\n\nsort x =\n    x\n")],
    );
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&old, 1.0), (&new, 2.0)]));

    pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap();

    let manifest: serde_json::Value = serde_json::from_str(&tc.staged("elm.json")).unwrap();
    let direct = manifest["dependencies"]["direct"].as_object().unwrap();
    let indirect = manifest["dependencies"]["indirect"].as_object().unwrap();

    assert_eq!(direct["elm-explorations/benchmark"], "1.0.2");
    assert_eq!(direct["BrianHicks/elm-trend"], "2.1.3");
    assert_eq!(direct["elm/json"], "1.1.3");
    assert_eq!(direct["elm/regex"], "1.0.0");
    assert_eq!(indirect["elm/parser"], "1.1.0");
    for name in direct.keys() {
        assert!(!indirect.contains_key(name), "{name} is in both tiers");
    }
    assert_eq!(manifest["type"], "application");
}

#[test]
fn toolchain_stderr_becomes_a_warning() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain {
        compile_stderr: "Debug remnants found\n".to_owned(),
        ..FakeToolchain::printing(bench_stdout("sort", &[(&old, 1.0), (&new, 1.0)]))
    };

    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();

    let report = tracing::subscriber::with_default(subscriber, || {
        pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new())
    })
    .unwrap();

    assert_eq!(report.warnings, ["elm make: Debug remnants found"]);
    // Shown once, in the report, not again on stderr at the default level.
    let logged = logs.text();
    assert!(!logged.contains("Debug remnants found"), "got:\n{logged}");
}

#[test]
fn custom_label_and_extra_import_reach_the_driver() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let stdout = bench_stdout("reverse sort", &[(&old, 1.0), (&new, 1.0)]);
    let tc = FakeToolchain::printing(stdout);
    let mut req = request(&[&old, &new]);
    req.label = Some("reverse sort".to_owned());
    req.imports = vec!["Array".to_owned()];

    let report = pipeline::run(&req, &tc, &Interrupt::new()).unwrap();

    assert_eq!(report.label, "reverse sort");
    let driver = tc.staged("src/Main.elm");
    assert!(driver.contains("import Array\n"), "got:\n{driver}");
    assert!(driver.contains("Benchmark.scale \"reverse sort\""), "got:\n{driver}");
}

// ---------------------------------------------------------------------------
// Cleanup on every path
// ---------------------------------------------------------------------------

fn assert_cleans_up(tc: &FakeToolchain, err: &BenchError, stage: Stage) {
    assert_eq!(err.stage(), Some(stage), "unexpected error: {err}");
    let root = tc.workspace_root();
    assert!(!root.exists(), "workspace {} was left behind", root.display());
}

#[test]
fn workspace_removed_after_success() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&old, 1.0), (&new, 1.0)]));

    pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap();

    assert!(!tc.workspace_root().exists());
}

#[test]
fn workspace_removed_after_compile_failure() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::failing_at(Stage::Compiled, String::new());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Toolchain);
    assert!(err.to_string().contains("TYPE MISMATCH"));
    assert_cleans_up(&tc, &err, Stage::Compiled);
}

#[test]
fn workspace_removed_after_execute_failure() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::failing_at(Stage::Executed, String::new());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert_eq!(err.category().exit_code(), 4);
    assert_cleans_up(&tc, &err, Stage::Executed);
}

#[test]
fn workspace_removed_after_unparseable_output() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing("Segmentation fault (core dumped)".to_owned());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Toolchain);
    assert_cleans_up(&tc, &err, Stage::Parsed);
}

#[test]
fn missing_result_for_a_candidate_is_a_parse_failure() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(bench_stdout("sort", &[(&old, 1.0)]));

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert_cleans_up(&tc, &err, Stage::Parsed);
}

#[test]
fn interrupt_before_staging_never_reaches_toolchain() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(String::new());
    let interrupt = Interrupt::new();
    interrupt.trigger();

    let err = pipeline::run(&request(&[&old, &new]), &tc, &interrupt).unwrap_err();

    assert!(matches!(err, BenchError::Interrupted { stage: Stage::Staged }));
    assert_eq!(err.category().exit_code(), 130);
    assert!(!*tc.compiled.borrow());
}

#[test]
fn interrupt_during_run_still_removes_workspace() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.sorting_candidate("new");
    // The fake trips the interrupt flag while "executing"; the run itself
    // completes, and the pipeline has already released the workspace.
    let tc = FakeToolchain::failing_at(
        Stage::Reported,
        bench_stdout("sort", &[(&old, 1.0), (&new, 1.0)]),
    );

    let result = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new());

    assert!(result.is_ok());
    assert!(!tc.workspace_root().exists());
}

// ---------------------------------------------------------------------------
// Rejected before the workspace exists
// ---------------------------------------------------------------------------

#[test]
fn colliding_namespaces_are_rejected() {
    let fx = Fixture::new();
    let a = fx.sorting_candidate("a/impl");
    let b = fx.sorting_candidate("b/impl");
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&a, &b]), &tc, &Interrupt::new()).unwrap_err();

    assert!(matches!(err, BenchError::NamespaceCollision { .. }), "got {err}");
    assert_eq!(err.category().exit_code(), 3);
    assert!(!*tc.compiled.borrow());
}

#[test]
fn reserved_namespace_is_rejected() {
    let fx = Fixture::new();
    let a = fx.sorting_candidate("main");
    let b = fx.sorting_candidate("new");
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&a, &b]), &tc, &Interrupt::new()).unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Reconcile);
}

#[test]
fn invalid_version_is_a_reconcile_error() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.candidate(
        "new",
        &[("elm/core", "1.0")],
        &[],
        &[("Main.elm", "module Main exposing (sort)\n\nsort x =\n    x\n")],
    );
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert!(matches!(err, BenchError::InvalidVersion { .. }), "got {err}");
    assert_eq!(err.category().exit_code(), 3);
    assert!(!*tc.compiled.borrow());
}

#[test]
fn malformed_manifest_is_an_input_error() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    fx.write("new/elm.json", "{ \"type\": \"application\", ");
    fx.write("new/src/Main.elm", "module Main exposing (sort)\n");
    let new = fx.path().join("new").display().to_string();
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert!(matches!(err, BenchError::ManifestMalformed { .. }), "got {err}");
    assert_eq!(err.category(), ErrorCategory::Input);
}

#[test]
fn missing_entry_module_is_an_input_error() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let new = fx.candidate(
        "new",
        &[("elm/core", "1.0.5")],
        &[],
        &[("Sorting.elm", "module Sorting exposing (sort)\n\nsort x =\n    x\n")],
    );
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&old, &new]), &tc, &Interrupt::new()).unwrap_err();

    assert!(matches!(err, BenchError::EntryModuleMissing { .. }), "got {err}");
    assert_eq!(err.category(), ErrorCategory::Input);
}

#[test]
fn missing_candidate_directory_is_an_input_error() {
    let fx = Fixture::new();
    let old = fx.sorting_candidate("old");
    let missing = fx.path().join("nope").display().to_string();
    let tc = FakeToolchain::printing(String::new());

    let err = pipeline::run(&request(&[&old, &missing]), &tc, &Interrupt::new()).unwrap_err();

    assert!(matches!(err, BenchError::CandidateNotFound { .. }), "got {err}");
}
