//! Shared test helpers for elm-bench integration tests.
//!
//! Every candidate project is written into a temp directory; nothing touches
//! the real filesystem outside it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// A directory holding one or more candidate projects side by side.
pub struct Fixture {
    root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write an arbitrary file below the fixture root.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        std::fs::create_dir_all(path.parent().expect("file has a parent"))
            .expect("failed to create parent dirs");
        std::fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    /// Create a candidate at `rel` with the given manifest dependencies and
    /// `src/` modules. Returns the candidate's path as passed on the command
    /// line.
    pub fn candidate(
        &self,
        rel: &str,
        direct: &[(&str, &str)],
        indirect: &[(&str, &str)],
        modules: &[(&str, &str)],
    ) -> String {
        self.write(&format!("{rel}/elm.json"), &manifest(direct, indirect));
        for (file, text) in modules {
            self.write(&format!("{rel}/src/{file}"), text);
        }
        self.root.path().join(rel).display().to_string()
    }

    /// A candidate whose `Main.sort` delegates to a helper module.
    pub fn sorting_candidate(&self, rel: &str) -> String {
        self.candidate(
            rel,
            &[("elm/core", "1.0.5")],
            &[("elm/json", "1.1.3")],
            &[
                (
                    "Main.elm",
                    "module Main exposing (sort)\n\nimport Sort.Impl\nimport Utils\n\n\nsort : List comparable -> List comparable\nsort =\n    Utils.identity << Sort.Impl.sort\n",
                ),
                (
                    "Sort/Impl.elm",
                    "module Sort.Impl exposing (sort)\n\n\nsort : List comparable -> List comparable\nsort =\n    List.sort\n",
                ),
                (
                    "Utils.elm",
                    "module Utils exposing (identity)\n\n\nidentity : a -> a\nidentity x =\n    x\n",
                ),
            ],
        )
    }
}

/// Render an application `elm.json`.
pub fn manifest(direct: &[(&str, &str)], indirect: &[(&str, &str)]) -> String {
    let tier = |pins: &[(&str, &str)]| -> serde_json::Value {
        pins.iter()
            .map(|(k, v)| ((*k).to_owned(), serde_json::Value::from(*v)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    };
    let value = serde_json::json!({
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": { "direct": tier(direct), "indirect": tier(indirect) },
        "test-dependencies": { "direct": {}, "indirect": {} },
    });
    serde_json::to_string_pretty(&value).expect("manifest serializes")
}

/// The benchmark output the runner script would print for `results`.
pub fn bench_stdout(bench: &str, results: &[(&str, f64)]) -> String {
    let results: Vec<serde_json::Value> = results
        .iter()
        .map(|(label, ns)| serde_json::json!({ "name": [bench, label], "nsPerRun": ns }))
        .collect();
    serde_json::json!({ "results": results, "warning": null }).to_string()
}

/// Run the elm-bench binary in `dir` with a compiler that does not exist, so
/// a run that gets past validation fails at the compile stage.
pub fn elm_bench_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_elm-bench"))
        .args(args)
        .current_dir(dir)
        .env("ELM_BENCH_ELM", "/nonexistent/elm-bench-test/elm")
        .env("ELM_BENCH_NODE", "/nonexistent/elm-bench-test/node")
        .env_remove("ELM_BENCH_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to execute elm-bench")
}

/// Run elm-bench and assert it fails with `code`. Returns stderr.
pub fn elm_bench_fails(dir: &Path, args: &[&str], code: i32) -> String {
    let out = elm_bench_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
    assert_eq!(
        out.status.code(),
        Some(code),
        "elm-bench {} should exit {code}:\nstdout: {}\nstderr: {stderr}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    stderr
}
