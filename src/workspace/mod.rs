//! The scratch project the toolchain compiles.
//!
//! A [`Workspace`] is a temporary directory seeded with the harness skeleton
//! embedded in the binary. It is removed when the value is dropped, whatever
//! path the pipeline took to get there.
//!
//! ```text
//! <tmp>/elm-bench-XXXX/
//!   elm.json             merged manifest
//!   runner.js            loads build/elm.js and prints the report
//!   src/BenchRunner.elm  steps the benchmark, emits JSON
//!   src/Main.elm         synthesized driver
//!   src/<Ns>.elm         each candidate's entry module
//!   src/<Ns>/...         each candidate's other modules
//!   build/elm.js         compiled artifact
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, instrument};

use crate::error::{BenchError, Result};
use crate::manifest::Manifest;
use crate::model::candidate::MANIFEST_FILE;

const SKELETON_MANIFEST: &str = include_str!("skeleton/elm.json");
const SKELETON_RUNNER: &str = include_str!("skeleton/runner.js");
const SKELETON_BENCH_RUNNER: &str = include_str!("skeleton/src/BenchRunner.elm");

/// Top-level module names no candidate namespace may take: the harness's own
/// modules, the benchmark library the driver imports, and the modules every
/// Elm file imports implicitly.
pub const RESERVED_MODULES: &[&str] = &[
    "Main",
    "BenchRunner",
    "Benchmark",
    "Basics",
    "Char",
    "Cmd",
    "Debug",
    "List",
    "Maybe",
    "Platform",
    "Result",
    "String",
    "Sub",
    "Tuple",
];

/// Driver file, relative to the workspace root.
pub const DRIVER_FILE: &str = "src/Main.elm";

/// Compiled artifact, relative to the workspace root.
pub const ARTIFACT_FILE: &str = "build/elm.js";

/// Node entry script, relative to the workspace root.
pub const RUNNER_FILE: &str = "runner.js";

/// The skeleton's own manifest, parsed.
///
/// # Errors
/// Only if the embedded manifest is broken, which is a bug.
pub fn skeleton_manifest() -> Result<Manifest> {
    Manifest::parse(SKELETON_MANIFEST, Path::new("<skeleton>/elm.json"))
        .map_err(|e| BenchError::internal(format!("embedded skeleton manifest: {e}")))
}

/// A staged harness project in a temporary directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh temporary directory and write the skeleton into it.
    ///
    /// # Errors
    /// I/O failures while creating the directory or writing files.
    #[instrument(name = "stage")]
    pub fn stage() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("elm-bench-")
            .tempdir()
            .map_err(|e| BenchError::workspace_io("creating the workspace directory", e))?;
        let ws = Self { dir };

        ws.write(RUNNER_FILE, SKELETON_RUNNER)?;
        ws.write("src/BenchRunner.elm", SKELETON_BENCH_RUNNER)?;
        fs::create_dir_all(ws.root().join("build"))
            .map_err(|e| BenchError::workspace_io("creating the build directory", e))?;

        debug!(root = %ws.root().display(), "workspace staged");
        Ok(ws)
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Where candidate modules and the driver live.
    #[must_use]
    pub fn src_dir(&self) -> PathBuf {
        self.root().join("src")
    }

    /// Absolute path of the compiled artifact.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.root().join(ARTIFACT_FILE)
    }

    /// Write the merged manifest.
    ///
    /// # Errors
    /// Serialization or I/O failures.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.write(MANIFEST_FILE, &manifest.to_json()?)
    }

    /// Write the synthesized driver module.
    ///
    /// # Errors
    /// I/O failures.
    pub fn write_driver(&self, source: &str) -> Result<()> {
        self.write(DRIVER_FILE, source)
    }

    fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| {
                    BenchError::workspace_io(format!("creating {}", parent.display()), e)
                })?;
        }
        fs::write(&path, contents)
            .map_err(|e| BenchError::workspace_io(format!("writing {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::isolate::parse::parse_module;

    #[test]
    fn skeleton_manifest_parses() {
        let m = skeleton_manifest().unwrap();
        assert_eq!(m.source_directories, vec!["src"]);
        assert!(m.dependencies.direct.contains_key("elm-explorations/benchmark"));
        for package in m.dependencies.indirect.keys() {
            assert!(!m.dependencies.direct.contains_key(package));
        }
    }

    #[test]
    fn skeleton_imports_resolve_to_direct_packages() {
        let m = skeleton_manifest().unwrap();
        let runner = parse_module(SKELETON_BENCH_RUNNER).unwrap();
        assert!(!runner.imports.is_empty());
        for import in &runner.imports {
            let package = match import.path.segments()[0].as_str() {
                "Benchmark" => "elm-explorations/benchmark",
                "Json" => "elm/json",
                "Trend" => "BrianHicks/elm-trend",
                "Basics" | "Char" | "Dict" | "List" | "Maybe" | "Platform" | "Process"
                | "Result" | "String" | "Task" | "Tuple" => "elm/core",
                other => panic!("no package known for import {other}"),
            };
            assert!(
                m.dependencies.direct.contains_key(package),
                "{} comes from {package}, which must be a direct dependency",
                import.path
            );
        }
    }

    #[test]
    fn skeleton_bench_runner_is_reserved() {
        assert!(SKELETON_BENCH_RUNNER.starts_with("port module BenchRunner "));
        assert!(RESERVED_MODULES.contains(&"BenchRunner"));
        assert!(RESERVED_MODULES.contains(&"Main"));
    }

    #[test]
    fn stage_writes_skeleton() {
        let ws = Workspace::stage().unwrap();
        assert!(ws.root().join(RUNNER_FILE).is_file());
        assert!(ws.src_dir().join("BenchRunner.elm").is_file());
        assert!(ws.root().join("build").is_dir());
        assert!(!ws.root().join(DRIVER_FILE).exists());
    }

    #[test]
    fn drop_removes_directory() {
        let ws = Workspace::stage().unwrap();
        let root = ws.root().to_path_buf();
        ws.write_driver("module Main exposing (main)\n").unwrap();
        assert!(root.exists());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn manifest_round_trips_through_workspace() {
        let ws = Workspace::stage().unwrap();
        let m = skeleton_manifest().unwrap();
        ws.write_manifest(&m).unwrap();
        let back = Manifest::load(&ws.root().join(MANIFEST_FILE)).unwrap();
        assert_eq!(back.dependencies, m.dependencies);
        assert_eq!(back.extra, m.extra);
    }

    #[test]
    fn write_failure_is_an_environment_error() {
        let ws = Workspace::stage().unwrap();
        fs::remove_dir_all(ws.src_dir()).unwrap();
        fs::write(ws.src_dir(), "not a directory").unwrap();

        let err = ws.write_driver("module Main exposing (main)\n").unwrap_err();

        assert!(matches!(err, BenchError::WorkspaceIo { .. }), "got {err:?}");
        assert_eq!(err.category(), ErrorCategory::Environment);
    }

    #[test]
    fn concurrent_workspaces_are_distinct() {
        let a = Workspace::stage().unwrap();
        let b = Workspace::stage().unwrap();
        assert_ne!(a.root(), b.root());
    }
}
