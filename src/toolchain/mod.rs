//! The external Elm toolchain: `elm make` to compile, `node` to run.
//!
//! [`Toolchain`] is the seam the pipeline drives; [`ElmToolchain`] is the real
//! implementation, and tests substitute their own.

pub mod process;

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument};

use crate::config::ToolchainConfig;
use crate::error::{BenchError, Result};
use crate::pipeline::Stage;
use crate::workspace::{ARTIFACT_FILE, DRIVER_FILE, RUNNER_FILE, Workspace};

pub use process::Interrupt;

/// Captured output of a successful toolchain step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Standard output, verbatim.
    pub stdout: String,
    /// Standard error, verbatim. Non-empty on success means warnings.
    pub stderr: String,
}

/// Compile and run a staged workspace.
pub trait Toolchain {
    /// Compile the driver into the workspace's artifact.
    ///
    /// # Errors
    /// A [`BenchError`] tagged [`Stage::Compiled`] on failure.
    fn compile(&self, workspace: &Workspace, interrupt: &Interrupt) -> Result<StepOutput>;

    /// Run the compiled artifact and capture what it prints.
    ///
    /// # Errors
    /// A [`BenchError`] tagged [`Stage::Executed`] on failure.
    fn execute(&self, workspace: &Workspace, interrupt: &Interrupt) -> Result<StepOutput>;
}

/// `elm` + `node` from the configured paths.
#[derive(Clone, Debug)]
pub struct ElmToolchain {
    elm: PathBuf,
    node: PathBuf,
    optimize: bool,
    compile_timeout: Duration,
    run_timeout: Duration,
}

impl ElmToolchain {
    /// Build from resolved configuration.
    #[must_use]
    pub fn new(config: &ToolchainConfig) -> Self {
        Self {
            elm: config.elm.clone(),
            node: config.node.clone(),
            optimize: config.optimize,
            compile_timeout: Duration::from_secs(config.compile_timeout_secs),
            run_timeout: Duration::from_secs(config.run_timeout_secs),
        }
    }

    /// Arguments passed to `elm`.
    #[must_use]
    pub fn compile_args(&self) -> Vec<String> {
        let mut args = vec!["make".to_owned(), DRIVER_FILE.to_owned()];
        if self.optimize {
            args.push("--optimize".to_owned());
        }
        args.push(format!("--output={ARTIFACT_FILE}"));
        args
    }
}

fn failure_detail(stdout: &str, stderr: &str) -> String {
    [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Toolchain for ElmToolchain {
    #[instrument(name = "compile", skip_all, fields(optimize = self.optimize))]
    fn compile(&self, workspace: &Workspace, interrupt: &Interrupt) -> Result<StepOutput> {
        let mut cmd = Command::new(&self.elm);
        cmd.args(self.compile_args()).current_dir(workspace.root());

        let out = process::run(&mut cmd, Stage::Compiled, self.compile_timeout, interrupt)?;
        if !out.success() {
            return Err(BenchError::Toolchain {
                stage: Stage::Compiled,
                detail: failure_detail(&out.stdout, &out.stderr),
            });
        }
        if !workspace.artifact_path().is_file() {
            return Err(BenchError::Toolchain {
                stage: Stage::Compiled,
                detail: format!("`elm make` succeeded but wrote no {ARTIFACT_FILE}"),
            });
        }
        info!(elapsed = ?out.elapsed, "compiled");
        Ok(StepOutput {
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    #[instrument(name = "execute", skip_all)]
    fn execute(&self, workspace: &Workspace, interrupt: &Interrupt) -> Result<StepOutput> {
        let mut cmd = Command::new(&self.node);
        cmd.arg(RUNNER_FILE).current_dir(workspace.root());

        let out = process::run(&mut cmd, Stage::Executed, self.run_timeout, interrupt)?;
        if !out.success() {
            let code = out
                .status
                .code()
                .map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"));
            let mut detail = format!("`node {RUNNER_FILE}` exited with {code}");
            let diagnostics = failure_detail("", &out.stderr);
            if !diagnostics.is_empty() {
                detail.push('\n');
                detail.push_str(&diagnostics);
            }
            return Err(BenchError::Toolchain {
                stage: Stage::Executed,
                detail,
            });
        }
        info!(elapsed = ?out.elapsed, "executed");
        Ok(StepOutput {
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}
