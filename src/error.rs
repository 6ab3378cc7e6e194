//! Pipeline error types for elm-bench.
//!
//! Defines [`BenchError`], the unified error type for every pipeline stage.
//! Each variant carries enough context to be printed on its own: what went
//! wrong, which candidate or file is at fault, and how to fix it. Variants are
//! grouped into [`ErrorCategory`] so the binary can pick an exit code and so
//! users can tell a problem in their own project apart from a failure further
//! down in the Elm toolchain.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::types::{Namespace, ValidationError};
use crate::pipeline::Stage;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Coarse classification of a [`BenchError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad command line or candidate project structure.
    Input,
    /// Candidates cannot be merged (namespace collision, bad version).
    Reconcile,
    /// The Elm compiler or the compiled benchmark failed.
    Toolchain,
    /// A bug in elm-bench itself.
    Internal,
    /// The local machine failed us (temp directory, disk space, process
    /// table).
    Environment,
    /// The user interrupted the run.
    Interrupted,
}

impl ErrorCategory {
    /// Process exit code for this category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Input => 2,
            Self::Reconcile => 3,
            Self::Toolchain => 4,
            Self::Internal => 70,
            Self::Environment => 74,
            Self::Interrupted => 130,
        }
    }
}

// ---------------------------------------------------------------------------
// BenchError
// ---------------------------------------------------------------------------

/// Unified error type for elm-bench.
#[derive(Debug)]
pub enum BenchError {
    /// The command line is unusable as given.
    InvalidArguments {
        /// What is wrong with it.
        reason: String,
    },

    /// A candidate path does not exist or is not a directory.
    CandidateNotFound {
        /// The path as given by the user.
        path: PathBuf,
    },

    /// A candidate has no `elm.json`.
    ManifestMissing {
        /// Candidate display name.
        candidate: String,
        /// Where the manifest was expected.
        path: PathBuf,
    },

    /// A manifest could not be parsed or has the wrong shape.
    ManifestMalformed {
        /// Path to the manifest.
        path: PathBuf,
        /// Parser diagnostic.
        detail: String,
    },

    /// A candidate's display name does not yield a usable namespace.
    InvalidNamespace(ValidationError),

    /// A candidate's source directories contain no Elm modules.
    NoModules {
        /// Candidate display name.
        candidate: String,
        /// Directories that were searched.
        searched: Vec<PathBuf>,
    },

    /// A candidate has no entry module.
    EntryModuleMissing {
        /// Candidate display name.
        candidate: String,
        /// The module name that was looked for.
        entry: String,
    },

    /// An Elm source file has no usable module header.
    ModuleHeader {
        /// Path to the offending file.
        path: PathBuf,
        /// What is wrong with it.
        detail: String,
    },

    /// Two candidates map to the same namespace.
    NamespaceCollision {
        /// The namespace both resolve to.
        namespace: Namespace,
        /// Display name of the earlier candidate (or the reserved module).
        first: String,
        /// Display name of the later candidate.
        second: String,
    },

    /// A manifest pins a package to a non-conforming version string.
    InvalidVersion {
        /// Manifest that holds the value.
        manifest: PathBuf,
        /// Package name.
        package: String,
        /// The offending value.
        value: String,
    },

    /// An external toolchain stage failed.
    Toolchain {
        /// The stage that was being entered.
        stage: Stage,
        /// Captured diagnostics.
        detail: String,
    },

    /// An external toolchain stage did not finish in time.
    TimedOut {
        /// The stage that was being entered.
        stage: Stage,
        /// The configured limit.
        after: Duration,
    },

    /// The user interrupted the run.
    Interrupted {
        /// The stage that was running.
        stage: Stage,
    },

    /// The pipeline reached a state that should be impossible.
    Internal {
        /// Description of the inconsistency.
        detail: String,
    },

    /// An I/O error while reading a candidate.
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        source: io::Error,
    },

    /// An I/O error inside elm-bench's own workspace or while supervising a
    /// child process.
    WorkspaceIo {
        /// What was being done.
        context: String,
        /// Underlying error.
        source: io::Error,
    },
}

/// Convenience alias used throughout the library.
pub type Result<T, E = BenchError> = std::result::Result<T, E>;

impl BenchError {
    /// Wrap an I/O error with a short description of the operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O error that happened in the workspace rather than in a
    /// candidate.
    pub fn workspace_io(context: impl Into<String>, source: io::Error) -> Self {
        Self::WorkspaceIo {
            context: context.into(),
            source,
        }
    }

    /// Build an internal-consistency error.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArguments { .. }
            | Self::CandidateNotFound { .. }
            | Self::ManifestMissing { .. }
            | Self::ManifestMalformed { .. }
            | Self::InvalidNamespace(_)
            | Self::NoModules { .. }
            | Self::EntryModuleMissing { .. }
            | Self::ModuleHeader { .. }
            | Self::Io { .. } => ErrorCategory::Input,
            Self::NamespaceCollision { .. } | Self::InvalidVersion { .. } => {
                ErrorCategory::Reconcile
            }
            Self::Toolchain { .. } | Self::TimedOut { .. } => ErrorCategory::Toolchain,
            Self::Interrupted { .. } => ErrorCategory::Interrupted,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::WorkspaceIo { .. } => ErrorCategory::Environment,
        }
    }

    /// The pipeline stage this error belongs to, if it is a toolchain error.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Toolchain { stage, .. }
            | Self::TimedOut { stage, .. }
            | Self::Interrupted { stage } => Some(*stage),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArguments { reason } => {
                write!(
                    f,
                    "invalid arguments: {reason}\n  Usage: elm-bench -f <function> <candidate> <candidate>... -- <arg>..."
                )
            }
            Self::CandidateNotFound { path } => {
                write!(
                    f,
                    "candidate '{}' not found or not a directory.\n  To fix: pass the directory that contains the candidate's elm.json.",
                    path.display()
                )
            }
            Self::ManifestMissing { candidate, path } => {
                write!(
                    f,
                    "candidate '{candidate}' has no manifest at {}\n  To fix: every candidate must be an Elm application with its own elm.json.",
                    path.display()
                )
            }
            Self::ManifestMalformed { path, detail } => {
                write!(
                    f,
                    "malformed manifest {}: {detail}\n  To fix: check that the file is a valid Elm application elm.json.",
                    path.display()
                )
            }
            Self::InvalidNamespace(err) => {
                write!(
                    f,
                    "cannot use candidate name: {err}\n  To fix: rename the candidate directory so it starts with a letter."
                )
            }
            Self::NoModules {
                candidate,
                searched,
            } => {
                let dirs: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "candidate '{candidate}' has no Elm modules (searched: {}).\n  To fix: check the candidate's \"source-directories\".",
                    dirs.join(", ")
                )
            }
            Self::EntryModuleMissing { candidate, entry } => {
                write!(
                    f,
                    "candidate '{candidate}' has no entry module '{entry}'.\n  To fix: add {entry}.elm exposing the benchmarked function, or pass --entry <Module>."
                )
            }
            Self::ModuleHeader { path, detail } => {
                write!(
                    f,
                    "cannot read module header of {}: {detail}\n  To fix: make sure the file starts with a valid `module ... exposing (...)` declaration.",
                    path.display()
                )
            }
            Self::NamespaceCollision {
                namespace,
                first,
                second,
            } => {
                write!(
                    f,
                    "candidates '{first}' and '{second}' both map to namespace '{namespace}'.\n  To fix: give the candidate directories distinct names."
                )
            }
            Self::InvalidVersion {
                manifest,
                package,
                value,
            } => {
                write!(
                    f,
                    "package '{package}' in {} has non-conforming version '{value}'.\n  To fix: versions must be exact MAJOR.MINOR.PATCH, as written by `elm install`.",
                    manifest.display()
                )
            }
            Self::Toolchain { stage, detail } => {
                write!(f, "{stage} stage failed")?;
                if !detail.is_empty() {
                    write!(f, ":\n{detail}")?;
                }
                Ok(())
            }
            Self::TimedOut { stage, after } => {
                write!(
                    f,
                    "{stage} stage timed out after {}s.\n  To fix: raise the limit in elm-bench.toml or reduce the workload.",
                    after.as_secs()
                )
            }
            Self::Interrupted { stage } => write!(f, "interrupted during {stage} stage"),
            Self::Internal { detail } => {
                write!(
                    f,
                    "internal error: {detail}\n  This is a bug in elm-bench, please report it."
                )
            }
            Self::Io { context, source } => {
                write!(
                    f,
                    "I/O error while {context}: {source}\n  To fix: check file permissions and disk space."
                )
            }
            Self::WorkspaceIo { context, source } => {
                write!(
                    f,
                    "workspace I/O error while {context}: {source}\n  To fix: check free space and permissions in the temp directory (TMPDIR)."
                )
            }
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::WorkspaceIo { source, .. } => Some(source),
            Self::InvalidNamespace(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for BenchError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidNamespace(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
