//! elm-bench configuration (`elm-bench.toml`).
//!
//! Every field is optional. A missing file means all defaults; unknown keys
//! are rejected so typos do not silently fall back to a default.
//!
//! ```toml
//! [toolchain]
//! elm = "elm"
//! node = "node"
//! optimize = true
//! compile_timeout_secs = 300
//! run_timeout_secs = 600
//!
//! [harness]
//! entry = "Main"
//!
//! [report]
//! color = "auto"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "elm-bench.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level elm-bench configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// External programs and their limits.
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Driver generation.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Report rendering.
    #[serde(default)]
    pub report: ReportConfig,
}

// ---------------------------------------------------------------------------
// ToolchainConfig
// ---------------------------------------------------------------------------

/// External toolchain settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// The Elm compiler (default: `"elm"` on `PATH`).
    #[serde(default = "default_elm")]
    pub elm: PathBuf,

    /// The JavaScript runtime (default: `"node"` on `PATH`).
    #[serde(default = "default_node")]
    pub node: PathBuf,

    /// Pass `--optimize` to `elm make` (default: true).
    #[serde(default = "default_optimize")]
    pub optimize: bool,

    /// Upper bound on `elm make`, in seconds.
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout_secs: u64,

    /// Upper bound on running the benchmark, in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            elm: default_elm(),
            node: default_node(),
            optimize: default_optimize(),
            compile_timeout_secs: default_compile_timeout(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_elm() -> PathBuf {
    PathBuf::from("elm")
}

fn default_node() -> PathBuf {
    PathBuf::from("node")
}

const fn default_optimize() -> bool {
    true
}

const fn default_compile_timeout() -> u64 {
    300
}

const fn default_run_timeout() -> u64 {
    600
}

// ---------------------------------------------------------------------------
// HarnessConfig
// ---------------------------------------------------------------------------

/// Driver settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Module in each candidate that exposes the benchmarked function.
    #[serde(default = "default_entry")]
    pub entry: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
        }
    }
}

fn default_entry() -> String {
    "Main".to_owned()
}

// ---------------------------------------------------------------------------
// ReportConfig
// ---------------------------------------------------------------------------

/// Report settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// When to emphasize the fastest candidate with color.
    #[serde(default)]
    pub color: ColorChoice,
}

/// When to use terminal color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

impl ColorChoice {
    /// Resolve against the output stream and the environment.
    #[must_use]
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => is_terminal && std::env::var_os("NO_COLOR").is_none(),
        }
    }
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl BenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields all defaults unless `required` is set (an
    /// explicit `--config` that does not exist is an error).
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors or parse errors.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or a zero
    /// timeout.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;

        let tc = &config.toolchain;
        if tc.compile_timeout_secs == 0 || tc.run_timeout_secs == 0 {
            return Err(ConfigError {
                path: None,
                message: "[toolchain] timeouts must be at least 1 second".to_owned(),
            });
        }
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
