//! Elm application manifests (`elm.json`).
//!
//! Only the parts elm-bench reasons about are typed: the project kind, the
//! source directories and the two dependency tiers. Everything else
//! (`elm-version`, `test-dependencies`, ...) is carried through untouched.

pub mod merge;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::model::Version;

pub use merge::merge_manifests;

/// The only project kind a candidate or the workspace may have.
pub const APPLICATION: &str = "application";

/// Package name → pinned version, ordered by name.
pub type Pins = BTreeMap<String, Version>;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
struct RawManifest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "source-directories", default = "default_source_dirs")]
    source_directories: Vec<String>,
    #[serde(default)]
    dependencies: RawTiers,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawTiers {
    #[serde(default)]
    direct: BTreeMap<String, String>,
    #[serde(default)]
    indirect: BTreeMap<String, String>,
}

fn default_source_dirs() -> Vec<String> {
    vec!["src".to_owned()]
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// The two dependency tiers of a manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tiers {
    /// Packages the project imports itself.
    pub direct: Pins,
    /// Packages pulled in transitively.
    pub indirect: Pins,
}

/// A parsed `elm.json` of type `application`.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    /// Where the manifest was read from (used in diagnostics).
    pub path: PathBuf,
    /// `source-directories`, relative to the manifest's directory.
    pub source_directories: Vec<String>,
    /// `dependencies.direct` / `dependencies.indirect`.
    pub dependencies: Tiers,
    /// Every other top-level field, verbatim.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Read and parse a manifest from disk.
    ///
    /// # Errors
    /// I/O failures, malformed JSON, non-application manifests and
    /// non-conforming version strings.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BenchError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&text, path)
    }

    /// Parse manifest text; `path` is only used for error messages.
    ///
    /// # Errors
    /// [`BenchError::ManifestMalformed`] for structural problems and
    /// [`BenchError::InvalidVersion`] for bad version strings.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest =
            serde_json::from_str(text).map_err(|e| BenchError::ManifestMalformed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        if raw.kind != APPLICATION {
            return Err(BenchError::ManifestMalformed {
                path: path.to_path_buf(),
                detail: format!(
                    "\"type\" is \"{}\", only \"{APPLICATION}\" projects can be benchmarked",
                    raw.kind
                ),
            });
        }
        if raw.source_directories.is_empty() {
            return Err(BenchError::ManifestMalformed {
                path: path.to_path_buf(),
                detail: "\"source-directories\" is empty".to_owned(),
            });
        }

        let dependencies = Tiers {
            direct: pins(path, raw.dependencies.direct)?,
            indirect: pins(path, raw.dependencies.indirect)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            source_directories: raw.source_directories,
            dependencies,
            extra: raw.extra,
        })
    }

    /// Source directories resolved against the manifest's directory.
    #[must_use]
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        self.source_directories.iter().map(|d| base.join(d)).collect()
    }

    /// Render as pretty-printed JSON, the way it is written into the
    /// workspace.
    ///
    /// # Errors
    /// Only if serialization itself fails, which indicates a bug.
    pub fn to_json(&self) -> Result<String> {
        let raw = RawManifest {
            kind: APPLICATION.to_owned(),
            source_directories: self.source_directories.clone(),
            dependencies: RawTiers {
                direct: unpin(&self.dependencies.direct),
                indirect: unpin(&self.dependencies.indirect),
            },
            extra: self.extra.clone(),
        };
        let mut text = serde_json::to_string_pretty(&raw)
            .map_err(|e| BenchError::internal(format!("serializing manifest: {e}")))?;
        text.push('\n');
        Ok(text)
    }
}

fn pins(path: &Path, raw: BTreeMap<String, String>) -> Result<Pins> {
    raw.into_iter()
        .map(|(package, value)| match Version::parse(&value) {
            Ok(v) => Ok((package, v)),
            Err(_) => Err(BenchError::InvalidVersion {
                manifest: path.to_path_buf(),
                package,
                value,
            }),
        })
        .collect()
}

fn unpin(pins: &Pins) -> BTreeMap<String, String> {
    pins.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
