//! A user-supplied candidate project.

use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};

/// File name of an Elm project manifest.
pub const MANIFEST_FILE: &str = "elm.json";

/// One implementation under comparison: an Elm application directory.
///
/// Read-only for the whole run; the pipeline never writes below `root`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// The label exactly as passed on the command line.
    pub display_name: String,
    /// Canonical project directory.
    pub root: PathBuf,
    /// `<root>/elm.json`.
    pub manifest_path: PathBuf,
}

impl Candidate {
    /// Resolve a candidate from the path the user passed.
    ///
    /// # Errors
    /// [`BenchError::CandidateNotFound`] if the path is not a directory and
    /// [`BenchError::ManifestMissing`] if it has no `elm.json`.
    pub fn open(display_name: &str) -> Result<Self> {
        let given = Path::new(display_name);
        if !given.is_dir() {
            return Err(BenchError::CandidateNotFound {
                path: given.to_path_buf(),
            });
        }
        let root = given
            .canonicalize()
            .map_err(|e| BenchError::io(format!("resolving {}", given.display()), e))?;

        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(BenchError::ManifestMissing {
                candidate: display_name.to_owned(),
                path: manifest_path,
            });
        }

        Ok(Self {
            display_name: display_name.to_owned(),
            root,
            manifest_path,
        })
    }
}
