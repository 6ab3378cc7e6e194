//! Namespace isolation: copy each candidate's module tree into the workspace
//! under its own namespace so N independently written trees compile together.
//!
//! # Layout
//!
//! ```text
//! candidate/src/Main.elm          → workspace/src/Old.elm          (module Old)
//! candidate/src/Data/Tree.elm     → workspace/src/Old/Data/Tree.elm (module Old.Data.Tree)
//! candidate/src/data/table.csv    → workspace/src/Old/data/table.csv
//! ```
//!
//! # Invariants
//!
//! - Every rewritten module path starts with the candidate's namespace.
//! - Imports between modules of the same candidate follow the rename;
//!   imports of package modules are untouched.
//! - No two candidates share a namespace, and no candidate namespace shadows
//!   a harness module. Both are checked before anything is written.
//! - Output is a pure function of the candidate's files and namespace.
//! - Nothing is ever written outside the workspace's source root.

pub mod parse;
pub mod rewrite;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{BenchError, Result};
use crate::model::{Candidate, ModulePath, Namespace};

use self::parse::{ParseError, ParsedModule, parse_module};
use self::rewrite::{RenameMap, rewrite_module};

// ---------------------------------------------------------------------------
// Namespace assignment
// ---------------------------------------------------------------------------

/// Derive one namespace per candidate, failing on any collision.
///
/// `reserved` lists module names owned by the harness; a candidate whose
/// namespace equals one of them is rejected as a collision too.
///
/// # Errors
/// [`BenchError::InvalidNamespace`] if a display name yields no usable
/// namespace, [`BenchError::NamespaceCollision`] on duplicates.
pub fn assign_namespaces(candidates: &[Candidate], reserved: &[&str]) -> Result<Vec<Namespace>> {
    let mut seen: BTreeMap<Namespace, &str> = BTreeMap::new();
    let mut out = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let ns = Namespace::from_display_name(&candidate.display_name)?;
        if reserved.contains(&ns.as_str()) {
            return Err(BenchError::NamespaceCollision {
                namespace: ns.clone(),
                first: format!("harness module {ns}"),
                second: candidate.display_name.clone(),
            });
        }
        if let Some(first) = seen.get(&ns) {
            return Err(BenchError::NamespaceCollision {
                namespace: ns.clone(),
                first: (*first).to_owned(),
                second: candidate.display_name.clone(),
            });
        }
        seen.insert(ns.clone(), &candidate.display_name);
        out.push(ns);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// An Elm module found in a candidate's source tree.
#[derive(Clone, Debug)]
pub struct ModuleFile {
    /// Absolute path of the original file.
    pub source: PathBuf,
    /// Path relative to its source directory.
    pub rel_path: PathBuf,
    /// Declared (and location-implied) module path.
    pub path: ModulePath,
    /// File contents.
    pub text: String,
    /// Parsed header and imports.
    pub parsed: ParsedModule,
}

/// A non-module file that travels with the candidate's sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceFile {
    /// Absolute path of the original file.
    pub source: PathBuf,
    /// Path relative to its source directory.
    pub rel_path: PathBuf,
}

/// Everything found under a candidate's source directories.
#[derive(Clone, Debug, Default)]
pub struct CandidateSources {
    /// Elm modules, sorted by module path.
    pub modules: Vec<ModuleFile>,
    /// Incidental files copied through unchanged.
    pub resources: Vec<ResourceFile>,
}

/// Enumerate and parse every file under `source_roots`.
///
/// # Errors
/// Input errors for unreadable files, unparseable module headers, headers
/// that disagree with the file location, duplicate modules, and a tree with
/// no modules at all.
pub fn discover(candidate: &Candidate, source_roots: &[PathBuf]) -> Result<CandidateSources> {
    let mut sources = CandidateSources::default();
    let mut by_path: BTreeMap<ModulePath, PathBuf> = BTreeMap::new();

    for root in source_roots {
        if !root.is_dir() {
            debug!(root = %root.display(), "source directory missing, skipping");
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BenchError::io(
                    format!("walking {}", root.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let source = entry.path().to_path_buf();
            let rel_path = source
                .strip_prefix(root)
                .map_err(|_| BenchError::internal("walkdir yielded a path outside its root"))?
                .to_path_buf();

            let Some(expected) = ModulePath::from_relative_file(&rel_path) else {
                debug!(file = %rel_path.display(), "not a module, copying as resource");
                sources.resources.push(ResourceFile { source, rel_path });
                continue;
            };

            let text = fs::read_to_string(&source)
                .map_err(|e| BenchError::io(format!("reading {}", source.display()), e))?;
            let parsed = match parse_module(&text) {
                Ok(parsed) => parsed,
                Err(ParseError::MissingHeader { line }) => {
                    warn!(
                        file = %source.display(),
                        line,
                        "no module declaration, skipping"
                    );
                    continue;
                }
                Err(e) => {
                    return Err(BenchError::ModuleHeader {
                        path: source,
                        detail: e.to_string(),
                    });
                }
            };
            if parsed.header.path != expected {
                return Err(BenchError::ModuleHeader {
                    path: source,
                    detail: format!(
                        "declares module {} but its location implies {expected}",
                        parsed.header.path
                    ),
                });
            }
            if let Some(other) = by_path.insert(expected.clone(), source.clone()) {
                return Err(BenchError::ModuleHeader {
                    path: source,
                    detail: format!("module {expected} is also defined in {}", other.display()),
                });
            }
            sources.modules.push(ModuleFile {
                source,
                rel_path,
                path: expected,
                text,
                parsed,
            });
        }
    }

    if sources.modules.is_empty() {
        return Err(BenchError::NoModules {
            candidate: candidate.display_name.clone(),
            searched: source_roots.to_vec(),
        });
    }
    sources.modules.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// A file to be written into the workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlannedFile {
    /// Rewritten module text.
    Module {
        /// Destination relative to the workspace source root.
        dest: PathBuf,
        /// New contents.
        text: String,
    },
    /// Byte-for-byte copy.
    Copy {
        /// Original file.
        source: PathBuf,
        /// Destination relative to the workspace source root.
        dest: PathBuf,
    },
}

impl PlannedFile {
    /// Destination relative to the workspace source root.
    #[must_use]
    pub fn dest(&self) -> &Path {
        match self {
            Self::Module { dest, .. } | Self::Copy { dest, .. } => dest,
        }
    }
}

/// The outcome of isolating one candidate.
#[derive(Clone, Debug)]
pub struct IsolatedCandidate {
    /// The candidate's label, verbatim.
    pub display_name: String,
    /// Assigned namespace.
    pub namespace: Namespace,
    /// Rewritten path of the entry module (equal to the namespace).
    pub entry: ModulePath,
    /// Original → rewritten module paths.
    pub renames: RenameMap,
    /// Imports that resolve outside the candidate, by their written path.
    pub external_imports: BTreeSet<ModulePath>,
    /// Files to write, in deterministic order.
    pub files: Vec<PlannedFile>,
}

/// Compute the rewritten file set for a candidate without touching disk.
///
/// # Errors
/// [`BenchError::EntryModuleMissing`] if `entry` is not among the modules,
/// or a header error if a body cannot be scanned.
pub fn plan(
    candidate: &Candidate,
    namespace: &Namespace,
    entry: &ModulePath,
    sources: &CandidateSources,
) -> Result<IsolatedCandidate> {
    if !sources.modules.iter().any(|m| &m.path == entry) {
        return Err(BenchError::EntryModuleMissing {
            candidate: candidate.display_name.clone(),
            entry: entry.to_string(),
        });
    }

    let renames: RenameMap = sources
        .modules
        .iter()
        .map(|m| {
            let new_path = if &m.path == entry {
                ModulePath::from(namespace)
            } else {
                m.path.prefixed(namespace)
            };
            (m.path.clone(), new_path)
        })
        .collect();

    let ns_dir = PathBuf::from(namespace.as_str());
    let mut files = Vec::with_capacity(sources.modules.len() + sources.resources.len());
    let mut external_imports = BTreeSet::new();

    for module in &sources.modules {
        let new_path = &renames[&module.path];
        let text = rewrite_module(&module.text, &module.parsed, new_path, &renames).map_err(
            |e| BenchError::ModuleHeader {
                path: module.source.clone(),
                detail: e.to_string(),
            },
        )?;
        let reparsed = parse_module(&text).map_err(|e| {
            BenchError::internal(format!(
                "rewritten {} no longer parses: {e}",
                module.source.display()
            ))
        })?;
        let header = &module.parsed.header;
        if reparsed.header.path != *new_path
            || reparsed.header.kind != header.kind
            || reparsed.header.exposing != header.exposing
        {
            return Err(BenchError::internal(format!(
                "rewriting {} changed its module declaration",
                module.source.display()
            )));
        }
        let dest = if &module.path == entry {
            PathBuf::from(format!("{namespace}.elm"))
        } else {
            ns_dir.join(&module.rel_path)
        };
        for import in &module.parsed.imports {
            if !renames.contains_key(&import.path) {
                external_imports.insert(import.path.clone());
            }
        }
        files.push(PlannedFile::Module { dest, text });
    }

    for resource in &sources.resources {
        files.push(PlannedFile::Copy {
            source: resource.source.clone(),
            dest: ns_dir.join(&resource.rel_path),
        });
    }

    Ok(IsolatedCandidate {
        display_name: candidate.display_name.clone(),
        namespace: namespace.clone(),
        entry: ModulePath::from(namespace),
        renames,
        external_imports,
        files,
    })
}

/// Reject a candidate whose package import would resolve into another
/// candidate's rewritten tree.
///
/// # Errors
/// [`BenchError::NamespaceCollision`] naming both candidates.
pub fn check_cross_references(isolated: &[IsolatedCandidate]) -> Result<()> {
    for a in isolated {
        for import in &a.external_imports {
            for b in isolated {
                if b.renames.values().any(|p| p == import) {
                    return Err(BenchError::NamespaceCollision {
                        namespace: b.namespace.clone(),
                        first: b.display_name.clone(),
                        second: format!("{} (import {import})", a.display_name),
                    });
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a planned candidate below `src_root`.
///
/// Directories are created if absent, so candidates can be written in any
/// order.
///
/// # Errors
/// I/O failures while creating directories or writing files.
pub fn write(isolated: &IsolatedCandidate, src_root: &Path) -> Result<()> {
    for file in &isolated.files {
        let dest = src_root.join(file.dest());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| {
                    BenchError::workspace_io(format!("creating {}", parent.display()), e)
                })?;
        }
        match file {
            PlannedFile::Module { text, .. } => fs::write(&dest, text),
            PlannedFile::Copy { source, .. } => fs::copy(source, &dest).map(|_| ()),
        }
        .map_err(|e| BenchError::workspace_io(format!("writing {}", dest.display()), e))?;
    }
    Ok(())
}

/// Discover, plan and write one candidate.
///
/// # Errors
/// See [`discover`], [`plan`] and [`write`].
#[instrument(skip_all, fields(candidate = %candidate.display_name, namespace = %namespace))]
pub fn isolate(
    candidate: &Candidate,
    source_roots: &[PathBuf],
    namespace: &Namespace,
    entry: &ModulePath,
    src_root: &Path,
) -> Result<IsolatedCandidate> {
    let sources = discover(candidate, source_roots)?;
    let isolated = plan(candidate, namespace, entry, &sources)?;
    write(&isolated, src_root)?;
    info!(
        modules = sources.modules.len(),
        resources = sources.resources.len(),
        "isolated candidate"
    );
    Ok(isolated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
