//! Core value types for elm-bench.
//!
//! Foundation types used throughout the pipeline: candidate namespaces, Elm
//! module paths and package versions. Every type validates on construction so
//! the rest of the pipeline can rely on well-formed values.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// A validated candidate namespace, e.g. `Old` or `Newv2`.
///
/// The namespace prefixes every module copied from a candidate, so it must be
/// a single valid Elm module segment: an ASCII uppercase letter followed by
/// lowercase letters and digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Derive a namespace from the label the user passed for a candidate.
    ///
    /// Takes the last path component, keeps ASCII alphanumerics, lowercases
    /// it and capitalizes the first letter: `./impl/NEW-v2/` becomes `Newv2`.
    ///
    /// # Errors
    /// Returns an error if no usable path component exists or the result does
    /// not start with a letter.
    pub fn from_display_name(display_name: &str) -> Result<Self, ValidationError> {
        let trimmed = display_name.trim_end_matches(['/', '\\']);
        let last = Path::new(trimmed)
            .components()
            .next_back()
            .and_then(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .ok_or_else(|| ValidationError {
                kind: ErrorKind::Namespace,
                value: display_name.to_owned(),
                reason: "no directory name to derive a namespace from; \
                         pass the candidate by its directory name"
                    .to_owned(),
            })?;

        let normalized: String = last
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let mut chars = normalized.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };

        Self::new(&capitalized).map_err(|mut e| {
            e.value = display_name.to_owned();
            e
        })
    }

    /// Create a namespace from an already-normalized string.
    ///
    /// # Errors
    /// Returns an error if the string is not a single capitalized segment.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the namespace as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let Some(first) = s.chars().next() else {
            return Err(ValidationError {
                kind: ErrorKind::Namespace,
                value: s.to_owned(),
                reason: "namespace must contain at least one letter or digit".to_owned(),
            });
        };
        if !first.is_ascii_uppercase() {
            return Err(ValidationError {
                kind: ErrorKind::Namespace,
                value: s.to_owned(),
                reason: "namespace must start with a letter".to_owned(),
            });
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError {
                kind: ErrorKind::Namespace,
                value: s.to_owned(),
                reason: "namespace must contain only ASCII letters and digits".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

// ---------------------------------------------------------------------------
// ModulePath
// ---------------------------------------------------------------------------

/// A validated dotted Elm module path, e.g. `Data.Tree.Zipper`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Parse a dotted module path.
    ///
    /// # Errors
    /// Returns an error if any segment is empty, does not start with an
    /// uppercase letter, or contains characters other than `[A-Za-z0-9_]`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let segments: Vec<String> = s.split('.').map(str::to_owned).collect();
        for segment in &segments {
            Self::validate_segment(s, segment)?;
        }
        Ok(Self(segments))
    }

    /// Derive the module path implied by a file location relative to a
    /// source directory: `Data/Tree.elm` → `Data.Tree`.
    ///
    /// Returns `None` if the file is not an `.elm` file or a directory name
    /// is not a valid module segment.
    #[must_use]
    pub fn from_relative_file(rel: &Path) -> Option<Self> {
        if rel.extension().and_then(|e| e.to_str()) != Some("elm") {
            return None;
        }
        let stem = rel.with_extension("");
        let mut segments = Vec::new();
        for component in stem.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            segments.push(part.to_str()?.to_owned());
        }
        Self::parse(&segments.join(".")).ok()
    }

    /// Return a new path with `namespace` prepended.
    #[must_use]
    pub fn prefixed(&self, namespace: &Namespace) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(namespace.as_str().to_owned());
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// Whether the first segment of this path is `namespace`.
    #[must_use]
    pub fn starts_with(&self, namespace: &Namespace) -> bool {
        self.0.first().map(String::as_str) == Some(namespace.as_str())
    }

    /// The path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a module path has at least one segment.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate_segment(whole: &str, segment: &str) -> Result<(), ValidationError> {
        let mut chars = segment.chars();
        match chars.next() {
            None => Err(ValidationError {
                kind: ErrorKind::ModulePath,
                value: whole.to_owned(),
                reason: "module path segments must not be empty".to_owned(),
            }),
            Some(c) if !c.is_ascii_uppercase() => Err(ValidationError {
                kind: ErrorKind::ModulePath,
                value: whole.to_owned(),
                reason: format!("segment '{segment}' must start with an uppercase letter"),
            }),
            Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                Err(ValidationError {
                    kind: ErrorKind::ModulePath,
                    value: whole.to_owned(),
                    reason: format!(
                        "segment '{segment}' may only contain letters, digits and '_'"
                    ),
                })
            }
            Some(_) => Ok(()),
        }
    }
}

impl From<&Namespace> for ModulePath {
    fn from(ns: &Namespace) -> Self {
        Self(vec![ns.as_str().to_owned()])
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for ModulePath {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A package version as Elm writes it: exactly `MAJOR.MINOR.PATCH`.
///
/// Ordering is numeric per component, so `1.10.0 > 1.9.3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl Version {
    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `MAJOR.MINOR.PATCH` string.
    ///
    /// # Errors
    /// Returns an error if the string does not have exactly three numeric
    /// components.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError {
            kind: ErrorKind::Version,
            value: s.to_owned(),
            reason: reason.to_owned(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        let &[major, minor, patch] = parts.as_slice() else {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        };
        let component = |p: &str| -> Result<u32, ValidationError> {
            if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("version components must be plain decimal numbers"));
            }
            p.parse::<u32>()
                .map_err(|_| invalid("version component out of range"))
        };
        Ok(Self::new(
            component(major)?,
            component(minor)?,
            component(patch)?,
        ))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// The kind of value that failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A [`Namespace`] validation error.
    Namespace,
    /// A [`ModulePath`] validation error.
    ModulePath,
    /// A [`Version`] validation error.
    Version,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace => write!(f, "namespace"),
            Self::ModulePath => write!(f, "module path"),
            Self::Version => write!(f, "version"),
        }
    }
}

/// A validation error for elm-bench core types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} {:?}: {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // -- Namespace --

    #[test]
    fn namespace_from_simple_name() {
        let ns = Namespace::from_display_name("old").unwrap();
        assert_eq!(ns.as_str(), "Old");
    }

    #[test]
    fn namespace_from_nested_path_with_trailing_slash() {
        let ns = Namespace::from_display_name("./impl/NEW-v2/").unwrap();
        assert_eq!(ns.as_str(), "Newv2");
    }

    #[test]
    fn namespace_case_normalized() {
        let a = Namespace::from_display_name("FastSort").unwrap();
        let b = Namespace::from_display_name("fastsort").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Fastsort");
    }

    #[test]
    fn namespace_rejects_leading_digit() {
        let err = Namespace::from_display_name("2fast").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Namespace);
        assert_eq!(err.value, "2fast");
    }

    #[test]
    fn namespace_rejects_dot() {
        assert!(Namespace::from_display_name(".").is_err());
        assert!(Namespace::from_display_name("..").is_err());
        assert!(Namespace::from_display_name("").is_err());
    }

    #[test]
    fn namespace_rejects_punctuation_only() {
        let err = Namespace::from_display_name("---").unwrap_err();
        assert!(err.reason.contains("at least one"));
    }

    // -- ModulePath --

    #[test]
    fn module_path_parse_and_display() {
        let p = ModulePath::parse("Data.Tree.Zipper").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.to_string(), "Data.Tree.Zipper");
    }

    #[test]
    fn module_path_rejects_lowercase_segment() {
        assert!(ModulePath::parse("Data.tree").is_err());
        assert!(ModulePath::parse("Data..Tree").is_err());
        assert!(ModulePath::parse("Data.Tr-ee").is_err());
    }

    #[test]
    fn module_path_from_relative_file() {
        let p = ModulePath::from_relative_file(&PathBuf::from("Data/Tree.elm")).unwrap();
        assert_eq!(p.to_string(), "Data.Tree");
        assert!(ModulePath::from_relative_file(&PathBuf::from("data/tree.elm")).is_none());
        assert!(ModulePath::from_relative_file(&PathBuf::from("Data/Tree.js")).is_none());
    }

    #[test]
    fn module_path_prefixed() {
        let ns = Namespace::new("Old").unwrap();
        let p = ModulePath::parse("Utils.Sort").unwrap().prefixed(&ns);
        assert_eq!(p.to_string(), "Old.Utils.Sort");
        assert!(p.starts_with(&ns));
    }

    // -- Version --

    #[test]
    fn version_numeric_ordering() {
        let a = Version::parse("1.9.3").unwrap();
        let b = Version::parse("1.10.0").unwrap();
        assert!(b > a, "semantic comparison, not lexicographic");
    }

    #[test]
    fn version_round_trips_display() {
        assert_eq!(Version::parse("1.0.5").unwrap().to_string(), "1.0.5");
    }

    #[test]
    fn version_rejects_non_conforming() {
        for bad in ["1.0", "1.0.0.0", "v1.0.0", "1.x.0", "", "1.0.0-beta", "+1.0.0"] {
            let err = Version::parse(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Version, "{bad}");
        }
    }

    #[test]
    fn version_deserializes_from_json_string() {
        let v: Version = serde_json::from_str("\"1.2.3\"").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
        assert!(serde_json::from_str::<Version>("\"1.2\"").is_err());
    }

    // -- ValidationError --

    #[test]
    fn validation_error_display_names_value() {
        let err = Version::parse("1.x.0").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("version"));
        assert!(msg.contains("1.x.0"));
    }
}
