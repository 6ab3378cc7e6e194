//! Driver synthesis.
//!
//! The driver (`src/Main.elm`) is assembled from explicit parts through
//! [`DriverBuilder`] and rendered by [`DriverModule::render`]. Every part is
//! set exactly once; a missing or repeated part means the pipeline is wired
//! wrong, so it surfaces as a [`SynthesisError`] rather than a user error.

use std::fmt;
use std::fmt::Write as _;

use crate::error::BenchError;
use crate::model::ModulePath;

/// A part of the driver module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    /// Benchmark label.
    Label,
    /// Benchmarked function name.
    Function,
    /// Candidate entry modules.
    Candidates,
    /// Positional argument expressions.
    Arguments,
    /// Extra imports available to argument expressions.
    Imports,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Label => "label",
            Self::Function => "function",
            Self::Candidates => "candidates",
            Self::Arguments => "arguments",
            Self::Imports => "imports",
        };
        f.write_str(name)
    }
}

/// Driver assembly errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SynthesisError {
    /// A part was set twice.
    Duplicate(Component),
    /// A required part was never set.
    Missing(Component),
    /// A list part was set to an empty list.
    Empty(Component),
    /// The function name is not a lowercase Elm identifier.
    InvalidFunction(String),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(c) => write!(f, "driver {c} set more than once"),
            Self::Missing(c) => write!(f, "driver {c} never set"),
            Self::Empty(c) => write!(f, "driver {c} is empty"),
            Self::InvalidFunction(name) => {
                write!(f, "{name:?} is not an Elm function name")
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

impl From<SynthesisError> for BenchError {
    fn from(err: SynthesisError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Whether `name` can be referenced as `Module.name` in Elm.
#[must_use]
pub fn is_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !ELM_KEYWORDS.contains(&name)
}

const ELM_KEYWORDS: &[&str] = &[
    "if", "then", "else", "case", "of", "let", "in", "type", "module", "where", "import",
    "exposing", "as", "port", "alias", "infix", "effect",
];

/// One candidate in the suite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteEntry {
    /// Display name, used as the benchmark label and to match results.
    pub label: String,
    /// The candidate's rewritten entry module.
    pub module: ModulePath,
}

/// One top-level argument binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    /// `arg0`, `arg1`, ...
    pub name: String,
    /// Elm expression text, verbatim.
    pub expr: String,
}

/// The assembled driver, ready to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverModule {
    /// Benchmark label.
    pub label: String,
    /// Function applied in every candidate.
    pub function: String,
    /// Imported module names, in render order.
    pub imports: Vec<String>,
    /// Argument bindings, in positional order.
    pub bindings: Vec<Binding>,
    /// Candidates, in input order.
    pub suite: Vec<SuiteEntry>,
}

/// Builder for [`DriverModule`].
#[derive(Debug, Default)]
pub struct DriverBuilder {
    label: Option<String>,
    function: Option<String>,
    candidates: Option<Vec<SuiteEntry>>,
    arguments: Option<Vec<String>>,
    imports: Option<Vec<ModulePath>>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, component: Component) -> Result<(), SynthesisError> {
    if slot.is_some() {
        return Err(SynthesisError::Duplicate(component));
    }
    *slot = Some(value);
    Ok(())
}

impl DriverBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the benchmark label.
    ///
    /// # Errors
    /// [`SynthesisError::Duplicate`] if already set.
    pub fn label(&mut self, label: impl Into<String>) -> Result<&mut Self, SynthesisError> {
        set_once(&mut self.label, label.into(), Component::Label)?;
        Ok(self)
    }

    /// Set the function every candidate is called through.
    ///
    /// # Errors
    /// Duplicate or not an Elm function name.
    pub fn function(&mut self, name: impl Into<String>) -> Result<&mut Self, SynthesisError> {
        let name = name.into();
        if !is_function_name(&name) {
            return Err(SynthesisError::InvalidFunction(name));
        }
        set_once(&mut self.function, name, Component::Function)?;
        Ok(self)
    }

    /// Set the candidates as `(display name, rewritten entry module)`.
    ///
    /// # Errors
    /// Duplicate or empty.
    pub fn candidates<I, S>(&mut self, candidates: I) -> Result<&mut Self, SynthesisError>
    where
        I: IntoIterator<Item = (S, ModulePath)>,
        S: Into<String>,
    {
        let entries: Vec<SuiteEntry> = candidates
            .into_iter()
            .map(|(label, module)| SuiteEntry {
                label: label.into(),
                module,
            })
            .collect();
        if entries.is_empty() {
            return Err(SynthesisError::Empty(Component::Candidates));
        }
        set_once(&mut self.candidates, entries, Component::Candidates)?;
        Ok(self)
    }

    /// Set the positional argument expressions.
    ///
    /// # Errors
    /// Duplicate or empty.
    pub fn arguments<I, S>(&mut self, args: I) -> Result<&mut Self, SynthesisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(SynthesisError::Empty(Component::Arguments));
        }
        set_once(&mut self.arguments, args, Component::Arguments)?;
        Ok(self)
    }

    /// Add modules argument expressions may refer to. Optional.
    ///
    /// # Errors
    /// [`SynthesisError::Duplicate`] if already set.
    pub fn imports(
        &mut self,
        modules: impl IntoIterator<Item = ModulePath>,
    ) -> Result<&mut Self, SynthesisError> {
        set_once(&mut self.imports, modules.into_iter().collect(), Component::Imports)?;
        Ok(self)
    }

    /// Assemble the driver.
    ///
    /// # Errors
    /// [`SynthesisError::Missing`] for any required part not set.
    pub fn build(self) -> Result<DriverModule, SynthesisError> {
        let label = self.label.ok_or(SynthesisError::Missing(Component::Label))?;
        let function = self
            .function
            .ok_or(SynthesisError::Missing(Component::Function))?;
        let suite = self
            .candidates
            .ok_or(SynthesisError::Missing(Component::Candidates))?;
        let arguments = self
            .arguments
            .ok_or(SynthesisError::Missing(Component::Arguments))?;

        let mut imports = vec!["Benchmark".to_owned(), "BenchRunner".to_owned()];
        let extra = self.imports.into_iter().flatten();
        for module in extra.chain(suite.iter().map(|e| e.module.clone())) {
            let name = module.to_string();
            if !imports.contains(&name) {
                imports.push(name);
            }
        }

        let bindings = arguments
            .into_iter()
            .enumerate()
            .map(|(i, expr)| Binding {
                name: format!("arg{i}"),
                expr,
            })
            .collect();

        Ok(DriverModule {
            label,
            function,
            imports,
            bindings,
            suite,
        })
    }
}

impl DriverModule {
    /// Render as Elm source.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("module Main exposing (main)\n\n");
        for import in &self.imports {
            let _ = writeln!(out, "import {import}");
        }

        for binding in &self.bindings {
            let _ = write!(out, "\n\n{} =\n", binding.name);
            for line in binding.expr.lines() {
                if line.trim().is_empty() {
                    out.push('\n');
                } else {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }

        let application: String = self
            .bindings
            .iter()
            .map(|b| format!(" {}", b.name))
            .collect();

        out.push_str("\n\nmain =\n    BenchRunner.program <|\n");
        let _ = writeln!(out, "        Benchmark.scale {}", elm_string(&self.label));
        for (i, entry) in self.suite.iter().enumerate() {
            let open = if i == 0 { '[' } else { ',' };
            let _ = writeln!(
                out,
                "            {open} ( {}, \\_ -> {}.{}{application} )",
                elm_string(&entry.label),
                entry.module,
                self.function,
            );
        }
        out.push_str("            ]\n");
        out
    }
}

/// Quote `s` as an Elm string literal.
#[must_use]
pub fn elm_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:04X}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
