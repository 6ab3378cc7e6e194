//! A small, forgiving parser for the parts of an Elm module that namespace
//! isolation touches: the module header, the import block, and qualified
//! references in the body.
//!
//! The parser never builds an AST. It records byte spans so the rewriter can
//! splice new module paths into the original text and leave every other byte
//! alone (comments, formatting, export lists).
//!
//! ```text
//! header  = ["port" | "effect"] "module" path ["where" "{" ... "}"] "exposing" "(" ... ")"
//! import  = "import" path ["as" Upper] ["exposing" "(" ... ")"]
//! ```
//!
//! Whitespace, `--` line comments and nested `{- -}` block comments may
//! appear between any two tokens.

use std::fmt;
use std::ops::Range;

use crate::model::ModulePath;

// ---------------------------------------------------------------------------
// Parsed structures
// ---------------------------------------------------------------------------

/// Which flavor of module declaration a file uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// `module X exposing (..)`
    Plain,
    /// `port module X exposing (..)`
    Port,
    /// `effect module X where { .. } exposing (..)`
    Effect,
}

/// The module declaration at the top of an Elm file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleHeader {
    /// Declaration flavor.
    pub kind: HeaderKind,
    /// Declared module path.
    pub path: ModulePath,
    /// Byte span of the module path in the source.
    pub path_span: Range<usize>,
    /// The export list including its parentheses, verbatim.
    pub exposing: String,
}

/// One `import` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    /// Imported module path.
    pub path: ModulePath,
    /// Byte span of the module path in the source.
    pub path_span: Range<usize>,
    /// `as` alias, if any.
    pub alias: Option<String>,
}

/// A `Module.Path.name` style reference in the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedRef {
    /// Every uppercase segment before the referenced name.
    pub qualifier: Vec<String>,
    /// Byte offset where the reference starts.
    pub start: usize,
    /// Byte offset just past each qualifier segment (one per segment).
    pub segment_ends: Vec<usize>,
}

/// Header and imports of a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedModule {
    /// The module declaration.
    pub header: ModuleHeader,
    /// Imports in source order.
    pub imports: Vec<Import>,
    /// Byte offset where the declarations after the import block begin.
    pub body_start: usize,
}

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Why a module could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The file does not start with a module declaration.
    MissingHeader {
        /// 1-based line of the first unexpected token.
        line: usize,
    },
    /// An expected token was not found.
    Expected {
        /// What the parser was looking for.
        what: &'static str,
        /// 1-based line where it looked.
        line: usize,
    },
    /// A `{-` comment is never closed.
    UnterminatedComment {
        /// 1-based line where the comment starts.
        line: usize,
    },
    /// A bracketed group is never closed.
    Unbalanced {
        /// The opening delimiter.
        open: char,
        /// 1-based line where it starts.
        line: usize,
    },
    /// The module path is not a valid Elm module name.
    InvalidPath {
        /// The text that was read.
        text: String,
        /// 1-based line.
        line: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader { line } => {
                write!(f, "no module declaration (line {line})")
            }
            Self::Expected { what, line } => write!(f, "expected {what} on line {line}"),
            Self::UnterminatedComment { line } => {
                write!(f, "unterminated block comment starting on line {line}")
            }
            Self::Unbalanced { open, line } => {
                write!(f, "unclosed '{open}' starting on line {line}")
            }
            Self::InvalidPath { text, line } => {
                write!(f, "'{text}' is not a valid module name (line {line})")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse the header and import block of an Elm module.
///
/// # Errors
/// Returns [`ParseError`] when the header is missing or malformed. Problems
/// after the import block are not detected; that is the compiler's job.
pub fn parse_module(src: &str) -> Result<ParsedModule, ParseError> {
    let mut p = Scanner::new(src);
    let header = p.header()?;

    let mut imports = Vec::new();
    loop {
        p.skip_trivia()?;
        // Declarations in Elm start at column 0; so do imports.
        if !p.at_line_start() || !p.eat_keyword("import") {
            break;
        }
        imports.push(p.import()?);
    }

    Ok(ParsedModule {
        header,
        imports,
        body_start: p.pos,
    })
}

/// Find every qualified reference (`A.B.name`, `A.B.Type`) in `src[from..]`,
/// skipping comments, strings and character literals.
///
/// # Errors
/// Returns [`ParseError::UnterminatedComment`] if a block comment never
/// closes. Unterminated strings simply end the scan.
pub fn qualified_refs(src: &str, from: usize) -> Result<Vec<QualifiedRef>, ParseError> {
    let mut p = Scanner::new(src);
    p.pos = from;
    let mut refs = Vec::new();

    while let Some(c) = p.peek() {
        match c {
            '-' if p.starts_with("--") => p.skip_line(),
            '{' if p.starts_with("{-") => p.skip_block_comment()?,
            '"' => p.skip_string(),
            '\'' => p.skip_char_literal(),
            c if c.is_ascii_uppercase() && !p.prev_is_ident_or_dot() => {
                if let Some(r) = p.qualified_ref() {
                    refs.push(r);
                }
            }
            c if is_ident_char(c) => {
                // Consume the whole identifier so `fooBar.baz` never starts a
                // match at `B`.
                while p.peek().is_some_and(is_ident_char) {
                    p.bump();
                }
            }
            _ => p.bump(),
        }
    }
    Ok(refs)
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

const fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn line_at(&self, offset: usize) -> usize {
        self.src[..offset.min(self.src.len())]
            .bytes()
            .filter(|&b| b == b'\n')
            .count()
            + 1
    }

    fn line(&self) -> usize {
        self.line_at(self.pos)
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src.as_bytes()[self.pos - 1] == b'\n'
    }

    fn prev_is_ident_or_dot(&self) -> bool {
        self.src[..self.pos]
            .chars()
            .next_back()
            .is_some_and(|c| is_ident_char(c) || c == '.')
    }

    // -- trivia -------------------------------------------------------------

    fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start_line = self.line();
        let mut depth = 0usize;
        while !self.rest().is_empty() {
            if self.starts_with("{-") {
                depth += 1;
                self.pos += 2;
            } else if self.starts_with("-}") {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                self.bump();
            }
        }
        Err(ParseError::UnterminatedComment { line: start_line })
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.bump(),
                Some('-') if self.starts_with("--") => self.skip_line(),
                Some('{') if self.starts_with("{-") => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_string(&mut self) {
        let triple = self.starts_with("\"\"\"");
        self.pos += if triple { 3 } else { 1 };
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                self.bump();
            } else if triple && self.starts_with("\"\"\"") {
                self.pos += 3;
                return;
            } else if !triple && c == '"' {
                self.bump();
                return;
            } else if !triple && c == '\n' {
                // Not valid Elm; stop here rather than swallow the file.
                return;
            } else {
                self.bump();
            }
        }
    }

    fn skip_char_literal(&mut self) {
        self.bump();
        if self.peek() == Some('\\') {
            self.bump();
        }
        self.bump();
        while let Some(c) = self.peek() {
            self.bump();
            if c == '\'' || c == '\n' {
                return;
            }
        }
    }

    // -- tokens -------------------------------------------------------------

    /// Consume `kw` if it appears here as a whole word.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        if !self.starts_with(kw) {
            return false;
        }
        let after = self.src[self.pos + kw.len()..].chars().next();
        if after.is_some_and(is_ident_char) {
            return false;
        }
        self.pos += kw.len();
        true
    }

    fn expect_keyword(&mut self, kw: &'static str) -> Result<(), ParseError> {
        self.skip_trivia()?;
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(ParseError::Expected {
                what: kw,
                line: self.line(),
            })
        }
    }

    fn module_path(&mut self) -> Result<(ModulePath, Range<usize>), ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        loop {
            while self.peek().is_some_and(is_ident_char) {
                self.bump();
            }
            let continues = self.starts_with(".")
                && self.src[self.pos + 1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_uppercase());
            if !continues {
                break;
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        if text.is_empty() {
            return Err(ParseError::Expected {
                what: "module name",
                line: self.line(),
            });
        }
        let path = ModulePath::parse(text).map_err(|_| ParseError::InvalidPath {
            text: text.to_owned(),
            line: self.line_at(start),
        })?;
        Ok((path, start..self.pos))
    }

    /// Consume a bracketed group starting at the current position and return
    /// its span. Comments inside are skipped so a `)` in a comment does not
    /// close the group.
    fn balanced(&mut self, open: char, close: char) -> Result<Range<usize>, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        let start_line = self.line();
        if self.peek() != Some(open) {
            return Err(ParseError::Expected {
                what: if open == '(' { "'('" } else { "'{'" },
                line: start_line,
            });
        }
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            if self.starts_with("{-") {
                self.skip_block_comment()?;
                continue;
            }
            if self.starts_with("--") {
                self.skip_line();
                continue;
            }
            self.bump();
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(start..self.pos);
                }
            }
        }
        Err(ParseError::Unbalanced {
            open,
            line: start_line,
        })
    }

    // -- grammar ------------------------------------------------------------

    fn header(&mut self) -> Result<ModuleHeader, ParseError> {
        self.skip_trivia()?;
        let kind = if self.eat_keyword("port") {
            HeaderKind::Port
        } else if self.eat_keyword("effect") {
            HeaderKind::Effect
        } else {
            HeaderKind::Plain
        };
        if kind == HeaderKind::Plain {
            if !self.eat_keyword("module") {
                return Err(ParseError::MissingHeader { line: self.line() });
            }
        } else {
            self.expect_keyword("module")?;
        }

        let (path, path_span) = self.module_path()?;

        if kind == HeaderKind::Effect {
            self.expect_keyword("where")?;
            self.balanced('{', '}')?;
        }

        self.expect_keyword("exposing")?;
        let exposing_span = self.balanced('(', ')')?;

        Ok(ModuleHeader {
            kind,
            path,
            path_span,
            exposing: self.src[exposing_span].to_owned(),
        })
    }

    /// Parse the remainder of an import after the `import` keyword.
    fn import(&mut self) -> Result<Import, ParseError> {
        let (path, path_span) = self.module_path()?;
        let checkpoint = self.pos;

        self.skip_trivia()?;
        let alias = if self.eat_keyword("as") {
            let (alias, _) = self.module_path()?;
            Some(alias.to_string())
        } else {
            None
        };

        let before_exposing = self.pos;
        self.skip_trivia()?;
        if self.eat_keyword("exposing") {
            self.balanced('(', ')')?;
        } else {
            self.pos = if alias.is_some() {
                before_exposing
            } else {
                checkpoint
            };
        }

        Ok(Import {
            path,
            path_span,
            alias,
        })
    }

    /// Read an uppercase-led dotted chain and report it if it qualifies a
    /// name (i.e. has at least one segment before the final one).
    fn qualified_ref(&mut self) -> Option<QualifiedRef> {
        let start = self.pos;
        let mut segments: Vec<(String, usize)> = Vec::new();
        loop {
            let seg_start = self.pos;
            while self.peek().is_some_and(is_ident_char) {
                self.bump();
            }
            segments.push((self.src[seg_start..self.pos].to_owned(), self.pos));
            let next_is_segment = self.starts_with(".")
                && self.src[self.pos + 1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if !next_is_segment {
                break;
            }
            self.bump();
        }

        // The last segment is the referenced name; the qualifier is every
        // uppercase segment before it.
        segments.pop()?;
        let qualifier_len = segments
            .iter()
            .take_while(|(s, _)| s.starts_with(|c: char| c.is_ascii_uppercase()))
            .count();
        if qualifier_len == 0 {
            return None;
        }
        segments.truncate(qualifier_len);
        Some(QualifiedRef {
            qualifier: segments.iter().map(|(s, _)| s.clone()).collect(),
            start,
            segment_ends: segments.iter().map(|(_, end)| *end).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
