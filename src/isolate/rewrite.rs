//! Text splicing for namespace isolation.
//!
//! Given a parsed module and a map from original to rewritten module paths,
//! produce the new source text. Only module paths change; every other byte of
//! the input is copied through.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::model::ModulePath;

use super::parse::{ParseError, ParsedModule, qualified_refs};

/// Original module path → rewritten module path, for one candidate.
pub type RenameMap = BTreeMap<ModulePath, ModulePath>;

/// Rewrite one module's source.
///
/// - The declared module path becomes `new_path`.
/// - Imports of modules in `renames` point at their rewritten path. A
///   single-segment import without an alias keeps its old name as alias, so
///   `Utils.helper` in the body still resolves.
/// - For multi-segment imports without an alias (aliases cannot contain
///   dots), qualified references in the body are rewritten instead.
/// - Imports not in `renames` are left exactly as written.
///
/// # Errors
/// Propagates [`ParseError`] from scanning the body for qualified references.
pub fn rewrite_module(
    src: &str,
    parsed: &ParsedModule,
    new_path: &ModulePath,
    renames: &RenameMap,
) -> Result<String, ParseError> {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    edits.push((parsed.header.path_span.clone(), new_path.to_string()));

    let mut qualified: BTreeMap<Vec<String>, &ModulePath> = BTreeMap::new();
    for import in &parsed.imports {
        let Some(target) = renames.get(&import.path) else {
            continue;
        };
        let mut replacement = target.to_string();
        if import.alias.is_none() {
            if import.path.len() == 1 {
                replacement.push_str(" as ");
                replacement.push_str(&import.path.to_string());
            } else {
                qualified.insert(import.path.segments().to_vec(), target);
            }
        }
        edits.push((import.path_span.clone(), replacement));
    }

    if !qualified.is_empty() {
        for r in qualified_refs(src, parsed.body_start)? {
            // Longest qualifier prefix that names a renamed module wins:
            // `Data.Tree.Node` may be module `Data.Tree` + constructor `Node`.
            let hit = (1..=r.qualifier.len())
                .rev()
                .find_map(|k| qualified.get(&r.qualifier[..k]).map(|t| (k, *t)));
            if let Some((k, target)) = hit {
                edits.push((r.start..r.segment_ends[k - 1], target.to_string()));
            }
        }
    }

    edits.sort_by_key(|(range, _)| range.start);

    let mut out = String::with_capacity(src.len() + edits.len() * 8);
    let mut cursor = 0;
    for (range, replacement) in edits {
        debug_assert!(range.start >= cursor, "overlapping edits");
        out.push_str(&src[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&src[cursor..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
