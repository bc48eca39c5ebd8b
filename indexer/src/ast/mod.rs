//! Interface to the compiler front end.
//!
//! The engine never parses source text itself. A [`FrontEnd`] turns a file plus its
//! argument list into a [`TranslationUnit`], whose cursors expose the semantic
//! information the resolver needs.

mod dump;
mod kind;

pub use dump::DumpCursor;
pub use dump::DumpFrontEnd;
pub use dump::DumpUnit;
pub use dump::InMemoryFrontEnd;
pub use dump::NodeDump;
pub use dump::UnitDump;
pub use kind::CursorCategory;
pub use kind::CursorKind;

use crate::error::ParseError;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// Instantiation location of a cursor (macro expansions report the expansion site).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

/// Non-fatal issue reported by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    pub message: String,
}

/// One file pulled in while parsing a translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inclusion {
    pub file: PathBuf,
    /// Include chain: the first element includes `file`, the last one is the main file.
    #[serde(default)]
    pub stack: Vec<PathBuf>,
}

/// Verdict returned for each visited cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildVisit {
    /// Stop the traversal.
    Break,
    /// Move on to the next sibling without descending.
    Continue,
    /// Descend into the children.
    Recurse,
}

pub trait Cursor: Clone {
    fn kind(&self) -> CursorKind;

    fn location(&self) -> Option<SourceLocation>;

    fn display_name(&self) -> String;

    fn semantic_parent(&self) -> Option<Self>;

    fn referenced(&self) -> Option<Self>;

    fn definition(&self) -> Option<Self>;

    /// Whether the cursor carries a concrete (valid) type.
    fn has_type(&self) -> bool;

    fn type_declaration(&self) -> Option<Self>;

    /// Definition flag as computed by the front end.
    fn is_definition(&self) -> bool;

    /// File named by an inclusion directive.
    fn included_file(&self) -> Option<PathBuf>;

    fn children(&self) -> Vec<Self>;
}

pub trait TranslationUnit {
    type Cursor: Cursor;

    fn root(&self) -> Self::Cursor;

    fn diagnostics(&self) -> Vec<Diagnostic>;

    fn inclusions(&self) -> Vec<Inclusion>;
}

pub trait FrontEnd: Send + Sync + 'static {
    type Unit: TranslationUnit;

    fn parse(&self, file: &Path, args: &[String]) -> Result<Self::Unit, ParseError>;
}

/// Depth-first walk over the descendants of `root`, in source order.
///
/// `root` itself is not passed to `visit`.
pub fn visit_children<C, F>(root: &C, mut visit: F)
where
    C: Cursor,
    F: FnMut(&C) -> ChildVisit,
{
    let mut stack: Vec<C> = root.children().into_iter().rev().collect();
    while let Some(cursor) = stack.pop() {
        match visit(&cursor) {
            ChildVisit::Break => return,
            ChildVisit::Continue => {}
            ChildVisit::Recurse => stack.extend(cursor.children().into_iter().rev()),
        }
    }
}
