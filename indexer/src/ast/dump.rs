//! Serialized translation units.
//!
//! A [`UnitDump`] is a self-contained JSON description of one parsed file: every
//! cursor with its location and semantic links, plus diagnostics and the include
//! graph. It lets the indexer run against output captured from any compiler front end.

use super::Cursor;
use super::CursorKind;
use super::Diagnostic;
use super::FrontEnd;
use super::Inclusion;
use super::SourceLocation;
use super::TranslationUnit;
use crate::error::ParseError;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

const DUMP_EXTENSION: &str = "ast.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDump {
    pub kind: CursorKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_parent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_declaration: Option<usize>,
    #[serde(default)]
    pub has_type: bool,
    #[serde(default)]
    pub is_definition: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_file: Option<PathBuf>,
}

impl NodeDump {
    pub fn new(kind: CursorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            location: None,
            children: Vec::new(),
            semantic_parent: None,
            referenced: None,
            definition: None,
            type_declaration: None,
            has_type: false,
            is_definition: false,
            included_file: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32, offset: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
            column,
            offset,
        });
        self
    }

    pub fn defining(mut self) -> Self {
        self.is_definition = true;
        self
    }

    pub fn including(mut self, file: impl Into<PathBuf>) -> Self {
        self.included_file = Some(file.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDump {
    pub file: PathBuf,
    pub nodes: Vec<NodeDump>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default)]
    pub inclusions: Vec<Inclusion>,
}

impl UnitDump {
    /// Id of the translation-unit node.
    pub const ROOT: usize = 0;

    pub fn new(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let root = NodeDump::new(CursorKind::TranslationUnit, file.to_string_lossy());
        Self {
            file,
            nodes: vec![root],
            diagnostics: Vec::new(),
            inclusions: Vec::new(),
        }
    }

    /// Appends `node` as the last lexical child of `parent` and returns its id.
    ///
    /// The semantic parent defaults to the lexical one.
    pub fn push(&mut self, parent: usize, mut node: NodeDump) -> usize {
        let id = self.nodes.len();
        if node.semantic_parent.is_none() {
            node.semantic_parent = Some(parent);
        }
        self.nodes.push(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    pub fn set_definition(&mut self, id: usize, definition: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.definition = Some(definition);
        }
    }

    pub fn set_referenced(&mut self, id: usize, target: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.referenced = Some(target);
        }
    }

    pub fn set_semantic_parent(&mut self, id: usize, parent: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.semantic_parent = Some(parent);
        }
    }

    pub fn set_type_declaration(&mut self, id: usize, declaration: usize) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.has_type = true;
            node.type_declaration = Some(declaration);
        }
    }

    pub fn include(&mut self, file: impl Into<PathBuf>, stack: Vec<PathBuf>) {
        self.inclusions.push(Inclusion {
            file: file.into(),
            stack,
        });
    }

    /// Checks that the child lists form a tree and every link points inside the dump.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.nodes.is_empty() {
            return Err(ParseError::new(&self.file, "dump has no root node"));
        }
        let len = self.nodes.len();
        let mut has_parent = vec![false; len];
        for (id, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                if child == Self::ROOT || has_parent.get(child).copied().unwrap_or(false) {
                    return Err(ParseError::new(
                        &self.file,
                        format!("node {child} is listed as a child more than once (via {id})"),
                    ));
                }
                if let Some(slot) = has_parent.get_mut(child) {
                    *slot = true;
                }
            }
        }
        for (id, node) in self.nodes.iter().enumerate() {
            let links = node
                .children
                .iter()
                .copied()
                .chain(node.semantic_parent)
                .chain(node.referenced)
                .chain(node.definition)
                .chain(node.type_declaration);
            for link in links {
                if link >= len {
                    return Err(ParseError::new(
                        &self.file,
                        format!("node {id} links to missing node {link}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parsed unit backed by a shared dump.
#[derive(Debug, Clone)]
pub struct DumpUnit {
    dump: Arc<UnitDump>,
}

impl DumpUnit {
    pub fn new(dump: UnitDump) -> Self {
        Self {
            dump: Arc::new(dump),
        }
    }

    fn from_shared(dump: Arc<UnitDump>) -> Self {
        Self { dump }
    }

    /// Cursor for node `id`, if it exists.
    pub fn cursor(&self, id: usize) -> Option<DumpCursor> {
        (id < self.dump.nodes.len()).then(|| DumpCursor {
            unit: Arc::clone(&self.dump),
            id,
        })
    }
}

impl TranslationUnit for DumpUnit {
    type Cursor = DumpCursor;

    fn root(&self) -> DumpCursor {
        DumpCursor {
            unit: Arc::clone(&self.dump),
            id: UnitDump::ROOT,
        }
    }

    fn diagnostics(&self) -> Vec<Diagnostic> {
        self.dump.diagnostics.clone()
    }

    fn inclusions(&self) -> Vec<Inclusion> {
        self.dump.inclusions.clone()
    }
}

#[derive(Debug, Clone)]
pub struct DumpCursor {
    unit: Arc<UnitDump>,
    id: usize,
}

impl DumpCursor {
    fn node(&self) -> Option<&NodeDump> {
        self.unit.nodes.get(self.id)
    }

    fn link(&self, select: impl Fn(&NodeDump) -> Option<usize>) -> Option<Self> {
        let id = self.node().and_then(select)?;
        (id < self.unit.nodes.len()).then(|| Self {
            unit: Arc::clone(&self.unit),
            id,
        })
    }
}

impl Cursor for DumpCursor {
    fn kind(&self) -> CursorKind {
        self.node()
            .map(|node| node.kind)
            .unwrap_or(CursorKind::InvalidCode)
    }

    fn location(&self) -> Option<SourceLocation> {
        self.node().and_then(|node| node.location.clone())
    }

    fn display_name(&self) -> String {
        self.node().map(|node| node.name.clone()).unwrap_or_default()
    }

    fn semantic_parent(&self) -> Option<Self> {
        self.link(|node| node.semantic_parent)
    }

    fn referenced(&self) -> Option<Self> {
        self.link(|node| node.referenced)
    }

    fn definition(&self) -> Option<Self> {
        self.link(|node| node.definition)
    }

    fn has_type(&self) -> bool {
        self.node().is_some_and(|node| node.has_type)
    }

    fn type_declaration(&self) -> Option<Self> {
        self.link(|node| node.type_declaration)
    }

    fn is_definition(&self) -> bool {
        self.node().is_some_and(|node| node.is_definition)
    }

    fn included_file(&self) -> Option<PathBuf> {
        self.node().and_then(|node| node.included_file.clone())
    }

    fn children(&self) -> Vec<Self> {
        let Some(node) = self.node() else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter(|id| **id < self.unit.nodes.len())
            .map(|id| Self {
                unit: Arc::clone(&self.unit),
                id: *id,
            })
            .collect()
    }
}

/// Front end that loads `<source>.ast.json` dumps from disk.
///
/// Without an `ast_dir` the dump sits next to the source file; with one, the
/// source's absolute path is mirrored below that directory.
#[derive(Debug, Clone, Default)]
pub struct DumpFrontEnd {
    ast_dir: Option<PathBuf>,
}

impl DumpFrontEnd {
    pub fn new(ast_dir: Option<PathBuf>) -> Self {
        Self { ast_dir }
    }

    pub fn dump_path(&self, source: &Path) -> PathBuf {
        let base = match &self.ast_dir {
            Some(dir) => {
                let relative: PathBuf = source
                    .components()
                    .filter(|component| matches!(component, Component::Normal(_)))
                    .collect();
                dir.join(relative)
            }
            None => source.to_path_buf(),
        };
        let mut name = base.file_name().map(OsString::from).unwrap_or_default();
        name.push(".");
        name.push(DUMP_EXTENSION);
        base.with_file_name(name)
    }

    pub fn load(&self, source: &Path) -> Result<UnitDump, ParseError> {
        let path = self.dump_path(source);
        let content = fs::read_to_string(&path).map_err(|err| {
            ParseError::new(source, format!("can't read {}: {err}", path.display()))
        })?;
        let dump: UnitDump = serde_json::from_str(&content).map_err(|err| {
            ParseError::new(source, format!("malformed {}: {err}", path.display()))
        })?;
        dump.validate()?;
        Ok(dump)
    }
}

impl FrontEnd for DumpFrontEnd {
    type Unit = DumpUnit;

    fn parse(&self, file: &Path, args: &[String]) -> Result<DumpUnit, ParseError> {
        trace!("loading dump for {} ({} args)", file.display(), args.len());
        self.load(file).map(DumpUnit::new)
    }
}

/// Front end over dumps registered up front, keyed by their `file`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFrontEnd {
    units: HashMap<PathBuf, Arc<UnitDump>>,
}

impl InMemoryFrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dump: UnitDump) {
        self.units.insert(dump.file.clone(), Arc::new(dump));
    }

    pub fn with(mut self, dump: UnitDump) -> Self {
        self.insert(dump);
        self
    }
}

impl FrontEnd for InMemoryFrontEnd {
    type Unit = DumpUnit;

    fn parse(&self, file: &Path, _args: &[String]) -> Result<DumpUnit, ParseError> {
        let dump = self
            .units
            .get(file)
            .ok_or_else(|| ParseError::new(file, "no unit registered"))?;
        dump.validate()?;
        Ok(DumpUnit::from_shared(Arc::clone(dump)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn unit_with_reference() -> UnitDump {
        let mut dump = UnitDump::new("/src/a.cpp");
        let decl = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::FunctionDecl, "f()").at("/src/a.cpp", 1, 6, 5),
        );
        let call = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::DeclRefExpr, "f").at("/src/a.cpp", 2, 1, 12),
        );
        dump.set_referenced(call, decl);
        dump
    }

    #[test]
    fn json_round_trip_preserves_links() {
        let dump = unit_with_reference();
        let json = dump.to_json().expect("serialize");
        let parsed: UnitDump = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, dump);
    }

    #[test]
    fn validate_rejects_dangling_links() {
        let mut dump = unit_with_reference();
        dump.set_referenced(1, 42);
        let err = dump.validate().expect_err("dangling link");
        assert!(err.reason.contains("missing node 42"));
    }

    #[test]
    fn validate_rejects_shared_children() {
        let mut dump = unit_with_reference();
        dump.nodes[1].children.push(2);
        let err = dump.validate().expect_err("child listed twice");
        assert!(err.reason.contains("node 2"));
    }

    #[test]
    fn dump_path_mirrors_absolute_source_under_ast_dir() {
        let front_end = DumpFrontEnd::new(Some(PathBuf::from("/tmp/ast")));
        assert_eq!(
            front_end.dump_path(Path::new("/src/lib/a.cpp")),
            PathBuf::from("/tmp/ast/src/lib/a.cpp.ast.json")
        );
        let sibling = DumpFrontEnd::new(None);
        assert_eq!(
            sibling.dump_path(Path::new("/src/a.cpp")),
            PathBuf::from("/src/a.cpp.ast.json")
        );
    }

    #[test]
    fn front_end_reports_missing_dump_as_parse_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("missing.cpp");
        let front_end = DumpFrontEnd::new(None);
        let err = front_end.parse(&source, &[]).expect_err("missing dump");
        assert_eq!(err.file, source);
    }

    #[test]
    fn front_end_loads_dump_from_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("a.cpp");
        let front_end = DumpFrontEnd::new(None);
        let dump = unit_with_reference();
        fs::write(front_end.dump_path(&source), dump.to_json().expect("json")).expect("write");

        let unit = front_end.parse(&source, &[]).expect("parse");
        let root = unit.root();
        assert_eq!(root.children().len(), 2);
        let call = root.children().pop().expect("call cursor");
        let target = call.referenced().expect("referenced");
        assert_eq!(target.display_name(), "f()");
        assert_eq!(target.semantic_parent().map(|p| p.kind()), Some(CursorKind::TranslationUnit));
    }
}
