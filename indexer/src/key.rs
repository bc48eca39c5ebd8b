//! Canonical identity of a cursor occurrence.

use crate::ast::Cursor;
use crate::ast::CursorKind;
use path_absolutize::Absolutize;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;

/// Guards the semantic-parent walk against cyclic parent links.
const MAX_PARENT_DEPTH: usize = 256;

/// Identity of one occurrence of a name in source.
///
/// Equality, hashing and ordering only look at `kind`, `file_name`, `offset` and
/// `symbol_name`; `line`/`column` are display data. Keys with an empty file or
/// symbol name are invalid: they all compare equal to each other and sort first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolKey {
    pub kind: CursorKind,
    pub file_name: String,
    pub symbol_name: String,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    pub definition: bool,
}

impl Default for SymbolKey {
    fn default() -> Self {
        Self {
            kind: CursorKind::InvalidCode,
            file_name: String::new(),
            symbol_name: String::new(),
            line: 0,
            column: 0,
            offset: 0,
            definition: false,
        }
    }
}

impl SymbolKey {
    /// Synthetic target of an inclusion directive: the top of the included file.
    pub fn inclusion(file: &Path) -> Self {
        let file_name = file.to_string_lossy().into_owned();
        Self {
            kind: CursorKind::InclusionDirective,
            symbol_name: file_name.clone(),
            file_name,
            line: 1,
            column: 1,
            offset: 0,
            definition: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.file_name.is_empty() && !self.symbol_name.is_empty()
    }

    pub fn is_definition(&self) -> bool {
        self.definition
    }

    /// Merge key: `file:offset`.
    pub fn location_key(&self) -> String {
        format!("{}:{}", self.file_name, self.offset)
    }

    /// Persisted location: `file:line:col`.
    pub fn location_string(&self) -> String {
        format!("{}:{}:{}", self.file_name, self.line, self.column)
    }

    pub fn same_location(&self, other: &SymbolKey) -> bool {
        self.offset == other.offset && self.file_name == other.file_name
    }
}

impl PartialEq for SymbolKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => true,
            (true, true) => {
                self.kind == other.kind
                    && self.offset == other.offset
                    && self.file_name == other.file_name
                    && self.symbol_name == other.symbol_name
            }
            _ => false,
        }
    }
}

impl Eq for SymbolKey {}

impl Hash for SymbolKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if !self.is_valid() {
            return;
        }
        self.kind.hash(state);
        self.offset.hash(state);
        self.file_name.hash(state);
        self.symbol_name.hash(state);
    }
}

impl Ord for SymbolKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self
                .file_name
                .as_bytes()
                .cmp(other.file_name.as_bytes())
                .then(self.offset.cmp(&other.offset))
                .then_with(|| self.symbol_name.as_bytes().cmp(other.symbol_name.as_bytes()))
                .then(self.kind.cmp(&other.kind)),
        }
    }
}

impl PartialOrd for SymbolKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Enclosing namespace/class/struct names, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerChain(pub Vec<String>);

impl ContainerChain {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// A key together with the containers it was declared in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub key: SymbolKey,
    pub containers: ContainerChain,
}

impl CursorRecord {
    /// Record without container information.
    pub fn bare(key: SymbolKey) -> Self {
        Self {
            key,
            containers: ContainerChain::default(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.key.is_valid()
    }
}

/// Builds keys from cursors, memoizing path resolution.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    resolved: HashMap<PathBuf, String>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key<C: Cursor>(&mut self, cursor: &C) -> SymbolKey {
        let kind = cursor.kind();
        if kind.is_invalid() {
            return SymbolKey {
                kind,
                ..SymbolKey::default()
            };
        }
        let Some(location) = cursor.location() else {
            return SymbolKey {
                kind,
                ..SymbolKey::default()
            };
        };
        SymbolKey {
            kind,
            file_name: self.resolve(&location.file),
            symbol_name: cursor.display_name(),
            line: location.line,
            column: location.column,
            offset: location.offset,
            definition: is_definition(cursor),
        }
    }

    /// Key plus container chain, walking the semantic parents until a parent has no valid key.
    pub fn record<C: Cursor>(&mut self, cursor: &C, key: SymbolKey) -> CursorRecord {
        let mut containers = Vec::new();
        let mut parent = cursor.semantic_parent();
        let mut depth = 0;
        while let Some(current) = parent {
            depth += 1;
            if depth > MAX_PARENT_DEPTH {
                break;
            }
            let parent_key = self.key(&current);
            if !parent_key.is_valid() {
                break;
            }
            if parent_key.kind.is_container() {
                containers.push(parent_key.symbol_name);
            }
            parent = current.semantic_parent();
        }
        CursorRecord {
            key,
            containers: ContainerChain(containers),
        }
    }

    pub fn resolve(&mut self, path: &Path) -> String {
        if path.as_os_str().is_empty() {
            return String::new();
        }
        if let Some(resolved) = self.resolved.get(path) {
            return resolved.clone();
        }
        let resolved = resolve_path(path).to_string_lossy().into_owned();
        self.resolved.insert(path.to_path_buf(), resolved.clone());
        resolved
    }
}

/// Absolute, symlink-free form of `path`; lexical absolutization when it does not exist.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }
    path.absolutize()
        .map(|absolute| absolute.into_owned())
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Macro definitions always define; variable declarations never do on their own.
pub fn is_definition<C: Cursor>(cursor: &C) -> bool {
    match cursor.kind() {
        CursorKind::MacroDefinition => true,
        CursorKind::VarDecl => false,
        _ => cursor.is_definition(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DumpUnit;
    use crate::ast::NodeDump;
    use crate::ast::TranslationUnit;
    use crate::ast::UnitDump;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn key(file: &str, offset: u32, name: &str, kind: CursorKind) -> SymbolKey {
        SymbolKey {
            kind,
            file_name: file.to_string(),
            symbol_name: name.to_string(),
            line: 1,
            column: offset + 1,
            offset,
            definition: false,
        }
    }

    #[test]
    fn equality_ignores_line_column_and_definition() {
        let a = key("/a.cpp", 4, "f()", CursorKind::FunctionDecl);
        let mut b = a.clone();
        b.line = 9;
        b.column = 9;
        b.definition = true;
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn ordering_is_file_then_offset_then_name_then_kind() {
        let mut keys = vec![
            key("/b.cpp", 0, "a", CursorKind::FunctionDecl),
            key("/a.cpp", 10, "a", CursorKind::FunctionDecl),
            key("/a.cpp", 2, "z", CursorKind::FunctionDecl),
            key("/a.cpp", 2, "b", CursorKind::VarDecl),
            key("/a.cpp", 2, "b", CursorKind::StructDecl),
            SymbolKey::default(),
        ];
        keys.sort();
        let order: Vec<(String, u32, String, CursorKind)> = keys
            .into_iter()
            .map(|k| (k.file_name, k.offset, k.symbol_name, k.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                (String::new(), 0, String::new(), CursorKind::InvalidCode),
                ("/a.cpp".into(), 2, "b".into(), CursorKind::StructDecl),
                ("/a.cpp".into(), 2, "b".into(), CursorKind::VarDecl),
                ("/a.cpp".into(), 2, "z".into(), CursorKind::FunctionDecl),
                ("/a.cpp".into(), 10, "a".into(), CursorKind::FunctionDecl),
                ("/b.cpp".into(), 0, "a".into(), CursorKind::FunctionDecl),
            ]
        );
    }

    #[test]
    fn order_is_antisymmetric() {
        let keys = [
            key("/a.cpp", 1, "x", CursorKind::FieldDecl),
            key("/a.cpp", 1, "x", CursorKind::VarDecl),
            key("/a.cpp", 1, "y", CursorKind::FieldDecl),
            SymbolKey::default(),
        ];
        for a in &keys {
            for b in &keys {
                assert!(!(a < b && b < a));
                assert_eq!(a == b, a.cmp(b) == Ordering::Equal);
            }
        }
    }

    #[test]
    fn invalid_keys_never_equal_valid_ones() {
        let valid = key("/a.cpp", 0, "x", CursorKind::VarDecl);
        let no_name = key("/a.cpp", 0, "", CursorKind::VarDecl);
        let no_file = key("", 0, "x", CursorKind::VarDecl);
        assert!(!no_name.is_valid());
        assert_ne!(valid, no_name);
        assert_eq!(no_name, no_file);
        assert!(no_file < valid);
    }

    #[test]
    fn location_formats() {
        let k = SymbolKey {
            line: 3,
            column: 7,
            ..key("/a.cpp", 42, "x", CursorKind::VarDecl)
        };
        assert_eq!(k.location_key(), "/a.cpp:42");
        assert_eq!(k.location_string(), "/a.cpp:3:7");
        let include = SymbolKey::inclusion(Path::new("/inc/b.h"));
        assert_eq!(include.location_string(), "/inc/b.h:1:1");
        assert_eq!(include.symbol_name, "/inc/b.h");
    }

    #[test]
    fn builder_collects_container_chain_innermost_first() {
        let mut dump = UnitDump::new("/src/a.cpp");
        let ns = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::Namespace, "ns").at("/src/a.cpp", 1, 11, 10),
        );
        let class = dump.push(
            ns,
            NodeDump::new(CursorKind::ClassDecl, "Foo").at("/src/a.cpp", 2, 7, 20),
        );
        let method = dump.push(
            class,
            NodeDump::new(CursorKind::CxxMethod, "bar(int)").at("/src/a.cpp", 3, 10, 40),
        );
        let unit = DumpUnit::new(dump);
        let cursor = unit.cursor(method).expect("method cursor");

        let mut builder = KeyBuilder::new();
        let key = builder.key(&cursor);
        assert!(key.is_valid());
        let record = builder.record(&cursor, key);
        assert_eq!(record.containers.names(), ["Foo".to_string(), "ns".to_string()]);
    }

    #[test]
    fn var_decls_are_never_definitions_by_themselves() {
        let mut dump = UnitDump::new("/src/a.cpp");
        let var = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::VarDecl, "x")
                .at("/src/a.cpp", 1, 5, 4)
                .defining(),
        );
        let mac = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::MacroDefinition, "M").at("/src/a.cpp", 2, 9, 20),
        );
        let unit = DumpUnit::new(dump);
        let mut builder = KeyBuilder::new();
        let var = unit.cursor(var).expect("var");
        let mac = unit.cursor(mac).expect("macro");
        assert!(!builder.key(&var).is_definition());
        assert!(builder.key(&mac).is_definition());
    }
}
