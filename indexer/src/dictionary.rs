//! Name → locations map backing the `d:` key family.

use crate::key::CursorRecord;
use crate::store::EntryStore;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

const SCOPE_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    names: BTreeMap<String, BTreeSet<String>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the cursor and reference side of every persisted entry.
    pub fn build(store: &EntryStore) -> Self {
        let mut dictionary = Self::new();
        for entry in store.persisted() {
            dictionary.insert_record(&entry.cursor);
            dictionary.insert_record(&entry.reference);
        }
        dictionary
    }

    /// Adds the plain, bare and container-qualified names of one record.
    pub fn insert_record(&mut self, record: &CursorRecord) {
        let key = &record.key;
        if !key.is_valid() || key.kind.is_reference() || key.kind.is_expression() {
            return;
        }
        let location = key.location_string();
        let name = key.symbol_name.as_str();
        let bare = bare_name(name);

        self.insert(name, &location);
        if let Some(bare) = bare {
            self.insert(bare, &location);
        }

        if !key.kind.is_dictionary_qualified() {
            return;
        }
        let mut qualified = name.to_string();
        let mut qualified_bare = bare.map(str::to_string);
        for container in record.containers.names() {
            qualified = format!("{container}{SCOPE_SEPARATOR}{qualified}");
            self.insert(&qualified, &location);
            if let Some(bare) = qualified_bare.as_mut() {
                *bare = format!("{container}{SCOPE_SEPARATOR}{bare}");
                self.insert(bare, &location);
            }
        }
    }

    fn insert(&mut self, name: &str, location: &str) {
        self.names
            .entry(name.to_string())
            .or_default()
            .insert(location.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.names.get(name)
    }

    /// Names in byte order, each with its sorted locations.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// `bar(int)` → `bar`; `None` for names without a parameter list.
fn bare_name(name: &str) -> Option<&str> {
    name.find('(')
        .map(|paren| &name[..paren])
        .filter(|bare| !bare.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CursorKind;
    use crate::key::ContainerChain;
    use crate::key::SymbolKey;
    use pretty_assertions::assert_eq;

    fn record(kind: CursorKind, name: &str, line: u32, containers: &[&str]) -> CursorRecord {
        CursorRecord {
            key: SymbolKey {
                kind,
                file_name: "/src/a.cpp".to_string(),
                symbol_name: name.to_string(),
                line,
                column: 1,
                offset: line * 10,
                definition: true,
            },
            containers: ContainerChain(containers.iter().map(|c| c.to_string()).collect()),
        }
    }

    fn names(dictionary: &Dictionary) -> Vec<&str> {
        dictionary.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn method_is_reachable_by_every_spelling() {
        let mut dictionary = Dictionary::new();
        dictionary.insert_record(&record(CursorKind::CxxMethod, "bar(int)", 7, &["Foo"]));
        for name in ["bar", "bar(int)", "Foo::bar", "Foo::bar(int)"] {
            let locations = dictionary.get(name).expect(name);
            assert!(locations.contains("/src/a.cpp:7:1"), "{name}");
        }
        assert_eq!(dictionary.len(), 4);
    }

    #[test]
    fn qualification_accumulates_innermost_first() {
        let mut dictionary = Dictionary::new();
        dictionary.insert_record(&record(CursorKind::ClassDecl, "Foo", 2, &["inner", "outer"]));
        assert_eq!(
            names(&dictionary),
            vec!["Foo", "inner::Foo", "outer::inner::Foo"]
        );
    }

    #[test]
    fn free_functions_get_bare_name_but_no_qualification() {
        let mut dictionary = Dictionary::new();
        dictionary.insert_record(&record(CursorKind::FunctionDecl, "f(int, char)", 1, &["ns"]));
        assert_eq!(names(&dictionary), vec!["f", "f(int, char)"]);
    }

    #[test]
    fn references_and_expressions_are_skipped() {
        let mut dictionary = Dictionary::new();
        dictionary.insert_record(&record(CursorKind::TypeRef, "class Foo", 3, &[]));
        dictionary.insert_record(&record(CursorKind::DeclRefExpr, "x", 4, &[]));
        dictionary.insert_record(&CursorRecord::default());
        assert!(dictionary.is_empty());
    }

    #[test]
    fn operator_call_names_keep_their_prefix() {
        assert_eq!(bare_name("operator()(int)"), Some("operator"));
        assert_eq!(bare_name("(anonymous)"), None);
        assert_eq!(bare_name("plain"), None);
    }
}
