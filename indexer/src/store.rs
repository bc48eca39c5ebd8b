//! In-memory table of canonical entries, keyed by `file:offset`.

use crate::error::ConsistencyError;
use crate::key::CursorRecord;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::collections::HashMap;
use tracing::error;

/// `expected` of a consistency error whose definition has no usable location.
const UNRESOLVED_LOCATION: &str = "<unresolved>";

/// Lifecycle of one entry during a pass.
///
/// `Unseen → Declared → Defined`; a `Defined` entry ignores every later visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    #[default]
    Unseen,
    Declared,
    Defined,
}

/// What a single cursor visit contributes to its entry.
#[derive(Debug, Clone)]
pub enum Visit {
    /// `#include`: the target is the included file itself.
    Include {
        cursor: CursorRecord,
        target: CursorRecord,
    },
    /// The cursor is its own definitive occurrence (or has no definition at all).
    Reference {
        cursor: CursorRecord,
        target: CursorRecord,
        defining: bool,
    },
    /// The cursor's definition lives at another location.
    Declaration {
        cursor: CursorRecord,
        definition: Option<CursorRecord>,
        provides_definition: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Entry {
    state: EntryState,
    pub cursor: CursorRecord,
    pub reference: CursorRecord,
    pub back_references: BTreeSet<String>,
}

impl Entry {
    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn has_definition(&self) -> bool {
        self.state == EntryState::Defined
    }

    /// A reference may still be (re)assigned while it is unset or points at the cursor itself.
    pub fn accepts_reference(&self) -> bool {
        !self.reference.is_valid() || self.reference.key == self.cursor.key
    }

    /// Applies one visit; returns whether the entry changed.
    pub fn apply(&mut self, visit: Visit) -> bool {
        if self.has_definition() {
            return false;
        }
        match visit {
            Visit::Include { cursor, target } => {
                self.cursor = cursor;
                self.reference = target;
                self.state = EntryState::Defined;
            }
            Visit::Reference {
                cursor,
                target,
                defining,
            } => {
                if !defining && !self.accepts_reference() {
                    return false;
                }
                self.cursor = cursor;
                self.reference = target;
                self.state = if defining {
                    EntryState::Defined
                } else {
                    EntryState::Declared
                };
            }
            Visit::Declaration {
                cursor,
                definition,
                provides_definition,
            } => {
                self.cursor = cursor;
                if let Some(definition) = definition {
                    self.reference = definition;
                }
                self.state = if provides_definition {
                    EntryState::Defined
                } else {
                    EntryState::Declared
                };
            }
        }
        true
    }

    /// Folds an entry for the same location produced by another worker.
    fn merge_from(&mut self, other: Entry) {
        match other.state {
            EntryState::Unseen => {}
            EntryState::Declared => {
                if self.state == EntryState::Unseen
                    || (self.state == EntryState::Declared && self.accepts_reference())
                {
                    self.cursor = other.cursor;
                    self.reference = other.reference;
                    self.state = EntryState::Declared;
                }
            }
            EntryState::Defined => {
                if !self.has_definition() {
                    self.cursor = other.cursor;
                    self.reference = other.reference;
                    self.state = EntryState::Defined;
                }
            }
        }
        self.back_references.extend(other.back_references);
    }
}

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    seen: HashMap<String, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in creation order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, location_key: &str) -> Option<&Entry> {
        self.seen.get(location_key).map(|idx| &self.entries[*idx])
    }

    /// Entry for `location_key`, created `Unseen` on first use.
    pub fn entry_mut(&mut self, location_key: &str) -> &mut Entry {
        let idx = match self.seen.get(location_key) {
            Some(idx) => *idx,
            None => {
                let idx = self.entries.len();
                self.entries.push(Entry::default());
                self.seen.insert(location_key.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    /// Entries that end up in the database: those whose cursor became valid.
    pub fn persisted(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.cursor.is_valid())
    }

    /// Folds a worker's partial store into this one, keeping first-seen order.
    pub fn absorb(&mut self, other: EntryStore) {
        let mut locations: Vec<(usize, String)> = other
            .seen
            .into_iter()
            .map(|(location, idx)| (idx, location))
            .collect();
        locations.sort_unstable_by_key(|(idx, _)| *idx);
        let mut entries: Vec<Option<Entry>> = other.entries.into_iter().map(Some).collect();
        for (idx, location) in locations {
            if let Some(entry) = entries.get_mut(idx).and_then(Option::take) {
                self.entry_mut(&location).merge_from(entry);
            }
        }
    }

    /// Post-pass run once every unit has been folded in.
    ///
    /// Member-function declarations hand their cursor to the definition entry they
    /// resolve to; every other entry registers its location in its target's
    /// back-references. Missing definition entries are returned as consistency errors.
    pub fn propagate_back_references(&mut self) -> Vec<ConsistencyError> {
        let mut threads: Vec<(usize, CursorRecord)> = Vec::new();
        let mut back_references: Vec<(usize, String)> = Vec::new();
        let mut errors = Vec::new();

        for (idx, entry) in self.entries.iter().enumerate() {
            let key = &entry.cursor.key;
            let reference = &entry.reference.key;
            if !key.is_valid() {
                continue;
            }
            if !reference.is_valid() {
                if key.kind.is_member_function() && !key.is_definition() {
                    let err = ConsistencyError {
                        declaration: key.location_string(),
                        expected: UNRESOLVED_LOCATION.to_string(),
                    };
                    error!("{err}");
                    errors.push(err);
                }
                continue;
            }
            let target = self
                .seen
                .get(&reference.location_key())
                .copied()
                .filter(|target| *target != idx);

            if key.kind.is_member_function() {
                if key != reference && !key.is_definition() {
                    match target {
                        Some(target) => threads.push((target, entry.cursor.clone())),
                        None => {
                            let err = ConsistencyError {
                                declaration: key.location_string(),
                                expected: reference.location_string(),
                            };
                            error!("{err}");
                            errors.push(err);
                        }
                    }
                }
                continue;
            }

            if let Some(target) = target {
                back_references.push((target, key.location_string()));
            }
        }

        for (target, declaration) in threads {
            self.entries[target].reference = declaration;
        }
        for (target, location) in back_references {
            self.entries[target].back_references.insert(location);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CursorKind;
    use crate::key::SymbolKey;
    use pretty_assertions::assert_eq;

    fn record(kind: CursorKind, name: &str, line: u32, offset: u32, definition: bool) -> CursorRecord {
        CursorRecord::bare(SymbolKey {
            kind,
            file_name: "/src/a.cpp".to_string(),
            symbol_name: name.to_string(),
            line,
            column: 1,
            offset,
            definition,
        })
    }

    fn reference_visit(cursor: &CursorRecord, target: &CursorRecord) -> Visit {
        Visit::Reference {
            cursor: cursor.clone(),
            target: target.clone(),
            defining: cursor.key.is_definition(),
        }
    }

    #[test]
    fn defining_visit_upgrades_a_declared_entry() {
        let first = record(CursorKind::ClassDecl, "Foo", 1, 6, false);
        let second = record(CursorKind::ClassDecl, "Foo", 1, 6, true);
        let mut store = EntryStore::new();
        let location = first.key.location_key();

        assert!(store.entry_mut(&location).apply(reference_visit(&first, &first)));
        assert_eq!(store.get(&location).map(Entry::state), Some(EntryState::Declared));

        assert!(store.entry_mut(&location).apply(reference_visit(&second, &second)));
        assert_eq!(store.len(), 1);
        let entry = store.get(&location).expect("entry");
        assert!(entry.has_definition());
        assert!(entry.cursor.key.is_definition());
        assert!(entry.reference.key.is_definition());
    }

    #[test]
    fn first_definition_wins() {
        let def = record(CursorKind::FunctionDecl, "f()", 1, 0, true);
        let other = record(CursorKind::FunctionDecl, "f()", 9, 0, true);
        let mut entry = Entry::default();
        assert!(entry.apply(reference_visit(&def, &def)));
        assert!(!entry.apply(reference_visit(&other, &other)));
        assert_eq!(entry.cursor.key.line, 1);
    }

    #[test]
    fn plain_reference_does_not_override_foreign_target() {
        let cursor = record(CursorKind::DeclRefExpr, "x", 3, 30, false);
        let target = record(CursorKind::VarDecl, "x", 1, 4, false);
        let other = record(CursorKind::VarDecl, "y", 2, 14, false);
        let mut entry = Entry::default();
        entry.apply(reference_visit(&cursor, &target));
        assert!(!entry.apply(reference_visit(&cursor, &other)));
        assert_eq!(entry.reference.key.symbol_name, "x");
    }

    #[test]
    fn call_declarations_never_become_defined() {
        let call = record(CursorKind::CallExpr, "f", 4, 40, false);
        let def = record(CursorKind::FunctionDecl, "f()", 1, 0, true);
        let mut entry = Entry::default();
        entry.apply(Visit::Declaration {
            cursor: call,
            definition: Some(def),
            provides_definition: false,
        });
        assert_eq!(entry.state(), EntryState::Declared);
        assert_eq!(entry.reference.key.symbol_name, "f()");
    }

    #[test]
    fn back_references_skip_self_and_collect_uses() {
        let def = record(CursorKind::FunctionDecl, "f()", 1, 0, true);
        let use_site = record(CursorKind::DeclRefExpr, "f", 5, 50, false);
        let mut store = EntryStore::new();
        store
            .entry_mut(&def.key.location_key())
            .apply(reference_visit(&def, &def));
        store
            .entry_mut(&use_site.key.location_key())
            .apply(reference_visit(&use_site, &def));

        let errors = store.propagate_back_references();
        assert!(errors.is_empty());
        let def_entry = store.get(&def.key.location_key()).expect("def");
        assert_eq!(
            def_entry.back_references.iter().cloned().collect::<Vec<_>>(),
            vec!["/src/a.cpp:5:1".to_string()]
        );
        let use_entry = store.get(&use_site.key.location_key()).expect("use");
        assert!(use_entry.back_references.is_empty());
    }

    #[test]
    fn method_declaration_threads_onto_definition() {
        let decl = record(CursorKind::CxxMethod, "bar(int)", 2, 20, false);
        let def = record(CursorKind::CxxMethod, "bar(int)", 8, 80, true);
        let mut store = EntryStore::new();
        store
            .entry_mut(&decl.key.location_key())
            .apply(Visit::Declaration {
                cursor: decl.clone(),
                definition: Some(def.clone()),
                provides_definition: true,
            });
        store
            .entry_mut(&def.key.location_key())
            .apply(reference_visit(&def, &def));

        assert!(store.propagate_back_references().is_empty());
        let def_entry = store.get(&def.key.location_key()).expect("def");
        assert_eq!(def_entry.reference.key, decl.key);
        assert!(def_entry.back_references.is_empty());
    }

    #[test]
    fn missing_method_definition_is_a_consistency_error() {
        let decl = record(CursorKind::Constructor, "Foo()", 2, 20, false);
        let def = record(CursorKind::Constructor, "Foo()", 8, 80, true);
        let mut store = EntryStore::new();
        store
            .entry_mut(&decl.key.location_key())
            .apply(Visit::Declaration {
                cursor: decl,
                definition: Some(def),
                provides_definition: true,
            });
        let errors = store.propagate_back_references();
        assert_eq!(
            errors,
            vec![ConsistencyError {
                declaration: "/src/a.cpp:2:1".to_string(),
                expected: "/src/a.cpp:8:1".to_string(),
            }]
        );
    }

    #[test]
    fn method_with_unlocatable_definition_is_a_consistency_error() {
        let decl = record(CursorKind::CxxMethod, "bar(int)", 1, 17, false);
        let mut store = EntryStore::new();
        store
            .entry_mut(&decl.key.location_key())
            .apply(Visit::Declaration {
                cursor: decl,
                definition: None,
                provides_definition: true,
            });
        let errors = store.propagate_back_references();
        assert_eq!(
            errors,
            vec![ConsistencyError {
                declaration: "/src/a.cpp:1:1".to_string(),
                expected: UNRESOLVED_LOCATION.to_string(),
            }]
        );
    }

    #[test]
    fn absorb_prefers_definitions_and_keeps_order() {
        let decl = record(CursorKind::ClassDecl, "Foo", 1, 6, false);
        let def = record(CursorKind::ClassDecl, "Foo", 1, 6, true);
        let other = record(CursorKind::VarDecl, "x", 3, 30, false);

        let mut global = EntryStore::new();
        global
            .entry_mut(&decl.key.location_key())
            .apply(reference_visit(&decl, &decl));

        let mut partial = EntryStore::new();
        partial
            .entry_mut(&other.key.location_key())
            .apply(reference_visit(&other, &other));
        partial
            .entry_mut(&def.key.location_key())
            .apply(reference_visit(&def, &def));

        global.absorb(partial);
        assert_eq!(global.len(), 2);
        let names: Vec<&str> = global
            .entries()
            .iter()
            .map(|entry| entry.cursor.key.symbol_name.as_str())
            .collect();
        assert_eq!(names, vec!["Foo", "x"]);
        assert!(global.entries()[0].has_definition());
    }
}
