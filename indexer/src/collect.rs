//! Walks a translation unit and feeds every cursor into the entry store.

use crate::ast::ChildVisit;
use crate::ast::Cursor;
use crate::ast::CursorKind;
use crate::ast::visit_children;
use crate::key::CursorRecord;
use crate::key::KeyBuilder;
use crate::key::SymbolKey;
use crate::key::is_definition;
use crate::resolver::reference_target;
use crate::store::Entry;
use crate::store::EntryStore;
use crate::store::Visit;
use std::path::Path;

/// Visits every descendant of `root` depth-first, updating `store`.
///
/// Returns the number of cursors visited.
pub fn collect_symbols<C: Cursor>(root: &C, keys: &mut KeyBuilder, store: &mut EntryStore) -> usize {
    let mut visited = 0;
    visit_children(root, |cursor| {
        visited += 1;
        visit_cursor(cursor, keys, store)
    });
    visited
}

fn visit_cursor<C: Cursor>(cursor: &C, keys: &mut KeyBuilder, store: &mut EntryStore) -> ChildVisit {
    let key = keys.key(cursor);
    if !key.is_valid() {
        return ChildVisit::Recurse;
    }
    let location = key.location_key();
    if store.get(&location).is_some_and(Entry::has_definition) {
        return ChildVisit::Recurse;
    }

    if key.kind == CursorKind::InclusionDirective {
        let target = match cursor.included_file() {
            Some(file) => SymbolKey::inclusion(Path::new(&keys.resolve(&file))),
            None => SymbolKey::default(),
        };
        let record = keys.record(cursor, key);
        store.entry_mut(&location).apply(Visit::Include {
            cursor: record,
            target: CursorRecord::bare(target),
        });
        return ChildVisit::Continue;
    }

    let definition = cursor.definition().filter(is_definition);
    let definition_key = definition.as_ref().map(|definition| keys.key(definition));
    match (definition, definition_key) {
        (Some(definition), Some(definition_key)) if !definition_key.same_location(&key) => {
            visit_declaration(cursor, key, &definition, definition_key, keys, store);
        }
        _ => visit_reference(cursor, key, keys, store),
    }
    ChildVisit::Recurse
}

/// The cursor is the definitive occurrence, or nothing defines it.
fn visit_reference<C: Cursor>(
    cursor: &C,
    key: SymbolKey,
    keys: &mut KeyBuilder,
    store: &mut EntryStore,
) {
    let location = key.location_key();
    let defining = key.is_definition();
    if !defining && !store.entry_mut(&location).accepts_reference() {
        return;
    }
    let Some(target) = reference_target(cursor) else {
        store.entry_mut(&location);
        return;
    };
    let target_key = keys.key(&target);
    if !target_key.is_valid() {
        store.entry_mut(&location);
        return;
    }
    let cursor_record = keys.record(cursor, key);
    let target_record = keys.record(&target, target_key);
    store.entry_mut(&location).apply(Visit::Reference {
        cursor: cursor_record,
        target: target_record,
        defining,
    });
}

/// The cursor's definition lives elsewhere: thread the entry to it.
fn visit_declaration<C: Cursor>(
    cursor: &C,
    key: SymbolKey,
    definition: &C,
    definition_key: SymbolKey,
    keys: &mut KeyBuilder,
    store: &mut EntryStore,
) {
    let location = key.location_key();
    let provides_definition = !cursor.kind().is_call() && !definition.kind().is_call();
    let cursor_record = keys.record(cursor, key);
    let definition_record = (definition_key.is_valid() && !definition.kind().is_call())
        .then(|| keys.record(definition, definition_key));
    store.entry_mut(&location).apply(Visit::Declaration {
        cursor: cursor_record,
        definition: definition_record,
        provides_definition,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DumpUnit;
    use crate::ast::NodeDump;
    use crate::ast::TranslationUnit;
    use crate::ast::UnitDump;
    use crate::store::EntryState;
    use pretty_assertions::assert_eq;

    const FILE: &str = "/src/main.cpp";

    fn collect(dump: UnitDump) -> EntryStore {
        let unit = DumpUnit::new(dump);
        let mut keys = KeyBuilder::new();
        let mut store = EntryStore::new();
        collect_symbols(&unit.root(), &mut keys, &mut store);
        store
    }

    #[test]
    fn forward_declaration_threads_to_definition() {
        // void f(); void f() {}
        let mut dump = UnitDump::new(FILE);
        let decl = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::FunctionDecl, "f()").at(FILE, 1, 6, 5),
        );
        let def = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::FunctionDecl, "f()")
                .at(FILE, 1, 16, 15)
                .defining(),
        );
        dump.set_definition(decl, def);
        dump.set_definition(def, def);
        dump.set_referenced(decl, decl);
        dump.set_referenced(def, def);

        let mut store = collect(dump);
        assert!(store.propagate_back_references().is_empty());

        let self_defined: Vec<&Entry> = store
            .entries()
            .iter()
            .filter(|entry| entry.has_definition() && entry.reference.key == entry.cursor.key)
            .collect();
        assert_eq!(self_defined.len(), 1);
        let definition = self_defined[0];
        assert_eq!(definition.cursor.key.offset, 15);
        assert_eq!(
            definition.back_references.iter().cloned().collect::<Vec<_>>(),
            vec![format!("{FILE}:1:6")]
        );

        let declaration = store.get(&format!("{FILE}:5")).expect("declaration entry");
        assert_eq!(declaration.reference.key, definition.cursor.key);
    }

    #[test]
    fn inclusion_directive_targets_included_file() {
        let mut dump = UnitDump::new(FILE);
        dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::InclusionDirective, "b.h")
                .at(FILE, 1, 1, 0)
                .including("/src/b.h"),
        );
        let store = collect(dump);
        let entry = store.get(&format!("{FILE}:0")).expect("include entry");
        assert!(entry.has_definition());
        assert_eq!(entry.reference.key.location_string(), "/src/b.h:1:1");
        assert_eq!(entry.reference.key.kind, CursorKind::InclusionDirective);
    }

    #[test]
    fn invalid_cursors_are_skipped_but_children_visited() {
        let mut dump = UnitDump::new(FILE);
        let unnamed = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::CompoundStmt, "").at(FILE, 1, 1, 0),
        );
        let var = dump.push(
            unnamed,
            NodeDump::new(CursorKind::VarDecl, "x").at(FILE, 2, 5, 10),
        );
        dump.set_referenced(var, var);
        let store = collect(dump);
        assert_eq!(store.len(), 1);
        let entry = store.get(&format!("{FILE}:10")).expect("var entry");
        assert_eq!(entry.state(), EntryState::Declared);
        assert_eq!(entry.reference.key, entry.cursor.key);
    }

    #[test]
    fn calls_produce_no_entry_of_their_own() {
        let mut dump = UnitDump::new(FILE);
        let func = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::FunctionDecl, "g()").at(FILE, 1, 6, 5),
        );
        dump.set_referenced(func, func);
        let call = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::CallExpr, "g").at(FILE, 3, 3, 40),
        );
        dump.set_referenced(call, func);
        let store = collect(dump);
        let call_entry = store.get(&format!("{FILE}:40")).expect("created entry");
        assert!(!call_entry.cursor.is_valid());
        assert_eq!(store.persisted().count(), 1);
    }

    #[test]
    fn out_of_line_method_definition_collects_class_container() {
        // class Foo { void bar(int); }; void Foo::bar(int) {}
        let mut dump = UnitDump::new(FILE);
        let class = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::ClassDecl, "Foo")
                .at(FILE, 1, 7, 6)
                .defining(),
        );
        dump.set_referenced(class, class);
        let decl = dump.push(
            class,
            NodeDump::new(CursorKind::CxxMethod, "bar(int)").at(FILE, 1, 18, 17),
        );
        let def = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::CxxMethod, "bar(int)")
                .at(FILE, 2, 11, 40)
                .defining(),
        );
        dump.set_semantic_parent(def, class);
        dump.set_definition(decl, def);
        dump.set_definition(def, def);
        dump.set_referenced(def, def);

        let mut store = collect(dump);
        assert!(store.propagate_back_references().is_empty());
        let def_entry = store.get(&format!("{FILE}:40")).expect("definition");
        assert_eq!(def_entry.cursor.containers.names(), ["Foo".to_string()]);
        assert_eq!(def_entry.reference.key.offset, 17);
        let decl_entry = store.get(&format!("{FILE}:17")).expect("declaration");
        assert!(decl_entry.has_definition());
        assert_eq!(decl_entry.reference.key.offset, 40);
    }

    #[test]
    fn method_definition_without_location_is_reported() {
        let mut dump = UnitDump::new(FILE);
        let class = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::ClassDecl, "Foo")
                .at(FILE, 1, 7, 6)
                .defining(),
        );
        let decl = dump.push(
            class,
            NodeDump::new(CursorKind::CxxMethod, "bar(int)").at(FILE, 1, 18, 17),
        );
        let def = dump.push(
            UnitDump::ROOT,
            NodeDump::new(CursorKind::CxxMethod, "bar(int)").defining(),
        );
        dump.set_definition(decl, def);

        let mut store = collect(dump);
        let errors = store.propagate_back_references();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].declaration, format!("{FILE}:1:18"));
    }
}
