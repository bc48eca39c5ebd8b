//! Per-category policy deciding what a cursor points to.

use crate::ast::Cursor;
use crate::ast::CursorCategory;
use crate::ast::CursorKind;

/// Target of a reference-shaped cursor, or `None` when the cursor is not a
/// useful reference (calls, attributes, unrecognized categories).
pub fn reference_target<C: Cursor>(cursor: &C) -> Option<C> {
    let kind = cursor.kind();
    if kind.is_call() {
        return None;
    }
    let target = match kind.category() {
        CursorCategory::Reference => {
            let resolved = if cursor.has_type() {
                cursor.type_declaration()
            } else {
                cursor.referenced()
            };
            resolved.or_else(|| Some(cursor.clone()))
        }
        CursorCategory::Expression | CursorCategory::Statement | CursorCategory::Declaration => {
            cursor.referenced().or_else(|| Some(cursor.clone()))
        }
        CursorCategory::Preprocessing => match kind {
            CursorKind::MacroExpansion => cursor.referenced(),
            CursorKind::MacroDefinition => Some(cursor.clone()),
            _ => None,
        },
        CursorCategory::Attribute | CursorCategory::TranslationUnit | CursorCategory::Invalid => {
            None
        }
    };
    target.filter(|target| !target.kind().is_call())
}
