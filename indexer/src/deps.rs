//! Per-translation-unit dependency records.

use crate::ast::TranslationUnit;
use crate::key::KeyBuilder;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

/// What a translation unit was built from, persisted under `f:` + its path.
///
/// Times are `None` when the file could not be stat'ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub arguments: Vec<String>,
    pub last_modified: Option<SystemTime>,
    pub included_files: BTreeMap<PathBuf, Option<SystemTime>>,
}

impl DependencyRecord {
    /// Records `file` and every file on the unit's inclusion stacks with their current times.
    ///
    /// The main file closes every stack, so it is only stored as `last_modified`.
    pub fn collect<U: TranslationUnit>(
        file: &Path,
        arguments: &[String],
        unit: &U,
        keys: &mut KeyBuilder,
    ) -> Self {
        let mut included_files = BTreeMap::new();
        for inclusion in unit.inclusions() {
            let chain_end = inclusion.stack.len().saturating_sub(1);
            let includers = inclusion.stack.iter().take(chain_end);
            for path in std::iter::once(&inclusion.file).chain(includers) {
                let resolved = PathBuf::from(keys.resolve(path));
                if resolved.as_path() == file || included_files.contains_key(&resolved) {
                    continue;
                }
                let modified = file_mtime(&resolved);
                included_files.insert(resolved, modified);
            }
        }
        Self {
            arguments: arguments.to_vec(),
            last_modified: file_mtime(file),
            included_files,
        }
    }

    /// Files whose current modification time no longer matches the recorded one.
    pub fn changed_files(&self, owner: &Path) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        if file_mtime(owner) != self.last_modified {
            changed.push(owner.to_path_buf());
        }
        for (path, recorded) in &self.included_files {
            if file_mtime(path) != *recorded {
                changed.push(path.clone());
            }
        }
        changed
    }
}

pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
