//! Finds translation units whose recorded dependencies changed on disk.

use crate::build_commands::CompileArguments;
use crate::build_commands::CompileJob;
use crate::deps::DependencyRecord;
use crate::error::Result;
use crate::storage::Database;
use crate::storage::schema::read_dependencies;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;

/// Units to re-index with the arguments they were last built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub jobs: BTreeMap<PathBuf, CompileArguments>,
    /// Changed files per dirty unit (the unit itself and/or its includes).
    pub changed: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// Number of dependency records examined.
    pub records: usize,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// One job per distinct argument list, inputs in path order.
    pub fn into_jobs(self) -> Vec<CompileJob> {
        let mut grouped: BTreeMap<CompileArguments, Vec<PathBuf>> = BTreeMap::new();
        for (file, arguments) in self.jobs {
            grouped.entry(arguments).or_default().push(file);
        }
        grouped
            .into_iter()
            .map(|(arguments, inputs)| CompileJob { inputs, arguments })
            .collect()
    }
}

/// Compares every `f:` record of `db` against the file system. Never writes.
pub fn scan_dirty(db: &Database) -> Result<DirtySet> {
    let mut dirty = DirtySet::default();
    for (owner, record) in read_dependencies(db)? {
        dirty.records += 1;
        mark_if_changed(&mut dirty, owner, record);
    }
    info!(
        "{} of {} translation units are dirty in {}",
        dirty.len(),
        dirty.records,
        db.path().display()
    );
    Ok(dirty)
}

fn mark_if_changed(dirty: &mut DirtySet, owner: PathBuf, record: DependencyRecord) {
    let changed = record.changed_files(&owner);
    if changed.is_empty() {
        return;
    }
    debug!("{} is dirty: {changed:?}", owner.display());
    dirty
        .jobs
        .insert(owner.clone(), CompileArguments(record.arguments));
    dirty.changed.insert(owner, changed);
}
