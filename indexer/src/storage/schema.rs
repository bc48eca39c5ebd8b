//! Key families and value encodings of the symbol database.
//!
//! | key | value |
//! |---|---|
//! | `f:` + absolute path | [`DependencyRecord`] |
//! | `d:` + name | NUL-separated location strings |
//! | `file:line:col` | [`ReferenceValue`] |
//! | `" "` | [`Manifest`] |

use super::Database;
use crate::deps::DependencyRecord;
use crate::dictionary::Dictionary;
use crate::error::IndexerError;
use crate::error::Result;
use crate::key::CursorRecord;
use crate::store::Entry;
use crate::store::EntryStore;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

pub const DEPENDENCY_PREFIX: &str = "f:";
pub const DICTIONARY_PREFIX: &str = "d:";
pub const MANIFEST_KEY: &str = " ";
const LOCATION_SEPARATOR: char = '\0';

/// Value stored under an entry's own `file:line:col`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceValue {
    /// Location of the reference target; empty when the entry has none.
    pub target: String,
    pub back_references: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub has_definition: bool,
    pub cursor: CursorRecord,
    pub reference: CursorRecord,
    pub back_references: BTreeSet<String>,
}

impl From<&Entry> for PersistedEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            has_definition: entry.has_definition(),
            cursor: entry.cursor.clone(),
            reference: entry.reference.clone(),
            back_references: entry.back_references.clone(),
        }
    }
}

/// Every persisted entry, in the order the pass produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<PersistedEntry>,
}

/// Counts of what one write pass stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub entries: usize,
    pub dictionary_names: usize,
    pub dependency_records: usize,
}

pub fn dependency_key(path: &Path) -> Vec<u8> {
    format!("{DEPENDENCY_PREFIX}{}", path.to_string_lossy()).into_bytes()
}

pub fn dictionary_key(name: &str) -> Vec<u8> {
    format!("{DICTIONARY_PREFIX}{name}").into_bytes()
}

pub fn join_locations<'a>(locations: impl IntoIterator<Item = &'a String>) -> Vec<u8> {
    let mut out = String::new();
    for location in locations {
        if !out.is_empty() {
            out.push(LOCATION_SEPARATOR);
        }
        out.push_str(location);
    }
    out.into_bytes()
}

pub fn split_locations(value: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(value)
        .split(LOCATION_SEPARATOR)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(key: &[u8], value: &[u8]) -> Result<T> {
    bincode::deserialize(value).map_err(|err| IndexerError::CorruptRecord {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: err.to_string(),
    })
}

/// Writes every key family for one finished pass.
pub fn write_index(
    db: &mut Database,
    store: &EntryStore,
    dictionary: &Dictionary,
    dependencies: &[(PathBuf, DependencyRecord)],
) -> Result<WriteSummary> {
    for (path, record) in dependencies {
        db.put(dependency_key(path), encode(record)?)?;
    }

    for (name, locations) in dictionary.iter() {
        db.put(dictionary_key(name), join_locations(locations))?;
    }

    let mut manifest = Manifest::default();
    for entry in store.persisted() {
        let target = if entry.reference.is_valid() {
            entry.reference.key.location_string()
        } else {
            String::new()
        };
        let value = ReferenceValue {
            target,
            back_references: entry.back_references.clone(),
        };
        db.put(entry.cursor.key.location_string(), encode(&value)?)?;
        manifest.entries.push(PersistedEntry::from(entry));
    }
    let entries = manifest.entries.len();
    db.put(MANIFEST_KEY, encode(&manifest)?)?;

    Ok(WriteSummary {
        entries,
        dictionary_names: dictionary.len(),
        dependency_records: dependencies.len(),
    })
}

/// Reads the dependency record of every translation unit, in path order.
pub fn read_dependencies(db: &Database) -> Result<Vec<(PathBuf, DependencyRecord)>> {
    db.scan_prefix(DEPENDENCY_PREFIX.as_bytes())
        .map(|(key, value)| {
            let path = PathBuf::from(
                String::from_utf8_lossy(&key[DEPENDENCY_PREFIX.len()..]).into_owned(),
            );
            Ok((path, decode(key, value)?))
        })
        .collect()
}
