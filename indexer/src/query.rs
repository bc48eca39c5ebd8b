//! Read-side API over a committed database.

use crate::error::Result;
use crate::key::resolve_path;
use crate::staleness::DirtySet;
use crate::staleness::scan_dirty;
use crate::storage::Database;
use crate::storage::schema::DICTIONARY_PREFIX;
use crate::storage::schema::MANIFEST_KEY;
use crate::storage::schema::Manifest;
use crate::storage::schema::ReferenceValue;
use crate::storage::schema::decode;
use crate::storage::schema::dictionary_key;
use crate::storage::schema::split_locations;
use nucleo_matcher::Matcher;
use nucleo_matcher::Utf32Str;
use nucleo_matcher::pattern::AtomKind;
use nucleo_matcher::pattern::CaseMatching;
use nucleo_matcher::pattern::Normalization;
use nucleo_matcher::pattern::Pattern;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolMatch {
    pub name: String,
    pub score: u32,
    pub locations: Vec<String>,
}

#[derive(Debug)]
pub struct SymbolQuery {
    db: Database,
}

impl SymbolQuery {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_read_only(path)?))
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Locations recorded for an exact (plain, bare or qualified) name.
    pub fn lookup(&self, name: &str) -> Vec<String> {
        self.db
            .get(&dictionary_key(name))
            .map(split_locations)
            .unwrap_or_default()
    }

    /// Reference target stored for `file:line:col`, if any.
    pub fn follow(&self, location: &str) -> Result<Option<String>> {
        Ok(self
            .reference_value(location)?
            .map(|value| value.target)
            .filter(|target| !target.is_empty()))
    }

    /// Back-references of whatever `location` resolves to.
    pub fn references(&self, location: &str) -> Result<Vec<String>> {
        let Some(value) = self.reference_value(location)? else {
            return Ok(Vec::new());
        };
        let back_references = if value.target.is_empty() || value.target == location {
            value.back_references
        } else {
            match self.reference_value(&value.target)? {
                Some(target) if !target.back_references.is_empty() => target.back_references,
                _ => value.back_references,
            }
        };
        Ok(back_references.into_iter().collect())
    }

    /// Fuzzy search over dictionary names, best score first.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SymbolMatch> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }
        let pattern = Pattern::new(
            query,
            CaseMatching::Smart,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
        let mut utf32buf = Vec::new();
        let mut matches = Vec::new();
        for (key, value) in self.db.scan_prefix(DICTIONARY_PREFIX.as_bytes()) {
            let name = String::from_utf8_lossy(&key[DICTIONARY_PREFIX.len()..]);
            let haystack: Utf32Str<'_> = Utf32Str::new(&name, &mut utf32buf);
            if let Some(score) = pattern.score(haystack, &mut matcher) {
                matches.push(SymbolMatch {
                    name: name.into_owned(),
                    score,
                    locations: split_locations(value),
                });
            }
        }
        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        matches.truncate(limit);
        matches
    }

    pub fn manifest(&self) -> Result<Manifest> {
        match self.db.get(MANIFEST_KEY.as_bytes()) {
            Some(value) => decode(MANIFEST_KEY.as_bytes(), value),
            None => Ok(Manifest::default()),
        }
    }

    pub fn dirty(&self) -> Result<DirtySet> {
        scan_dirty(&self.db)
    }

    fn reference_value(&self, location: &str) -> Result<Option<ReferenceValue>> {
        self.db
            .get(location.as_bytes())
            .map(|value| decode(location.as_bytes(), value))
            .transpose()
    }
}

/// Rewrites the file part of `file:line:col` the way keys are stored.
pub fn normalize_location(location: &str) -> String {
    let mut parts = location.rsplitn(3, ':');
    let (Some(column), Some(line), Some(file)) = (parts.next(), parts.next(), parts.next())
    else {
        return location.to_string();
    };
    if line.parse::<u32>().is_err() || column.parse::<u32>().is_err() {
        return location.to_string();
    }
    format!(
        "{}:{line}:{column}",
        resolve_path(Path::new(file)).to_string_lossy()
    )
}
