//! Ordered byte-keyed store persisted as a single snapshot file.

pub mod schema;

use crate::error::IndexerError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::fs::TryLockError;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

const STORE_FILE: &str = "store.bin";
const STORE_TMP_FILE: &str = "store.bin.tmp";
const LOCK_FILE: &str = "LOCK";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

#[derive(Debug)]
enum Mode {
    /// Exclusive write pass. The OS lock on `LOCK` lives as long as the handle, so a writer
    /// that dies without unwinding never leaves the directory locked.
    Write { _lock: File },
    ReadOnly,
}

#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    records: BTreeMap<Vec<u8>, Vec<u8>>,
    mode: Mode,
}

impl Database {
    /// Deletes whatever lives at `path` and starts an empty write pass there.
    pub fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path).map_err(|err| open_error(path, err))?;
        let lock = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))
            .map_err(|err| open_error(path, err))?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(IndexerError::StorageLocked(path.to_path_buf()));
            }
            Err(TryLockError::Error(err)) => return Err(open_error(path, err)),
        }
        clear_directory(path).map_err(|err| open_error(path, err))?;
        debug!("created database at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            records: BTreeMap::new(),
            mode: Mode::Write { _lock: lock },
        })
    }

    /// Opens a committed database for queries and staleness scans.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(IndexerError::StorageOpen {
                path: path.to_path_buf(),
                reason: "no such database directory".to_string(),
            });
        }
        ensure_unlocked(path)?;
        let data = fs::read(path.join(STORE_FILE)).map_err(|err| open_error(path, err))?;
        let snapshot: Snapshot =
            bincode::deserialize(&data).map_err(|err| IndexerError::StorageOpen {
                path: path.to_path_buf(),
                reason: format!("unreadable snapshot: {err}"),
            })?;
        if snapshot.version != FORMAT_VERSION {
            return Err(IndexerError::StorageOpen {
                path: path.to_path_buf(),
                reason: format!(
                    "snapshot version {} (expected {FORMAT_VERSION})",
                    snapshot.version
                ),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            records: snapshot.records,
            mode: Mode::ReadOnly,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.mode, Mode::ReadOnly)
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<()> {
        if self.is_read_only() {
            return Err(IndexerError::ReadOnly(self.path.clone()));
        }
        self.records.insert(key.into(), value.into());
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.records.get(key).map(Vec::as_slice)
    }

    /// Records whose key starts with `prefix`, in key order.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.records
            .range(prefix.to_vec()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    /// Every record in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.records
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flushes the snapshot and releases the write lock.
    pub fn commit(mut self) -> Result<()> {
        if self.is_read_only() {
            return Err(IndexerError::ReadOnly(self.path.clone()));
        }
        let snapshot = Snapshot {
            version: FORMAT_VERSION,
            records: std::mem::take(&mut self.records),
        };
        let data = bincode::serialize(&snapshot)?;
        let tmp_path = self.path.join(STORE_TMP_FILE);
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, self.path.join(STORE_FILE))?;
        debug!(
            "committed {} records to {}",
            snapshot.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Fails with `StorageLocked` while a live writer holds `LOCK`. A leftover file with no owner is
/// not a lock.
fn ensure_unlocked(path: &Path) -> Result<()> {
    let lock = match File::open(path.join(LOCK_FILE)) {
        Ok(lock) => lock,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(open_error(path, err)),
    };
    match lock.try_lock_shared() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(IndexerError::StorageLocked(path.to_path_buf())),
        Err(TryLockError::Error(err)) => Err(open_error(path, err)),
    }
}

/// Removes everything under `path` except the lock file.
fn clear_directory(path: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_name() == LOCK_FILE {
            continue;
        }
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn open_error(path: &Path, err: std::io::Error) -> IndexerError {
    IndexerError::StorageOpen {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
