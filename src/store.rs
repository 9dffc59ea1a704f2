use crate::error::PersistenceError;
use crate::model::record::{CompositionPage, CompositionRecord};
use crate::util::{page_number, write_atomic};
use fs2::FileExt;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

type Registry = BTreeMap<String, CompositionRecord>;

/// Registry of composition records backed by a single JSON snapshot file.
///
/// One instance is meant to be shared (behind an `Arc`) by everything in the process that
/// touches the same snapshot. Writers hold the lock across both the snapshot rewrite and the
/// in-memory update, so concurrent `put`s are serialized and the file always matches memory.
/// Separate processes (or separate instances) over the same snapshot are serialized by an
/// exclusive advisory lock on `<snapshot>.lock`, and each `put` merges what is already on
/// disk before rewriting it.
#[derive(Debug)]
pub struct CompositionStore {
    path: PathBuf,
    records: RwLock<Registry>,
}

impl CompositionStore {
    /// Loads the snapshot at `path`. A missing, unreadable or corrupt snapshot yields an empty
    /// store.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = load_snapshot(&path);

        info!(
            "Loaded {} composition record(s) from {}..!",
            records.len(),
            path.display()
        );

        Self {
            path,
            records: RwLock::new(records),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces the record under its id, persisting the full snapshot before the
    /// record becomes visible. On failure the store is left exactly as it was.
    pub fn put(&self, record: CompositionRecord) -> Result<CompositionRecord, PersistenceError> {
        let Ok(mut records) = self.records.write() else {
            return Err(PersistenceError::Poisoned);
        };

        let _guard = self.lock_snapshot().map_err(|source| self.write_error(&record, source))?;

        // records written by other instances since we loaded
        let mut next = records.clone();
        if let Some(on_disk) = read_snapshot(&self.path) {
            next.extend(on_disk);
        }
        next.insert(record.id.clone(), record.clone());

        let json = serde_json::to_vec_pretty(&next)?;
        write_atomic(&self.path, &json).map_err(|source| self.write_error(&record, source))?;

        *records = next;
        debug!("Stored composition '{}' ({} total)", record.id, records.len());

        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<CompositionRecord> {
        self.read().get(id).cloned()
    }

    /// Records sorted by `created_at`, newest first, with `skip` dropped and at most `limit`
    /// returned. Equal timestamps fall back to id order.
    pub fn list(&self, skip: usize, limit: usize) -> CompositionPage {
        let records = self.read();
        let total = records.len();

        let mut sorted: Vec<&CompositionRecord> = records.values().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        CompositionPage {
            compositions: sorted.into_iter().skip(skip).take(limit).cloned().collect(),
            total,
            page: page_number(skip, limit),
            size: limit,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive advisory lock, released when the returned file is dropped.
    fn lock_snapshot(&self) -> io::Result<File> {
        let mut lock_path = OsString::from(self.path.as_os_str());
        lock_path.push(".lock");

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;

        Ok(file)
    }

    fn write_error(&self, record: &CompositionRecord, source: io::Error) -> PersistenceError {
        error!(
            "Failed to persist composition '{}' to {}: {}..!",
            record.id,
            self.path.display(),
            source
        );
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        // a poisoned lock still guards a registry that matches the snapshot
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_snapshot(path: &Path) -> Registry {
    read_snapshot(path).unwrap_or_default()
}

/// `None` when the snapshot is missing, unreadable or corrupt.
fn read_snapshot(path: &Path) -> Option<Registry> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No metadata snapshot at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!(
                "Failed to read metadata snapshot {}: {}..!",
                path.display(),
                e
            );
            return None;
        }
    };

    match serde_json::from_slice::<Registry>(&bytes) {
        Ok(records) => Some(records),
        Err(e) => {
            warn!(
                "Discarding corrupt metadata snapshot {}: {}..!",
                path.display(),
                e
            );
            None
        }
    }
}
