//! Persisted reconciliation state.
//!
//! Three tables back the scan engine:
//!
//! - `files` — path → fingerprint, at most one row per path
//! - `dirty` — pending synchronization edges, duplicates allowed
//! - `hints` — manually queued recheck requests
//!
//! [`StateStore`] is the contract the engine is written against; the handle is
//! passed explicitly to every component, never held in a process-wide global.
//! [`JsonStateStore`] is the bundled implementation: one JSON document,
//! persisted with the same atomic `.tmp` + rename pattern on every mutating
//! batch.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::types::{DirtyRecord, FileRecord, HintRecord};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Read/write access to the reconciliation state tables.
pub trait StateStore {
    /// Look up the file record for an exact path.
    fn lookup_file(&self, path: &Path) -> Result<Option<FileRecord>, StoreError>;

    /// All file records equal to `root`, plus — when `recursive` — every
    /// record lexically inside the `root` subtree, in ascending path order.
    ///
    /// Subtree membership is the half-open range bounded by `root` plus a
    /// separator, so sibling paths sharing a prefix are excluded. A recursive
    /// query on `/` matches every record.
    fn files_within(&self, root: &Path, recursive: bool) -> Result<Vec<FileRecord>, StoreError>;

    /// Insert or replace the file record for `record.path`.
    fn upsert_file(&mut self, record: FileRecord) -> Result<(), StoreError>;

    /// Delete the file record for `path`. Deleting an untracked path is a
    /// no-op.
    fn remove_file(&mut self, path: &Path) -> Result<(), StoreError>;

    /// Append dirty records. The whole batch commits as a single unit, so a
    /// multi-peer mark is never partially persisted.
    fn add_dirty(&mut self, records: Vec<DirtyRecord>) -> Result<(), StoreError>;

    /// Append one hint record.
    fn add_hint(&mut self, hint: HintRecord) -> Result<(), StoreError>;

    /// All dirty records, in insertion order. Duplicates are not collapsed
    /// here; that is the consumer's job.
    fn dirty(&self) -> Result<Vec<DirtyRecord>, StoreError>;

    /// All hint records, in insertion order.
    fn hints(&self) -> Result<Vec<HintRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// JSON document
// ---------------------------------------------------------------------------

/// On-disk state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateDocument {
    updated_at: DateTime<Utc>,
    files: BTreeMap<String, String>,
    dirty: Vec<DirtyRecord>,
    hints: Vec<HintRecord>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            updated_at: Utc::now(),
            files: BTreeMap::new(),
            dirty: Vec::new(),
            hints: Vec::new(),
        }
    }
}

/// JSON-document state store.
///
/// The document is held in memory and rewritten atomically after each
/// mutating batch: serialize → `<path>.tmp` sibling → rename. The `.tmp`
/// file lives in the same directory as the target, so the rename never
/// crosses filesystems.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    doc: StateDocument,
}

impl JsonStateStore {
    /// Open the state document at `path`, starting empty if it does not
    /// exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            serde_json::from_str(&contents)?
        } else {
            StateDocument::default()
        };
        Ok(Self { path, doc })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&mut self) -> Result<(), StoreError> {
        self.doc.updated_at = Utc::now();
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }
}

/// Store keys are UTF-8 strings; reject anything else instead of encoding it
/// lossily.
fn key(path: &Path) -> Result<&str, StoreError> {
    path.to_str().ok_or_else(|| StoreError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}

impl StateStore for JsonStateStore {
    fn lookup_file(&self, path: &Path) -> Result<Option<FileRecord>, StoreError> {
        let key = key(path)?;
        Ok(self.doc.files.get(key).map(|fingerprint| FileRecord {
            path: path.to_path_buf(),
            fingerprint: fingerprint.clone(),
        }))
    }

    fn files_within(&self, root: &Path, recursive: bool) -> Result<Vec<FileRecord>, StoreError> {
        let root = key(root)?;
        let mut records = Vec::new();

        if recursive && root == "/" {
            for (path, fingerprint) in &self.doc.files {
                records.push(FileRecord {
                    path: PathBuf::from(path),
                    fingerprint: fingerprint.clone(),
                });
            }
            return Ok(records);
        }

        // Exact match sorts before everything in the subtree range.
        if let Some(fingerprint) = self.doc.files.get(root) {
            records.push(FileRecord {
                path: PathBuf::from(root),
                fingerprint: fingerprint.clone(),
            });
        }

        if recursive {
            // Half-open range: everything above "<root>/" and below "<root>0"
            // ('0' is the byte after '/'). Siblings like "<root>x" fall
            // outside it.
            let low = format!("{root}/");
            let high = format!("{root}0");
            let range = (Bound::Excluded(low), Bound::Excluded(high));
            for (path, fingerprint) in self.doc.files.range::<String, _>(range) {
                records.push(FileRecord {
                    path: PathBuf::from(path),
                    fingerprint: fingerprint.clone(),
                });
            }
        }

        Ok(records)
    }

    fn upsert_file(&mut self, record: FileRecord) -> Result<(), StoreError> {
        let key = key(&record.path)?.to_owned();
        self.doc.files.insert(key, record.fingerprint);
        self.save()
    }

    fn remove_file(&mut self, path: &Path) -> Result<(), StoreError> {
        let key = key(path)?.to_owned();
        if self.doc.files.remove(&key).is_none() {
            return Ok(());
        }
        self.save()
    }

    fn add_dirty(&mut self, records: Vec<DirtyRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            key(&record.path)?;
        }
        self.doc.dirty.extend(records);
        self.save()
    }

    fn add_hint(&mut self, hint: HintRecord) -> Result<(), StoreError> {
        key(&hint.path)?;
        self.doc.hints.push(hint);
        self.save()
    }

    fn dirty(&self) -> Result<Vec<DirtyRecord>, StoreError> {
        Ok(self.doc.dirty.clone())
    }

    fn hints(&self) -> Result<Vec<HintRecord>, StoreError> {
        Ok(self.doc.hints.clone())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerName;
    use tempfile::TempDir;

    fn record(path: &str, fingerprint: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            fingerprint: fingerprint.to_owned(),
        }
    }

    fn open_store(dir: &TempDir) -> JsonStateStore {
        JsonStateStore::open(dir.path().join("state.json")).expect("open")
    }

    #[test]
    fn open_missing_file_starts_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir);
        assert!(store.dirty().expect("dirty").is_empty());
        assert!(store.hints().expect("hints").is_empty());
        assert!(store
            .files_within(Path::new("/"), true)
            .expect("files")
            .is_empty());
    }

    #[test]
    fn upsert_then_lookup_after_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store
            .upsert_file(record("/data/x", "v1:mtime=1"))
            .expect("upsert");
        drop(store);

        let store = open_store(&dir);
        let found = store
            .lookup_file(Path::new("/data/x"))
            .expect("lookup")
            .expect("present");
        assert_eq!(found.fingerprint, "v1:mtime=1");
    }

    #[test]
    fn upsert_replaces_existing_fingerprint() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/x", "old")).expect("first");
        store.upsert_file(record("/data/x", "new")).expect("second");

        let all = store.files_within(Path::new("/"), true).expect("files");
        assert_eq!(all.len(), 1, "at most one record per path");
        assert_eq!(all[0].fingerprint, "new");
    }

    #[test]
    fn files_within_excludes_siblings_sharing_a_prefix() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/a", "a")).expect("upsert");
        store.upsert_file(record("/data/a/f", "f")).expect("upsert");
        store.upsert_file(record("/data/ab", "ab")).expect("upsert");

        let within = store
            .files_within(Path::new("/data/a"), true)
            .expect("files");
        let paths: Vec<_> = within.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/data/a"), PathBuf::from("/data/a/f")]
        );
    }

    #[test]
    fn files_within_non_recursive_is_exact_match_only() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/a", "a")).expect("upsert");
        store.upsert_file(record("/data/a/f", "f")).expect("upsert");

        let within = store
            .files_within(Path::new("/data/a"), false)
            .expect("files");
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].path, PathBuf::from("/data/a"));
    }

    #[test]
    fn recursive_root_query_matches_every_record() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/etc/f", "1")).expect("upsert");
        store.upsert_file(record("/data/g", "2")).expect("upsert");

        let all = store.files_within(Path::new("/"), true).expect("files");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn files_within_returns_ascending_path_order() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/c", "3")).expect("upsert");
        store.upsert_file(record("/data/a", "1")).expect("upsert");
        store.upsert_file(record("/data/b", "2")).expect("upsert");

        let all = store.files_within(Path::new("/data"), true).expect("files");
        let paths: Vec<_> = all.iter().map(|r| r.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn remove_untracked_path_is_noop() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store
            .remove_file(Path::new("/never/seen"))
            .expect("remove absent");
    }

    #[test]
    fn remove_file_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/x", "v")).expect("upsert");
        store.remove_file(Path::new("/data/x")).expect("remove");
        drop(store);

        let store = open_store(&dir);
        assert!(store
            .lookup_file(Path::new("/data/x"))
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn dirty_batch_persists_all_rows_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        let batch = vec![
            DirtyRecord {
                path: PathBuf::from("/data/x"),
                force: false,
                myname: PeerName::from("a"),
                peername: PeerName::from("b"),
            },
            DirtyRecord {
                path: PathBuf::from("/data/x"),
                force: false,
                myname: PeerName::from("a"),
                peername: PeerName::from("c"),
            },
        ];
        store.add_dirty(batch.clone()).expect("add");
        drop(store);

        let store = open_store(&dir);
        assert_eq!(store.dirty().expect("dirty"), batch);
    }

    #[test]
    fn duplicate_dirty_rows_are_kept() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        let row = DirtyRecord {
            path: PathBuf::from("/data/x"),
            force: false,
            myname: PeerName::from("a"),
            peername: PeerName::from("b"),
        };
        store.add_dirty(vec![row.clone()]).expect("first");
        store.add_dirty(vec![row.clone()]).expect("second");
        assert_eq!(store.dirty().expect("dirty").len(), 2);
    }

    #[test]
    fn hint_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        let hint = HintRecord {
            path: PathBuf::from("/data"),
            recursive: true,
        };
        store.add_hint(hint.clone()).expect("add");
        drop(store);

        let store = open_store(&dir);
        assert_eq!(store.hints().expect("hints"), vec![hint]);
    }

    #[test]
    fn save_cleans_up_tmp_file() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        store.upsert_file(record("/data/x", "v")).expect("upsert");
        let tmp = dir.path().join("state.json.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn path_with_quotes_and_separators_roundtrips() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        let tricky = "/data/has \"quotes\" and 'more', plus:colons";
        store.upsert_file(record(tricky, "v")).expect("upsert");
        drop(store);

        let store = open_store(&dir);
        let found = store
            .lookup_file(Path::new(tricky))
            .expect("lookup")
            .expect("present");
        assert_eq!(found.path, PathBuf::from(tricky));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().expect("tempdir");
        let mut store = open_store(&dir);
        let bad = PathBuf::from(OsStr::from_bytes(b"/data/\xff"));
        let err = store
            .upsert_file(FileRecord {
                path: bad,
                fingerprint: "v".to_owned(),
            })
            .expect_err("non-UTF-8 path must be rejected");
        assert!(matches!(err, StoreError::NonUtf8Path { .. }));
    }
}
