//! Reconciliation engine.
//!
//! A full pass over a subtree runs in two phases, always in this order:
//!
//! 1. [`Engine::check_deleted`] — retire tracked files that no longer exist
//!    on disk or whose ancestry is no longer safe.
//! 2. [`Engine::check_modified`] — walk the live tree, diff fingerprints
//!    against the store, and record changes.
//!
//! Retiring stale records first means the live scan never reconciles against
//! entries that are already known to be invalid.

use std::fs;
use std::path::{Path, PathBuf};

use herd_core::{DirtyRecord, FileRecord, HintRecord, PeerName, StateStore};

use crate::error::ScanError;
use crate::fingerprint::Fingerprinter;
use crate::purity::is_impure;
use crate::rules::{Classification, Classifier, HookRunner, PeerResolver};

/// The reconciliation engine for one local subtree.
///
/// Holds an exclusive handle to the state store plus the configured
/// collaborators. Single-threaded by design: one engine, one walk at a time.
/// Concurrent passes against the same store need external mutual exclusion;
/// the deletion pass's query-then-mutate sequence is not atomic against
/// interleaved writers.
pub struct Engine<'a, S: StateStore> {
    store: &'a mut S,
    rules: &'a dyn Classifier,
    fingerprint: &'a dyn Fingerprinter,
    peers: &'a dyn PeerResolver,
    hooks: &'a dyn HookRunner,
}

impl<'a, S: StateStore> Engine<'a, S> {
    pub fn new(
        store: &'a mut S,
        rules: &'a dyn Classifier,
        fingerprint: &'a dyn Fingerprinter,
        peers: &'a dyn PeerResolver,
        hooks: &'a dyn HookRunner,
    ) -> Self {
        Self {
            store,
            rules,
            fingerprint,
            peers,
            hooks,
        }
    }

    // -----------------------------------------------------------------------
    // Orchestration
    // -----------------------------------------------------------------------

    /// Run a full reconciliation pass for `path`: deletion detection first,
    /// then the live tree walk.
    ///
    /// With `init_run` set, fingerprint state is populated or retired without
    /// generating any dirty records (bootstrap scans).
    pub fn check(&mut self, path: &Path, recursive: bool, init_run: bool) -> Result<(), ScanError> {
        tracing::debug!(
            "running{} check of {}",
            if recursive { " recursive" } else { "" },
            path.display()
        );
        self.check_deleted(path, recursive, init_run)?;
        self.check_modified(path, recursive, true, init_run)
    }

    // -----------------------------------------------------------------------
    // Deletion detector
    // -----------------------------------------------------------------------

    /// Retire tracked files under `path` that are gone from disk or no
    /// longer pure.
    ///
    /// A candidate whose no-follow inspection fails is treated as confirmed
    /// deleted, not as an error. Each retired path is marked dirty (unless
    /// `init_run`) before its file record is deleted, so peer resolution
    /// still observes the path as classified state while marking.
    pub fn check_deleted(
        &mut self,
        path: &Path,
        recursive: bool,
        init_run: bool,
    ) -> Result<(), ScanError> {
        let candidates = self.store.files_within(path, recursive)?;

        let mut retired: Vec<PathBuf> = Vec::new();
        for record in candidates {
            if fs::symlink_metadata(&record.path).is_err() || is_impure(&record.path) {
                retired.push(record.path);
            }
        }

        for path in retired {
            tracing::debug!("retiring tracked file: {}", path.display());
            if !init_run {
                self.mark(&path, None)?;
            }
            self.store.remove_file(&path)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Change detector (tree walker)
    // -----------------------------------------------------------------------

    /// Walk the live filesystem under `path` and record changes.
    ///
    /// `allow_missing` permits the path to have vanished since the caller
    /// enumerated it; without it, a failed inspection of a non-excluded path
    /// is the fatal [`ScanError::Inspect`] inconsistency. Children are
    /// visited in lexically ascending order so traversal is reproducible; an
    /// unreadable directory listing skips that subtree only.
    pub fn check_modified(
        &mut self,
        path: &Path,
        recursive: bool,
        allow_missing: bool,
        init_run: bool,
    ) -> Result<(), ScanError> {
        let class = self.rules.classify(path);
        if class == Classification::Excluded {
            // Excluded paths are never inspected at all.
            tracing::debug!("not checking at all: {}", path.display());
            return Ok(());
        }

        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(_) if allow_missing => return Ok(()),
            Err(source) => {
                return Err(ScanError::Inspect {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if class.checks_content() {
            tracing::debug!("checking {}", path.display());
            let current = self
                .fingerprint
                .generate(&meta, path, false)
                .map_err(|source| ScanError::Fingerprint {
                    path: path.to_path_buf(),
                    source,
                })?;
            let known = self.store.lookup_file(path)?;
            let dirty = match &known {
                Some(record) => !self.fingerprint.equal(&current, &record.fingerprint),
                None => true,
            };
            if dirty {
                match known {
                    Some(_) => tracing::debug!("file has changed: {}", path.display()),
                    None => tracing::debug!("new file: {}", path.display()),
                }
                self.store.upsert_file(FileRecord {
                    path: path.to_path_buf(),
                    fingerprint: current,
                })?;
                if !init_run {
                    self.mark(path, None)?;
                }
            }
        }

        if recursive && class.may_recurse() && meta.is_dir() {
            tracing::debug!("checking children of {}", path.display());
            let mut children: Vec<PathBuf> = Vec::new();
            let listing = match fs::read_dir(path) {
                Ok(listing) => listing,
                Err(err) => {
                    tracing::warn!(
                        "cannot list {}: {err}; skipping subtree",
                        path.display()
                    );
                    return Ok(());
                }
            };
            for entry in listing {
                match entry {
                    Ok(entry) => children.push(entry.path()),
                    Err(err) => {
                        tracing::warn!(
                            "cannot list {}: {err}; skipping subtree",
                            path.display()
                        );
                        return Ok(());
                    }
                }
            }
            children.sort();
            for child in children {
                self.check_modified(&child, recursive, false, init_run)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dirty marker
    // -----------------------------------------------------------------------

    /// Record synchronization obligations for a changed `path`.
    ///
    /// Hooks run first, then peer edges are resolved; `origin` names the peer
    /// a change report came from, whose echo edge is excluded. A path outside
    /// every peer group produces no records. All edges for one mark are
    /// inserted as a single batch.
    pub fn mark(&mut self, path: &Path, origin: Option<&PeerName>) -> Result<(), ScanError> {
        self.hooks.run(path, origin.is_none());

        let edges = self.peers.resolve(path, origin);
        if edges.is_empty() {
            tracing::debug!("not in any of my groups: {}", path.display());
            return Ok(());
        }

        tracing::info!("marking file as dirty: {}", path.display());
        let records = edges
            .into_iter()
            .map(|edge| DirtyRecord {
                path: path.to_path_buf(),
                force: false,
                myname: edge.myname,
                peername: edge.peername,
            })
            .collect();
        self.store.add_dirty(records)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hint recorder
// ---------------------------------------------------------------------------

/// Queue a manual recheck request for `path`.
///
/// Inserts one hint record unconditionally; no validation, no interaction
/// with file or dirty state. A later reconciliation pass consumes it.
pub fn record_hint<S: StateStore>(
    store: &mut S,
    path: &Path,
    recursive: bool,
) -> Result<(), ScanError> {
    tracing::debug!("adding hint: {}", path.display());
    store.add_hint(HintRecord {
        path: path.to_path_buf(),
        recursive,
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
