//! Domain types for the Herd state store.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. Persisted records are serializable via serde + serde_json.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerName(pub String);

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PeerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Last known synchronized state of a tracked file.
///
/// The store keeps at most one record per path; a fresh sighting of the same
/// path replaces the previous fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path of the tracked file.
    pub path: PathBuf,
    /// Opaque fingerprint string produced by the configured generator.
    pub fingerprint: String,
}

/// A pending synchronization edge: `path` must be synced from `myname`
/// to `peername`.
///
/// Duplicates for the same (path, peer) pair are permitted; consumers of the
/// dirty table collapse them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyRecord {
    pub path: PathBuf,
    /// Reserved for externally forced resyncs; change-driven marks always
    /// record `false`.
    pub force: bool,
    pub myname: PeerName,
    pub peername: PeerName,
}

/// A manually queued request to recheck `path` on a later scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRecord {
    pub path: PathBuf,
    pub recursive: bool,
}

// ---------------------------------------------------------------------------
// Ephemeral types
// ---------------------------------------------------------------------------

/// One directed synchronization relationship resolved from peer-group
/// membership. Never persisted; the dirty marker turns edges into
/// [`DirtyRecord`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEdge {
    pub myname: PeerName,
    pub peername: PeerName,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
