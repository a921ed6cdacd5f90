//! Collaborator contracts the engine is written against.
//!
//! Classification, peer resolution, and command hooks are all configuration
//! concerns; the engine only sees these traits.

use std::path::Path;

use herd_core::{PeerEdge, PeerName};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a path participates in reconciliation.
///
/// The two walk decisions — "diff this path's own content" and "descend into
/// children" — are exposed as separate predicates rather than an ordering on
/// the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Ignore entirely. The engine never inspects the filesystem for an
    /// excluded path.
    Excluded,
    /// Do not diff the path itself, but descend into children on recursive
    /// walks.
    TraverseOnly,
    /// Diff the path's fingerprint, and also descend into children on
    /// recursive walks.
    Tracked,
}

impl Classification {
    /// Whether the path's own fingerprint is diffed against the store.
    pub fn checks_content(self) -> bool {
        matches!(self, Classification::Tracked)
    }

    /// Whether a recursive walk may descend into the path's children.
    pub fn may_recurse(self) -> bool {
        !matches!(self, Classification::Excluded)
    }
}

/// Resolves a path against configured include/exclude rules.
pub trait Classifier {
    fn classify(&self, path: &Path) -> Classification;
}

// ---------------------------------------------------------------------------
// Peer resolution
// ---------------------------------------------------------------------------

/// Resolves the synchronization edges for a path from peer-group membership.
///
/// `exclude` names the peer a change report originated from; edges back to it
/// are omitted so the obligation is not echoed to its source. Implementations
/// should return edges in a stable order.
pub trait PeerResolver {
    fn resolve(&self, path: &Path, exclude: Option<&PeerName>) -> Vec<PeerEdge>;
}

// ---------------------------------------------------------------------------
// Command hooks
// ---------------------------------------------------------------------------

/// Runs any actions bound to a path when it is marked dirty.
///
/// Fire-and-forget from the engine's perspective: implementations must not
/// let a hook failure abort the walk. `top_level` is true when the mark was
/// triggered directly by a scan or user request rather than cascaded from
/// deletion handling on behalf of a peer.
pub trait HookRunner {
    fn run(&self, path: &Path, top_level: bool);
}

/// Hook runner that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookRunner for NoHooks {
    fn run(&self, _path: &Path, _top_level: bool) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
