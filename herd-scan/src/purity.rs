//! Ancestor path safety check.
//!
//! A tracked path is only trustworthy while every directory above it is a
//! real directory. If any ancestor has been replaced with a symlink, the
//! path's real target may lie outside the synchronized tree, so the recorded
//! identity must not be trusted. The check is re-evaluated on every walk and
//! never cached; the substitution it defends against can happen between
//! walks.

use std::fs;
use std::path::Path;

/// Whether any ancestor directory of `path` is missing or is a symlink.
///
/// Ancestors strictly between the leaf and the filesystem root are inspected
/// without following symlinks. The leaf's own type is irrelevant: a tracked
/// file may itself be a symlink and still be pure.
pub fn is_impure(path: &Path) -> bool {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.parent().is_none() {
            break;
        }
        match fs::symlink_metadata(ancestor) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    return true;
                }
            }
            Err(_) => return true,
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
