//! File fingerprints.
//!
//! A fingerprint is an opaque string summarizing a file's metadata (and
//! optionally content) so change can be detected without a full content
//! comparison. The engine only depends on the [`Fingerprinter`] contract;
//! [`MetadataFingerprint`] is the bundled generator.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Generates and compares file fingerprints.
///
/// `generate` must be deterministic given identical inputs. `equal` may apply
/// tolerance (e.g. ignoring mtime when one side omits it) but must also be
/// deterministic.
pub trait Fingerprinter {
    /// Build a fingerprint from a no-follow inspection result. `ignore_mtime`
    /// requests a fingerprint that compares equal across pure timestamp
    /// changes.
    fn generate(&self, meta: &fs::Metadata, path: &Path, ignore_mtime: bool)
        -> io::Result<String>;

    /// Compare two fingerprints for equality.
    fn equal(&self, a: &str, b: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Default generator
// ---------------------------------------------------------------------------

/// Metadata-based fingerprint generator.
///
/// Produces `v1` colon-separated `key=value` fields: file type, permission
/// bits, owner, size, whole-second mtime, and the (hex-encoded) symlink
/// target for symlinks. With [`MetadataFingerprint::with_content_digest`] a
/// SHA-256 digest of regular file contents is appended, trading scan speed
/// for content-level change detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataFingerprint {
    content_digest: bool,
}

impl MetadataFingerprint {
    /// Metadata-only fingerprints.
    pub fn new() -> Self {
        Self {
            content_digest: false,
        }
    }

    /// Metadata fingerprints plus a SHA-256 content digest for regular files.
    pub fn with_content_digest() -> Self {
        Self {
            content_digest: true,
        }
    }
}

impl Fingerprinter for MetadataFingerprint {
    fn generate(
        &self,
        meta: &fs::Metadata,
        path: &Path,
        ignore_mtime: bool,
    ) -> io::Result<String> {
        let ftype = meta.file_type();
        let mut out = String::from("v1");
        push_field(&mut out, "type", type_name(meta));

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            push_field(&mut out, "mode", &format!("{:o}", meta.mode() & 0o7777));
            push_field(&mut out, "uid", &meta.uid().to_string());
            push_field(&mut out, "gid", &meta.gid().to_string());
        }

        if ftype.is_file() {
            push_field(&mut out, "size", &meta.len().to_string());
        }

        if !ignore_mtime {
            // Whole seconds only: sub-second drift between filesystems must
            // not register as a change.
            let mtime = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            push_field(&mut out, "mtime", &mtime.to_string());
        }

        if ftype.is_symlink() {
            let target = fs::read_link(path)?;
            push_field(&mut out, "target", &hex::encode(target_bytes(&target)));
        }

        if self.content_digest && ftype.is_file() {
            let contents = fs::read(path)?;
            let mut hasher = Sha256::new();
            hasher.update(&contents);
            push_field(&mut out, "sha256", &hex::encode(hasher.finalize()));
        }

        Ok(out)
    }

    fn equal(&self, a: &str, b: &str) -> bool {
        let (version_a, mut fields_a) = parse(a);
        let (version_b, mut fields_b) = parse(b);
        if version_a != version_b {
            return false;
        }
        // Tolerance: a side generated with `ignore_mtime` carries no mtime
        // field; in that case timestamps are not compared at all.
        if !fields_a.contains_key("mtime") || !fields_b.contains_key("mtime") {
            fields_a.remove("mtime");
            fields_b.remove("mtime");
        }
        fields_a == fields_b
    }
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push(':');
    out.push_str(key);
    out.push('=');
    out.push_str(value);
}

fn type_name(meta: &fs::Metadata) -> &'static str {
    let ftype = meta.file_type();
    if ftype.is_file() {
        "reg"
    } else if ftype.is_dir() {
        "dir"
    } else if ftype.is_symlink() {
        "lnk"
    } else {
        "other"
    }
}

#[cfg(unix)]
fn target_bytes(target: &Path) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    target.as_os_str().as_bytes()
}

#[cfg(not(unix))]
fn target_bytes(target: &Path) -> Vec<u8> {
    target.to_string_lossy().into_owned().into_bytes()
}

/// Split a fingerprint into its version token and `key=value` fields. Field
/// order does not affect comparison.
fn parse(s: &str) -> (Option<&str>, BTreeMap<&str, &str>) {
    let mut parts = s.split(':');
    let version = parts.next();
    let mut fields = BTreeMap::new();
    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            fields.insert(key, value);
        }
    }
    (version, fields)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
