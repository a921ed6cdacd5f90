//! # herd-scan
//!
//! Local reconciliation engine: decides which files under a subtree have
//! appeared, changed, or disappeared since the last recorded state, and turns
//! that delta into per-peer dirty records in the state store.
//!
//! Call [`Engine::check`] to run a full reconciliation pass (deletion pass
//! first, then the live tree walk), or [`record_hint`] to queue a manual
//! recheck for a later pass.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod purity;
pub mod rules;

pub use engine::{record_hint, Engine};
pub use error::ScanError;
pub use fingerprint::{Fingerprinter, MetadataFingerprint};
pub use purity::is_impure;
pub use rules::{Classification, Classifier, HookRunner, NoHooks, PeerResolver};
