//! Herd core library — domain types, state store contract, JSON store.
//!
//! Public API surface:
//! - [`types`] — newtypes and persisted record structs
//! - [`error`] — [`StoreError`]
//! - [`store`] — [`StateStore`] contract and the bundled [`JsonStateStore`]

pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{JsonStateStore, StateStore};
pub use types::{DirtyRecord, FileRecord, HintRecord, PeerEdge, PeerName};
