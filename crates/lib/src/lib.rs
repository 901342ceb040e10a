//! Dispatch board for a role-play emergency-services scenario.
//!
//! Tracks field units, groups of units, incident calls and BOLO alerts. All
//! state lives in one [`Snapshot`] held by a [`RecordStore`]; the
//! [`mutation`] functions compute each next snapshot, and a [`Board`] installs
//! it, stores it locally and optionally mirrors it to a hosted store.

mod board;
mod config;
mod error;
mod model;
pub mod mutation;
mod remote;
pub mod store;
mod sync;

#[cfg(test)]
mod testing;

pub use board::Board;
pub use config::{BoardConfig, DEFAULT_REMOTE_TIMEOUT, RemoteConfig};
pub use error::{PersistenceError, ValidationError};
pub use model::*;
pub use mutation::{CallPatch, NewBolo, NewCall, NewUnit};
pub use remote::{
    ChangeEvent, ChangeKind, RemoteStore, RemoteWrite, RestStore, Table, apply_write, poll_changes,
};
pub use store::{LocalStorage, RecordStore, STORAGE_KEY};
pub use sync::{Row, SyncAdapter, fetch_all, writes_between};
