//! Synchronization with the remote note service
//!
//! [`Reconciler`] decides per note, [`SyncRound`] sequences the terminal call
//! of a push round and [`SyncRunner`] drives a whole round end to end.

mod conflict;
pub mod decision;
mod engine;
mod folder_remote;
mod guid_lock;
mod remote;
mod round;
mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use conflict::{ConflictDecision, ConflictHandle, ConflictPresenter, FixedPresenter};
pub use engine::{Reconciler, Reconciliation, Resolution, SyncAction};
pub use folder_remote::{FolderRemote, SyncState, SYNC_STATE_FILE};
pub use remote::RemoteSyncService;
pub use round::{SyncRound, Terminal};
pub use runner::{RoundReport, SyncRunner};
