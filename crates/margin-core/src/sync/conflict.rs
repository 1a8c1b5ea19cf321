//! Conflict escalation types and the presenter seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Note, NoteGuid};

/// A true conflict waiting for the user
///
/// Nothing has been written to either store when one of these exists.
#[derive(Debug, Clone)]
pub struct ConflictHandle {
    /// The copy in the local store
    pub local: Note,
    /// The incoming copy
    pub remote: Note,
    /// `local` vs `remote` change date: 1 local newer, -1 remote newer
    pub diff_direction: i32,
    /// First conflict escalated in the round. Presenters stack conflicts, so
    /// this one is shown last and its dismissal chains to batch completion.
    pub is_last_conflict: bool,
}

impl ConflictHandle {
    pub const fn guid(&self) -> NoteGuid {
        self.local.guid
    }
}

/// What the user chose for a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// Keep the local copy and send it to the remote
    ApplyLocal,
    /// Overwrite the local copy with the incoming one
    ApplyRemote,
    /// Leave both untouched until a later round
    Defer,
}

/// Presents a conflict to the user and waits for their decision
#[async_trait]
pub trait ConflictPresenter: Send + Sync {
    async fn present_conflict(&self, conflict: &ConflictHandle) -> ConflictDecision;
}

/// Applies the same decision to every conflict
#[derive(Debug, Clone, Copy)]
pub struct FixedPresenter(pub ConflictDecision);

#[async_trait]
impl ConflictPresenter for FixedPresenter {
    async fn present_conflict(&self, conflict: &ConflictHandle) -> ConflictDecision {
        tracing::info!(
            "Resolving conflict on '{}' ({}) with {:?}",
            conflict.local.title,
            conflict.guid(),
            self.0
        );
        self.0
    }
}
