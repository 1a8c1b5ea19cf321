//! Reconciliation engine
//!
//! Every incoming note goes through [`Reconciler`], either as a plain import
//! or as part of a push round. The engine reads the local copy, classifies the
//! pair and issues exactly the side effects the verdict calls for. Conflicts
//! are handed back to the caller untouched; nothing is written until
//! [`Reconciler::resolve_conflict`] receives the user's decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::conflict::{ConflictDecision, ConflictHandle};
use super::decision::{classify, Comparison, Verdict};
use super::guid_lock::GuidLocks;
use super::remote::RemoteSyncService;
use super::round::{SyncRound, Terminal};
use crate::db::{NoteKey, NoteStore};
use crate::error::Result;
use crate::models::Note;

/// What reconciling a note did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// First time this guid was seen locally
    Inserted,
    /// Same change date on both sides; local fields overwritten anyway
    Refreshed,
    /// The local copy was sent to the remote
    PushedLocal,
    /// A local tombstone was deleted on the remote and then locally
    DeletedEverywhere,
    /// The incoming copy replaced the local one
    PulledRemote,
    /// Local copy is newer but no round is open; it goes out with the next one
    KeptLocal,
    /// The user postponed a conflict
    Deferred,
}

/// A settled reconciliation
#[derive(Debug, Clone)]
pub struct Resolution {
    pub action: SyncAction,
    /// The copy that won
    pub note: Note,
}

/// Outcome of reconciling one incoming note
#[derive(Debug, Clone)]
pub enum Reconciliation {
    Resolved(Resolution),
    /// A true conflict; the round cannot end until it is resolved
    AwaitingUser(ConflictHandle),
}

impl Reconciliation {
    pub const fn action(&self) -> Option<SyncAction> {
        match self {
            Self::Resolved(resolution) => Some(resolution.action),
            Self::AwaitingUser(_) => None,
        }
    }
}

/// Decides between local and incoming copies and applies the outcome
pub struct Reconciler {
    store: Arc<dyn NoteStore>,
    remote: Arc<dyn RemoteSyncService>,
    locks: GuidLocks,
}

impl Reconciler {
    pub fn new(store: Arc<dyn NoteStore>, remote: Arc<dyn RemoteSyncService>) -> Self {
        Self {
            store,
            remote,
            locks: GuidLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSyncService> {
        &self.remote
    }

    /// Reconcile a note outside a push round, as ingestion does.
    ///
    /// Conflicts are never escalated here and the remote is never touched.
    pub async fn import(&self, note: Note) -> Result<Resolution> {
        match self.decide(note, None).await? {
            Reconciliation::Resolved(resolution) => Ok(resolution),
            Reconciliation::AwaitingUser(conflict) => {
                // classify() only reports conflicts for push rounds
                tracing::warn!("Import escalated a conflict on {}", conflict.guid());
                Ok(Resolution {
                    action: SyncAction::KeptLocal,
                    note: conflict.local,
                })
            }
        }
    }

    /// Reconcile an incoming note as part of `round`.
    ///
    /// Issues the round's terminal call when this note completes it.
    pub async fn reconcile(&self, note: Note, round: &SyncRound) -> Result<Reconciliation> {
        let guid = note.guid;
        let outcome = self.decide(note, Some(round)).await?;

        if let Some(terminal) = round.note_reconciled(guid) {
            self.end_round(terminal).await?;
        }
        Ok(outcome)
    }

    /// Apply the user's decision on a conflict escalated during `round`.
    pub async fn resolve_conflict(
        &self,
        conflict: ConflictHandle,
        decision: ConflictDecision,
        round: &SyncRound,
    ) -> Result<Resolution> {
        let guid = conflict.guid();
        let (resolution, uploaded) = {
            let _guard = self.locks.lock(guid).await;
            match decision {
                ConflictDecision::ApplyLocal => {
                    // The stored copy may have moved on while the user was deciding.
                    let local = self.store.find(&guid).await?.unwrap_or(conflict.local);
                    (self.push_local(local).await?, true)
                }
                ConflictDecision::ApplyRemote => (self.pull(conflict.remote).await?, false),
                ConflictDecision::Defer => {
                    tracing::info!("Conflict on '{}' ({guid}) deferred", conflict.local.title);
                    let resolution = Resolution {
                        action: SyncAction::Deferred,
                        note: conflict.local,
                    };
                    (resolution, false)
                }
            }
        };

        if let Some(terminal) = round.conflict_resolved(guid, uploaded) {
            self.end_round(terminal).await?;
        }
        Ok(resolution)
    }

    /// End a round that had no incoming notes. Returns whether a terminal call was made.
    pub async fn close_round(&self, round: &SyncRound) -> Result<bool> {
        match round.close() {
            Some(terminal) => {
                self.end_round(terminal).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn decide(&self, note: Note, round: Option<&SyncRound>) -> Result<Reconciliation> {
        let _guard = self.locks.lock(note.guid).await;

        let Some(local) = self.store.find(&note.guid).await? else {
            tracing::debug!("New note '{}' ({})", note.title, note.guid);
            let note = self.store_note(note).await?;
            return Ok(Reconciliation::Resolved(Resolution {
                action: SyncAction::Inserted,
                note,
            }));
        };

        let baseline = round.map_or(DateTime::<Utc>::UNIX_EPOCH, SyncRound::baseline);
        let comparison = Comparison::new(local.last_change_date(), note.last_change_date(), baseline);
        let verdict = classify(&comparison, round.is_some());
        tracing::debug!(
            "Reconciling '{}' ({}): {:?} (both {:?}, baseline-local {:?}, baseline-remote {:?})",
            note.title,
            note.guid,
            verdict,
            comparison.both,
            comparison.sync_local,
            comparison.sync_remote
        );

        let resolution = match (verdict, round) {
            (Verdict::Identical, _) => self.refresh(&local, note).await?,
            (Verdict::Conflict, Some(round)) => {
                let is_last_conflict = round.register_conflict(note.guid);
                tracing::info!("Conflict on '{}' ({}) needs a decision", local.title, local.guid);
                return Ok(Reconciliation::AwaitingUser(ConflictHandle {
                    local,
                    remote: note,
                    diff_direction: comparison.direction(),
                    is_last_conflict,
                }));
            }
            (Verdict::LocalNewer, Some(round)) => {
                let guid = local.guid;
                let resolution = self.push_local(local).await?;
                round.record_upload(guid);
                resolution
            }
            (Verdict::LocalNewer | Verdict::Conflict, None) => {
                tracing::debug!("Keeping newer local copy of {} until the next round", local.guid);
                Resolution {
                    action: SyncAction::KeptLocal,
                    note: local,
                }
            }
            (Verdict::RemoteNewer, _) => self.pull(note).await?,
        };

        Ok(Reconciliation::Resolved(resolution))
    }

    /// Local wins: propagate a tombstone or upload the note.
    async fn push_local(&self, local: Note) -> Result<Resolution> {
        if local.is_deleted() {
            tracing::debug!("Deleting '{}' ({}) from remote and locally", local.title, local.guid);
            self.remote.delete_note(&local.guid).await?;
            let key = local
                .local_handle
                .map_or(NoteKey::Guid(local.guid), NoteKey::Handle);
            self.store.delete(key).await?;
            Ok(Resolution {
                action: SyncAction::DeletedEverywhere,
                note: local,
            })
        } else {
            tracing::debug!("Pushing local '{}' ({})", local.title, local.guid);
            self.remote.push_note(&local).await?;
            Ok(Resolution {
                action: SyncAction::PushedLocal,
                note: local,
            })
        }
    }

    /// Remote wins: overwrite the local copy.
    async fn pull(&self, incoming: Note) -> Result<Resolution> {
        tracing::debug!("Pulling remote '{}' ({})", incoming.title, incoming.guid);
        let note = self.store_note(incoming).await?;
        Ok(Resolution {
            action: SyncAction::PulledRemote,
            note,
        })
    }

    async fn refresh(&self, local: &Note, incoming: Note) -> Result<Resolution> {
        if local.xml_content() != incoming.xml_content() {
            tracing::warn!(
                "Note '{}' ({}) has the same change date on both sides but different content; keeping the incoming body",
                incoming.title,
                incoming.guid
            );
        }
        let note = self.store_note(incoming).await?;
        Ok(Resolution {
            action: SyncAction::Refreshed,
            note,
        })
    }

    async fn store_note(&self, mut note: Note) -> Result<Note> {
        let handle = self.store.upsert(&note).await?;
        note.local_handle = Some(handle);
        Ok(note)
    }

    async fn end_round(&self, terminal: Terminal) -> Result<()> {
        match terminal {
            Terminal::Finished => {
                tracing::info!("Sync round complete, nothing uploaded");
                self.remote.finish_sync(true).await
            }
            Terminal::LastGuid(guid) => {
                tracing::info!("Sync round complete, last upload {guid}");
                self.remote.set_last_guid(&guid).await
            }
        }
    }
}
