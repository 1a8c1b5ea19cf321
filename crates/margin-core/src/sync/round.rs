//! Per-round batch sequencing
//!
//! A push round ends with a single terminal call to the remote. The tracker
//! decides when that is: after the last note of the batch has been reconciled
//! and no escalated conflict is still waiting for the user.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::models::{Note, NoteGuid};

/// The call that ends a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Nothing was uploaded: `finish_sync(true)`
    Finished,
    /// Uploads were made: `set_last_guid(guid)` names the final one
    LastGuid(NoteGuid),
}

#[derive(Debug, Default)]
struct RoundState {
    last_seen: bool,
    pending_conflicts: BTreeSet<NoteGuid>,
    first_conflict: Option<NoteGuid>,
    last_upload: Option<NoteGuid>,
    terminal: Option<Terminal>,
}

/// Sequencing state for one sync round
#[derive(Debug)]
pub struct SyncRound {
    last_guid: Option<NoteGuid>,
    baseline: DateTime<Utc>,
    state: Mutex<RoundState>,
}

impl SyncRound {
    pub fn new(last_guid: Option<NoteGuid>, baseline: DateTime<Utc>) -> Self {
        Self {
            last_guid,
            baseline,
            state: Mutex::new(RoundState::default()),
        }
    }

    /// Round over `notes`, whose final entry is the last note of the batch
    pub fn for_batch(notes: &[Note], baseline: DateTime<Utc>) -> Self {
        Self::new(notes.last().map(|note| note.guid), baseline)
    }

    /// Start of the last completed round
    pub const fn baseline(&self) -> DateTime<Utc> {
        self.baseline
    }

    pub const fn last_guid(&self) -> Option<NoteGuid> {
        self.last_guid
    }

    /// The terminal call, once issued
    pub fn terminal(&self) -> Option<Terminal> {
        self.state().terminal
    }

    pub fn pending_conflicts(&self) -> usize {
        self.state().pending_conflicts.len()
    }

    pub(crate) fn record_upload(&self, guid: NoteGuid) {
        let mut state = self.state();
        if state.terminal.is_some() {
            tracing::warn!("Upload of {guid} recorded after the round already ended");
        }
        state.last_upload = Some(guid);
    }

    /// Track an escalated conflict. Returns whether it is the round's first.
    pub(crate) fn register_conflict(&self, guid: NoteGuid) -> bool {
        let mut state = self.state();
        state.pending_conflicts.insert(guid);
        if state.first_conflict.is_none() {
            tracing::debug!("Conflict {guid} is the last one to be presented");
            state.first_conflict = Some(guid);
            true
        } else {
            false
        }
    }

    /// A note went through reconciliation.
    pub(crate) fn note_reconciled(&self, guid: NoteGuid) -> Option<Terminal> {
        let mut state = self.state();
        if self.last_guid == Some(guid) {
            state.last_seen = true;
        }
        Self::try_complete(&mut state)
    }

    /// The user decided a conflict; `uploaded` when the decision pushed the local copy.
    pub(crate) fn conflict_resolved(&self, guid: NoteGuid, uploaded: bool) -> Option<Terminal> {
        let mut state = self.state();
        state.pending_conflicts.remove(&guid);
        if uploaded {
            state.last_upload = Some(guid);
        }
        Self::try_complete(&mut state)
    }

    /// End a round that had no incoming notes.
    pub(crate) fn close(&self) -> Option<Terminal> {
        let mut state = self.state();
        if self.last_guid.is_none() {
            state.last_seen = true;
        }
        Self::try_complete(&mut state)
    }

    fn try_complete(state: &mut RoundState) -> Option<Terminal> {
        if state.terminal.is_some() || !state.last_seen || !state.pending_conflicts.is_empty() {
            return None;
        }
        let terminal = state
            .last_upload
            .take()
            .map_or(Terminal::Finished, Terminal::LastGuid);
        state.terminal = Some(terminal);
        Some(terminal)
    }

    fn state(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(last: NoteGuid) -> SyncRound {
        SyncRound::new(Some(last), DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn test_finishes_at_last_note_without_uploads() {
        let (a, b) = (NoteGuid::new(), NoteGuid::new());
        let round = round(b);

        assert_eq!(round.note_reconciled(a), None);
        assert_eq!(round.note_reconciled(b), Some(Terminal::Finished));
        assert_eq!(round.terminal(), Some(Terminal::Finished));
    }

    #[test]
    fn test_names_latest_upload() {
        let (a, b, c) = (NoteGuid::new(), NoteGuid::new(), NoteGuid::new());
        let round = round(c);

        round.record_upload(a);
        round.note_reconciled(a);
        round.record_upload(b);
        round.note_reconciled(b);
        assert_eq!(round.note_reconciled(c), Some(Terminal::LastGuid(b)));
    }

    #[test]
    fn test_terminal_is_issued_once() {
        let a = NoteGuid::new();
        let round = round(a);
        assert!(round.note_reconciled(a).is_some());
        assert_eq!(round.note_reconciled(a), None);
        assert_eq!(round.close(), None);
    }

    #[test]
    fn test_pending_conflict_defers_terminal() {
        let (a, b) = (NoteGuid::new(), NoteGuid::new());
        let round = round(b);

        assert!(round.register_conflict(a));
        round.note_reconciled(a);
        assert_eq!(round.note_reconciled(b), None);
        assert_eq!(round.pending_conflicts(), 1);

        assert_eq!(round.conflict_resolved(a, true), Some(Terminal::LastGuid(a)));
        assert_eq!(round.pending_conflicts(), 0);
    }

    #[test]
    fn test_conflict_on_last_note_resolved_without_upload() {
        let a = NoteGuid::new();
        let round = round(a);

        assert!(round.register_conflict(a));
        assert_eq!(round.note_reconciled(a), None);
        assert_eq!(round.conflict_resolved(a, false), Some(Terminal::Finished));
    }

    #[test]
    fn test_only_first_conflict_is_flagged_last() {
        let (a, b) = (NoteGuid::new(), NoteGuid::new());
        let round = round(b);
        assert!(round.register_conflict(a));
        assert!(!round.register_conflict(b));
    }

    #[test]
    fn test_conflict_resolved_before_last_note() {
        let (a, b) = (NoteGuid::new(), NoteGuid::new());
        let round = round(b);

        round.register_conflict(a);
        round.note_reconciled(a);
        assert_eq!(round.conflict_resolved(a, true), None);
        assert_eq!(round.note_reconciled(b), Some(Terminal::LastGuid(a)));
    }

    #[test]
    fn test_empty_round_closes() {
        let round = SyncRound::new(None, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(round.close(), Some(Terminal::Finished));
    }

    #[test]
    fn test_close_does_not_skip_last_note() {
        let a = NoteGuid::new();
        let round = round(a);
        assert_eq!(round.close(), None);
        assert_eq!(round.note_reconciled(a), Some(Terminal::Finished));
    }
}
