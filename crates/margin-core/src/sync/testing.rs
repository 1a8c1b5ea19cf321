//! Remote double that records every call

use std::sync::Mutex;

use async_trait::async_trait;

use super::remote::RemoteSyncService;
use crate::error::Result;
use crate::models::{Note, NoteGuid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch,
    Push(NoteGuid),
    Delete(NoteGuid),
    Finish(bool),
    SetLastGuid(NoteGuid),
}

impl RemoteCall {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish(_) | Self::SetLastGuid(_))
    }
}

#[derive(Default)]
pub struct RecordingRemote {
    notes: Mutex<Vec<Note>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl RecordingRemote {
    pub fn with_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: Mutex::new(notes),
            calls: Mutex::default(),
        }
    }

    /// Calls made so far, `Fetch` excluded
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call != RemoteCall::Fetch)
            .cloned()
            .collect()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteSyncService for RecordingRemote {
    async fn fetch_notes(&self) -> Result<Vec<Note>> {
        self.record(RemoteCall::Fetch);
        Ok(self.notes.lock().unwrap().clone())
    }

    async fn push_note(&self, note: &Note) -> Result<()> {
        self.record(RemoteCall::Push(note.guid));
        Ok(())
    }

    async fn delete_note(&self, guid: &NoteGuid) -> Result<()> {
        self.record(RemoteCall::Delete(*guid));
        Ok(())
    }

    async fn finish_sync(&self, success: bool) -> Result<()> {
        self.record(RemoteCall::Finish(success));
        Ok(())
    }

    async fn set_last_guid(&self, guid: &NoteGuid) -> Result<()> {
        self.record(RemoteCall::SetLastGuid(*guid));
        Ok(())
    }
}
