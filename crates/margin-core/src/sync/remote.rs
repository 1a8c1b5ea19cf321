//! Client-side contract with the remote note service

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Note, NoteGuid};

/// The remote side of a sync round
///
/// Uploads may be queued by the implementation. A round ends with exactly one
/// of `finish_sync` or `set_last_guid`.
#[async_trait]
pub trait RemoteSyncService: Send + Sync {
    /// Every note the remote currently holds
    async fn fetch_notes(&self) -> Result<Vec<Note>>;

    /// Upload a note
    async fn push_note(&self, note: &Note) -> Result<()>;

    /// Remove a note from the remote
    async fn delete_note(&self, guid: &NoteGuid) -> Result<()>;

    /// End the round
    async fn finish_sync(&self, success: bool) -> Result<()>;

    /// End the round once `guid` has been uploaded
    async fn set_last_guid(&self, guid: &NoteGuid) -> Result<()>;
}
