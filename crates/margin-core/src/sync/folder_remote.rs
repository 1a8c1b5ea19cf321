//! Directory-backed remote
//!
//! Each note lives in `<guid>.json` using the wire form. Uploads and deletions
//! are queued during a round and written out when the round ends, so a round
//! that never completes leaves the folder as it was.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::remote::RemoteSyncService;
use crate::error::{Error, Result};
use crate::models::change_date::now_utc;
use crate::models::{Note, NoteGuid, NoteWire};

/// Marker file recording the last completed round
pub const SYNC_STATE_FILE: &str = "sync-state.json";

/// Contents of [`SYNC_STATE_FILE`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    /// Guid named by `set_last_guid`, when the round uploaded anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_guid: Option<NoteGuid>,
}

#[derive(Debug)]
enum PendingOp {
    Upload(NoteWire),
    Remove,
}

#[derive(Debug, Default)]
struct Outbox {
    pending: Vec<(NoteGuid, PendingOp)>,
    last_guid: Option<NoteGuid>,
}

impl Outbox {
    fn holds(&self, guid: &NoteGuid) -> bool {
        self.pending.iter().any(|(queued, _)| queued == guid)
    }
}

/// Remote sync service over a local (or mounted) directory
pub struct FolderRemote {
    root: PathBuf,
    outbox: Mutex<Outbox>,
}

impl FolderRemote {
    /// Remote over `root` without touching the disk. The folder is created
    /// when a round first writes to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Open the folder, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let remote = Self::new(root);
        tokio::fs::create_dir_all(&remote.root).await?;
        Ok(remote)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The marker written by the last completed round, if any
    pub async fn last_state(&self) -> Result<Option<SyncState>> {
        match tokio::fs::read_to_string(self.root.join(SYNC_STATE_FILE)).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    #[cfg(test)]
    async fn pending(&self) -> usize {
        self.outbox.lock().await.pending.len()
    }

    fn note_path(&self, guid: &NoteGuid) -> PathBuf {
        self.root.join(format!("{guid}.json"))
    }

    async fn enqueue(&self, guid: NoteGuid, op: PendingOp) -> Result<()> {
        let mut outbox = self.outbox.lock().await;
        outbox.pending.retain(|(queued, _)| *queued != guid);
        outbox.pending.push((guid, op));

        if outbox.last_guid == Some(guid) {
            tracing::debug!("Final upload {guid} arrived, flushing");
            self.complete(&mut outbox, true).await?;
        }
        Ok(())
    }

    async fn complete(&self, outbox: &mut Outbox, success: bool) -> Result<()> {
        let last_guid = outbox.last_guid.take();
        let pending = std::mem::take(&mut outbox.pending);
        tokio::fs::create_dir_all(&self.root).await?;

        if success {
            let count = pending.len();
            for (guid, op) in pending {
                self.apply(guid, op).await?;
            }
            tracing::info!("Wrote {count} change(s) to {}", self.root.display());
        } else if !pending.is_empty() {
            tracing::warn!("Round failed, dropping {} queued change(s)", pending.len());
        }

        let state = SyncState {
            completed_at: now_utc(),
            success,
            last_guid,
        };
        tokio::fs::write(
            self.root.join(SYNC_STATE_FILE),
            serde_json::to_string_pretty(&state)?,
        )
        .await?;
        Ok(())
    }

    async fn apply(&self, guid: NoteGuid, op: PendingOp) -> Result<()> {
        let path = self.note_path(&guid);
        match op {
            PendingOp::Upload(wire) => {
                tokio::fs::write(&path, serde_json::to_string_pretty(&wire)?).await?;
            }
            PendingOp::Remove => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("{guid} was already gone from the remote");
                }
                Err(error) => return Err(error.into()),
            },
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSyncService for FolderRemote {
    async fn fetch_notes(&self) -> Result<Vec<Note>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut notes = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_note = path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != SYNC_STATE_FILE);
            if !is_note {
                continue;
            }

            let raw = tokio::fs::read_to_string(&path).await?;
            let wire: NoteWire = serde_json::from_str(&raw).map_err(|error| {
                Error::Remote(format!("{}: {error}", path.display()))
            })?;
            notes.push(wire.into_note()?);
        }

        notes.sort_by_key(|note| note.guid);
        tracing::debug!("Fetched {} note(s) from {}", notes.len(), self.root.display());
        Ok(notes)
    }

    async fn push_note(&self, note: &Note) -> Result<()> {
        self.enqueue(note.guid, PendingOp::Upload(NoteWire::from(note)))
            .await
    }

    async fn delete_note(&self, guid: &NoteGuid) -> Result<()> {
        self.enqueue(*guid, PendingOp::Remove).await
    }

    async fn finish_sync(&self, success: bool) -> Result<()> {
        let mut outbox = self.outbox.lock().await;
        self.complete(&mut outbox, success).await
    }

    async fn set_last_guid(&self, guid: &NoteGuid) -> Result<()> {
        let mut outbox = self.outbox.lock().await;
        outbox.last_guid = Some(*guid);
        if outbox.holds(guid) {
            self.complete(&mut outbox, true).await
        } else {
            tracing::debug!("Waiting for {guid} before flushing");
            Ok(())
        }
    }
}
