//! Drives one complete sync round against the remote

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use super::conflict::{ConflictHandle, ConflictPresenter};
use super::engine::{Reconciler, Reconciliation, SyncAction};
use super::round::SyncRound;
use crate::db::{NoteKey, NoteStore, SettingsStore};
use crate::error::{Error, Result};
use crate::models::change_date::now_utc;
use crate::models::{Note, NoteGuid};

/// What a sync round did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    pub fetched: usize,
    pub inserted: usize,
    pub refreshed: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub deleted_everywhere: usize,
    /// Local tombstones the remote never had
    pub purged_local: usize,
    pub conflicts: usize,
    pub deferred: usize,
    /// Whether the terminal call went out
    pub completed: bool,
}

impl RoundReport {
    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Inserted => self.inserted += 1,
            SyncAction::Refreshed => self.refreshed += 1,
            SyncAction::PushedLocal => self.pushed += 1,
            SyncAction::PulledRemote => self.pulled += 1,
            SyncAction::DeletedEverywhere => self.deleted_everywhere += 1,
            SyncAction::Deferred => self.deferred += 1,
            SyncAction::KeptLocal => {}
        }
    }
}

/// Runs sync rounds: fetch, push local-only changes, reconcile, resolve conflicts
pub struct SyncRunner {
    reconciler: Arc<Reconciler>,
    settings: Arc<dyn SettingsStore>,
    presenter: Arc<dyn ConflictPresenter>,
}

impl SyncRunner {
    pub fn new(
        reconciler: Arc<Reconciler>,
        settings: Arc<dyn SettingsStore>,
        presenter: Arc<dyn ConflictPresenter>,
    ) -> Self {
        Self {
            reconciler,
            settings,
            presenter,
        }
    }

    /// Run one round. On error the baseline is left untouched so the whole
    /// round can be retried.
    pub async fn run(&self) -> Result<RoundReport> {
        let mut settings = self.settings.load().await?;
        let baseline = settings.baseline();
        let started = now_utc();
        let store = self.reconciler.store();
        let remote = self.reconciler.remote();
        let mut report = RoundReport::default();

        let incoming = remote.fetch_notes().await?;
        report.fetched = incoming.len();
        tracing::info!("Sync round started: {} remote note(s)", incoming.len());

        let round = SyncRound::for_batch(&incoming, baseline);
        let on_remote: HashSet<NoteGuid> = incoming.iter().map(|note| note.guid).collect();

        for note in changed_since(store.as_ref(), baseline).await? {
            if on_remote.contains(&note.guid) {
                continue;
            }
            if note.is_deleted() {
                tracing::debug!("Removing tombstone {} the remote never had", note.guid);
                let key = note.local_handle.map_or(NoteKey::Guid(note.guid), NoteKey::Handle);
                store.delete(key).await?;
                report.purged_local += 1;
            } else {
                tracing::debug!("Pushing new local note '{}' ({})", note.title, note.guid);
                remote.push_note(&note).await?;
                round.record_upload(note.guid);
                report.pushed += 1;
            }
        }

        let mut conflicts = Vec::new();
        if incoming.is_empty() {
            self.reconciler.close_round(&round).await?;
        }
        for note in incoming {
            match self.reconciler.reconcile(note, &round).await? {
                Reconciliation::Resolved(resolution) => report.record(resolution.action),
                Reconciliation::AwaitingUser(conflict) => conflicts.push(conflict),
            }
        }

        report.conflicts = conflicts.len();
        for action in self.present_all(conflicts, &round).await? {
            report.record(action);
        }

        report.completed = round.terminal().is_some();
        if report.completed {
            settings.last_sync_date = Some(started);
            self.settings.save(&settings).await?;
        } else {
            tracing::warn!("Sync round ended without a terminal call; baseline kept");
        }

        tracing::info!(
            "Sync round finished: {} pushed, {} pulled, {} inserted, {} conflict(s)",
            report.pushed,
            report.pulled,
            report.inserted,
            report.conflicts
        );
        Ok(report)
    }

    /// Present every conflict at once and resolve each as its decision arrives.
    async fn present_all(
        &self,
        conflicts: Vec<ConflictHandle>,
        round: &SyncRound,
    ) -> Result<Vec<SyncAction>> {
        let mut tasks = JoinSet::new();
        for conflict in conflicts {
            let presenter = Arc::clone(&self.presenter);
            tasks.spawn(async move {
                let decision = presenter.present_conflict(&conflict).await;
                (conflict, decision)
            });
        }

        let mut actions = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (conflict, decision) = joined.map_err(|error| Error::Task(error.to_string()))?;
            let resolution = self
                .reconciler
                .resolve_conflict(conflict, decision, round)
                .await?;
            actions.push(resolution.action);
        }
        Ok(actions)
    }
}

/// Local notes changed after `baseline`, tombstones included
async fn changed_since(store: &dyn NoteStore, baseline: DateTime<Utc>) -> Result<Vec<Note>> {
    Ok(store
        .list_by_guid_date()
        .await?
        .into_iter()
        .filter(|note| note.last_change_date() > baseline)
        .collect())
}
