//! Concurrent ingestion of note documents
//!
//! A fixed pool of workers drains the document listing. Each worker parses a
//! document and hands the note to [`Reconciler::import`] before taking the
//! next one. Whichever worker settles the final outstanding document sends the
//! single [`IngestSignal::ParsingComplete`] for the batch.

pub mod document;
mod source;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::sync::{Reconciler, Resolution};

pub use document::{parse_note_document, NOTE_SUFFIX};
pub use source::list_note_documents;

/// Batch progress reported to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSignal {
    /// The directory held no note documents; nothing was done
    NoNotes,
    /// One document could not be ingested; the rest of the batch continues
    ParsingFailed { path: PathBuf, error: String },
    /// Every document has been ingested or has failed
    ParsingComplete(IngestSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub total: usize,
    pub ingested: usize,
    pub failed: usize,
}

/// Countdown shared by the workers of one batch
struct Batch {
    queue: Mutex<VecDeque<PathBuf>>,
    total: usize,
    remaining: AtomicUsize,
    ingested: AtomicUsize,
    failed: AtomicUsize,
}

impl Batch {
    fn new(documents: Vec<PathBuf>) -> Self {
        let total = documents.len();
        Self {
            queue: Mutex::new(documents.into()),
            total,
            remaining: AtomicUsize::new(total),
            ingested: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<PathBuf> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Count one settled document. True for the document that settles the batch.
    fn settle(&self, ingested: bool) -> bool {
        let counter = if ingested { &self.ingested } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }

    fn summary(&self) -> IngestSummary {
        IngestSummary {
            total: self.total,
            ingested: self.ingested.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

/// Parses a directory of note documents into the local store
pub struct IngestPipeline {
    reconciler: Arc<Reconciler>,
    workers: usize,
}

impl IngestPipeline {
    /// `workers` is clamped to at least one.
    pub fn new(reconciler: Arc<Reconciler>, workers: usize) -> Self {
        Self {
            reconciler,
            workers: workers.max(1),
        }
    }

    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Ingest every document in `dir`, reporting progress on `signals`.
    ///
    /// Only listing the directory can fail the call; per-document failures are
    /// signalled and counted in the summary.
    pub async fn run(
        &self,
        dir: &Path,
        signals: UnboundedSender<IngestSignal>,
    ) -> Result<IngestSummary> {
        let documents = list_note_documents(dir).await?;
        if documents.is_empty() {
            tracing::info!("No note documents in {}", dir.display());
            emit(&signals, IngestSignal::NoNotes);
            return Ok(IngestSummary::default());
        }

        let batch = Arc::new(Batch::new(documents));
        let pool = self.workers.min(batch.total);
        tracing::info!(
            "Ingesting {} document(s) from {} with {pool} worker(s)",
            batch.total,
            dir.display()
        );

        let mut tasks = JoinSet::new();
        for worker in 0..pool {
            let batch = Arc::clone(&batch);
            let reconciler = Arc::clone(&self.reconciler);
            let signals = signals.clone();
            tasks.spawn(async move { work(worker, &batch, &reconciler, &signals).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|error| Error::Task(error.to_string()))?;
        }

        Ok(batch.summary())
    }
}

async fn work(
    worker: usize,
    batch: &Batch,
    reconciler: &Reconciler,
    signals: &UnboundedSender<IngestSignal>,
) {
    while let Some(path) = batch.next() {
        let ingested = match ingest_document(reconciler, &path).await {
            Ok(resolution) => {
                tracing::debug!(
                    "Worker {worker}: {} -> {:?}",
                    path.display(),
                    resolution.action
                );
                true
            }
            Err(error) => {
                if error.is_document_failure() {
                    tracing::warn!("Skipping {}: {error}", path.display());
                } else {
                    tracing::error!("Failed to store {}: {error}", path.display());
                }
                emit(
                    signals,
                    IngestSignal::ParsingFailed {
                        path: path.clone(),
                        error: error.to_string(),
                    },
                );
                false
            }
        };

        if batch.settle(ingested) {
            let summary = batch.summary();
            tracing::info!(
                "Ingestion complete: {} of {} document(s), {} failed",
                summary.ingested,
                summary.total,
                summary.failed
            );
            emit(signals, IngestSignal::ParsingComplete(summary));
        }
    }
}

async fn ingest_document(reconciler: &Reconciler, path: &Path) -> Result<Resolution> {
    let raw = tokio::fs::read_to_string(path).await?;
    let note = parse_note_document(path, &raw)?;
    reconciler.import(note).await
}

fn emit(signals: &UnboundedSender<IngestSignal>, signal: IngestSignal) {
    if signals.send(signal).is_err() {
        tracing::debug!("Ingestion signal dropped, nobody is listening");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, ListFilter, NoteKey, NoteStore, SqliteNoteStore};
    use crate::models::{Note, NoteGuid, NoteHandle};
    use crate::sync::testing::RecordingRemote;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    /// Counts every store call
    struct CountingStore {
        inner: SqliteNoteStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: SqliteNoteStore::new(Arc::new(Database::open_in_memory().unwrap())),
                calls: AtomicUsize::new(0),
            }
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl NoteStore for CountingStore {
        async fn find(&self, guid: &NoteGuid) -> Result<Option<Note>> {
            self.hit();
            self.inner.find(guid).await
        }

        async fn upsert(&self, note: &Note) -> Result<NoteHandle> {
            self.hit();
            self.inner.upsert(note).await
        }

        async fn delete(&self, key: NoteKey) -> Result<bool> {
            self.hit();
            self.inner.delete(key).await
        }

        async fn list_by_guid_date(&self) -> Result<Vec<Note>> {
            self.hit();
            self.inner.list_by_guid_date().await
        }

        async fn list(&self, filter: &ListFilter) -> Result<Vec<Note>> {
            self.hit();
            self.inner.list(filter).await
        }

        async fn purge_deleted(&self) -> Result<usize> {
            self.hit();
            self.inner.purge_deleted().await
        }
    }

    fn pipeline(workers: usize) -> (IngestPipeline, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::new());
        let reconciler = Reconciler::new(store.clone(), Arc::new(RecordingRemote::default()));
        (IngestPipeline::new(Arc::new(reconciler), workers), store)
    }

    fn write_note(dir: &Path, title: &str, date: &str) -> NoteGuid {
        let guid = NoteGuid::new();
        let raw = format!(
            "<note version=\"0.3\"><title>{title}</title><text xml:space=\"preserve\">\
             <note-content version=\"0.1\">{title}\n\nbody of {title}</note-content></text>\
             <last-change-date>{date}</last-change-date></note>"
        );
        std::fs::write(dir.join(format!("{guid}.note")), raw).unwrap();
        guid
    }

    async fn run(
        pipeline: &IngestPipeline,
        dir: &Path,
    ) -> (IngestSummary, Vec<IngestSignal>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = pipeline.run(dir, tx).await.unwrap();
        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        (summary, signals)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_worker_signals_complete_once() {
        let dir = tempfile::tempdir().unwrap();
        for (i, title) in ["One", "Two", "Three"].iter().enumerate() {
            write_note(dir.path(), title, &format!("2012-0{}-01T10:00:00.0000000+02:00", i + 1));
        }
        let (pipeline, store) = pipeline(1);

        // Count the stored notes at the moment each signal arrives.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let receiver = async {
            let mut seen = Vec::new();
            while let Some(signal) = rx.recv().await {
                let stored = store.inner.list_by_guid_date().await.unwrap().len();
                seen.push((signal, stored));
            }
            seen
        };
        let (summary, seen) = tokio::join!(pipeline.run(dir.path(), tx), receiver);

        let expected = IngestSummary {
            total: 3,
            ingested: 3,
            failed: 0,
        };
        assert_eq!(summary.unwrap(), expected);
        assert_eq!(seen, vec![(IngestSignal::ParsingComplete(expected), 3)]);
        let stored = store.inner.list(&ListFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored
            .iter()
            .all(|note| note.xml_content().starts_with("<note-content version=\"0.1\">body of")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_directory_signals_no_notes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("not-a-note.txt"), "").unwrap();
        let (pipeline, store) = pipeline(1);

        let (summary, signals) = run(&pipeline, dir.path()).await;

        assert_eq!(summary, IngestSummary::default());
        assert_eq!(signals, vec![IngestSignal::NoNotes]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bad_document_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "Good", "2012-01-01T10:00:00.000Z");
        let bad = write_note(dir.path(), "Bad", "the day after tomorrow");
        write_note(dir.path(), "Also good", "2012-01-02T10:00:00.000Z");
        let (pipeline, _store) = pipeline(2);

        let (summary, signals) = run(&pipeline, dir.path()).await;

        assert_eq!(summary.ingested, 2);
        assert_eq!(summary.failed, 1);
        let failures = signals
            .iter()
            .filter_map(|signal| match signal {
                IngestSignal::ParsingFailed { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(failures, vec![dir.path().join(format!("{bad}.note"))]);
        assert_eq!(signals.last(), Some(&IngestSignal::ParsingComplete(summary)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parallel_workers_complete_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..24 {
            write_note(
                dir.path(),
                &format!("Note {i}"),
                &format!("2013-03-{:02}T09:30:00.000Z", i + 1),
            );
        }
        let (pipeline, store) = pipeline(4);

        let (summary, signals) = run(&pipeline, dir.path()).await;

        assert_eq!(summary.ingested, 24);
        let completions = signals
            .iter()
            .filter(|signal| matches!(signal, IngestSignal::ParsingComplete(_)))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(store.inner.list_by_guid_date().await.unwrap().len(), 24);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reimport_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "Again", "2012-01-01T10:00:00.000Z");
        let (pipeline, store) = pipeline(1);

        run(&pipeline, dir.path()).await;
        let first = store.inner.list_by_guid_date().await.unwrap();
        run(&pipeline, dir.path()).await;
        let second = store.inner.list_by_guid_date().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_workers_clamped() {
        let (pipeline, _store) = pipeline(0);
        assert_eq!(pipeline.workers(), 1);
    }
}
