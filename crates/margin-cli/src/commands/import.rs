use std::path::Path;
use std::sync::Arc;

use margin_core::db::SettingsStore;
use margin_core::ingest::{IngestPipeline, IngestSignal};
use margin_core::sync::{FolderRemote, Reconciler};
use tokio::sync::mpsc;

use crate::commands::common::open_workspace;
use crate::error::CliError;

pub async fn run_import(
    dir: &Path,
    workers: Option<usize>,
    db_path: &Path,
    remote_dir: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path)?;
    let settings = workspace.settings.load().await?;
    // Import never calls the remote, so the folder is not created here.
    let remote = Arc::new(FolderRemote::new(remote_dir));

    let reconciler = Arc::new(Reconciler::new(workspace.notes.clone(), remote));
    let pipeline = IngestPipeline::new(reconciler, workers.unwrap_or(settings.ingest_workers));

    let (signals, mut receiver) = mpsc::unbounded_channel();
    let source = dir.display().to_string();
    let printer = tokio::spawn(async move {
        while let Some(signal) = receiver.recv().await {
            let line = describe_signal(&signal, &source);
            if matches!(signal, IngestSignal::ParsingFailed { .. }) {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
    });

    let result = pipeline.run(dir, signals).await;
    printer
        .await
        .map_err(|error| CliError::Task(error.to_string()))?;
    result?;
    Ok(())
}

pub fn describe_signal(signal: &IngestSignal, source: &str) -> String {
    match signal {
        IngestSignal::NoNotes => format!("No notes found in {source}"),
        IngestSignal::ParsingFailed { path, error } => {
            format!("Skipped {}: {error}", path.display())
        }
        IngestSignal::ParsingComplete(summary) if summary.failed == 0 => {
            format!("Imported {} note(s)", summary.ingested)
        }
        IngestSignal::ParsingComplete(summary) => format!(
            "Imported {} of {} note(s), {} failed",
            summary.ingested, summary.total, summary.failed
        ),
    }
}
