use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use margin_core::models::change_date::format_change_date;
use margin_core::sync::{
    ConflictDecision, ConflictHandle, ConflictPresenter, FixedPresenter, Reconciler, RoundReport,
    SyncRunner,
};
use tokio::sync::Mutex;

use crate::cli::Preference;
use crate::commands::common::{open_remote, open_workspace};
use crate::error::CliError;

/// Asks on the terminal, one conflict at a time
#[derive(Default)]
pub struct PromptPresenter {
    turn: Mutex<()>,
}

#[async_trait]
impl ConflictPresenter for PromptPresenter {
    async fn present_conflict(&self, conflict: &ConflictHandle) -> ConflictDecision {
        let _turn = self.turn.lock().await;
        let summary = describe_conflict(conflict);

        match tokio::task::spawn_blocking(move || ask(&summary)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(error)) => {
                tracing::warn!("Could not read a decision, deferring: {error}");
                ConflictDecision::Defer
            }
            Err(error) => {
                tracing::warn!("Prompt task failed, deferring: {error}");
                ConflictDecision::Defer
            }
        }
    }
}

fn ask(summary: &str) -> io::Result<ConflictDecision> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{summary}")?;

    loop {
        write!(stdout, "Keep [l]ocal, take [r]emote or [d]efer? ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(ConflictDecision::Defer);
        }
        if let Some(decision) = parse_decision(&line) {
            return Ok(decision);
        }
    }
}

pub fn parse_decision(input: &str) -> Option<ConflictDecision> {
    match input.trim().to_lowercase().as_str() {
        "l" | "local" => Some(ConflictDecision::ApplyLocal),
        "r" | "remote" => Some(ConflictDecision::ApplyRemote),
        "d" | "defer" | "" => Some(ConflictDecision::Defer),
        _ => None,
    }
}

pub fn describe_conflict(conflict: &ConflictHandle) -> String {
    let (local_mark, remote_mark) = match conflict.diff_direction {
        1 => (" (newer)", ""),
        -1 => ("", " (newer)"),
        _ => ("", ""),
    };
    format!(
        "Conflict on '{}' ({})\n  local:  {}{local_mark}\n  remote: {}{remote_mark}",
        conflict.local.title,
        conflict.guid(),
        format_change_date(&conflict.local.last_change_date()),
        format_change_date(&conflict.remote.last_change_date()),
    )
}

pub const fn decision_for(preference: Preference) -> ConflictDecision {
    match preference {
        Preference::Local => ConflictDecision::ApplyLocal,
        Preference::Remote => ConflictDecision::ApplyRemote,
        Preference::Defer => ConflictDecision::Defer,
    }
}

pub async fn run_sync(
    prefer: Option<Preference>,
    as_json: bool,
    db_path: &Path,
    remote_dir: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path)?;
    let remote = open_remote(remote_dir).await?;
    let reconciler = Arc::new(Reconciler::new(workspace.notes.clone(), remote));

    let presenter: Arc<dyn ConflictPresenter> = match prefer {
        Some(preference) => Arc::new(FixedPresenter(decision_for(preference))),
        None if io::stdin().is_terminal() => Arc::new(PromptPresenter::default()),
        None => Arc::new(FixedPresenter(ConflictDecision::Defer)),
    };

    let runner = SyncRunner::new(reconciler, workspace.settings.clone(), presenter);
    let report = runner.run().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_report_lines(report: &RoundReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sync {}: {} fetched, {} pushed, {} pulled, {} new",
        if report.completed { "completed" } else { "incomplete" },
        report.fetched,
        report.pushed,
        report.pulled,
        report.inserted
    )];
    if report.deleted_everywhere > 0 || report.purged_local > 0 {
        lines.push(format!(
            "Deleted {} note(s) everywhere, {} locally",
            report.deleted_everywhere, report.purged_local
        ));
    }
    if report.conflicts > 0 {
        lines.push(format!(
            "{} conflict(s), {} deferred",
            report.conflicts, report.deferred
        ));
    }
    lines
}
