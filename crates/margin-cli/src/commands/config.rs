use std::path::Path;

use margin_core::db::SettingsStore;
use margin_core::models::change_date::format_change_date;
use margin_core::models::SyncSettings;

use crate::commands::common::open_workspace;
use crate::error::CliError;

pub async fn run_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let settings = open_workspace(db_path)?.settings.load().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        for line in format_settings_lines(&settings) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_set(
    workers: Option<usize>,
    include_templates: Option<bool>,
    reset_sync_date: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path)?;
    let current = workspace.settings.load().await?;
    let updated = apply_settings(current, workers, include_templates, reset_sync_date)?;

    workspace.settings.save(&updated).await?;
    for line in format_settings_lines(&updated) {
        println!("{line}");
    }
    Ok(())
}

pub fn apply_settings(
    mut settings: SyncSettings,
    workers: Option<usize>,
    include_templates: Option<bool>,
    reset_sync_date: bool,
) -> Result<SyncSettings, CliError> {
    if let Some(workers) = workers {
        if workers == 0 {
            return Err(CliError::Config("worker count must be at least 1".to_string()));
        }
        settings.ingest_workers = workers;
    }
    if let Some(include_templates) = include_templates {
        settings.include_templates_in_listing = include_templates;
    }
    if reset_sync_date {
        settings.last_sync_date = None;
    }
    Ok(settings)
}

pub fn format_settings_lines(settings: &SyncSettings) -> Vec<String> {
    vec![
        format!(
            "last sync:         {}",
            settings
                .last_sync_date
                .map_or_else(|| "never".to_string(), |date| format_change_date(&date))
        ),
        format!(
            "include templates: {}",
            settings.include_templates_in_listing
        ),
        format!("ingest workers:    {}", settings.ingest_workers),
    ]
}
