use std::path::Path;

use margin_core::db::SettingsStore;

use crate::commands::common::{
    format_note_lines, list_notes, note_to_list_item, open_workspace, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    templates: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let settings = open_workspace(db_path)?.settings.load().await?;
    let include_templates = templates || settings.include_templates_in_listing;
    let notes = list_notes(limit, include_templates, None, db_path).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
