use std::path::Path;

use margin_core::db::NoteStore;
use margin_core::models::content::to_note_content;
use margin_core::Note;

use crate::commands::common::{normalize_title, open_workspace, resolve_note_body};
use crate::error::CliError;

pub async fn run_add(title: &str, body_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let body = resolve_note_body(body_parts)?;

    let workspace = open_workspace(db_path)?;
    let note = Note::create(title, to_note_content(&body));
    workspace.notes.upsert(&note).await?;

    println!("{}", note.guid);
    Ok(())
}
